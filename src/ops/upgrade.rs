//! Implementation of `strata upgrade`.

use std::collections::BTreeSet;

use anyhow::Result;
use tracing::{debug, info};

use super::sync::{execute, Backends, SyncOptions};
use crate::planner::PlanSummary;
use crate::resolver::UpgradeSummary;
use crate::util::context::GlobalContext;
use crate::util::shell::{Shell, Status};

/// Upgrade every installed package that has a newer version, leaving out
/// `exclude` and whatever only they needed.
pub fn upgrade(
    ctx: &GlobalContext,
    backends: &Backends<'_>,
    shell: &Shell,
    opts: &SyncOptions,
    exclude: &[String],
) -> Result<(UpgradeSummary, PlanSummary)> {
    shell.status(Status::Resolving, "upgrades");

    if let Some(store) = backends.store {
        let installed: BTreeSet<String> =
            backends.db.local_packages().into_iter().map(|pkg| pkg.name).collect();
        let removed = store.clean_orphans(&installed)?;
        if !removed.is_empty() {
            info!("forgot fingerprints of removed packages: {}", removed.join(", "));
        }
    }

    let mut grapher = backends.grapher(opts.resolve.clone());
    let upgrades = grapher.graph_upgrades(backends.store)?;
    for name in &upgrades.ignored {
        shell.status(Status::Skipped, format!("{} (ignored)", name));
    }

    for name in exclude {
        let removed = grapher.exclude_upgrade(name);
        debug!("excluding {} removed {:?}", name, removed);
    }

    // Explicit targets can ride along with the upgrade.
    grapher.graph_from_targets(&opts.targets)?;
    let resolution = grapher.finish()?;

    let summary = execute(ctx, backends, shell, resolution, opts)?;
    Ok((upgrades, summary))
}
