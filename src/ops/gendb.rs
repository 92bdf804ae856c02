//! Implementation of `strata gendb`.
//!
//! Seeds the fingerprint store for development packages that were installed
//! before strata tracked them, so the next `upgrade --devel` has something to
//! compare against.

use std::collections::{BTreeMap, BTreeSet};

use anyhow::{bail, Context, Result};
use tracing::warn;

use super::sync::Backends;
use crate::aur::AurQuery;
use crate::resolver::Srcinfo;
use crate::util::context::GlobalContext;
use crate::util::shell::{Shell, Status};
use crate::vcs::parse_source;

/// Record the current upstream commit of every VCS source of installed
/// foreign packages found in the AUR. Returns the packages recorded.
pub fn gendb(ctx: &GlobalContext, backends: &Backends<'_>, shell: &Shell) -> Result<Vec<String>> {
    let Some(store) = backends.store else {
        bail!("no fingerprint store configured");
    };

    let foreign: Vec<String> = backends
        .db
        .installed_foreign_packages()
        .into_iter()
        .map(|pkg| pkg.name)
        .collect();
    if foreign.is_empty() {
        shell.note("no foreign packages installed");
        return Ok(Vec::new());
    }

    shell.status(Status::Resolving, format!("{} foreign packages", foreign.len()));
    let records = backends
        .remote
        .query(&AurQuery::names(foreign.iter().cloned()))
        .context("failed to query the AUR")?;

    // Package name -> base, for the packages the AUR knows.
    let bases: BTreeMap<String, String> = records
        .into_iter()
        .map(|rec| (rec.name, rec.base))
        .collect();
    let to_fetch: BTreeSet<String> = bases.values().cloned().collect();
    if to_fetch.is_empty() {
        return Ok(Vec::new());
    }

    let build_dir = ctx.build_dir();
    ctx.ensure_dir(&build_dir)?;
    let progress = shell.progress(to_fetch.len() as u64, "Fetching PKGBUILDs");
    backends
        .pkgbuilds
        .fetch(&to_fetch, &build_dir, &progress)
        .context("failed to fetch PKGBUILDs")?;

    let archs = backends.db.architectures();
    let mut recorded = Vec::new();
    for (name, base) in &bases {
        let srcinfo = match Srcinfo::from_dir(&build_dir.join(base), &archs) {
            Ok(srcinfo) => srcinfo,
            Err(e) => {
                warn!("skipping {}: {}", name, e);
                continue;
            }
        };
        if !srcinfo.sources.iter().any(|s| parse_source(s).is_some()) {
            continue;
        }

        shell.status(Status::Fetching, format!("fingerprints of {}", name));
        store.update(name, &srcinfo.sources)?;
        if store.get(name).is_some() {
            recorded.push(name.clone());
        }
    }

    Ok(recorded)
}
