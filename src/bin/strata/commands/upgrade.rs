//! `strata upgrade` command

use anyhow::Result;

use super::{GlobalArgs, Session};
use crate::cli::UpgradeArgs;
use strata::ops::upgrade;
use strata::util::shell::Status;

pub fn execute(global: &GlobalArgs, args: UpgradeArgs) -> Result<()> {
    let session = Session::open(global)?;

    let mut opts = session.sync_options(&args.build)?;
    opts.targets = args.targets;
    opts.resolve.devel |= args.devel;
    opts.resolve.downgrade |= args.downgrade;
    opts.resolve.ignore.extend(args.ignore);

    let (upgrades, summary) = upgrade(
        &session.ctx,
        &session.backends(),
        &session.shell,
        &opts,
        &args.exclude,
    )?;

    if upgrades.is_empty() {
        session.shell.note("everything is up to date");
    } else {
        session.shell.status(
            Status::Finished,
            format!(
                "{} repository, {} AUR, {} development upgrades ({} installed)",
                upgrades.repo.len(),
                upgrades.aur.len(),
                upgrades.devel.len(),
                summary.total()
            ),
        );
    }

    Ok(())
}
