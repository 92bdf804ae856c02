//! `strata install` command

use anyhow::Result;

use super::{GlobalArgs, Session};
use crate::cli::InstallArgs;
use strata::ops::sync;
use strata::util::shell::Status;

pub fn execute(global: &GlobalArgs, args: InstallArgs) -> Result<()> {
    let session = Session::open(global)?;

    let mut opts = session.sync_options(&args.build)?;
    opts.targets = args.targets;
    opts.srcinfo_dir = args.srcinfo;

    let summary = sync(&session.ctx, &session.backends(), &session.shell, &opts)?;
    if summary.total() > 0 {
        session
            .shell
            .status(Status::Finished, format!("{} packages", summary.total()));
    }

    Ok(())
}
