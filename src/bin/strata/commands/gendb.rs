//! `strata gendb` command

use anyhow::Result;

use super::{GlobalArgs, Session};
use strata::ops::gendb;
use strata::util::shell::Status;

pub fn execute(global: &GlobalArgs) -> Result<()> {
    let session = Session::open(global)?;

    let recorded = gendb(&session.ctx, &session.backends(), &session.shell)?;
    session.shell.status(
        Status::Finished,
        format!("recorded {} development packages", recorded.len()),
    );

    Ok(())
}
