//! Source downloads ahead of building.

use std::collections::BTreeMap;
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use tracing::debug;

use super::build::MakepkgCommand;
use crate::util::pool::fan_out;
use crate::util::process::CommandRunner;
use crate::util::shell::Progress;

/// Download and verify the sources of every base in `dirs` on at most
/// `workers` threads. All bases are attempted; failures are reported together.
pub fn download_sources(
    runner: &dyn CommandRunner,
    makepkg: &MakepkgCommand,
    dirs: &BTreeMap<String, PathBuf>,
    workers: usize,
    progress: &Progress,
) -> Result<()> {
    let outcome = fan_out(dirs.keys().cloned(), workers, |base| {
        let dir = dirs
            .get(base)
            .with_context(|| format!("no build directory for {}", base))?;
        let cmd = makepkg.verify_sources(dir);
        debug!("downloading sources for {}", base);
        let output = runner.capture(&cmd)?;
        progress.inc(1);
        if !output.success() {
            bail!(
                "failed to download sources for {}: {}",
                base,
                output.stderr.trim()
            );
        }
        Ok(())
    });
    progress.finish();
    outcome.into_result().map(|_| ())
}
