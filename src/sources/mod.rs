//! Package sources.
//!
//! Source-built packages are fetched as git repositories holding a PKGBUILD
//! and its `.SRCINFO`.

pub mod aur;

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use anyhow::Result;

use crate::util::shell::Progress;

pub use aur::{fetch_pkgbuild, fetch_pkgbuilds, pkgbuild_url, AurGit};

/// Where the build recipes of package bases come from.
pub trait PkgbuildSource: Send + Sync {
    /// Place the recipe of every base in `<build_dir>/<base>` and return
    /// the directories.
    fn fetch(
        &self,
        bases: &BTreeSet<String>,
        build_dir: &Path,
        progress: &Progress,
    ) -> Result<Vec<(String, PathBuf)>>;
}
