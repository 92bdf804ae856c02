//! PKGBUILD repositories from the AUR.
//!
//! Every package base lives in its own git repository at
//! `<aur_url>/<base>.git`. Checkouts are kept under the build directory and
//! updated in place on later runs.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use git2::{Repository, ResetType};

use super::PkgbuildSource;
use crate::util::config::Config;
use crate::util::pool::{fan_out, worker_count};
use crate::util::shell::Progress;

/// [`PkgbuildSource`] cloning from the AUR's git server.
#[derive(Debug, Clone)]
pub struct AurGit {
    url: String,
    workers: usize,
}

impl AurGit {
    pub fn new(url: impl Into<String>, workers: usize) -> Self {
        AurGit {
            url: url.into(),
            workers,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        AurGit::new(config.aur_url(), worker_count(config.build.download_workers))
    }
}

impl PkgbuildSource for AurGit {
    fn fetch(
        &self,
        bases: &BTreeSet<String>,
        build_dir: &Path,
        progress: &Progress,
    ) -> Result<Vec<(String, PathBuf)>> {
        fetch_pkgbuilds(&self.url, bases.iter().cloned(), build_dir, self.workers, progress)
    }
}

/// Clone URL of the PKGBUILD repository of `base`.
pub fn pkgbuild_url(aur_url: &str, base: &str) -> String {
    format!("{}/{}.git", aur_url.trim_end_matches('/'), base)
}

/// Clone or update the checkout of `base` in `dest`.
pub fn fetch_pkgbuild(aur_url: &str, base: &str, dest: &Path) -> Result<()> {
    let url = pkgbuild_url(aur_url, base);
    if dest.join(".git").exists() {
        update(&url, dest)
    } else {
        clone(&url, dest)
    }
}

fn clone(url: &str, dest: &Path) -> Result<()> {
    tracing::info!("Cloning {}", url);

    if let Some(parent) = dest.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    Repository::clone(url, dest).with_context(|| format!("failed to clone {}", url))?;
    Ok(())
}

fn update(url: &str, dest: &Path) -> Result<()> {
    tracing::debug!("Updating {}", url);

    let repo = Repository::open(dest)
        .with_context(|| format!("failed to open git repository {}", dest.display()))?;

    let mut remote = repo.find_remote("origin")?;
    remote
        .fetch(&["HEAD"], None, None)
        .with_context(|| format!("failed to fetch {}", url))?;

    // Local edits to the PKGBUILD are discarded.
    let head = repo.find_reference("FETCH_HEAD")?.peel_to_commit()?;
    repo.reset(head.as_object(), ResetType::Hard, None)?;
    Ok(())
}

/// Fetch the PKGBUILD repositories of `bases` into `build_dir` on at most
/// `workers` threads. Returns the checkout of every base; failures of
/// individual bases are reported together after all have been tried.
pub fn fetch_pkgbuilds<I, S>(
    aur_url: &str,
    bases: I,
    build_dir: &Path,
    workers: usize,
    progress: &Progress,
) -> Result<Vec<(String, PathBuf)>>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let outcome = fan_out(bases, workers, |base| {
        let dest = build_dir.join(base);
        let result = fetch_pkgbuild(aur_url, base, &dest);
        progress.inc(1);
        result.map(|()| (base.to_string(), dest))
    });
    progress.finish();

    let mut fetched = outcome.into_result()?;
    fetched.sort();
    Ok(fetched)
}
