//! Global context for strata operations.
//!
//! Resolves the directories strata works in from the loaded [`Config`] and
//! carries the config itself, so operations take one explicit value instead
//! of reaching for process-wide state.

use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use anyhow::{Context, Result};
use directories::{BaseDirs, ProjectDirs};

use super::config::Config;

static PROJECT_DIRS: LazyLock<Option<ProjectDirs>> =
    LazyLock::new(|| ProjectDirs::from("", "", "strata"));

/// Global context for strata operations.
#[derive(Debug, Clone)]
pub struct GlobalContext {
    /// Current working directory
    cwd: PathBuf,

    /// Cache root (`~/.cache/strata`)
    home: PathBuf,

    /// Merged configuration
    config: Config,
}

impl GlobalContext {
    /// Create a new GlobalContext for `config`.
    pub fn new(config: Config) -> Result<Self> {
        let cwd = std::env::current_dir().context("failed to get current directory")?;

        let home = if let Some(dirs) = PROJECT_DIRS.as_ref() {
            dirs.cache_dir().to_path_buf()
        } else {
            BaseDirs::new()
                .map(|b| b.home_dir().join(".cache").join("strata"))
                .unwrap_or_else(|| PathBuf::from(".strata"))
        };

        Ok(GlobalContext { cwd, home, config })
    }

    /// Create a GlobalContext rooted at explicit directories.
    pub fn with_dirs(cwd: PathBuf, home: PathBuf, config: Config) -> Self {
        GlobalContext { cwd, home, config }
    }

    /// Get the current working directory.
    pub fn cwd(&self) -> &Path {
        &self.cwd
    }

    /// Get the strata cache root.
    pub fn home(&self) -> &Path {
        &self.home
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Directory PKGBUILD repositories are cloned and built in.
    pub fn build_dir(&self) -> PathBuf {
        self.config
            .paths
            .build_dir
            .clone()
            .unwrap_or_else(|| self.home.clone())
    }

    /// Path of the development package fingerprint store.
    pub fn vcs_file(&self) -> PathBuf {
        self.config
            .paths
            .vcs_file
            .clone()
            .unwrap_or_else(|| self.home.join("vcs.json"))
    }

    /// Ensure a directory exists, creating it if necessary.
    pub fn ensure_dir(&self, path: &Path) -> Result<()> {
        super::fs::ensure_dir(path)
    }
}

/// Default location of the global configuration file.
pub fn global_config_path() -> Option<PathBuf> {
    if let Some(dirs) = PROJECT_DIRS.as_ref() {
        return Some(dirs.config_dir().join("config.toml"));
    }
    BaseDirs::new().map(|b| b.config_dir().join("strata").join("config.toml"))
}
