//! Configuration file support for strata.
//!
//! strata reads two configuration files:
//! - Global: `$XDG_CONFIG_HOME/strata/config.toml` - User-wide defaults
//! - Explicit: the file passed with `--config` - Per-invocation overrides
//!
//! The explicit file takes precedence over the global one, and command-line
//! flags take precedence over both. The merged [`Config`] is built once and
//! handed to every component that needs it.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

pub const DEFAULT_AUR_URL: &str = "https://aur.archlinux.org";
pub const DEFAULT_DB_PATH: &str = "/var/lib/pacman";
pub const DEFAULT_PACMAN_CONF: &str = "/etc/pacman.conf";

/// strata configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Filesystem locations
    pub paths: PathsConfig,

    /// AUR access
    pub aur: AurConfig,

    /// makepkg behaviour
    pub build: BuildConfig,

    /// pacman behaviour and target selection
    pub install: InstallConfig,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    /// Where PKGBUILD repositories are cloned and built
    pub build_dir: Option<PathBuf>,

    /// Fingerprint store for development packages
    pub vcs_file: Option<PathBuf>,

    /// pacman database root
    pub db_path: Option<PathBuf>,

    /// pacman configuration passed to every transaction
    pub pacman_conf: Option<PathBuf>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AurConfig {
    /// Base URL for RPC requests and PKGBUILD clones
    pub url: Option<String>,

    /// HTTP timeout in seconds
    pub timeout: Option<u64>,

    /// Concurrent provider searches
    pub provider_workers: Option<usize>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BuildConfig {
    /// When to rebuild packages whose archives already exist
    pub rebuild: Option<RebuildMode>,

    /// Skip packages already installed at the target version
    #[serde(default)]
    pub needed: bool,

    /// Concurrent source downloads (None = available parallelism)
    pub download_workers: Option<usize>,

    /// makepkg executable
    pub makepkg_bin: Option<PathBuf>,

    /// Remove make dependencies after a successful install
    #[serde(default)]
    pub remove_make_deps: bool,

    /// Do not pull in check dependencies
    #[serde(default)]
    pub no_check: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct InstallConfig {
    /// pacman executable
    pub pacman_bin: Option<PathBuf>,

    /// Privilege elevation command
    pub sudo_bin: Option<PathBuf>,

    /// Wrap pacman with `sudo_bin`
    pub use_sudo: Option<bool>,

    /// Never prompt; conflicts become fatal
    #[serde(default)]
    pub no_confirm: bool,

    /// Which sources bare targets are looked up in
    pub mode: Option<TargetMode>,

    /// Track development packages by VCS fingerprint
    #[serde(default)]
    pub devel: bool,

    /// Allow AUR packages to be downgraded during upgrades
    #[serde(default)]
    pub downgrade: bool,

    /// Packages never upgraded
    #[serde(default)]
    pub ignore: Vec<String>,

    /// Sync repositories in lookup order (empty = read from pacman.conf)
    #[serde(default)]
    pub repositories: Vec<String>,
}

/// When to rebuild packages whose archives are already on disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RebuildMode {
    /// Reuse existing archives.
    #[default]
    No,
    /// Rebuild explicit targets, reuse archives for dependencies.
    Yes,
    /// Always rebuild.
    All,
    /// Always rebuild the whole dependency tree.
    Tree,
}

impl FromStr for RebuildMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "no" => Ok(RebuildMode::No),
            "yes" => Ok(RebuildMode::Yes),
            "all" => Ok(RebuildMode::All),
            "tree" => Ok(RebuildMode::Tree),
            _ => Err(format!(
                "invalid rebuild mode '{}'; expected 'no', 'yes', 'all', or 'tree'",
                s
            )),
        }
    }
}

/// Which sources bare target names are resolved against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TargetMode {
    #[default]
    Any,
    Repo,
    Aur,
}

impl TargetMode {
    pub fn allows_repo(self) -> bool {
        self != TargetMode::Aur
    }

    pub fn allows_aur(self) -> bool {
        self != TargetMode::Repo
    }
}

impl FromStr for TargetMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "any" => Ok(TargetMode::Any),
            "repo" => Ok(TargetMode::Repo),
            "aur" => Ok(TargetMode::Aur),
            _ => Err(format!(
                "invalid mode '{}'; expected 'any', 'repo', or 'aur'",
                s
            )),
        }
    }
}

impl fmt::Display for TargetMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            TargetMode::Any => "any",
            TargetMode::Repo => "repo",
            TargetMode::Aur => "aur",
        })
    }
}

impl Config {
    /// Load configuration from a file.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file: {}", path.display()))?;

        toml::from_str(&contents)
            .with_context(|| format!("failed to parse config file: {}", path.display()))
    }

    /// Load configuration with fallback to defaults if file doesn't exist.
    pub fn load_or_default(path: &Path) -> Self {
        if path.exists() {
            Self::load(path).unwrap_or_else(|e| {
                tracing::warn!("Failed to load config from {}: {}", path.display(), e);
                Self::default()
            })
        } else {
            Self::default()
        }
    }

    /// Merge another config into this one (other takes precedence).
    pub fn merge(&mut self, other: Config) {
        // Paths
        if other.paths.build_dir.is_some() {
            self.paths.build_dir = other.paths.build_dir;
        }
        if other.paths.vcs_file.is_some() {
            self.paths.vcs_file = other.paths.vcs_file;
        }
        if other.paths.db_path.is_some() {
            self.paths.db_path = other.paths.db_path;
        }
        if other.paths.pacman_conf.is_some() {
            self.paths.pacman_conf = other.paths.pacman_conf;
        }

        // AUR
        if other.aur.url.is_some() {
            self.aur.url = other.aur.url;
        }
        if other.aur.timeout.is_some() {
            self.aur.timeout = other.aur.timeout;
        }
        if other.aur.provider_workers.is_some() {
            self.aur.provider_workers = other.aur.provider_workers;
        }

        // Build
        if other.build.rebuild.is_some() {
            self.build.rebuild = other.build.rebuild;
        }
        if other.build.needed {
            self.build.needed = true;
        }
        if other.build.download_workers.is_some() {
            self.build.download_workers = other.build.download_workers;
        }
        if other.build.makepkg_bin.is_some() {
            self.build.makepkg_bin = other.build.makepkg_bin;
        }
        if other.build.remove_make_deps {
            self.build.remove_make_deps = true;
        }
        if other.build.no_check {
            self.build.no_check = true;
        }

        // Install
        if other.install.pacman_bin.is_some() {
            self.install.pacman_bin = other.install.pacman_bin;
        }
        if other.install.sudo_bin.is_some() {
            self.install.sudo_bin = other.install.sudo_bin;
        }
        if other.install.use_sudo.is_some() {
            self.install.use_sudo = other.install.use_sudo;
        }
        if other.install.no_confirm {
            self.install.no_confirm = true;
        }
        if other.install.mode.is_some() {
            self.install.mode = other.install.mode;
        }
        if other.install.devel {
            self.install.devel = true;
        }
        if other.install.downgrade {
            self.install.downgrade = true;
        }
        if !other.install.ignore.is_empty() {
            self.install.ignore = other.install.ignore;
        }
        if !other.install.repositories.is_empty() {
            self.install.repositories = other.install.repositories;
        }
    }

    pub fn aur_url(&self) -> &str {
        self.aur.url.as_deref().unwrap_or(DEFAULT_AUR_URL)
    }

    pub fn aur_timeout(&self) -> Duration {
        Duration::from_secs(self.aur.timeout.unwrap_or(30))
    }

    pub fn provider_workers(&self) -> usize {
        self.aur.provider_workers.unwrap_or(4).max(1)
    }

    pub fn rebuild(&self) -> RebuildMode {
        self.build.rebuild.unwrap_or_default()
    }

    pub fn mode(&self) -> TargetMode {
        self.install.mode.unwrap_or_default()
    }

    pub fn db_path(&self) -> PathBuf {
        self.paths
            .db_path
            .clone()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_DB_PATH))
    }

    pub fn pacman_conf(&self) -> PathBuf {
        self.paths
            .pacman_conf
            .clone()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_PACMAN_CONF))
    }

    pub fn pacman_bin(&self) -> PathBuf {
        self.install
            .pacman_bin
            .clone()
            .unwrap_or_else(|| PathBuf::from("pacman"))
    }

    pub fn makepkg_bin(&self) -> PathBuf {
        self.build
            .makepkg_bin
            .clone()
            .unwrap_or_else(|| PathBuf::from("makepkg"))
    }

    /// Elevation command, or `None` when pacman runs directly.
    pub fn sudo_bin(&self) -> Option<PathBuf> {
        if self.install.use_sudo.unwrap_or(true) {
            Some(
                self.install
                    .sudo_bin
                    .clone()
                    .unwrap_or_else(|| PathBuf::from("sudo")),
            )
        } else {
            None
        }
    }
}

/// Load merged configuration from the global and explicit locations.
///
/// Order of precedence (highest to lowest):
/// 1. Explicit config (`--config`)
/// 2. Global config
/// 3. Defaults
pub fn load_config(global_path: &Path, explicit_path: Option<&Path>) -> Config {
    let mut config = Config::default();

    if global_path.exists() {
        let global = Config::load_or_default(global_path);
        config.merge(global);
    }

    if let Some(path) = explicit_path {
        if path.exists() {
            config.merge(Config::load_or_default(path));
        } else {
            tracing::warn!("config file {} does not exist", path.display());
        }
    }

    config
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_config_default() {
        let config = Config::default();
        assert_eq!(config.rebuild(), RebuildMode::No);
        assert_eq!(config.mode(), TargetMode::Any);
        assert_eq!(config.aur_url(), DEFAULT_AUR_URL);
        assert_eq!(config.db_path(), PathBuf::from("/var/lib/pacman"));
        assert_eq!(config.sudo_bin(), Some(PathBuf::from("sudo")));
        assert!(!config.build.needed);
    }

    #[test]
    fn test_config_load() {
        let tmp = TempDir::new().unwrap();
        let config_path = tmp.path().join("config.toml");

        std::fs::write(
            &config_path,
            r#"
[paths]
build_dir = "/tmp/strata"

[build]
rebuild = "tree"
needed = true
download_workers = 2

[install]
mode = "aur"
devel = true
ignore = ["linux-git"]
use_sudo = false
"#,
        )
        .unwrap();

        let config = Config::load(&config_path).unwrap();
        assert_eq!(config.paths.build_dir, Some(PathBuf::from("/tmp/strata")));
        assert_eq!(config.rebuild(), RebuildMode::Tree);
        assert!(config.build.needed);
        assert_eq!(config.build.download_workers, Some(2));
        assert_eq!(config.mode(), TargetMode::Aur);
        assert!(config.install.devel);
        assert_eq!(config.install.ignore, vec!["linux-git"]);
        assert_eq!(config.sudo_bin(), None);
    }

    #[test]
    fn test_config_merge() {
        let mut base = Config::default();
        base.build.rebuild = Some(RebuildMode::Yes);
        base.aur.timeout = Some(10);

        let mut override_cfg = Config::default();
        override_cfg.build.rebuild = Some(RebuildMode::All);
        override_cfg.install.no_confirm = true;

        base.merge(override_cfg);

        assert_eq!(base.rebuild(), RebuildMode::All);
        assert_eq!(base.aur.timeout, Some(10)); // Not overridden
        assert!(base.install.no_confirm);
    }

    #[test]
    fn test_malformed_config_falls_back() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("config.toml");
        std::fs::write(&path, "[build\nrebuild = ").unwrap();

        assert!(Config::load(&path).is_err());
        let config = Config::load_or_default(&path);
        assert_eq!(config.rebuild(), RebuildMode::No);
    }

    #[test]
    fn test_load_config_precedence() {
        let tmp = TempDir::new().unwrap();
        let global_path = tmp.path().join("global.toml");
        let explicit_path = tmp.path().join("explicit.toml");

        std::fs::write(
            &global_path,
            r#"
[aur]
url = "https://aur.example.org"
timeout = 5

[install]
mode = "repo"
"#,
        )
        .unwrap();
        std::fs::write(
            &explicit_path,
            r#"
[install]
mode = "any"
"#,
        )
        .unwrap();

        let config = load_config(&global_path, Some(&explicit_path));
        assert_eq!(config.aur_url(), "https://aur.example.org");
        assert_eq!(config.aur_timeout(), Duration::from_secs(5));
        assert_eq!(config.mode(), TargetMode::Any);
    }

    #[test]
    fn test_mode_parsing() {
        assert_eq!("AUR".parse::<TargetMode>(), Ok(TargetMode::Aur));
        assert!("both".parse::<TargetMode>().is_err());
        assert_eq!("yes".parse::<RebuildMode>(), Ok(RebuildMode::Yes));
        assert!(TargetMode::Repo.allows_repo());
        assert!(!TargetMode::Repo.allows_aur());
    }
}
