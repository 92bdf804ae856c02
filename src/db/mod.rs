//! Package database access.
//!
//! The resolver and installer never read pacman's databases directly; they
//! go through [`Executor`], which [`AlpmDb`] implements over the on-disk
//! files and the test suite implements in memory.

pub mod alpm;
pub mod conf;

use std::path::PathBuf;

use thiserror::Error;

use crate::core::record::PackageRecord;

pub use alpm::AlpmDb;
pub use conf::PacmanConf;

#[derive(Debug, Error)]
pub enum DbError {
    #[error("failed to read {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed database entry {entry} in {path}: missing %{field}%")]
    MissingField {
        path: PathBuf,
        entry: String,
        field: &'static str,
    },
}

/// An installed package with a newer version in a sync repository.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Upgrade {
    pub name: String,
    pub repository: String,
    pub local_version: String,
    pub remote_version: String,
}

/// Read access to the installed and sync package databases.
pub trait Executor: Send + Sync {
    /// The installed package called `name`.
    fn local_package(&self, name: &str) -> Option<PackageRecord>;

    /// Every installed package.
    fn local_packages(&self) -> Vec<PackageRecord>;

    /// Whether an installed package satisfies the dependency string `dep`.
    fn local_satisfier_exists(&self, dep: &str) -> bool;

    /// First package called `name` across the sync repositories, in order.
    fn sync_package(&self, name: &str) -> Option<PackageRecord>;

    /// The package called `name` in the sync repository `db`.
    fn sync_package_from_db(&self, db: &str, name: &str) -> Option<PackageRecord>;

    /// First sync package satisfying `dep`, by name before provides.
    fn sync_satisfier(&self, dep: &str) -> Option<PackageRecord>;

    /// Members of the package group `group`.
    fn packages_from_group(&self, group: &str) -> Vec<PackageRecord>;

    /// Whether `name` is installed at exactly `version`.
    fn is_correct_version_installed(&self, name: &str, version: &str) -> bool;

    /// Installed packages that no sync repository carries.
    fn installed_foreign_packages(&self) -> Vec<PackageRecord>;

    /// Installed packages that a sync repository carries at a newer version.
    fn repo_upgrades(&self) -> Vec<Upgrade>;

    /// Architectures that `_<arch>` PKGBUILD fields are honored for.
    fn architectures(&self) -> Vec<String>;
}
