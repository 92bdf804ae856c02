//! Package records for common test scenarios.

use crate::core::record::{AurMeta, Origin, PackageRecord};

/// An AUR package whose base is its own name.
pub fn aur_pkg(name: &str, version: &str) -> PackageRecord {
    PackageRecord::new(name, version, Origin::Aur(AurMeta::default()))
}

/// A package from the `extra` repository. [`MockDb::with_sync`] replaces
/// the repository with the one it is added to.
///
/// [`MockDb::with_sync`]: super::MockDb::with_sync
pub fn repo_pkg(name: &str, version: &str) -> PackageRecord {
    PackageRecord::new(
        name,
        version,
        Origin::Repo {
            repository: "extra".to_string(),
        },
    )
}

/// An installed package that was pulled in as a dependency.
pub fn local_pkg(name: &str, version: &str) -> PackageRecord {
    PackageRecord::new(name, version, Origin::Local { explicit: false })
}

/// An installed package the user asked for.
pub fn explicit_pkg(name: &str, version: &str) -> PackageRecord {
    PackageRecord::new(name, version, Origin::Local { explicit: true })
}
