//! Resolved package candidates.

use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Where a package comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum PackageSource {
    /// A prebuilt package from a sync repository.
    RemoteBinary,
    /// A package built from an AUR PKGBUILD.
    SourceBuild,
    /// A package built from a PKGBUILD directory on disk.
    LocalSourceFile,
}

impl PackageSource {
    /// Whether packages from this source go through `makepkg`.
    pub fn is_built(self) -> bool {
        !matches!(self, PackageSource::RemoteBinary)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            PackageSource::RemoteBinary => "Repository",
            PackageSource::SourceBuild => "AUR",
            PackageSource::LocalSourceFile => "SRCINFO",
        }
    }
}

impl fmt::Display for PackageSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why a package is part of a plan.
///
/// Declaration order is significant: `Explicit` sorts first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum InstallReason {
    Explicit,
    RuntimeDep,
    BuildDep,
    CheckDep,
}

impl InstallReason {
    /// Whether a node already carrying `self` should take `incoming` instead.
    ///
    /// Explicit replaces any dependency reason; otherwise the first reason sticks.
    pub fn yields_to(self, incoming: InstallReason) -> bool {
        incoming == InstallReason::Explicit && self != InstallReason::Explicit
    }

    /// Whether pacman should record the package as a dependency.
    pub fn is_dependency(self) -> bool {
        self != InstallReason::Explicit
    }

    pub fn as_str(self) -> &'static str {
        match self {
            InstallReason::Explicit => "Explicit",
            InstallReason::RuntimeDep => "Dependency",
            InstallReason::BuildDep => "Make Dependency",
            InstallReason::CheckDep => "Check Dependency",
        }
    }
}

impl fmt::Display for InstallReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A package candidate attached to a graph node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageRef {
    pub name: String,
    pub source: PackageSource,
    pub reason: InstallReason,
    /// Version that will be installed.
    pub version: String,
    /// Currently installed version, if any.
    pub local_version: Option<String>,
    /// Build group for source packages; split packages share one.
    pub package_base: Option<String>,
    /// Sync repository for binary packages.
    pub repository: Option<String>,
    pub is_upgrade: bool,
    /// Freshness is tracked by VCS fingerprint rather than version.
    pub is_development: bool,
    pub is_group: bool,
    /// Another planned package depends on this one at runtime, whatever
    /// `reason` says.
    pub runtime_needed: bool,
    /// Working directory of a local PKGBUILD.
    pub srcinfo_dir: Option<PathBuf>,
}

impl PackageRef {
    /// A binary package from `repository`.
    pub fn binary(
        name: impl Into<String>,
        version: impl Into<String>,
        repository: impl Into<String>,
        reason: InstallReason,
    ) -> Self {
        PackageRef {
            name: name.into(),
            source: PackageSource::RemoteBinary,
            reason,
            version: version.into(),
            local_version: None,
            package_base: None,
            repository: Some(repository.into()),
            is_upgrade: false,
            is_development: false,
            is_group: false,
            runtime_needed: false,
            srcinfo_dir: None,
        }
    }

    /// A package group from `repository`.
    pub fn group(name: impl Into<String>, repository: impl Into<String>) -> Self {
        PackageRef {
            is_group: true,
            ..PackageRef::binary(name, "", repository, InstallReason::Explicit)
        }
    }

    /// An AUR package built from `base`.
    pub fn source_build(
        name: impl Into<String>,
        version: impl Into<String>,
        base: impl Into<String>,
        reason: InstallReason,
    ) -> Self {
        PackageRef {
            name: name.into(),
            source: PackageSource::SourceBuild,
            reason,
            version: version.into(),
            local_version: None,
            package_base: Some(base.into()),
            repository: None,
            is_upgrade: false,
            is_development: false,
            is_group: false,
            runtime_needed: false,
            srcinfo_dir: None,
        }
    }

    /// A package built from a PKGBUILD directory on disk.
    pub fn local_source(
        name: impl Into<String>,
        version: impl Into<String>,
        base: impl Into<String>,
        dir: impl Into<PathBuf>,
    ) -> Self {
        PackageRef {
            source: PackageSource::LocalSourceFile,
            srcinfo_dir: Some(dir.into()),
            ..PackageRef::source_build(name, version, base, InstallReason::Explicit)
        }
    }

    /// Mark this ref as replacing `local_version`.
    pub fn with_upgrade(mut self, local_version: impl Into<String>) -> Self {
        self.is_upgrade = true;
        self.local_version = Some(local_version.into());
        self
    }

    pub fn with_development(mut self, is_development: bool) -> Self {
        self.is_development = is_development;
        self
    }

    /// Package base, falling back to the package name.
    pub fn base(&self) -> &str {
        self.package_base.as_deref().unwrap_or(&self.name)
    }

    /// `repo/name` for sync transactions.
    pub fn sync_target(&self) -> String {
        match &self.repository {
            Some(repo) => format!("{}/{}", repo, self.name),
            None => self.name.clone(),
        }
    }
}

impl fmt::Display for PackageRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.version.is_empty() {
            write!(f, "{}", self.name)
        } else {
            write!(f, "{}-{}", self.name, self.version)
        }
    }
}
