//! Unified package metadata.
//!
//! Sync repositories, the local database, the AUR and `.SRCINFO` files all
//! describe packages differently. Everything downstream of the database and
//! remote layers works with [`PackageRecord`] and inspects [`Origin`] only
//! where the source actually matters.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// AUR-only metadata.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AurMeta {
    pub votes: u64,
    pub popularity: f64,
    pub maintainer: Option<String>,
    /// Unix timestamp.
    pub last_modified: i64,
    /// Unix timestamp at which the package was flagged, if it is.
    pub out_of_date: Option<i64>,
}

/// Where a [`PackageRecord`] was read from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Origin {
    /// A sync repository database.
    Repo { repository: String },
    /// The local (installed) database.
    Local { explicit: bool },
    /// The AUR RPC interface.
    Aur(AurMeta),
    /// A `.SRCINFO` file in `dir`.
    SrcInfo { dir: PathBuf },
}

/// A package as described by any source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PackageRecord {
    pub name: String,
    pub base: String,
    pub version: String,
    pub description: String,
    pub depends: Vec<String>,
    pub make_depends: Vec<String>,
    pub check_depends: Vec<String>,
    pub provides: Vec<String>,
    pub conflicts: Vec<String>,
    pub groups: Vec<String>,
    pub origin: Origin,
}

impl PackageRecord {
    /// A record with no dependency metadata.
    pub fn new(name: impl Into<String>, version: impl Into<String>, origin: Origin) -> Self {
        let name = name.into();
        PackageRecord {
            base: name.clone(),
            name,
            version: version.into(),
            description: String::new(),
            depends: Vec::new(),
            make_depends: Vec::new(),
            check_depends: Vec::new(),
            provides: Vec::new(),
            conflicts: Vec::new(),
            groups: Vec::new(),
            origin,
        }
    }

    pub fn repository(&self) -> Option<&str> {
        match &self.origin {
            Origin::Repo { repository } => Some(repository),
            _ => None,
        }
    }

    pub fn is_aur(&self) -> bool {
        matches!(self.origin, Origin::Aur(_))
    }

    /// Installed explicitly, for records read from the local database.
    pub fn is_explicit(&self) -> bool {
        matches!(self.origin, Origin::Local { explicit: true })
    }

    /// Names provided by this package, without version constraints.
    pub fn provided_names(&self) -> impl Iterator<Item = &str> {
        self.provides
            .iter()
            .map(|p| p.split_once('=').map_or(p.as_str(), |(name, _)| name))
    }

    pub fn with_base(mut self, base: impl Into<String>) -> Self {
        self.base = base.into();
        self
    }

    pub fn with_depends<I, S>(mut self, deps: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.depends = deps.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_make_depends<I, S>(mut self, deps: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.make_depends = deps.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_check_depends<I, S>(mut self, deps: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.check_depends = deps.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_provides<I, S>(mut self, provides: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.provides = provides.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_conflicts<I, S>(mut self, conflicts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.conflicts = conflicts.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_groups<I, S>(mut self, groups: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.groups = groups.into_iter().map(Into::into).collect();
        self
    }
}
