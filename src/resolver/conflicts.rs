//! Conflict detection between planned and installed packages.

use std::collections::{BTreeMap, BTreeSet};

use super::errors::ResolveError;
use crate::core::depend::Depend;
use crate::core::record::PackageRecord;
use crate::db::Executor;

/// Conflicts found for a set of candidates, keyed by the declaring package.
///
/// Conflicts between two planned packages and conflicts with installed
/// packages share one map; pacman asks about both.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConflictReport {
    pub conflicts: BTreeMap<String, BTreeSet<String>>,
}

impl ConflictReport {
    pub fn is_empty(&self) -> bool {
        self.conflicts.is_empty()
    }

    fn add(&mut self, declaring: &str, other: &str) {
        self.conflicts
            .entry(declaring.to_string())
            .or_default()
            .insert(other.to_string());
    }

    /// Fail when there are conflicts and nobody can confirm their resolution.
    pub fn ensure_confirmable(&self, no_confirm: bool) -> Result<(), ResolveError> {
        if no_confirm && !self.is_empty() {
            return Err(ResolveError::UnresolvableConflicts {
                conflicts: self.conflicts.clone(),
            });
        }
        Ok(())
    }
}

fn conflicts_with(declaring: &PackageRecord, other: &PackageRecord) -> bool {
    declaring
        .conflicts
        .iter()
        .any(|c| Depend::parse(c).satisfied_by(other))
}

/// Check `candidates` against each other and against the installed packages.
///
/// An installed package with the same name as a candidate is being replaced
/// and never counts as a conflict.
pub fn check_conflicts(candidates: &[&PackageRecord], db: &dyn Executor) -> ConflictReport {
    let mut report = ConflictReport::default();
    let planned: BTreeSet<&str> = candidates.iter().map(|c| c.name.as_str()).collect();

    for a in candidates {
        for b in candidates {
            if a.name != b.name && conflicts_with(a, b) {
                report.add(&a.name, &b.name);
            }
        }
    }

    for local in db.local_packages() {
        if planned.contains(local.name.as_str()) {
            continue;
        }
        for candidate in candidates {
            if conflicts_with(candidate, &local) {
                report.add(&candidate.name, &local.name);
            }
            if conflicts_with(&local, candidate) {
                report.add(&local.name, &candidate.name);
            }
        }
    }

    report
}
