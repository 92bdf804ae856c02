//! Install planning.
//!
//! An [`InstallPlan`] is the dependency graph cut into layers, prerequisites
//! first, plus the working directory of every package base that has to be
//! built. Layers are the unit the installer builds and installs in one go.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::path::{Path, PathBuf};

use crate::core::package::{InstallReason, PackageRef, PackageSource};
use crate::graph::DependencyGraph;

/// Packages installed together, keyed by name.
pub type Layer = BTreeMap<String, PackageRef>;

/// Layers in install order plus build directories.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InstallPlan {
    pub layers: Vec<Layer>,
    /// Package base -> directory holding its PKGBUILD.
    pub build_dirs: BTreeMap<String, PathBuf>,
}

impl InstallPlan {
    /// Plan `graph`, placing AUR bases under `build_dir`.
    pub fn new(graph: &DependencyGraph<PackageRef>, build_dir: &Path) -> Self {
        let layers = graph.topo_sorted_layer_map();

        let mut build_dirs = BTreeMap::new();
        for pkg in layers.iter().flat_map(|layer| layer.values()) {
            match pkg.source {
                PackageSource::RemoteBinary => {}
                PackageSource::SourceBuild => {
                    build_dirs
                        .entry(pkg.base().to_string())
                        .or_insert_with(|| build_dir.join(pkg.base()));
                }
                PackageSource::LocalSourceFile => {
                    let dir = pkg
                        .srcinfo_dir
                        .clone()
                        .unwrap_or_else(|| build_dir.join(pkg.base()));
                    build_dirs.entry(pkg.base().to_string()).or_insert(dir);
                }
            }
        }

        InstallPlan { layers, build_dirs }
    }

    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }

    /// Every planned package, in install order.
    pub fn packages(&self) -> impl Iterator<Item = &PackageRef> {
        self.layers.iter().flat_map(|layer| layer.values())
    }

    /// Bases fetched from the AUR, excluding local PKGBUILD directories.
    pub fn bases(&self) -> BTreeSet<String> {
        self.packages()
            .filter(|pkg| pkg.source == PackageSource::SourceBuild)
            .map(|pkg| pkg.base().to_string())
            .collect()
    }

    /// Packages that are only needed to build others.
    pub fn make_deps(&self) -> Vec<String> {
        self.packages()
            .filter(|pkg| pkg.reason == InstallReason::BuildDep && !pkg.runtime_needed)
            .filter(|pkg| !pkg.is_upgrade && !pkg.is_group)
            .map(|pkg| pkg.name.clone())
            .collect()
    }

    pub fn summary(&self) -> PlanSummary {
        let mut groups: BTreeMap<(PackageSource, InstallReason), Vec<String>> = BTreeMap::new();
        for pkg in self.packages() {
            groups
                .entry((pkg.source, pkg.reason))
                .or_default()
                .push(pkg.to_string());
        }
        PlanSummary { groups }
    }
}

/// Planned packages grouped by where they come from and why.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PlanSummary {
    pub groups: BTreeMap<(PackageSource, InstallReason), Vec<String>>,
}

impl PlanSummary {
    pub fn total(&self) -> usize {
        self.groups.values().map(Vec::len).sum()
    }
}

impl fmt::Display for PlanSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for ((source, reason), names) in &self.groups {
            let label = match reason {
                InstallReason::Explicit => source.to_string(),
                _ => format!("{} {}", source, reason),
            };
            writeln!(f, "{} ({}): {}", label, names.len(), names.join(" "))?;
        }
        Ok(())
    }
}
