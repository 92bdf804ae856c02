//! strata - an AUR helper built around a layered dependency graph
//!
//! This crate provides the library side of strata: reading the package
//! databases, resolving targets into a dependency graph, planning install
//! layers, and driving makepkg and pacman through them.

pub mod aur;
pub mod core;
pub mod db;
pub mod graph;
pub mod installer;
pub mod ops;
pub mod planner;
pub mod resolver;
pub mod sources;
pub mod util;
pub mod vcs;

/// In-memory stand-ins for the database, the AUR, git remotes and
/// subprocesses, used by unit tests.
#[cfg(test)]
pub mod test_support;

pub use core::{InstallReason, PackageRecord, PackageRef, PackageSource};
pub use graph::DependencyGraph;
pub use util::context::GlobalContext;
