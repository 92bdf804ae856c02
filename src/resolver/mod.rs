//! Dependency resolution.
//!
//! Turns targets, `.SRCINFO` directories and pending upgrades into a
//! [`DependencyGraph`](crate::graph::DependencyGraph) of [`PackageRef`](crate::core::PackageRef)s.
//! All database and network access goes through the [`Executor`](crate::db::Executor)
//! and [`RemoteQuery`](crate::aur::RemoteQuery) seams, so resolution runs
//! unchanged against in-memory fixtures.

pub mod conflicts;
pub mod errors;
pub mod grapher;
pub mod providers;
pub mod srcinfo;
pub mod upgrade;

pub use conflicts::{check_conflicts, ConflictReport};
pub use errors::ResolveError;
pub use grapher::{is_vcs_name, Grapher, Resolution, ResolveOptions};
pub use providers::{AutoSelector, ProviderSelector};
pub use srcinfo::{Srcinfo, SrcinfoError};
pub use upgrade::UpgradeSummary;
