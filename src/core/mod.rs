//! Core data structures for strata.
//!
//! - Version ordering (`vercmp`)
//! - Dependency strings and command-line targets
//! - Unified package metadata and plan entries

pub mod depend;
pub mod package;
pub mod record;
pub mod version;

pub use depend::{DepMod, Depend, Target};
pub use package::{InstallReason, PackageRef, PackageSource};
pub use record::{AurMeta, Origin, PackageRecord};
pub use version::vercmp;
