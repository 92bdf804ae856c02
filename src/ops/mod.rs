//! High-level operations.
//!
//! This module contains the implementation of strata commands.

pub mod gendb;
pub mod graph;
pub mod sync;
pub mod upgrade;

pub use gendb::gendb;
pub use graph::{graph, GraphFormat};
pub use sync::{sync, Backends, SyncOptions};
pub use upgrade::upgrade;
