//! Upstream change detection for development packages.
//!
//! A development package's version string says nothing about whether its
//! upstream moved. Instead the commit each git source pointed at when the
//! package was last built is stored, and compared against `git ls-remote`.

pub mod remote;
pub mod source;
pub mod store;

pub use remote::{GitLsRemote, RefError, RefQuery};
pub use source::{parse_source, VcsSource};
pub use store::{FingerprintStore, OriginFingerprint, PackageFingerprints};
