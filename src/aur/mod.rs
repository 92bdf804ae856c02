//! Remote package metadata.

pub mod rpc;

use thiserror::Error;

use crate::core::record::PackageRecord;

pub use rpc::AurClient;

#[derive(Debug, Error)]
pub enum AurError {
    #[error("invalid AUR URL `{url}`")]
    InvalidUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },

    #[error("AUR request failed")]
    Http(#[from] reqwest::Error),

    #[error("AUR returned HTTP {0}")]
    Status(u16),

    #[error("AUR error: {0}")]
    Rpc(String),
}

/// Field a query matches against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchBy {
    Name,
    Provides,
}

/// A batch lookup against the remote repository.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AurQuery {
    pub by: SearchBy,
    pub needles: Vec<String>,
}

impl AurQuery {
    pub fn names<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        AurQuery {
            by: SearchBy::Name,
            needles: names.into_iter().map(Into::into).collect(),
        }
    }

    pub fn provides(name: impl Into<String>) -> Self {
        AurQuery {
            by: SearchBy::Provides,
            needles: vec![name.into()],
        }
    }
}

/// Looks up source-built packages.
///
/// Name queries return only the packages that exist; provides queries
/// return every package providing one of the needles.
pub trait RemoteQuery: Send + Sync {
    fn query(&self, query: &AurQuery) -> Result<Vec<PackageRecord>, AurError>;
}
