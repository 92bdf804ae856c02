//! Remote ref lookup.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use crate::util::process::{CancelToken, ProcessBuilder, ProcessError};

/// How long a single `git ls-remote` may take.
pub const LS_REMOTE_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Error)]
pub enum RefError {
    #[error("{url} is unreachable: {reason}")]
    Unreachable { url: String, reason: String },

    #[error("querying {url} timed out")]
    TimedOut { url: String },

    #[error("query for {url} was cancelled")]
    Cancelled { url: String },
}

/// Resolves the commit a branch of a remote repository points at.
pub trait RefQuery: Send + Sync {
    /// Commit hash of `branch` at `url`, or an empty string if the remote
    /// answered without a matching ref.
    fn head(
        &self,
        url: &str,
        branch: &str,
        protocols: &[String],
        cancel: &CancelToken,
    ) -> Result<String, RefError>;
}

/// [`RefQuery`] backed by `git ls-remote`.
#[derive(Debug, Clone)]
pub struct GitLsRemote {
    git: PathBuf,
    timeout: Duration,
}

impl GitLsRemote {
    pub fn new(git: impl Into<PathBuf>) -> Self {
        GitLsRemote {
            git: git.into(),
            timeout: LS_REMOTE_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    fn query(&self, remote: &str, branch: &str, cancel: &CancelToken) -> Result<String, RefError> {
        let cmd = ProcessBuilder::new(&self.git)
            .args(["ls-remote", remote, branch])
            .env("GIT_TERMINAL_PROMPT", "0");

        let output = cmd.exec_with_timeout(self.timeout, cancel).map_err(|e| {
            match e.downcast_ref::<ProcessError>() {
                Some(ProcessError::TimedOut { .. }) => RefError::TimedOut {
                    url: remote.to_string(),
                },
                Some(ProcessError::Cancelled(_)) => RefError::Cancelled {
                    url: remote.to_string(),
                },
                None => RefError::Unreachable {
                    url: remote.to_string(),
                    reason: format!("{:#}", e),
                },
            }
        })?;

        if !output.status.success() {
            return Err(RefError::Unreachable {
                url: remote.to_string(),
                reason: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        Ok(first_commit(&String::from_utf8_lossy(&output.stdout)))
    }
}

impl Default for GitLsRemote {
    fn default() -> Self {
        GitLsRemote::new("git")
    }
}

impl RefQuery for GitLsRemote {
    fn head(
        &self,
        url: &str,
        branch: &str,
        protocols: &[String],
        cancel: &CancelToken,
    ) -> Result<String, RefError> {
        let mut last_err = None;
        // The parsed protocol list keeps the most preferred entry last.
        for protocol in protocols.iter().rev() {
            let remote = format!("{}://{}", protocol, url);
            match self.query(&remote, branch, cancel) {
                Ok(sha) => return Ok(sha),
                Err(err @ RefError::Cancelled { .. }) => return Err(err),
                Err(err) => {
                    tracing::debug!("{}", err);
                    last_err = Some(err);
                }
            }
        }
        Err(last_err.unwrap_or_else(|| RefError::Unreachable {
            url: url.to_string(),
            reason: "no protocol to query with".to_string(),
        }))
    }
}

/// First field of the first `ls-remote` line, or empty if there is none.
fn first_commit(stdout: &str) -> String {
    let mut fields = stdout.split_whitespace();
    match (fields.next(), fields.next()) {
        (Some(sha), Some(_)) => sha.to_string(),
        _ => String::new(),
    }
}
