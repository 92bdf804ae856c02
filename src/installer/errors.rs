//! Installation error types.

use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

use crate::util::diagnostic::{suggestions, Diagnostic};

/// Packages that failed during the terminal pass, with the reason.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FailedAndIgnored(pub BTreeMap<String, String>);

impl FailedAndIgnored {
    pub fn insert(&mut self, name: impl Into<String>, reason: impl fmt::Display) {
        self.0.insert(name.into(), format!("{:#}", reason));
    }

    pub fn contains(&self, name: &str) -> bool {
        self.0.contains_key(name)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }
}

impl fmt::Display for FailedAndIgnored {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (name, reason) in &self.0 {
            writeln!(f, "{} - {}", name, reason)?;
        }
        Ok(())
    }
}

#[derive(Debug, Error)]
pub enum InstallError {
    #[error("error making: {base}")]
    BuildFailed {
        base: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("could not find {name} in the makepkg package list")]
    PkgDestNotInList { name: String },

    #[error("the package archive {} does not exist", path.display())]
    MissingArtifact { path: PathBuf },

    #[error("makepkg listed no packages")]
    NoPkgDestsFound,

    #[error("cannot find package name in `{line}`")]
    CannotFindPackageName { line: String },

    #[error("no build directory for {base}")]
    MissingBuildDir { base: String },

    #[error("failed to run `{command}`")]
    Command {
        command: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("pacman exited with status {exit_code}")]
    Transaction { exit_code: i32 },

    #[error("{} packages need manual intervention", .0.len())]
    FailedAndIgnored(FailedAndIgnored),
}

impl InstallError {
    /// Exit status the process should end with for this error.
    pub fn exit_code(&self) -> i32 {
        match self {
            InstallError::Transaction { exit_code } => *exit_code,
            _ => 1,
        }
    }

    pub fn to_diagnostic(&self) -> Diagnostic {
        match self {
            InstallError::FailedAndIgnored(failed) => {
                let mut diag = Diagnostic::error("packages that need manual intervention");
                for (name, reason) in &failed.0 {
                    diag = diag.with_context(format!("{} - {}", name, reason));
                }
                diag
            }
            InstallError::BuildFailed { base, source } => {
                Diagnostic::error(format!("error making: {}", base))
                .with_context(format!("{:#}", source))
                .with_suggestion(suggestions::BUILD_FAILED)
            }
            InstallError::Transaction { .. } => Diagnostic::error(self.to_string())
                .with_suggestion("Check the pacman output above; the database may be locked"),
            other => Diagnostic::error(other.to_string()),
        }
    }
}
