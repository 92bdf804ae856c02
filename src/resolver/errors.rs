//! Resolution error types and diagnostics.

use std::collections::{BTreeMap, BTreeSet};

use miette::Diagnostic as MietteDiagnostic;
use thiserror::Error;

use crate::aur::AurError;
use crate::db::DbError;
use crate::graph::GraphError;
use crate::util::diagnostic::{suggestions, Diagnostic};

use super::srcinfo::SrcinfoError;

/// Error during dependency resolution.
#[derive(Debug, Error, MietteDiagnostic)]
pub enum ResolveError {
    /// Keyed by the missing name; each value lists the chains that wanted it.
    #[error("could not find all required packages: {}", missing_names(.missing))]
    #[diagnostic(code(strata::resolve::not_found), help("check the spelling, or refresh the sync databases"))]
    PackagesNotFound {
        missing: BTreeMap<String, Vec<Vec<String>>>,
    },

    #[error(transparent)]
    #[diagnostic(code(strata::resolve::graph))]
    Graph(#[from] GraphError),

    #[error("no provider selected for `{dependency}`")]
    #[diagnostic(code(strata::resolve::provider))]
    ProviderUnresolved {
        dependency: String,
        candidates: Vec<String>,
    },

    #[error("failed to query the AUR")]
    #[diagnostic(code(strata::resolve::remote), help("check your network connection and the configured AUR URL"))]
    Remote(#[from] AurError),

    #[error(transparent)]
    #[diagnostic(code(strata::resolve::srcinfo))]
    Srcinfo(#[from] SrcinfoError),

    #[error("failed to read the package database")]
    #[diagnostic(code(strata::resolve::database))]
    Database(#[from] DbError),

    #[error("unresolvable package conflicts")]
    #[diagnostic(code(strata::resolve::conflicts), help("remove the conflicting packages first"))]
    UnresolvableConflicts {
        conflicts: BTreeMap<String, BTreeSet<String>>,
    },
}

fn missing_names(missing: &BTreeMap<String, Vec<Vec<String>>>) -> String {
    missing.keys().cloned().collect::<Vec<_>>().join(", ")
}

impl ResolveError {
    /// Convert to a user-friendly diagnostic.
    pub fn to_diagnostic(&self) -> Diagnostic {
        match self {
            ResolveError::PackagesNotFound { missing } => {
                let mut diag = Diagnostic::error("could not find all required packages");
                for (name, chains) in missing {
                    let wanted: Vec<String> = chains
                        .iter()
                        .filter(|chain| !chain.is_empty())
                        .map(|chain| chain.join(" -> "))
                        .collect();
                    if wanted.is_empty() {
                        diag = diag.with_context(format!("{} (target)", name));
                    } else {
                        diag = diag.with_context(format!(
                            "{} (wanted by: {})",
                            name,
                            wanted.join(", ")
                        ));
                    }
                }
                diag.with_suggestion(suggestions::PACKAGE_NOT_FOUND)
            }

            ResolveError::Graph(err) => {
                let diag = Diagnostic::error(err.to_string());
                match err {
                    GraphError::Circular { child, parent } => diag
                        .with_context(format!("{} already depends on {}", parent, child))
                        .with_suggestion("Break the cycle by building one of the packages manually"),
                    GraphError::ConflictingAlias { .. } => diag.with_suggestion(
                        "Install one of the providers explicitly to disambiguate",
                    ),
                    _ => diag,
                }
            }

            ResolveError::ProviderUnresolved {
                dependency,
                candidates,
            } => Diagnostic::error(format!("no provider selected for `{}`", dependency))
                .with_context(format!("candidates: {}", candidates.join(", ")))
                .with_suggestion(format!(
                    "Name the provider you want as a target, e.g. `strata install {}`",
                    candidates.first().map_or("<provider>", String::as_str)
                )),

            ResolveError::Remote(err) => Diagnostic::error("failed to query the AUR")
                .with_context(err.to_string())
                .with_suggestion(suggestions::FETCH_FAILED),

            ResolveError::Srcinfo(err) => {
                let mut diag = Diagnostic::error(err.to_string());
                if let SrcinfoError::Io { path, .. } | SrcinfoError::Parse { path, .. } = err {
                    diag = diag.with_location(path);
                }
                diag
            }

            ResolveError::Database(err) => {
                Diagnostic::error("failed to read the package database").with_context(err.to_string())
            }

            ResolveError::UnresolvableConflicts { conflicts } => {
                let mut diag = Diagnostic::error("unresolvable package conflicts");
                for (pkg, with) in conflicts {
                    let with: Vec<&str> = with.iter().map(String::as_str).collect();
                    diag = diag.with_context(format!("{} conflicts with {}", pkg, with.join(", ")));
                }
                diag.with_suggestion(suggestions::CONFLICTS)
            }
        }
    }
}
