//! Choosing between several packages that provide the same dependency.

use crate::core::record::PackageRecord;

/// Picks one of several candidates for a dependency.
pub trait ProviderSelector: Send + Sync {
    /// Index into `candidates`, or `None` to give up on `dependency`.
    ///
    /// `in_graph` reports whether a name is already part of the plan.
    fn select(
        &self,
        dependency: &str,
        candidates: &[PackageRecord],
        in_graph: &dyn Fn(&str) -> bool,
    ) -> Option<usize>;
}

/// Non-interactive [`ProviderSelector`].
///
/// Prefers a candidate named exactly like the dependency, then one already
/// in the plan, then the first candidate.
#[derive(Debug, Clone, Copy, Default)]
pub struct AutoSelector;

impl ProviderSelector for AutoSelector {
    fn select(
        &self,
        dependency: &str,
        candidates: &[PackageRecord],
        in_graph: &dyn Fn(&str) -> bool,
    ) -> Option<usize> {
        if candidates.is_empty() {
            return None;
        }
        candidates
            .iter()
            .position(|c| c.name == dependency)
            .or_else(|| candidates.iter().position(|c| in_graph(&c.name)))
            .or(Some(0))
    }
}
