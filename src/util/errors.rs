//! Aggregated errors from concurrent work.

use std::fmt;
use std::sync::Mutex;

use anyhow::Result;

/// Thread-safe collector of independent failures.
///
/// Workers push errors as they happen; the coordinating thread turns the
/// collection into a single error once every worker has finished.
#[derive(Debug, Default)]
pub struct MultiError {
    errors: Mutex<Vec<anyhow::Error>>,
}

impl MultiError {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&self, err: impl Into<anyhow::Error>) {
        self.lock().push(err.into());
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// `Ok(())` if nothing was collected, otherwise one error listing every message.
    pub fn into_result(self) -> Result<()> {
        let mut errors = self.errors.into_inner().unwrap_or_else(|e| e.into_inner());
        if errors.len() > 1 {
            return Err(AggregateError { errors }.into());
        }
        match errors.pop() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<anyhow::Error>> {
        self.errors.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Several errors reported as one.
///
/// The last error is the one that ended the run and is exposed as the
/// [`source`](std::error::Error::source), so callers walking the chain
/// still find it.
#[derive(Debug)]
pub struct AggregateError {
    errors: Vec<anyhow::Error>,
}

impl AggregateError {
    pub fn errors(&self) -> &[anyhow::Error] {
        &self.errors
    }
}

impl fmt::Display for AggregateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let messages: Vec<String> = self.errors.iter().map(|e| format!("{:#}", e)).collect();
        f.write_str(&messages.join("\n"))
    }
}

impl std::error::Error for AggregateError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.errors
            .last()
            .map(|e| &**e as &(dyn std::error::Error + 'static))
    }
}
