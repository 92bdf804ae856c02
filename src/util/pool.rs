//! Bounded worker pool.
//!
//! Jobs are keyed by string and deduplicated before they are queued. Workers
//! report on two channels, one for successes and one for failures, and the
//! calling thread merges both until every worker has hung up.

use std::collections::HashSet;
use std::num::NonZeroUsize;
use std::thread;

use anyhow::Result;
use crossbeam_channel::{never, select, unbounded};

use super::errors::MultiError;

/// Results of a [`fan_out`] run.
#[derive(Debug)]
pub struct PoolOutcome<T> {
    pub completed: Vec<T>,
    pub errors: MultiError,
}

impl<T> PoolOutcome<T> {
    /// Completed values, or the aggregated error if any job failed.
    pub fn into_result(self) -> Result<Vec<T>> {
        self.errors.into_result()?;
        Ok(self.completed)
    }
}

/// Number of workers to use: `requested`, or the available parallelism.
pub fn worker_count(requested: Option<usize>) -> usize {
    requested
        .filter(|&n| n > 0)
        .unwrap_or_else(|| thread::available_parallelism().map_or(1, NonZeroUsize::get))
}

/// Run `job` for every distinct key on at most `workers` threads.
///
/// Returns only after all workers have finished. Failures are collected with
/// the key as context instead of stopping the other jobs.
pub fn fan_out<I, S, T, F>(keys: I, workers: usize, job: F) -> PoolOutcome<T>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
    T: Send,
    F: Fn(&str) -> Result<T> + Sync,
{
    let mut seen = HashSet::new();
    let (job_tx, job_rx) = unbounded::<String>();
    let mut queued = 0usize;
    for key in keys {
        let key = key.into();
        if seen.insert(key.clone()) {
            // The receiver is alive until the end of this function.
            let _ = job_tx.send(key);
            queued += 1;
        }
    }
    drop(job_tx);

    let errors = MultiError::new();
    let mut completed = Vec::with_capacity(queued);
    if queued == 0 {
        return PoolOutcome { completed, errors };
    }

    let (ok_tx, ok_rx) = unbounded::<T>();
    let (err_tx, err_rx) = unbounded::<anyhow::Error>();
    let job = &job;

    thread::scope(|s| {
        for _ in 0..workers.clamp(1, queued) {
            let job_rx = job_rx.clone();
            let ok_tx = ok_tx.clone();
            let err_tx = err_tx.clone();
            s.spawn(move || {
                for key in job_rx.iter() {
                    match job(&key) {
                        Ok(value) => {
                            let _ = ok_tx.send(value);
                        }
                        Err(e) => {
                            let _ = err_tx.send(e.context(format!("`{}` failed", key)));
                        }
                    }
                }
            });
        }
        drop(ok_tx);
        drop(err_tx);

        // A closed side is swapped for `never()` so select! stops waking on it.
        let mut ok_rx = Some(ok_rx);
        let mut err_rx = Some(err_rx);
        while ok_rx.is_some() || err_rx.is_some() {
            let ok_side = ok_rx.clone().unwrap_or_else(never);
            let err_side = err_rx.clone().unwrap_or_else(never);
            select! {
                recv(ok_side) -> msg => match msg {
                    Ok(value) => completed.push(value),
                    Err(_) => ok_rx = None,
                },
                recv(err_side) -> msg => match msg {
                    Ok(err) => errors.add(err),
                    Err(_) => err_rx = None,
                },
            }
        }
    });

    PoolOutcome { completed, errors }
}
