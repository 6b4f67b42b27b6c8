//! Fixed-size worker pool for the parallel screening phases

use rayon::prelude::*;
use rayon::{ThreadPool, ThreadPoolBuilder};
use std::time::Instant;

use crate::config::ScreeningConfig;
use crate::error::{Error, Result};

/// Successful unit results of one phase plus the count of isolated failures
#[derive(Debug)]
pub struct PhaseOutcome<T> {
    pub completed: Vec<T>,
    pub failed: usize,
}

impl<T> PhaseOutcome<T> {
    pub fn total(&self) -> usize {
        self.completed.len() + self.failed
    }
}

/// Worker pool for embarrassingly parallel phases
///
/// Each phase submits all units, blocks until every unit finishes, then
/// aggregates. Completion order is not preserved in logs, only in the result vector.
pub struct WorkerPool {
    pool: ThreadPool,
    workers: usize,
}

impl WorkerPool {
    /// Create a pool with a fixed number of worker threads
    pub fn new(workers: usize) -> Result<Self> {
        let workers = workers.max(1);
        let pool = ThreadPoolBuilder::new()
            .num_threads(workers)
            .thread_name(|i| format!("screen-worker-{}", i))
            .build()
            .map_err(|e| Error::internal(format!("Failed to build worker pool: {}", e)))?;

        tracing::info!("Worker pool configured: {} threads", workers);
        Ok(Self { pool, workers })
    }

    pub fn from_config(config: &ScreeningConfig) -> Result<Self> {
        Self::new(config.worker_count())
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Run `work` over every unit and wait for all of them
    ///
    /// A failing unit is logged and excluded; it never aborts the phase.
    pub fn run_phase<U, T, F>(&self, phase: &str, units: Vec<U>, work: F) -> PhaseOutcome<T>
    where
        U: Send,
        T: Send,
        F: Fn(U) -> Result<T> + Sync + Send,
    {
        let start = Instant::now();
        let unit_count = units.len();

        let results: Vec<Result<T>> = self
            .pool
            .install(|| units.into_par_iter().map(&work).collect());

        let mut completed = Vec::with_capacity(results.len());
        let mut failed = 0;
        for result in results {
            match result {
                Ok(value) => completed.push(value),
                Err(e) if e.is_unit_local() => {
                    failed += 1;
                    tracing::debug!("{} unit skipped: {}", phase, e);
                }
                Err(e) => {
                    failed += 1;
                    tracing::warn!("{} unit failed: {}", phase, e);
                }
            }
        }

        tracing::info!(
            "{} phase: {} of {} units completed, {} failed in {:.2}s",
            phase,
            completed.len(),
            unit_count,
            failed,
            start.elapsed().as_secs_f64()
        );

        PhaseOutcome { completed, failed }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_phase_isolates_failures() {
        let pool = WorkerPool::new(4).unwrap();
        let outcome = pool.run_phase("square", (0u32..100).collect(), |n| {
            if n % 10 == 0 {
                Err(Error::propagation(n, "degenerate"))
            } else {
                Ok(n * n)
            }
        });

        assert_eq!(outcome.failed, 10);
        assert_eq!(outcome.completed.len(), 90);
        assert_eq!(outcome.total(), 100);
        assert!(outcome.completed.contains(&81));
        assert!(!outcome.completed.contains(&0));
    }

    #[test]
    fn test_empty_phase() {
        let pool = WorkerPool::new(2).unwrap();
        let outcome: PhaseOutcome<u32> = pool.run_phase("empty", Vec::<u32>::new(), |n| Ok(n + 1));
        assert_eq!(outcome.total(), 0);
    }

    #[test]
    fn test_zero_workers_is_clamped() {
        assert_eq!(WorkerPool::new(0).unwrap().workers(), 1);
    }
}
