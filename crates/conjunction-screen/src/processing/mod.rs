//! Parallel batch processing

mod pool;

pub use pool::{PhaseOutcome, WorkerPool};
