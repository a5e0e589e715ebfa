//! Bounded-concurrency segment fetch pool.
//!
//! Pulls segment indices in increasing order, fetches them with per-segment
//! retry, and pipelines chunk writes so a worker's fetch slot frees as soon
//! as its write is issued. Completion is only reported after every issued
//! write has finished.

mod run;

pub use run::{run, PoolConfig};

use thiserror::Error;

use crate::retry::SegmentError;

/// Fetch slots per active job.
pub const DEFAULT_FETCH_CAPACITY: usize = 10;

/// How a pool run ended without failing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PoolOutcome {
    /// Every segment is downloaded and every chunk write has completed.
    Completed,
    /// A pause request was observed; in-flight work was drained and applied.
    Paused,
}

#[derive(Debug, Error)]
pub enum PoolError {
    /// Cooperative cancellation observed; in-flight results were discarded.
    #[error("download cancelled")]
    Cancelled,
    /// Too many segments exhausted their retry budget.
    #[error("gave up after {failures} exhausted segments (last: index {last_index}: {last_error})")]
    SegmentsExhausted {
        failures: u32,
        last_index: usize,
        last_error: SegmentError,
    },
    /// A chunk write failed; never retried.
    #[error("chunk write failed: {0}")]
    Storage(#[source] anyhow::Error),
    #[error("worker task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}
