//! Error type for a single segment fetch attempt.

use thiserror::Error;

use crate::fetch::FetchError;

/// Failure of one segment download attempt. Both variants are retried until
/// the policy's attempt budget runs out; storage failures are handled outside
/// the retry loop (a chunk write is never retried).
#[derive(Debug, Error)]
pub enum SegmentError {
    /// Response arrived with a non-success status.
    #[error("HTTP {0}")]
    Status(u16),
    /// Transport failure (connect, timeout, reset).
    #[error(transparent)]
    Fetch(#[from] FetchError),
}
