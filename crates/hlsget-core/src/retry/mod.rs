//! Per-segment retry: policy, error type, and the async retry loop.

mod error;
mod policy;
mod run;

pub use error::SegmentError;
pub use policy::RetryPolicy;
pub use run::run_with_retry;
