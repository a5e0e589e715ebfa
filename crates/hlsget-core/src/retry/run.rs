//! Retry loop: run an async operation until success or the policy says stop.

use std::future::Future;

use super::error::SegmentError;
use super::policy::RetryPolicy;

/// Runs `op` until it succeeds or the attempt budget is exhausted, sleeping
/// for the policy's backoff between attempts. Returns the last error when
/// giving up.
pub async fn run_with_retry<T, F, Fut>(policy: &RetryPolicy, mut op: F) -> Result<T, SegmentError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, SegmentError>>,
{
    let mut attempt = 1u32;
    loop {
        match op().await {
            Ok(v) => return Ok(v),
            Err(e) => match policy.backoff(attempt) {
                None => return Err(e),
                Some(delay) => {
                    tracing::debug!(attempt, delay_ms = delay.as_millis() as u64, error = %e, "segment attempt failed, backing off");
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
            },
        }
    }
}
