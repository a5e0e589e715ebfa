//! The pool loop: claim, fetch, write, account.

use std::sync::Arc;

use tokio::task::JoinSet;

use crate::control::{JobControls, Stats};
use crate::fetch::Fetcher;
use crate::playlist::Segment;
use crate::retry::{run_with_retry, RetryPolicy, SegmentError};
use crate::segment_set::SegmentSet;
use crate::state_db::StateDb;

use super::{PoolError, PoolOutcome, DEFAULT_FETCH_CAPACITY};

#[derive(Debug, Clone, Copy)]
pub struct PoolConfig {
    /// Maximum concurrent segment fetches.
    pub capacity: usize,
    /// Job fails once more than this many segments exhaust their retries.
    pub failure_threshold: u32,
    pub retry: RetryPolicy,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_FETCH_CAPACITY,
            failure_threshold: 5,
            retry: RetryPolicy::default(),
        }
    }
}

/// Drain the job's remaining segments into the chunk store.
///
/// `downloaded` carries resume state in and progress out; `on_progress` fires
/// after each chunk write completes (so stats never run ahead of durable
/// state). Pause and cancel flags are checked once per iteration.
pub async fn run(
    db: &StateDb,
    fetcher: &Arc<dyn Fetcher>,
    controls: &Arc<JobControls>,
    cfg: &PoolConfig,
    job_url: &str,
    segments: &[Segment],
    downloaded: &mut SegmentSet,
    mut on_progress: impl FnMut(Stats),
) -> Result<PoolOutcome, PoolError> {
    let total = segments.len();
    let capacity = cfg.capacity.max(1);
    let mut cursor = 0usize;
    let mut failures = 0u32;

    let mut fetches: JoinSet<(usize, Result<Vec<u8>, SegmentError>)> = JoinSet::new();
    let mut writes: JoinSet<(usize, anyhow::Result<()>)> = JoinSet::new();

    while cursor < total || !fetches.is_empty() {
        if controls.is_paused() {
            // Let issued work drain; its results still count toward resume.
            while let Some(joined) = fetches.join_next().await {
                let (index, result) = joined?;
                if let Ok(bytes) = result {
                    spawn_write(&mut writes, db, job_url, index, bytes);
                }
            }
            settle_writes(&mut writes, downloaded, total, controls, &mut on_progress).await?;
            tracing::info!(job = job_url, downloaded = downloaded.len(), total, "pool paused");
            return Ok(PoolOutcome::Paused);
        }
        if controls.is_cancelled() {
            fetches.abort_all();
            writes.abort_all();
            tracing::info!(job = job_url, "pool cancelled, discarding in-flight work");
            return Err(PoolError::Cancelled);
        }

        // Claim indices in increasing order up to capacity. Re-claims after a
        // cursor rewind are safe: downloaded indices are skipped here and
        // chunk writes are idempotent by key.
        while fetches.len() < capacity && cursor < total {
            let index = cursor;
            cursor += 1;
            if downloaded.contains(index) {
                continue;
            }
            let url = segments[index].url.clone();
            let fetcher = Arc::clone(fetcher);
            let policy = cfg.retry;
            fetches.spawn(async move {
                let result = run_with_retry(&policy, || fetch_segment(&fetcher, &url)).await;
                (index, result)
            });
        }

        // Writes that finished since the last pass free their accounting now.
        while let Some(joined) = writes.try_join_next() {
            let (index, result) = joined?;
            apply_write(index, result, downloaded, total, controls, &mut on_progress)?;
        }

        let Some(joined) = fetches.join_next().await else {
            continue;
        };
        let (index, result) = joined?;
        match result {
            Ok(bytes) => spawn_write(&mut writes, db, job_url, index, bytes),
            Err(e) => {
                failures += 1;
                tracing::warn!(job = job_url, index, failures, error = %e, "segment exhausted retries");
                if failures > cfg.failure_threshold {
                    fetches.abort_all();
                    writes.abort_all();
                    return Err(PoolError::SegmentsExhausted {
                        failures,
                        last_index: index,
                        last_error: e,
                    });
                }
                // Re-open the failed index for a later claim.
                cursor = cursor.min(index);
            }
        }
    }

    settle_writes(&mut writes, downloaded, total, controls, &mut on_progress).await?;
    Ok(PoolOutcome::Completed)
}

/// One segment fetch attempt: transport errors and non-success statuses both
/// surface as retryable segment errors.
async fn fetch_segment(fetcher: &Arc<dyn Fetcher>, url: &str) -> Result<Vec<u8>, SegmentError> {
    let resp = fetcher.fetch(url).await?;
    if !resp.is_success() {
        return Err(SegmentError::Status(resp.status));
    }
    Ok(resp.body)
}

/// Issue the chunk write for a fetched segment. The caller's fetch slot is
/// already free; completion is accounted when the write joins.
fn spawn_write(
    writes: &mut JoinSet<(usize, anyhow::Result<()>)>,
    db: &StateDb,
    job_url: &str,
    index: usize,
    bytes: Vec<u8>,
) {
    let db = db.clone();
    let job_url = job_url.to_string();
    writes.spawn(async move {
        let result = db.put_chunk(&job_url, index, &bytes).await;
        (index, result)
    });
}

/// Mark a completed write in the downloaded set and publish progress.
fn apply_write(
    index: usize,
    result: anyhow::Result<()>,
    downloaded: &mut SegmentSet,
    total: usize,
    controls: &JobControls,
    on_progress: &mut impl FnMut(Stats),
) -> Result<(), PoolError> {
    result.map_err(PoolError::Storage)?;
    if downloaded.insert(index) {
        let stats = Stats::new(downloaded.len(), total);
        controls.set_stats(stats);
        on_progress(stats);
    }
    Ok(())
}

/// Block until every outstanding chunk write has finished.
async fn settle_writes(
    writes: &mut JoinSet<(usize, anyhow::Result<()>)>,
    downloaded: &mut SegmentSet,
    total: usize,
    controls: &JobControls,
    on_progress: &mut impl FnMut(Stats),
) -> Result<(), PoolError> {
    while let Some(joined) = writes.join_next().await {
        let (index, result) = joined?;
        apply_write(index, result, downloaded, total, controls, on_progress)?;
    }
    Ok(())
}
