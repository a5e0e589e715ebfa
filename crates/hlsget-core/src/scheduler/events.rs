//! Events and status snapshots published by the engine.

use std::path::PathBuf;

use crate::control::{JobId, Stats};
use crate::state_db::JobRecord;

/// What the engine reports while running. Cancelled jobs emit nothing.
#[derive(Debug, Clone)]
pub enum DownloadEvent {
    /// A chunk write completed; stats reflect durable progress.
    Progress { job_id: JobId, stats: Stats },
    /// The artifact was assembled and delivered.
    Completed { job_id: JobId, path: PathBuf },
    /// The job gave up (resolve failure, exhausted segments, storage error).
    Failed { job_id: JobId, reason: String },
    /// Queue and active slot are both empty (only sent in run-until-idle mode).
    Idle,
}

/// One job's view in a status query.
#[derive(Debug, Clone)]
pub struct JobStatus {
    pub record: JobRecord,
    /// Live progress for the active job, zeroes otherwise.
    pub stats: Stats,
    pub is_active: bool,
    pub is_paused: bool,
    pub is_queued: bool,
}
