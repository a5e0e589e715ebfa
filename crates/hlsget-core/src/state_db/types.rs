//! Row types for the job table.

use crate::control::JobId;

/// Lifecycle state of a download job.
///
/// Queued → Active → {Paused ⇄ Active} → {Completed | Cancelled | Failed};
/// Completed and Cancelled are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobState {
    Queued,
    Active,
    Paused,
    Cancelled,
    Completed,
    Failed,
}

impl JobState {
    pub fn as_str(self) -> &'static str {
        match self {
            JobState::Queued => "queued",
            JobState::Active => "active",
            JobState::Paused => "paused",
            JobState::Cancelled => "cancelled",
            JobState::Completed => "completed",
            JobState::Failed => "failed",
        }
    }

    /// Unknown strings map to Failed so a corrupted row can't masquerade as
    /// runnable work.
    pub fn from_str(s: &str) -> Self {
        match s {
            "queued" => JobState::Queued,
            "active" => JobState::Active,
            "paused" => JobState::Paused,
            "cancelled" => JobState::Cancelled,
            "completed" => JobState::Completed,
            _ => JobState::Failed,
        }
    }

    /// True for states with no further transitions (cancel excepted for
    /// Paused, which is handled by the scheduler).
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            JobState::Cancelled | JobState::Completed | JobState::Failed
        )
    }
}

/// One job row.
#[derive(Debug, Clone)]
pub struct JobRecord {
    pub id: JobId,
    /// Originating manifest URL; unique across known jobs and the chunk key.
    pub source_url: String,
    /// Human label used to derive the artifact filename.
    pub title: Option<String>,
    /// Segment count from the last successful resolve; 0 until resolved.
    pub segment_count: i64,
    pub state: JobState,
    pub created_at: i64,
    pub updated_at: i64,
}
