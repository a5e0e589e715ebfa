//! Job control: shared pause/cancel flags and live progress stats.
//!
//! When the scheduler activates a job it registers a `JobControls` entry; the
//! fetch pool checks the flags once per iteration and mirrors progress into
//! the entry so status queries see live numbers without touching the pool.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, RwLock};

/// Job identifier: rowid in the jobs table.
pub type JobId = i64;

/// Progress snapshot: counts plus a rounded percentage.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Stats {
    pub downloaded: usize,
    pub total: usize,
    pub percent: u32,
}

impl Stats {
    pub fn new(downloaded: usize, total: usize) -> Self {
        let percent = if total == 0 {
            0
        } else {
            ((downloaded as f64 / total as f64) * 100.0).round() as u32
        };
        Stats {
            downloaded,
            total,
            percent,
        }
    }
}

/// Per-job control flags plus live stats. Cheap to clone via `Arc`.
#[derive(Default)]
pub struct JobControls {
    paused: AtomicBool,
    cancelled: AtomicBool,
    stats: Mutex<Stats>,
}

impl JobControls {
    pub fn pause(&self) {
        self.paused.store(true, Ordering::Relaxed);
    }

    pub fn resume(&self) {
        self.paused.store(false, Ordering::Relaxed);
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Relaxed);
    }

    pub fn is_paused(&self) -> bool {
        self.paused.load(Ordering::Relaxed)
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Relaxed)
    }

    pub fn set_stats(&self, stats: Stats) {
        *self.stats.lock().unwrap() = stats;
    }

    pub fn stats(&self) -> Stats {
        *self.stats.lock().unwrap()
    }
}

/// Registry of controls for jobs the scheduler currently knows as active.
#[derive(Default)]
pub struct ControlRegistry {
    jobs: RwLock<HashMap<JobId, Arc<JobControls>>>,
}

impl ControlRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a job at activation; returns the controls handle passed to
    /// the fetch pool.
    pub fn register(&self, job_id: JobId) -> Arc<JobControls> {
        let controls = Arc::new(JobControls::default());
        self.jobs
            .write()
            .unwrap()
            .insert(job_id, Arc::clone(&controls));
        controls
    }

    /// Drop a job's entry once it reaches a terminal state.
    pub fn unregister(&self, job_id: JobId) {
        self.jobs.write().unwrap().remove(&job_id);
    }

    pub fn get(&self, job_id: JobId) -> Option<Arc<JobControls>> {
        self.jobs.read().unwrap().get(&job_id).cloned()
    }
}
