//! The engine actor: command handling, activation, and job lifecycle.

use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Result};
use tokio::sync::{mpsc, oneshot};

use crate::assemble;
use crate::config::HlsgetConfig;
use crate::control::{ControlRegistry, JobControls, JobId, Stats};
use crate::fetch::Fetcher;
use crate::playlist;
use crate::pool::{self, PoolConfig, PoolError, PoolOutcome};
use crate::segment_set::SegmentSet;
use crate::sink::ArtifactSink;
use crate::state_db::{JobRecord, JobState, StateDb};

use super::{DownloadEvent, JobStatus};

enum Command {
    Enqueue {
        url: String,
        title: Option<String>,
        reply: oneshot::Sender<Result<JobId>>,
    },
    Pause {
        id: JobId,
        reply: oneshot::Sender<Result<()>>,
    },
    Resume {
        id: JobId,
        reply: oneshot::Sender<Result<()>>,
    },
    Cancel {
        id: JobId,
        reply: oneshot::Sender<Result<()>>,
    },
    Status {
        reply: oneshot::Sender<Result<Vec<JobStatus>>>,
    },
}

/// How one job's task ended. `Paused` keeps the active slot; everything else
/// releases it.
#[derive(Debug)]
enum JobOutcome {
    Completed { path: PathBuf },
    Paused,
    Cancelled,
    Failed { reason: String },
}

/// Cloneable handle for driving a running [`Engine`].
#[derive(Clone)]
pub struct EngineHandle {
    tx: mpsc::UnboundedSender<Command>,
}

impl EngineHandle {
    /// Add a job to the back of the queue. Idempotent by manifest URL; a job
    /// in a terminal state is reset and queued again.
    pub async fn enqueue(&self, url: &str, title: Option<&str>) -> Result<JobId> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(Command::Enqueue {
                url: url.to_string(),
                title: title.map(str::to_string),
                reply,
            })
            .map_err(|_| anyhow!("engine stopped"))?;
        rx.await.map_err(|_| anyhow!("engine stopped"))?
    }

    pub async fn pause(&self, id: JobId) -> Result<()> {
        self.send_simple(|reply| Command::Pause { id, reply }).await
    }

    pub async fn resume(&self, id: JobId) -> Result<()> {
        self.send_simple(|reply| Command::Resume { id, reply }).await
    }

    pub async fn cancel(&self, id: JobId) -> Result<()> {
        self.send_simple(|reply| Command::Cancel { id, reply }).await
    }

    /// Snapshot of every known job except cancelled ones.
    pub async fn status(&self) -> Result<Vec<JobStatus>> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(Command::Status { reply })
            .map_err(|_| anyhow!("engine stopped"))?;
        rx.await.map_err(|_| anyhow!("engine stopped"))?
    }

    async fn send_simple(&self, make: impl FnOnce(oneshot::Sender<Result<()>>) -> Command) -> Result<()> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(make(reply))
            .map_err(|_| anyhow!("engine stopped"))?;
        rx.await.map_err(|_| anyhow!("engine stopped"))?
    }
}

struct ActiveJob {
    record: JobRecord,
    controls: Arc<JobControls>,
    /// True while the job's task is executing. A paused job whose pool has
    /// drained keeps the slot with `running == false`.
    running: bool,
}

pub struct Engine {
    db: StateDb,
    fetcher: Arc<dyn Fetcher>,
    sink: Arc<dyn ArtifactSink>,
    registry: ControlRegistry,
    pool_cfg: PoolConfig,
    manifest_max_hops: usize,
    chunk_retention: Duration,
    queue: VecDeque<JobId>,
    active: Option<ActiveJob>,
    exit_when_idle: bool,
    /// Set once any job has been activated; idle-exit only fires afterwards,
    /// so a freshly started engine waits for its first enqueue.
    was_busy: bool,
    commands: mpsc::UnboundedReceiver<Command>,
    handles_gone: bool,
    done_tx: mpsc::UnboundedSender<(JobId, JobOutcome)>,
    done_rx: mpsc::UnboundedReceiver<(JobId, JobOutcome)>,
    events: mpsc::UnboundedSender<DownloadEvent>,
}

impl Engine {
    /// Build an engine plus its handle and event stream. Call [`Engine::run`]
    /// on a task to start it.
    pub fn new(
        db: StateDb,
        fetcher: Arc<dyn Fetcher>,
        sink: Arc<dyn ArtifactSink>,
        cfg: &HlsgetConfig,
    ) -> (Self, EngineHandle, mpsc::UnboundedReceiver<DownloadEvent>) {
        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
        let (done_tx, done_rx) = mpsc::unbounded_channel();
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let engine = Engine {
            db,
            fetcher,
            sink,
            registry: ControlRegistry::new(),
            pool_cfg: PoolConfig {
                capacity: cfg.max_concurrent_fetches,
                failure_threshold: cfg.segment_failure_threshold,
                retry: cfg.retry_policy(),
            },
            manifest_max_hops: cfg.manifest_max_hops,
            chunk_retention: cfg.chunk_retention(),
            queue: VecDeque::new(),
            active: None,
            exit_when_idle: false,
            was_busy: false,
            commands: cmd_rx,
            handles_gone: false,
            done_tx,
            done_rx,
            events: event_tx,
        };
        (engine, EngineHandle { tx: cmd_tx }, event_rx)
    }

    /// Emit [`DownloadEvent::Idle`] and return once the queue and active slot
    /// empty out after at least one job ran. Without this the engine runs
    /// until every handle is dropped.
    pub fn exit_when_idle(mut self) -> Self {
        self.exit_when_idle = true;
        self
    }

    /// Run the scheduler loop until shutdown.
    pub async fn run(mut self) {
        if let Err(e) = self.startup().await {
            tracing::error!(error = %e, "engine startup failed");
            return;
        }

        loop {
            if self.active.is_none() {
                self.activate_next().await;
            }
            if self.active.is_none() && self.queue.is_empty() {
                if self.exit_when_idle && self.was_busy {
                    let _ = self.events.send(DownloadEvent::Idle);
                    return;
                }
                if self.handles_gone {
                    return;
                }
            }

            if self.handles_gone {
                // Only job completions can change anything now; a paused job
                // with no task can never finish, so shut down instead.
                if !self.active.as_ref().is_some_and(|a| a.running) {
                    return;
                }
                if let Some((id, outcome)) = self.done_rx.recv().await {
                    self.handle_finished(id, outcome).await;
                }
                continue;
            }

            tokio::select! {
                maybe_cmd = self.commands.recv() => match maybe_cmd {
                    Some(cmd) => self.handle_command(cmd).await,
                    None => self.handles_gone = true,
                },
                Some((id, outcome)) = self.done_rx.recv() => {
                    self.handle_finished(id, outcome).await;
                }
            }
        }
    }

    /// Recover interrupted state and garbage-collect chunks, then rebuild the
    /// queue from job rows in FIFO order.
    async fn startup(&mut self) -> Result<()> {
        let recovered = self.db.recover_active_jobs().await?;
        if recovered > 0 {
            tracing::info!(recovered, "reset interrupted jobs to queued");
        }
        let live = self.db.live_job_urls().await?;
        self.db.sweep_chunks(&live, self.chunk_retention).await?;
        for job in self.db.list_jobs().await? {
            if job.state == JobState::Queued {
                self.queue.push_back(job.id);
            }
        }
        Ok(())
    }

    async fn handle_command(&mut self, cmd: Command) {
        match cmd {
            Command::Enqueue { url, title, reply } => {
                let _ = reply.send(self.enqueue_job(&url, title.as_deref()).await);
            }
            Command::Pause { id, reply } => {
                let _ = reply.send(self.pause_job(id).await);
            }
            Command::Resume { id, reply } => {
                let _ = reply.send(self.resume_job(id).await);
            }
            Command::Cancel { id, reply } => {
                let _ = reply.send(self.cancel_job(id).await);
            }
            Command::Status { reply } => {
                let _ = reply.send(self.status().await);
            }
        }
    }

    async fn enqueue_job(&mut self, url: &str, title: Option<&str>) -> Result<JobId> {
        let id = self.db.add_job(url, title).await?;
        let job = self
            .db
            .get_job(id)
            .await?
            .ok_or_else(|| anyhow!("job {id} vanished after insert"))?;

        let is_active = self.active.as_ref().is_some_and(|a| a.record.id == id);
        match job.state {
            JobState::Active | JobState::Paused => {}
            JobState::Queued => {
                if !is_active && !self.queue.contains(&id) {
                    self.queue.push_back(id);
                }
            }
            // A finished job enqueued again runs from scratch (its chunks are
            // already gone).
            JobState::Cancelled | JobState::Completed | JobState::Failed => {
                self.db.set_state(id, JobState::Queued).await?;
                self.queue.push_back(id);
            }
        }
        tracing::info!(job = id, url, "job enqueued");
        Ok(id)
    }

    async fn pause_job(&mut self, id: JobId) -> Result<()> {
        if let Some(active) = self.active.as_ref() {
            if active.record.id == id {
                active.controls.pause();
                self.db.set_state(id, JobState::Paused).await?;
                tracing::info!(job = id, "pause requested");
                return Ok(());
            }
        }
        let job = self.require_job(id).await?;
        match job.state {
            JobState::Queued => {
                self.queue.retain(|&q| q != id);
                self.db.set_state(id, JobState::Paused).await?;
                Ok(())
            }
            JobState::Paused => Ok(()),
            other => Err(anyhow!("job {id} is {}, cannot pause", other.as_str())),
        }
    }

    async fn resume_job(&mut self, id: JobId) -> Result<()> {
        if let Some(active) = self.active.as_mut() {
            if active.record.id == id {
                active.controls.resume();
                self.db.set_state(id, JobState::Active).await?;
                if !self.active.as_ref().is_some_and(|a| a.running) {
                    self.spawn_active();
                }
                tracing::info!(job = id, "resumed");
                return Ok(());
            }
        }
        let job = self.require_job(id).await?;
        match job.state {
            JobState::Paused => {
                self.db.set_state(id, JobState::Queued).await?;
                if !self.queue.contains(&id) {
                    self.queue.push_back(id);
                }
                Ok(())
            }
            JobState::Queued => Ok(()),
            other => Err(anyhow!("job {id} is {}, cannot resume", other.as_str())),
        }
    }

    async fn cancel_job(&mut self, id: JobId) -> Result<()> {
        if let Some(active) = self.active.as_ref() {
            if active.record.id == id {
                active.controls.cancel();
                let url = active.record.source_url.clone();
                let still_running = active.running;
                self.db.set_state(id, JobState::Cancelled).await?;
                self.db.delete_job_chunks(&url).await?;
                if !still_running {
                    // Paused with no task; release the slot here.
                    self.registry.unregister(id);
                    self.active = None;
                }
                tracing::info!(job = id, "cancelled");
                return Ok(());
            }
        }
        let job = self.require_job(id).await?;
        match job.state {
            JobState::Queued | JobState::Paused => {
                self.queue.retain(|&q| q != id);
                self.db.set_state(id, JobState::Cancelled).await?;
                self.db.delete_job_chunks(&job.source_url).await?;
                tracing::info!(job = id, "cancelled");
                Ok(())
            }
            JobState::Cancelled => Ok(()),
            other => Err(anyhow!("job {id} is {}, cannot cancel", other.as_str())),
        }
    }

    async fn status(&self) -> Result<Vec<JobStatus>> {
        let jobs = self.db.list_jobs().await?;
        Ok(jobs
            .into_iter()
            .filter(|j| j.state != JobState::Cancelled)
            .map(|record| {
                let is_active = self
                    .active
                    .as_ref()
                    .is_some_and(|a| a.record.id == record.id);
                let controls = self.registry.get(record.id);
                let stats = controls
                    .as_ref()
                    .map(|c| c.stats())
                    .unwrap_or_else(|| Stats::new(0, record.segment_count.max(0) as usize));
                let is_paused = record.state == JobState::Paused;
                let is_queued = self.queue.contains(&record.id);
                JobStatus {
                    record,
                    stats,
                    is_active,
                    is_paused,
                    is_queued,
                }
            })
            .collect())
    }

    async fn require_job(&self, id: JobId) -> Result<JobRecord> {
        self.db
            .get_job(id)
            .await?
            .ok_or_else(|| anyhow!("no such job: {id}"))
    }

    /// Promote the next runnable queued job into the active slot.
    async fn activate_next(&mut self) {
        while self.active.is_none() {
            let Some(id) = self.queue.pop_front() else {
                return;
            };
            let record = match self.db.get_job(id).await {
                Ok(Some(r)) if !r.state.is_terminal() => r,
                Ok(_) => continue,
                Err(e) => {
                    tracing::warn!(job = id, error = %e, "skipping unreadable job");
                    continue;
                }
            };
            if let Err(e) = self.db.set_state(id, JobState::Active).await {
                tracing::warn!(job = id, error = %e, "failed to mark job active");
            }
            let controls = self.registry.register(id);
            self.active = Some(ActiveJob {
                record,
                controls,
                running: false,
            });
            self.was_busy = true;
            self.spawn_active();
        }
    }

    /// Spawn (or respawn, after a resume) the active job's task.
    fn spawn_active(&mut self) {
        let Some(active) = self.active.as_mut() else {
            return;
        };
        active.running = true;
        let db = self.db.clone();
        let fetcher = Arc::clone(&self.fetcher);
        let sink = Arc::clone(&self.sink);
        let controls = Arc::clone(&active.controls);
        let job = active.record.clone();
        let events = self.events.clone();
        let done = self.done_tx.clone();
        let pool_cfg = self.pool_cfg;
        let max_hops = self.manifest_max_hops;
        tokio::spawn(async move {
            let id = job.id;
            let outcome = run_job(db, fetcher, sink, pool_cfg, max_hops, controls, job, events).await;
            let _ = done.send((id, outcome));
        });
    }

    async fn handle_finished(&mut self, id: JobId, outcome: JobOutcome) {
        let Some(active) = self.active.as_mut() else {
            return;
        };
        if active.record.id != id {
            return;
        }
        active.running = false;

        match outcome {
            JobOutcome::Completed { path } => {
                if let Err(e) = self.db.set_state(id, JobState::Completed).await {
                    tracing::warn!(job = id, error = %e, "failed to persist completed state");
                }
                self.release_active(id);
                let _ = self.events.send(DownloadEvent::Completed { job_id: id, path });
            }
            JobOutcome::Paused => {
                // Keep the slot. If a resume already landed, restart at once.
                if !active.controls.is_paused() && !active.controls.is_cancelled() {
                    self.spawn_active();
                }
            }
            JobOutcome::Cancelled => {
                // Cancelled jobs report nothing. Chunks were purged when the
                // cancel was accepted; purge again to catch writes that were
                // already in flight at that point.
                let url = active.record.source_url.clone();
                self.release_active(id);
                if let Err(e) = self.db.delete_job_chunks(&url).await {
                    tracing::warn!(job = id, error = %e, "post-cancel chunk purge failed");
                }
            }
            JobOutcome::Failed { reason } => {
                tracing::warn!(job = id, reason, "job failed");
                if let Err(e) = self.db.set_state(id, JobState::Failed).await {
                    tracing::warn!(job = id, error = %e, "failed to persist failed state");
                }
                self.release_active(id);
                let _ = self.events.send(DownloadEvent::Failed { job_id: id, reason });
            }
        }
    }

    fn release_active(&mut self, id: JobId) {
        self.registry.unregister(id);
        self.active = None;
    }
}

/// One activation of a job: resolve, rebuild resume state, drain the pool,
/// and on completion assemble and deliver the artifact.
#[allow(clippy::too_many_arguments)]
async fn run_job(
    db: StateDb,
    fetcher: Arc<dyn Fetcher>,
    sink: Arc<dyn ArtifactSink>,
    pool_cfg: PoolConfig,
    max_hops: usize,
    controls: Arc<JobControls>,
    job: JobRecord,
    events: mpsc::UnboundedSender<DownloadEvent>,
) -> JobOutcome {
    // The manifest is re-resolved on every activation; only chunks persist
    // across restarts.
    let resolved = match playlist::resolve(&fetcher, &job.source_url, max_hops).await {
        Ok(p) => p,
        Err(e) => {
            return JobOutcome::Failed {
                reason: format!("manifest resolve failed: {e}"),
            }
        }
    };
    let total = resolved.segments.len();
    if let Err(e) = db.set_segment_count(job.id, total).await {
        return JobOutcome::Failed {
            reason: format!("state update failed: {e:#}"),
        };
    }

    let indices = match db.list_chunk_indices(&job.source_url).await {
        Ok(i) => i,
        Err(e) => {
            return JobOutcome::Failed {
                reason: format!("chunk store read failed: {e:#}"),
            }
        }
    };
    let mut downloaded = SegmentSet::from_indices(indices, total);
    let stats = Stats::new(downloaded.len(), total);
    controls.set_stats(stats);
    let _ = events.send(DownloadEvent::Progress {
        job_id: job.id,
        stats,
    });

    let pool_result = pool::run(
        &db,
        &fetcher,
        &controls,
        &pool_cfg,
        &job.source_url,
        &resolved.segments,
        &mut downloaded,
        |stats| {
            let _ = events.send(DownloadEvent::Progress {
                job_id: job.id,
                stats,
            });
        },
    )
    .await;

    match pool_result {
        Ok(PoolOutcome::Paused) => JobOutcome::Paused,
        Ok(PoolOutcome::Completed) => match finalize(&db, sink.as_ref(), &job, total).await {
            Ok(path) => JobOutcome::Completed { path },
            Err(e) => JobOutcome::Failed {
                reason: format!("artifact delivery failed: {e:#}"),
            },
        },
        Err(PoolError::Cancelled) => JobOutcome::Cancelled,
        Err(e) => JobOutcome::Failed {
            reason: e.to_string(),
        },
    }
}

/// Assemble the artifact, deliver it, then drop the job's chunks.
async fn finalize(
    db: &StateDb,
    sink: &dyn ArtifactSink,
    job: &JobRecord,
    total: usize,
) -> Result<PathBuf> {
    let artifact = assemble::assemble(db, &job.source_url, job.title.as_deref(), total).await?;
    let path = sink.deliver(&artifact).await?;
    db.delete_job_chunks(&job.source_url).await?;
    Ok(path)
}
