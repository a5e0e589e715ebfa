//! `hlsget run [url]` – process queued jobs until the queue drains.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use hlsget_core::config::HlsgetConfig;
use hlsget_core::fetch::HttpFetcher;
use hlsget_core::scheduler::{DownloadEvent, Engine};
use hlsget_core::sink::DirSink;
use hlsget_core::state_db::{JobState, StateDb};

pub async fn run_downloads(
    db: &StateDb,
    cfg: &HlsgetConfig,
    url: Option<&str>,
    title: Option<&str>,
    out: Option<PathBuf>,
) -> Result<()> {
    // Nothing to do? Say so instead of starting an engine that would wait
    // forever for work.
    let queued = db
        .list_jobs()
        .await?
        .iter()
        .filter(|j| j.state == JobState::Queued || j.state == JobState::Active)
        .count();
    if url.is_none() && queued == 0 {
        println!("No queued jobs. Use `hlsget add <url>` or `hlsget run <url>`.");
        return Ok(());
    }

    let download_dir = match out.or_else(|| cfg.download_dir.clone()) {
        Some(dir) => dir,
        None => std::env::current_dir()?,
    };
    let fetcher = Arc::new(HttpFetcher::new(cfg.request_timeout())?);
    let sink = Arc::new(DirSink::new(download_dir));

    let (engine, handle, mut events) = Engine::new(db.clone(), fetcher, sink, cfg);
    let engine = tokio::spawn(engine.exit_when_idle().run());

    if let Some(url) = url {
        let id = handle.enqueue(url, title).await?;
        println!("Queued job {id} for manifest: {url}");
    }

    let mut last_percent = u32::MAX;
    while let Some(event) = events.recv().await {
        match event {
            DownloadEvent::Progress { job_id, stats } => {
                // One line per percent step, not per chunk.
                if stats.percent != last_percent {
                    last_percent = stats.percent;
                    println!(
                        "job {job_id}: {:>3}% ({}/{})",
                        stats.percent, stats.downloaded, stats.total
                    );
                }
            }
            DownloadEvent::Completed { job_id, path } => {
                last_percent = u32::MAX;
                println!("job {job_id}: saved {}", path.display());
            }
            DownloadEvent::Failed { job_id, reason } => {
                last_percent = u32::MAX;
                eprintln!("job {job_id}: failed: {reason}");
            }
            DownloadEvent::Idle => break,
        }
    }
    drop(handle);
    let _ = engine.await;
    Ok(())
}
