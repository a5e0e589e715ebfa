//! `hlsget status` – show status of all jobs.

use anyhow::Result;
use hlsget_core::state_db::{JobState, StateDb};

pub async fn run_status(db: &StateDb) -> Result<()> {
    let jobs = db.list_jobs().await?;
    let jobs: Vec<_> = jobs
        .into_iter()
        .filter(|j| j.state != JobState::Cancelled)
        .collect();
    if jobs.is_empty() {
        println!("No jobs in database.");
        return Ok(());
    }

    println!("{:<6} {:<10} {:<10} {}", "ID", "STATE", "SEGMENTS", "URL");
    for j in jobs {
        let done = db.list_chunk_indices(&j.source_url).await?.len();
        let segments = if j.segment_count > 0 {
            format!("{done}/{}", j.segment_count)
        } else {
            "-".to_string()
        };
        println!(
            "{:<6} {:<10} {:<10} {}",
            j.id,
            j.state.as_str(),
            segments,
            j.source_url
        );
    }
    Ok(())
}
