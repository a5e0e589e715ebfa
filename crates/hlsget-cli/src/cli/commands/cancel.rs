//! `hlsget cancel <id>` – cancel a job and discard its partial data.

use anyhow::{anyhow, Result};
use hlsget_core::state_db::{JobState, StateDb};

pub async fn run_cancel(db: &StateDb, id: i64) -> Result<()> {
    let job = db
        .get_job(id)
        .await?
        .ok_or_else(|| anyhow!("no such job: {id}"))?;
    match job.state {
        JobState::Cancelled => println!("Job {id} is already cancelled"),
        JobState::Completed => {
            return Err(anyhow!("job {id} is completed, cannot cancel"));
        }
        _ => {
            db.set_state(id, JobState::Cancelled).await?;
            let removed = db.delete_job_chunks(&job.source_url).await?;
            println!("Cancelled job {id} ({removed} chunks discarded)");
        }
    }
    Ok(())
}
