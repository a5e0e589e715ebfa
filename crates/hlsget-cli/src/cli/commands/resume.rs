//! `hlsget resume <id>` – return a paused job to the queue.

use anyhow::{anyhow, Result};
use hlsget_core::state_db::{JobState, StateDb};

pub async fn run_resume(db: &StateDb, id: i64) -> Result<()> {
    let job = db
        .get_job(id)
        .await?
        .ok_or_else(|| anyhow!("no such job: {id}"))?;
    match job.state {
        JobState::Paused => {
            db.set_state(id, JobState::Queued).await?;
            println!("Resumed job {id}; run `hlsget run` to continue downloading");
        }
        JobState::Queued | JobState::Active => println!("Job {id} is not paused"),
        other => return Err(anyhow!("job {id} is {}, cannot resume", other.as_str())),
    }
    Ok(())
}
