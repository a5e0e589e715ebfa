//! `hlsget pause <id>` – pause a queued or downloading job.

use anyhow::{anyhow, Result};
use hlsget_core::state_db::{JobState, StateDb};

pub async fn run_pause(db: &StateDb, id: i64) -> Result<()> {
    let job = db
        .get_job(id)
        .await?
        .ok_or_else(|| anyhow!("no such job: {id}"))?;
    match job.state {
        JobState::Queued | JobState::Active => {
            db.set_state(id, JobState::Paused).await?;
            println!("Paused job {id}");
        }
        JobState::Paused => println!("Job {id} is already paused"),
        other => return Err(anyhow!("job {id} is {}, cannot pause", other.as_str())),
    }
    Ok(())
}
