//! `hlsget remove <id>` – delete a job row and any leftover chunks.

use anyhow::{anyhow, Result};
use hlsget_core::state_db::StateDb;

pub async fn run_remove(db: &StateDb, id: i64) -> Result<()> {
    let job = db
        .get_job(id)
        .await?
        .ok_or_else(|| anyhow!("no such job: {id}"))?;
    db.delete_job_chunks(&job.source_url).await?;
    db.remove_job(id).await?;
    println!("Removed job {id}");
    Ok(())
}
