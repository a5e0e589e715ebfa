//! `hlsget add <url>` – queue a new download job.

use anyhow::Result;
use hlsget_core::state_db::StateDb;

pub async fn run_add(db: &StateDb, url: &str, title: Option<&str>) -> Result<()> {
    let id = db.add_job(url, title).await?;
    println!("Added job {id} for manifest: {url}");
    Ok(())
}
