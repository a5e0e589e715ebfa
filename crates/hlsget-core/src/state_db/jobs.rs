//! Job table operations.

use anyhow::Result;
use sqlx::Row;

use crate::control::JobId;

use super::db::{unix_timestamp, StateDb};
use super::types::{JobRecord, JobState};

fn record_from_row(row: &sqlx::sqlite::SqliteRow) -> JobRecord {
    let state_str: String = row.get("state");
    JobRecord {
        id: row.get("id"),
        source_url: row.get("source_url"),
        title: row.get("title"),
        segment_count: row.get("segment_count"),
        state: JobState::from_str(&state_str),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

impl StateDb {
    /// Insert a new queued job, or return the existing job for the same
    /// manifest URL (enqueue is idempotent by URL).
    pub async fn add_job(&self, source_url: &str, title: Option<&str>) -> Result<JobId> {
        let now = unix_timestamp();
        sqlx::query(
            r#"
            INSERT INTO jobs (source_url, title, segment_count, state, created_at, updated_at)
            VALUES (?1, ?2, 0, ?3, ?4, ?5)
            ON CONFLICT(source_url) DO NOTHING
            "#,
        )
        .bind(source_url)
        .bind(title)
        .bind(JobState::Queued.as_str())
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await?;

        let row = sqlx::query(r#"SELECT id FROM jobs WHERE source_url = ?1"#)
            .bind(source_url)
            .fetch_one(&self.pool)
            .await?;
        Ok(row.get("id"))
    }

    pub async fn get_job(&self, id: JobId) -> Result<Option<JobRecord>> {
        let row = sqlx::query(r#"SELECT * FROM jobs WHERE id = ?1"#)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.as_ref().map(record_from_row))
    }

    pub async fn get_job_by_url(&self, source_url: &str) -> Result<Option<JobRecord>> {
        let row = sqlx::query(r#"SELECT * FROM jobs WHERE source_url = ?1"#)
            .bind(source_url)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.as_ref().map(record_from_row))
    }

    /// All jobs, oldest first (FIFO order for queue reconstruction).
    pub async fn list_jobs(&self) -> Result<Vec<JobRecord>> {
        let rows = sqlx::query(r#"SELECT * FROM jobs ORDER BY id ASC"#)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.iter().map(record_from_row).collect())
    }

    pub async fn set_state(&self, id: JobId, state: JobState) -> Result<()> {
        sqlx::query(r#"UPDATE jobs SET state = ?1, updated_at = ?2 WHERE id = ?3"#)
            .bind(state.as_str())
            .bind(unix_timestamp())
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Record the segment count after a successful resolve.
    pub async fn set_segment_count(&self, id: JobId, segment_count: usize) -> Result<()> {
        sqlx::query(r#"UPDATE jobs SET segment_count = ?1, updated_at = ?2 WHERE id = ?3"#)
            .bind(segment_count as i64)
            .bind(unix_timestamp())
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Permanently remove a job row. Chunk cleanup is separate.
    pub async fn remove_job(&self, id: JobId) -> Result<()> {
        sqlx::query(r#"DELETE FROM jobs WHERE id = ?1"#)
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Normalize jobs left `active` by a previous process back to `queued`.
    /// Call before scheduling; returns the number of jobs reset.
    pub async fn recover_active_jobs(&self) -> Result<u64> {
        let r = sqlx::query(r#"UPDATE jobs SET state = 'queued', updated_at = ?1 WHERE state = 'active'"#)
            .bind(unix_timestamp())
            .execute(&self.pool)
            .await?;
        Ok(r.rows_affected())
    }

    /// URLs of jobs whose chunks must survive a sweep (non-terminal states).
    pub async fn live_job_urls(&self) -> Result<Vec<String>> {
        let rows = sqlx::query(
            r#"SELECT source_url FROM jobs WHERE state IN ('queued', 'active', 'paused')"#,
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.iter().map(|r| r.get("source_url")).collect())
    }
}
