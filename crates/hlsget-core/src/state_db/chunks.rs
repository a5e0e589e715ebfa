//! Chunk store operations: `(job_url, seg_index) → bytes`.
//!
//! Every call is one statement, so each operation is atomic and concurrent
//! writes to distinct indices cannot corrupt each other.

use std::time::Duration;

use anyhow::Result;
use sqlx::Row;

use super::db::{unix_timestamp, StateDb};

impl StateDb {
    /// Persist one segment's bytes. Replaces an existing row for the same
    /// key, which keeps the call idempotent on redundant re-downloads.
    pub async fn put_chunk(&self, job_url: &str, index: usize, body: &[u8]) -> Result<()> {
        sqlx::query(
            r#"
            INSERT OR REPLACE INTO chunks (job_url, seg_index, body, created_at)
            VALUES (?1, ?2, ?3, ?4)
            "#,
        )
        .bind(job_url)
        .bind(index as i64)
        .bind(body)
        .bind(unix_timestamp())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn get_chunk(&self, job_url: &str, index: usize) -> Result<Option<Vec<u8>>> {
        let row = sqlx::query(
            r#"SELECT body FROM chunks WHERE job_url = ?1 AND seg_index = ?2"#,
        )
        .bind(job_url)
        .bind(index as i64)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(|r| r.get("body")))
    }

    /// Chunks for indices `0..count` in index order. Missing indices come
    /// back as `None` so the assembler can detect partial loss instead of
    /// failing outright.
    pub async fn get_chunk_range(
        &self,
        job_url: &str,
        count: usize,
    ) -> Result<Vec<Option<Vec<u8>>>> {
        let rows = sqlx::query(
            r#"
            SELECT seg_index, body FROM chunks
            WHERE job_url = ?1 AND seg_index < ?2
            ORDER BY seg_index ASC
            "#,
        )
        .bind(job_url)
        .bind(count as i64)
        .fetch_all(&self.pool)
        .await?;

        let mut out: Vec<Option<Vec<u8>>> = vec![None; count];
        for row in rows {
            let idx: i64 = row.get("seg_index");
            if let Some(slot) = out.get_mut(idx as usize) {
                *slot = Some(row.get("body"));
            }
        }
        Ok(out)
    }

    /// Indices already persisted for a job; used to rebuild the downloaded
    /// set when a job is (re)activated.
    pub async fn list_chunk_indices(&self, job_url: &str) -> Result<Vec<usize>> {
        let rows = sqlx::query(
            r#"SELECT seg_index FROM chunks WHERE job_url = ?1 ORDER BY seg_index ASC"#,
        )
        .bind(job_url)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows
            .iter()
            .map(|r| r.get::<i64, _>("seg_index") as usize)
            .collect())
    }

    /// Remove every chunk belonging to a job (after assembly, or on cancel).
    pub async fn delete_job_chunks(&self, job_url: &str) -> Result<u64> {
        let r = sqlx::query(r#"DELETE FROM chunks WHERE job_url = ?1"#)
            .bind(job_url)
            .execute(&self.pool)
            .await?;
        Ok(r.rows_affected())
    }

    /// Garbage-collect chunks: rows whose job is not in `live_urls`, plus
    /// rows older than `retention` regardless of owner. Returns rows removed.
    pub async fn sweep_chunks(&self, live_urls: &[String], retention: Duration) -> Result<u64> {
        let mut removed = 0u64;

        let cutoff = unix_timestamp() - retention.as_secs() as i64;
        let r = sqlx::query(r#"DELETE FROM chunks WHERE created_at < ?1"#)
            .bind(cutoff)
            .execute(&self.pool)
            .await?;
        removed += r.rows_affected();

        let rows = sqlx::query(r#"SELECT DISTINCT job_url FROM chunks"#)
            .fetch_all(&self.pool)
            .await?;
        for row in rows {
            let job_url: String = row.get("job_url");
            if !live_urls.iter().any(|u| u == &job_url) {
                removed += self.delete_job_chunks(&job_url).await?;
            }
        }

        if removed > 0 {
            tracing::debug!(removed, "chunk sweep removed stale rows");
        }
        Ok(removed)
    }
}
