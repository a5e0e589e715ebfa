//! Artifact assembly: read chunks back in index order and concatenate.

use thiserror::Error;

use crate::naming;
use crate::state_db::StateDb;

/// The assembled output: final bytes plus the suggested filename.
#[derive(Debug)]
pub struct Artifact {
    pub file_name: String,
    pub bytes: Vec<u8>,
}

#[derive(Debug, Error)]
pub enum AssemblyError {
    #[error("chunk store read failed: {0}")]
    Store(#[source] anyhow::Error),
}

/// Read `segment_count` chunks for a job and concatenate them in index order.
///
/// Missing chunks cannot occur when completion was reached honestly; if one
/// is absent anyway it is logged and skipped rather than failing the whole
/// artifact. Chunk cleanup is the caller's job, after the artifact has been
/// handed off.
pub async fn assemble(
    db: &StateDb,
    job_url: &str,
    title: Option<&str>,
    segment_count: usize,
) -> Result<Artifact, AssemblyError> {
    let chunks = db
        .get_chunk_range(job_url, segment_count)
        .await
        .map_err(AssemblyError::Store)?;

    let mut bytes = Vec::with_capacity(chunks.iter().flatten().map(Vec::len).sum());
    for (index, chunk) in chunks.into_iter().enumerate() {
        match chunk {
            Some(body) => bytes.extend_from_slice(&body),
            None => {
                tracing::warn!(job = job_url, index, "chunk missing during assembly, skipping");
            }
        }
    }

    let file_name = naming::derive_artifact_name(title, job_url);
    tracing::info!(job = job_url, file = %file_name, size = bytes.len(), "artifact assembled");
    Ok(Artifact { file_name, bytes })
}
