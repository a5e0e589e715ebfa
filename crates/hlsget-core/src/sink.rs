//! Artifact delivery: where assembled files end up.
//!
//! The engine hands finished artifacts to an [`ArtifactSink`]; the default
//! sink writes them into a directory, with a numeric suffix on collision.

use std::path::PathBuf;

use async_trait::async_trait;

use crate::assemble::Artifact;

#[async_trait]
pub trait ArtifactSink: Send + Sync {
    /// Deliver one finished artifact. Returns the final location.
    async fn deliver(&self, artifact: &Artifact) -> anyhow::Result<PathBuf>;
}

/// Writes artifacts into a target directory.
pub struct DirSink {
    dir: PathBuf,
}

impl DirSink {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        DirSink { dir: dir.into() }
    }

    /// Pick a path that does not already exist: `name.ts`, then `name (1).ts`
    /// and so on.
    async fn free_path(&self, file_name: &str) -> PathBuf {
        let first = self.dir.join(file_name);
        if tokio::fs::try_exists(&first).await.ok() != Some(true) {
            return first;
        }

        let (stem, ext) = split_name(file_name);
        for n in 1u32.. {
            let candidate = self.dir.join(format!("{stem} ({n}){ext}"));
            if tokio::fs::try_exists(&candidate).await.ok() != Some(true) {
                return candidate;
            }
        }
        unreachable!("u32 suffix space exhausted");
    }
}

fn split_name(file_name: &str) -> (&str, &str) {
    match file_name.rfind('.') {
        Some(dot) if dot > 0 => (&file_name[..dot], &file_name[dot..]),
        _ => (file_name, ""),
    }
}

#[async_trait]
impl ArtifactSink for DirSink {
    async fn deliver(&self, artifact: &Artifact) -> anyhow::Result<PathBuf> {
        tokio::fs::create_dir_all(&self.dir).await?;
        let path = self.free_path(&artifact.file_name).await;
        tokio::fs::write(&path, &artifact.bytes).await?;
        tracing::info!(path = %path.display(), size = artifact.bytes.len(), "artifact written");
        Ok(path)
    }
}
