//! Durable artifact persistence.
//!
//! The provider's output URL is possibly time-limited, so a completed
//! render is copied into storage owned by this system before the job is
//! marked Completed. [`ArtifactStore`] is the backend seam; the default
//! implementation writes to a local directory.

use std::path::PathBuf;

use async_trait::async_trait;

use lucid_core::types::DbId;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors from artifact download/persistence.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// Fetching the artifact from the provider URL failed.
    #[error("Artifact download failed: {0}")]
    Download(#[from] reqwest::Error),

    /// The provider URL returned a non-2xx status code.
    #[error("Artifact download returned HTTP {0}")]
    HttpStatus(u16),

    /// Writing the artifact to durable storage failed.
    #[error("Artifact write failed: {0}")]
    Io(#[from] std::io::Error),
}

// ---------------------------------------------------------------------------
// ArtifactStore trait
// ---------------------------------------------------------------------------

/// Fetch-and-persist seam for completed render artifacts.
#[async_trait]
pub trait ArtifactStore: Send + Sync {
    /// Download the artifact at `source_url` and persist it durably.
    ///
    /// Returns the storage path recorded on the job row. The path must be
    /// deterministic per job id so that a duplicate persist (two racing
    /// reconciliation paths) re-writes identical bytes to the same
    /// location instead of accumulating copies.
    async fn persist(&self, job_id: DbId, source_url: &str) -> Result<String, StorageError>;
}

// ---------------------------------------------------------------------------
// LocalArtifactStore
// ---------------------------------------------------------------------------

/// [`ArtifactStore`] writing under a local base directory.
pub struct LocalArtifactStore {
    root: PathBuf,
    client: reqwest::Client,
}

impl LocalArtifactStore {
    /// Create a store rooted at `root` (created on first persist).
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            client: reqwest::Client::new(),
        }
    }

    /// The relative storage path for a job's video.
    fn relative_path(job_id: DbId) -> String {
        format!("videos/{job_id}.mp4")
    }
}

#[async_trait]
impl ArtifactStore for LocalArtifactStore {
    async fn persist(&self, job_id: DbId, source_url: &str) -> Result<String, StorageError> {
        let response = self.client.get(source_url).send().await?;
        if !response.status().is_success() {
            return Err(StorageError::HttpStatus(response.status().as_u16()));
        }
        let bytes = response.bytes().await?;

        let relative = Self::relative_path(job_id);
        let target = self.root.join(&relative);
        if let Some(parent) = target.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        // Write to a sibling temp file, then rename: a crashed persist
        // never leaves a half-written artifact at the final path.
        let tmp = target.with_extension("mp4.partial");
        tokio::fs::write(&tmp, &bytes).await?;
        tokio::fs::rename(&tmp, &target).await?;

        tracing::info!(
            job_id,
            path = %target.display(),
            bytes = bytes.len(),
            "Artifact persisted",
        );

        Ok(relative)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
