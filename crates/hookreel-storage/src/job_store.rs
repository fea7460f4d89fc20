//! Durable job state store.
//!
//! Each job owns a directory keyed by its id. Every transition rewrites the
//! complete public projection of the job to `state.json`; there are no
//! deltas. After a restart these snapshots are the only record of a job.

use async_trait::async_trait;
use tokio::fs;
use tracing::{debug, warn};

use hookreel_models::{Job, JobId, Manifest};

use crate::error::{StorageError, StorageResult};
use crate::fs_utils::{read_json_optional, write_json_atomic};
use crate::layout::OutputLayout;

/// Snapshot persistence contract used by the orchestrator.
#[async_trait]
pub trait JobStore: Send + Sync {
    /// Replace the stored snapshot of `job`.
    async fn persist(&self, job: &Job) -> StorageResult<()>;

    /// Load a job snapshot, `None` when no snapshot exists for `id`.
    async fn load(&self, id: &JobId) -> StorageResult<Option<Job>>;

    /// Load every stored job. Unreadable snapshots are skipped.
    async fn list_all(&self) -> StorageResult<Vec<Job>>;

    /// Write the manifest of a finished run and return its public reference.
    async fn write_manifest(&self, manifest: &Manifest) -> StorageResult<String>;
}

/// [`JobStore`] backed by JSON files under the outputs directory.
#[derive(Debug, Clone)]
pub struct FileJobStore {
    layout: OutputLayout,
}

impl FileJobStore {
    pub fn new(layout: OutputLayout) -> Self {
        Self { layout }
    }

    pub fn layout(&self) -> &OutputLayout {
        &self.layout
    }
}

#[async_trait]
impl JobStore for FileJobStore {
    async fn persist(&self, job: &Job) -> StorageResult<()> {
        if !job.id.is_valid() {
            return Err(StorageError::invalid_key(job.id.as_str()));
        }

        let path = self.layout.state_path(&job.id);
        write_json_atomic(&path, job).await?;
        debug!(job_id = %job.id, status = %job.status, progress = job.progress, "Persisted job snapshot");
        Ok(())
    }

    async fn load(&self, id: &JobId) -> StorageResult<Option<Job>> {
        if !id.is_valid() {
            return Ok(None);
        }

        let path = self.layout.state_path(id);
        let mut job: Option<Job> = read_json_optional(&path).await?;

        // Snapshots are keyed by directory; older ones may omit the id field.
        if let Some(job) = job.as_mut() {
            if job.id.is_empty() {
                job.id = id.clone();
            }
        }

        Ok(job)
    }

    async fn list_all(&self) -> StorageResult<Vec<Job>> {
        let outputs = self.layout.outputs_dir();

        let mut entries = match fs::read_dir(&outputs).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(source) => {
                return Err(StorageError::ReadFailed {
                    path: outputs,
                    source,
                })
            }
        };

        let mut jobs = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            if !entry.file_type().await.map(|t| t.is_dir()).unwrap_or(false) {
                continue;
            }

            let name = entry.file_name().to_string_lossy().to_string();
            let id = JobId::from(name);

            match self.load(&id).await {
                Ok(Some(job)) => jobs.push(job),
                Ok(None) => {}
                Err(e) => warn!(job_id = %id, "Skipping unreadable job snapshot: {}", e),
            }
        }

        Ok(jobs)
    }

    async fn write_manifest(&self, manifest: &Manifest) -> StorageResult<String> {
        if !manifest.id.is_valid() {
            return Err(StorageError::invalid_key(manifest.id.as_str()));
        }

        write_json_atomic(&self.layout.manifest_path(&manifest.id), manifest).await?;
        Ok(OutputLayout::manifest_url(&manifest.id))
    }
}
