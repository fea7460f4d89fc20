//! Batch job record and its state machine.
//!
//! A job moves `queued -> running -> {completed | failed}`. Terminal states
//! never transition further. The serialized form of [`Job`] is the public
//! projection: it is what clients poll and what is snapshotted to disk.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;
use uuid::Uuid;

use crate::item::{Item, ItemStatus};

/// Item count used when a request or snapshot does not specify one.
pub const DEFAULT_BATCH_SIZE: u32 = 10;

/// Largest batch a client may request.
pub const MAX_BATCH_SIZE: u32 = 50;

/// Error recorded on jobs that were still in flight when the process died.
pub const RESTART_INTERRUPTED_MESSAGE: &str =
    "Job was interrupted by a server restart before it finished";

/// Unique identifier for a job.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default)]
#[serde(transparent)]
pub struct JobId(pub String);

impl JobId {
    /// Generate a new random job ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Whether the id is safe to use as a directory name.
    ///
    /// Ids are UUIDs in practice; anything outside `[A-Za-z0-9_-]{1,64}`
    /// can never name a stored job.
    pub fn is_valid(&self) -> bool {
        !self.0.is_empty()
            && self.0.len() <= 64
            && self
                .0
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for JobId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for JobId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Job lifecycle status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    /// Waiting behind other jobs in the sequential queue
    #[default]
    Queued,
    /// Items are being processed
    Running,
    /// Every item produced a clip and the manifest was written
    Completed,
    /// Hook generation or an item failed, or the process restarted mid-run
    Failed,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Queued => "queued",
            JobStatus::Running => "running",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Rejected state-machine transition.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransitionError {
    #[error("job {job_id} is {status}, expected {expected}")]
    InvalidJobState {
        job_id: String,
        status: JobStatus,
        expected: JobStatus,
    },

    #[error("job {job_id} has no item {index}")]
    UnknownItem { job_id: String, index: u32 },

    #[error("item {index} of job {job_id} is {status}, expected {expected}")]
    InvalidItemState {
        job_id: String,
        index: u32,
        status: ItemStatus,
        expected: ItemStatus,
    },

    #[error("item {index} of job {job_id} cannot start before item {blocking} finishes")]
    OutOfOrder {
        job_id: String,
        index: u32,
        blocking: u32,
    },
}

fn default_total() -> u32 {
    DEFAULT_BATCH_SIZE
}

/// A batch request to produce `total` lip-synced clips.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Job {
    /// Unique job ID
    #[serde(default)]
    pub id: JobId,

    #[serde(default)]
    pub status: JobStatus,

    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,

    #[serde(default)]
    pub started_at: Option<DateTime<Utc>>,

    #[serde(default)]
    pub finished_at: Option<DateTime<Utc>>,

    /// Number of items that reached `done`
    #[serde(default)]
    pub progress: u32,

    #[serde(default = "default_total")]
    pub total: u32,

    /// Failure reason, set only when `status` is failed
    #[serde(default)]
    pub error: Option<String>,

    #[serde(default)]
    pub items: Vec<Item>,

    #[serde(default)]
    pub manifest_url: Option<String>,
}

impl Job {
    /// Create a new queued job with `total` queued items.
    pub fn new(total: u32) -> Self {
        Self {
            id: JobId::new(),
            status: JobStatus::Queued,
            created_at: Some(Utc::now()),
            started_at: None,
            finished_at: None,
            progress: 0,
            total,
            error: None,
            items: (1..=total).map(Item::queued).collect(),
            manifest_url: None,
        }
    }

    /// Placeholder returned for an id that has no record anywhere.
    ///
    /// The item count is not known for such ids, so [`DEFAULT_BATCH_SIZE`] is
    /// used as an approximation. Timestamps are fixed so repeated lookups
    /// return identical records.
    pub fn not_found_placeholder(id: JobId) -> Self {
        let epoch = DateTime::<Utc>::UNIX_EPOCH;
        Self {
            id,
            status: JobStatus::Failed,
            created_at: Some(epoch),
            started_at: None,
            finished_at: Some(epoch),
            progress: 0,
            total: DEFAULT_BATCH_SIZE,
            error: Some(RESTART_INTERRUPTED_MESSAGE.to_string()),
            items: (1..=DEFAULT_BATCH_SIZE)
                .map(|index| Item {
                    status: ItemStatus::Failed,
                    ..Item::queued(index)
                })
                .collect(),
            manifest_url: None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Look up an item by its 1-based index.
    pub fn item(&self, index: u32) -> Option<&Item> {
        self.items.iter().find(|item| item.index == index)
    }

    fn item_mut(&mut self, index: u32) -> Result<&mut Item, TransitionError> {
        let job_id = self.id.to_string();
        self.items
            .iter_mut()
            .find(|item| item.index == index)
            .ok_or(TransitionError::UnknownItem { job_id, index })
    }

    fn expect_status(&self, expected: JobStatus) -> Result<(), TransitionError> {
        if self.status != expected {
            return Err(TransitionError::InvalidJobState {
                job_id: self.id.to_string(),
                status: self.status,
                expected,
            });
        }
        Ok(())
    }

    /// `queued -> running`.
    pub fn start(&mut self) -> Result<(), TransitionError> {
        self.expect_status(JobStatus::Queued)?;
        self.status = JobStatus::Running;
        self.started_at = Some(Utc::now());
        Ok(())
    }

    /// Mark an item `running` and attach its text and future artifact reference.
    ///
    /// Every earlier item must already be `done`.
    pub fn begin_item(
        &mut self,
        index: u32,
        text: impl Into<String>,
        file: impl Into<String>,
    ) -> Result<(), TransitionError> {
        self.expect_status(JobStatus::Running)?;

        if let Some(blocking) = self
            .items
            .iter()
            .find(|item| item.index < index && item.status != ItemStatus::Done)
        {
            return Err(TransitionError::OutOfOrder {
                job_id: self.id.to_string(),
                index,
                blocking: blocking.index,
            });
        }

        let job_id = self.id.to_string();
        let item = self.item_mut(index)?;
        if item.status != ItemStatus::Queued {
            return Err(TransitionError::InvalidItemState {
                job_id,
                index,
                status: item.status,
                expected: ItemStatus::Queued,
            });
        }
        item.status = ItemStatus::Running;
        item.text = Some(text.into());
        item.file = Some(file.into());
        Ok(())
    }

    fn expect_running_item(&mut self, index: u32) -> Result<&mut Item, TransitionError> {
        let job_id = self.id.to_string();
        let item = self.item_mut(index)?;
        if item.status != ItemStatus::Running {
            return Err(TransitionError::InvalidItemState {
                job_id,
                index,
                status: item.status,
                expected: ItemStatus::Running,
            });
        }
        Ok(item)
    }

    /// `running -> done` for an item; advances `progress`.
    pub fn complete_item(&mut self, index: u32) -> Result<(), TransitionError> {
        self.expect_status(JobStatus::Running)?;
        self.expect_running_item(index)?.status = ItemStatus::Done;
        self.progress = (self.progress + 1).min(self.total);
        Ok(())
    }

    /// `running -> failed` for an item. The artifact was never produced, so
    /// its reference is cleared.
    pub fn fail_item(&mut self, index: u32) -> Result<(), TransitionError> {
        self.expect_status(JobStatus::Running)?;
        let item = self.expect_running_item(index)?;
        item.status = ItemStatus::Failed;
        item.file = None;
        Ok(())
    }

    /// `running -> completed`, stamped with the time recorded in the manifest.
    pub fn complete(
        &mut self,
        manifest_url: impl Into<String>,
        finished_at: DateTime<Utc>,
    ) -> Result<(), TransitionError> {
        self.expect_status(JobStatus::Running)?;
        self.status = JobStatus::Completed;
        self.finished_at = Some(finished_at);
        self.manifest_url = Some(manifest_url.into());
        Ok(())
    }

    /// Move a non-terminal job to `failed`. An item still `running` fails
    /// with it and loses its file reference.
    ///
    /// Returns `false` and leaves the record untouched when the job is
    /// already terminal.
    pub fn fail(&mut self, error: impl Into<String>) -> bool {
        if self.is_terminal() {
            return false;
        }
        for item in self
            .items
            .iter_mut()
            .filter(|item| item.status == ItemStatus::Running)
        {
            item.status = ItemStatus::Failed;
            item.file = None;
        }
        self.status = JobStatus::Failed;
        self.error = Some(error.into());
        self.finished_at = Some(Utc::now());
        true
    }

    /// Reclassify a record that was left `queued`/`running` by a dead process.
    pub fn reconcile_interrupted(&mut self) -> bool {
        self.fail(RESTART_INTERRUPTED_MESSAGE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_job_creation() {
        let job = Job::new(4);

        assert_eq!(job.status, JobStatus::Queued);
        assert_eq!(job.total, 4);
        assert_eq!(job.progress, 0);
        assert_eq!(job.items.len(), 4);
        assert!(job.items.iter().all(|i| i.status == ItemStatus::Queued));
        assert_eq!(
            job.items.iter().map(|i| i.index).collect::<Vec<_>>(),
            vec![1, 2, 3, 4]
        );
        assert!(job.created_at.is_some());
        assert!(job.started_at.is_none());
        assert!(job.id.is_valid());
    }

    #[test]
    fn test_job_state_transitions() {
        let mut job = Job::new(2);

        job.start().unwrap();
        assert_eq!(job.status, JobStatus::Running);
        assert!(job.started_at.is_some());

        job.begin_item(1, "first: hook.", "/outputs/x/hook_01.mp4").unwrap();
        assert_eq!(job.item(1).unwrap().status, ItemStatus::Running);
        job.complete_item(1).unwrap();
        job.begin_item(2, "second: hook.", "/outputs/x/hook_02.mp4").unwrap();
        job.complete_item(2).unwrap();
        assert_eq!(job.progress, 2);

        job.complete("/outputs/x/manifest.json", Utc::now()).unwrap();
        assert_eq!(job.status, JobStatus::Completed);
        assert!(job.finished_at.is_some());
        assert_eq!(job.manifest_url.as_deref(), Some("/outputs/x/manifest.json"));
    }

    #[test]
    fn test_items_start_in_index_order() {
        let mut job = Job::new(3);
        job.start().unwrap();

        let err = job.begin_item(2, "t", "f").unwrap_err();
        assert!(matches!(err, TransitionError::OutOfOrder { blocking: 1, .. }));

        job.begin_item(1, "t", "f").unwrap();
        let err = job.begin_item(2, "t", "f").unwrap_err();
        assert!(matches!(err, TransitionError::OutOfOrder { blocking: 1, .. }));
    }

    #[test]
    fn test_failed_item_clears_file_and_keeps_progress() {
        let mut job = Job::new(3);
        job.start().unwrap();
        job.begin_item(1, "a", "f1").unwrap();
        job.complete_item(1).unwrap();
        job.begin_item(2, "b", "f2").unwrap();
        job.fail_item(2).unwrap();

        assert_eq!(job.progress, 1);
        let item = job.item(2).unwrap();
        assert_eq!(item.status, ItemStatus::Failed);
        assert!(item.file.is_none());
        assert_eq!(item.text.as_deref(), Some("b"));
        assert_eq!(job.item(3).unwrap().status, ItemStatus::Queued);
    }

    #[test]
    fn test_terminal_job_never_changes() {
        let mut job = Job::new(1);
        assert!(job.fail("boom"));
        let snapshot = job.clone();

        assert!(!job.fail("again"));
        assert!(!job.reconcile_interrupted());
        assert!(job.start().is_err());
        assert_eq!(job, snapshot);
    }

    #[test]
    fn test_reconcile_fails_the_running_item() {
        let mut job = Job::new(3);
        job.start().unwrap();
        job.begin_item(1, "first", "/outputs/x/hook_01.mp4").unwrap();
        job.complete_item(1).unwrap();
        job.begin_item(2, "second", "/outputs/x/hook_02.mp4").unwrap();

        assert!(job.reconcile_interrupted());

        assert_eq!(job.status, JobStatus::Failed);
        assert_eq!(job.error.as_deref(), Some(RESTART_INTERRUPTED_MESSAGE));
        assert_eq!(job.progress, 1);

        let done = job.item(1).unwrap();
        assert_eq!(done.status, ItemStatus::Done);
        assert_eq!(done.file.as_deref(), Some("/outputs/x/hook_01.mp4"));

        let interrupted = job.item(2).unwrap();
        assert_eq!(interrupted.status, ItemStatus::Failed);
        assert!(interrupted.file.is_none());
        assert_eq!(interrupted.text.as_deref(), Some("second"));

        assert_eq!(job.item(3).unwrap().status, ItemStatus::Queued);
    }

    #[test]
    fn test_not_found_placeholder_is_deterministic() {
        let a = Job::not_found_placeholder(JobId::from("missing"));
        let b = Job::not_found_placeholder(JobId::from("missing"));

        assert_eq!(a, b);
        assert_eq!(a.status, JobStatus::Failed);
        assert_eq!(a.items.len(), 10);
        assert!(a.items.iter().all(|i| i.status == ItemStatus::Failed));
        assert_eq!(a.error.as_deref(), Some(RESTART_INTERRUPTED_MESSAGE));
    }

    #[test]
    fn test_snapshot_defaults() {
        let job: Job = serde_json::from_str(r#"{"id": "abc"}"#).unwrap();

        assert_eq!(job.status, JobStatus::Queued);
        assert_eq!(job.progress, 0);
        assert_eq!(job.total, DEFAULT_BATCH_SIZE);
        assert!(job.items.is_empty());
        assert!(job.created_at.is_none());
        assert!(job.started_at.is_none());
        assert!(job.finished_at.is_none());
    }

    #[test]
    fn test_public_projection_field_names() {
        let job = Job::new(1);
        let value = serde_json::to_value(&job).unwrap();

        for key in [
            "id", "status", "createdAt", "startedAt", "finishedAt", "progress", "total",
            "error", "items", "manifestUrl",
        ] {
            assert!(value.get(key).is_some(), "missing {key}");
        }
        assert_eq!(value["status"], "queued");
        assert!(value["startedAt"].is_null());
    }

    #[test]
    fn test_job_id_validation() {
        assert!(JobId::new().is_valid());
        assert!(JobId::from("job_1-a").is_valid());
        assert!(!JobId::from("").is_valid());
        assert!(!JobId::from("../etc").is_valid());
        assert!(!JobId::from("a/b").is_valid());
    }
}
