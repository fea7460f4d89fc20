//! Batch items: one clip-producing slot of a job.

use serde::{Deserialize, Serialize};

/// Per-item processing status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ItemStatus {
    /// Waiting for its turn in the pipeline
    #[default]
    Queued,
    /// Currently going through speech, render and captions
    Running,
    /// Clip produced
    Done,
    /// A pipeline stage failed
    Failed,
}

impl ItemStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ItemStatus::Queued => "queued",
            ItemStatus::Running => "running",
            ItemStatus::Done => "done",
            ItemStatus::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, ItemStatus::Done | ItemStatus::Failed)
    }
}

impl std::fmt::Display for ItemStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One slot of a batch job. Position (`index`) never changes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Item {
    /// 1-based position in the batch
    pub index: u32,

    #[serde(default)]
    pub status: ItemStatus,

    /// Hook text spoken in the clip
    #[serde(default)]
    pub text: Option<String>,

    /// Public reference to the rendered clip
    #[serde(default)]
    pub file: Option<String>,
}

impl Item {
    /// Create a queued item at the given 1-based index.
    pub fn queued(index: u32) -> Self {
        Self {
            index,
            status: ItemStatus::Queued,
            text: None,
            file: None,
        }
    }

    /// Artifact file name for the item at `index`.
    pub fn file_name(index: u32) -> String {
        format!("hook_{:02}.mp4", index)
    }
}
