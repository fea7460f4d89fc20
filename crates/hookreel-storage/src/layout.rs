//! Where job artifacts live on disk and how clients address them.
//!
//! ```text
//! {data_dir}/outputs/{job_id}/state.json      job snapshot
//! {data_dir}/outputs/{job_id}/manifest.json   written on completion
//! {data_dir}/outputs/{job_id}/hook_01.mp4     one clip per item
//! ```
//!
//! The same tree is served under `/outputs`, so public references are
//! `/outputs/{job_id}/{file}`.

use std::path::{Path, PathBuf};

use hookreel_models::{Item, JobId};

/// URL prefix the API serves the outputs directory under.
pub const PUBLIC_OUTPUTS_PREFIX: &str = "/outputs";

pub const STATE_FILE: &str = "state.json";
pub const MANIFEST_FILE: &str = "manifest.json";

/// Path layout rooted at the data directory.
#[derive(Debug, Clone)]
pub struct OutputLayout {
    data_dir: PathBuf,
}

impl OutputLayout {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
        }
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    /// Directory holding one sub-directory per job.
    pub fn outputs_dir(&self) -> PathBuf {
        self.data_dir.join("outputs")
    }

    pub fn job_dir(&self, id: &JobId) -> PathBuf {
        self.outputs_dir().join(id.as_str())
    }

    pub fn state_path(&self, id: &JobId) -> PathBuf {
        self.job_dir(id).join(STATE_FILE)
    }

    pub fn manifest_path(&self, id: &JobId) -> PathBuf {
        self.job_dir(id).join(MANIFEST_FILE)
    }

    /// Local path of the rendered clip for item `index`.
    pub fn item_path(&self, id: &JobId, index: u32) -> PathBuf {
        self.job_dir(id).join(Item::file_name(index))
    }

    /// Scratch directory for intermediate files of item `index`.
    pub fn work_dir(&self, id: &JobId, index: u32) -> PathBuf {
        self.job_dir(id).join(format!(".work_{:02}", index))
    }

    /// Persisted set of previously used hook texts.
    pub fn hook_history_path(&self) -> PathBuf {
        self.data_dir.join("hook_history.json")
    }

    pub fn item_url(id: &JobId, index: u32) -> String {
        format!("{}/{}/{}", PUBLIC_OUTPUTS_PREFIX, id, Item::file_name(index))
    }

    pub fn manifest_url(id: &JobId) -> String {
        format!("{}/{}/{}", PUBLIC_OUTPUTS_PREFIX, id, MANIFEST_FILE)
    }
}
