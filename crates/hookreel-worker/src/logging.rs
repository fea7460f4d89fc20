//! Structured batch logging.

use tracing::{error, info, warn, Span};

use hookreel_models::JobId;

/// Logs batch lifecycle events with the job id and stage attached.
#[derive(Debug, Clone)]
pub struct JobLogger {
    job_id: String,
    stage: String,
}

impl JobLogger {
    pub fn new(job_id: &JobId, stage: &str) -> Self {
        Self {
            job_id: job_id.to_string(),
            stage: stage.to_string(),
        }
    }

    /// Same job, different stage.
    pub fn for_stage(&self, stage: &str) -> Self {
        Self {
            job_id: self.job_id.clone(),
            stage: stage.to_string(),
        }
    }

    pub fn log_start(&self, message: &str) {
        info!(job_id = %self.job_id, stage = %self.stage, "Batch started: {}", message);
    }

    pub fn log_progress(&self, message: &str) {
        info!(job_id = %self.job_id, stage = %self.stage, "Batch progress: {}", message);
    }

    /// Item-level event, tagged with the 1-based item index.
    pub fn log_item(&self, index: u32, message: &str) {
        info!(
            job_id = %self.job_id,
            stage = %self.stage,
            item = index,
            "Item {}: {}", index, message
        );
    }

    pub fn log_warning(&self, message: &str) {
        warn!(job_id = %self.job_id, stage = %self.stage, "Batch warning: {}", message);
    }

    pub fn log_error(&self, message: &str) {
        error!(job_id = %self.job_id, stage = %self.stage, "Batch failed: {}", message);
    }

    pub fn log_completion(&self, message: &str) {
        info!(job_id = %self.job_id, stage = %self.stage, "Batch completed: {}", message);
    }

    pub fn job_id(&self) -> &str {
        &self.job_id
    }

    pub fn stage(&self) -> &str {
        &self.stage
    }

    /// Span for everything one batch execution does.
    pub fn create_span(&self) -> Span {
        tracing::info_span!("batch", job_id = %self.job_id, stage = %self.stage)
    }
}
