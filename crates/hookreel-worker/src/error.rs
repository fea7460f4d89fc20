//! Worker error types.
//!
//! The `Display` text of these errors is what ends up in a failed job's
//! `error` field.

use std::path::PathBuf;

use thiserror::Error;

use hookreel_media::MediaError;
use hookreel_models::TransitionError;
use hookreel_remote::RemoteError;
use hookreel_storage::StorageError;

pub type WorkerResult<T> = Result<T, WorkerError>;

#[derive(Debug, Error)]
pub enum WorkerError {
    #[error(
        "Hook generation exhausted: needed {requested} unique hooks, got {produced} after {attempts} attempts"
    )]
    HookGenerationExhausted {
        requested: usize,
        produced: usize,
        attempts: usize,
    },

    #[error("Hook generation failed: {0}")]
    HookGenerationFailed(#[source] RemoteError),

    #[error("Speech synthesis failed: {0}")]
    SpeechSynthesis(#[source] RemoteError),

    #[error("Lip-sync rendering failed: {0}")]
    LipsyncRender(#[source] RemoteError),

    #[error("Caption overlay failed: {0}")]
    CaptionOverlay(#[source] MediaError),

    #[error("Base video not found: {}", .0.display())]
    BaseVideoMissing(PathBuf),

    #[error("Invalid batch size {0}: must be between 1 and {max}", max = hookreel_models::MAX_BATCH_SIZE)]
    InvalidBatchSize(u32),

    #[error("Job {0} is not tracked by this process")]
    UnknownJob(String),

    #[error("Job execution panicked: {0}")]
    Panicked(String),

    #[error("Job queue is closed")]
    QueueClosed,

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Invalid state transition: {0}")]
    Transition(#[from] TransitionError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
