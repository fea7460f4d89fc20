//! Batch orchestration for HookReel.
//!
//! This crate provides:
//! - The batch orchestrator: job lifecycle, sequential execution, restart
//!   reconciliation of persisted snapshots
//! - Unique hook text generation (template and model strategies)
//! - The per-clip pipeline: speech synthesis, lip-sync render, captions
//! - The single-worker FIFO queue batches run on

pub mod config;
pub mod error;
pub mod hooks;
pub mod logging;
pub mod metrics;
pub mod orchestrator;
pub mod processor;
pub mod queue;
pub mod repository;

pub use config::{HookStrategy, WorkerConfig};
pub use error::{WorkerError, WorkerResult};
pub use hooks::{
    HookProvider, HookSource, HookTextProvider, ModelHookSource, TemplateHookSource,
};
pub use logging::JobLogger;
pub use orchestrator::{BatchOrchestrator, JobOrigin, OrchestratorDeps, ResolvedJob};
pub use processor::{
    CaptionOverlay, FfmpegCaptionOverlay, ItemProcessor, ItemSpec, LipsyncItemProcessor,
    LipsyncRenderer, SpeechSynthesizer,
};
pub use queue::SequentialQueue;
pub use repository::{JobRepository, MemoryJobRepository};
