//! Application state.

use std::sync::Arc;

use tracing::info;

use hookreel_media::{CaptionOptions, CaptionStyle};
use hookreel_remote::{FishClient, GeminiClient, ReplicateClient};
use hookreel_storage::{FileJobStore, HookHistory, OutputLayout};
use hookreel_worker::{
    BatchOrchestrator, FfmpegCaptionOverlay, HookProvider, HookSource, HookStrategy,
    LipsyncItemProcessor, MemoryJobRepository, ModelHookSource, OrchestratorDeps,
    TemplateHookSource, WorkerConfig, WorkerError,
};

use crate::config::ApiConfig;
use crate::error::{ApiError, ApiResult};

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub config: ApiConfig,
    pub orchestrator: BatchOrchestrator,
}

impl AppState {
    /// Wire the production pipeline from worker configuration.
    ///
    /// Service credentials are not required here; a missing one fails the
    /// first item that needs it.
    pub async fn new(config: ApiConfig, worker: WorkerConfig) -> ApiResult<Self> {
        let layout = OutputLayout::new(&worker.data_dir);
        tokio::fs::create_dir_all(layout.outputs_dir())
            .await
            .map_err(|e| ApiError::internal(format!("Cannot create outputs dir: {}", e)))?;

        let source: Arc<dyn HookSource> = match worker.hook_strategy {
            HookStrategy::Template => Arc::new(TemplateHookSource::new()),
            HookStrategy::Model => Arc::new(ModelHookSource::new(Arc::new(
                GeminiClient::from_env().map_err(WorkerError::HookGenerationFailed)?,
            ))),
        };
        let hooks = HookProvider::new(HookHistory::new(layout.hook_history_path()), source);

        let fish = FishClient::from_env().map_err(WorkerError::SpeechSynthesis)?;
        let replicate = ReplicateClient::from_env().map_err(WorkerError::LipsyncRender)?;
        let http = replicate.http().clone();
        let captions = FfmpegCaptionOverlay::new(CaptionOptions {
            words_per_line: worker.caption_words_per_line,
            target_seconds: worker.caption_target_seconds,
            style: CaptionStyle::from_env(),
            timeout_secs: Some(worker.ffmpeg_timeout_secs),
        });
        let processor = LipsyncItemProcessor::new(
            Arc::new(fish),
            Arc::new(replicate),
            Arc::new(captions),
            http,
            worker.base_video_path.clone(),
        );

        info!(
            data_dir = %worker.data_dir.display(),
            base_video = %worker.base_video_path.display(),
            hook_strategy = worker.hook_strategy.as_str(),
            "Batch pipeline ready"
        );

        let orchestrator = BatchOrchestrator::new(OrchestratorDeps {
            store: Arc::new(FileJobStore::new(layout.clone())),
            repository: Arc::new(MemoryJobRepository::new()),
            hooks: Arc::new(hooks),
            processor: Arc::new(processor),
            layout,
        });

        Ok(Self::from_parts(config, orchestrator))
    }

    pub fn from_parts(config: ApiConfig, orchestrator: BatchOrchestrator) -> Self {
        Self {
            config,
            orchestrator,
        }
    }
}
