//! Per-item clip production.
//!
//! One item runs three stages in order: speech synthesis of the hook text,
//! lip-sync rendering of the base video onto that speech, and caption
//! burn-in. The first failing stage ends the item; nothing it left behind
//! counts as an artifact.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use tokio::fs;
use tracing::{debug, warn};

use hookreel_media::{overlay_captions, CaptionOptions, CaptionRenderer, MediaResult};
use hookreel_models::JobId;
use hookreel_remote::{fetch_bytes, FishClient, RemoteResult, RenderOutput, ReplicateClient};

use crate::error::{WorkerError, WorkerResult};

/// Everything needed to produce one clip.
#[derive(Debug, Clone)]
pub struct ItemSpec {
    pub job_id: JobId,
    /// 1-based position in the batch
    pub index: u32,
    pub text: String,
    /// Where the finished clip must be written
    pub output_path: PathBuf,
    /// Scratch space for intermediate files; removed afterwards
    pub work_dir: PathBuf,
}

/// Produces the artifact for one item.
#[async_trait]
pub trait ItemProcessor: Send + Sync {
    /// Returns the path of the written clip.
    async fn process(&self, spec: &ItemSpec) -> WorkerResult<PathBuf>;
}

#[async_trait]
pub trait SpeechSynthesizer: Send + Sync {
    async fn synthesize(&self, text: &str) -> RemoteResult<Vec<u8>>;
}

#[async_trait]
impl SpeechSynthesizer for FishClient {
    async fn synthesize(&self, text: &str) -> RemoteResult<Vec<u8>> {
        FishClient::synthesize(self, text).await
    }
}

#[async_trait]
pub trait LipsyncRenderer: Send + Sync {
    async fn render(&self, base_video: &Path, speech: Vec<u8>) -> RemoteResult<RenderOutput>;
}

#[async_trait]
impl LipsyncRenderer for ReplicateClient {
    async fn render(&self, base_video: &Path, speech: Vec<u8>) -> RemoteResult<RenderOutput> {
        self.lipsync(base_video, speech).await
    }
}

#[async_trait]
pub trait CaptionOverlay: Send + Sync {
    async fn overlay(&self, input: &Path, output: &Path, text: &str)
        -> MediaResult<CaptionRenderer>;
}

/// [`CaptionOverlay`] running FFmpeg.
#[derive(Debug, Clone, Default)]
pub struct FfmpegCaptionOverlay {
    options: CaptionOptions,
}

impl FfmpegCaptionOverlay {
    pub fn new(options: CaptionOptions) -> Self {
        Self { options }
    }
}

#[async_trait]
impl CaptionOverlay for FfmpegCaptionOverlay {
    async fn overlay(
        &self,
        input: &Path,
        output: &Path,
        text: &str,
    ) -> MediaResult<CaptionRenderer> {
        overlay_captions(input, output, text, &self.options).await
    }
}

/// The speech, lip-sync, caption pipeline.
pub struct LipsyncItemProcessor {
    speech: Arc<dyn SpeechSynthesizer>,
    renderer: Arc<dyn LipsyncRenderer>,
    captions: Arc<dyn CaptionOverlay>,
    /// Client used to download URL render results
    http: reqwest::Client,
    base_video: PathBuf,
}

impl LipsyncItemProcessor {
    pub fn new(
        speech: Arc<dyn SpeechSynthesizer>,
        renderer: Arc<dyn LipsyncRenderer>,
        captions: Arc<dyn CaptionOverlay>,
        http: reqwest::Client,
        base_video: impl Into<PathBuf>,
    ) -> Self {
        Self {
            speech,
            renderer,
            captions,
            http,
            base_video: base_video.into(),
        }
    }

    async fn run_stages(&self, spec: &ItemSpec) -> WorkerResult<()> {
        if !fs::try_exists(&self.base_video).await.unwrap_or(false) {
            return Err(WorkerError::BaseVideoMissing(self.base_video.clone()));
        }

        fs::create_dir_all(&spec.work_dir).await?;
        if let Some(parent) = spec.output_path.parent() {
            fs::create_dir_all(parent).await?;
        }

        let started = Instant::now();
        let speech = self
            .speech
            .synthesize(&spec.text)
            .await
            .map_err(WorkerError::SpeechSynthesis)?;
        fs::write(spec.work_dir.join("speech.mp3"), &speech).await?;
        debug!(job_id = %spec.job_id, item = spec.index, bytes = speech.len(), elapsed_ms = started.elapsed().as_millis() as u64, "Speech ready");

        let output = self
            .renderer
            .render(&self.base_video, speech)
            .await
            .map_err(WorkerError::LipsyncRender)?;
        let rendered = fetch_bytes(&self.http, output)
            .await
            .map_err(WorkerError::LipsyncRender)?;
        let raw_path = spec.work_dir.join("lipsync.mp4");
        fs::write(&raw_path, &rendered).await?;
        debug!(job_id = %spec.job_id, item = spec.index, bytes = rendered.len(), elapsed_ms = started.elapsed().as_millis() as u64, "Lip-sync render ready");

        let renderer = self
            .captions
            .overlay(&raw_path, &spec.output_path, &spec.text)
            .await
            .map_err(WorkerError::CaptionOverlay)?;
        debug!(job_id = %spec.job_id, item = spec.index, renderer = %renderer, "Captions ready");

        Ok(())
    }
}

#[async_trait]
impl ItemProcessor for LipsyncItemProcessor {
    async fn process(&self, spec: &ItemSpec) -> WorkerResult<PathBuf> {
        let result = self.run_stages(spec).await;

        if let Err(e) = fs::remove_dir_all(&spec.work_dir).await {
            if e.kind() != std::io::ErrorKind::NotFound {
                warn!(job_id = %spec.job_id, item = spec.index, "Failed to clean work dir: {}", e);
            }
        }

        match result {
            Ok(()) => Ok(spec.output_path.clone()),
            Err(e) => {
                let _ = fs::remove_file(&spec.output_path).await;
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hookreel_media::MediaError;
    use hookreel_remote::RemoteError;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FakeSpeech {
        fail: bool,
    }

    #[async_trait]
    impl SpeechSynthesizer for FakeSpeech {
        async fn synthesize(&self, text: &str) -> RemoteResult<Vec<u8>> {
            if self.fail {
                Err(RemoteError::AllAttemptsFailed(vec!["base [s1]: 401".into()]))
            } else {
                Ok(text.as_bytes().to_vec())
            }
        }
    }

    #[derive(Default)]
    struct FakeRenderer {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl LipsyncRenderer for FakeRenderer {
        async fn render(&self, _video: &Path, speech: Vec<u8>) -> RemoteResult<RenderOutput> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let mut bytes = b"video:".to_vec();
            bytes.extend(speech);
            Ok(RenderOutput::Bytes(bytes))
        }
    }

    struct CopyOverlay {
        fail: bool,
    }

    #[async_trait]
    impl CaptionOverlay for CopyOverlay {
        async fn overlay(
            &self,
            input: &Path,
            output: &Path,
            _text: &str,
        ) -> MediaResult<CaptionRenderer> {
            if self.fail {
                std::fs::write(output, b"partial").unwrap();
                return Err(MediaError::ffmpeg_failed("No such filter: 'drawtext'", None, Some(1)));
            }
            std::fs::copy(input, output)?;
            Ok(CaptionRenderer::DrawText)
        }
    }

    struct Fixture {
        dir: tempfile::TempDir,
        renderer: Arc<FakeRenderer>,
    }

    impl Fixture {
        fn new() -> Self {
            let dir = tempfile::tempdir().unwrap();
            std::fs::write(dir.path().join("base.mp4"), b"base").unwrap();
            Self {
                dir,
                renderer: Arc::new(FakeRenderer::default()),
            }
        }

        fn processor(&self, speech_fails: bool, overlay_fails: bool) -> LipsyncItemProcessor {
            LipsyncItemProcessor::new(
                Arc::new(FakeSpeech { fail: speech_fails }),
                self.renderer.clone(),
                Arc::new(CopyOverlay { fail: overlay_fails }),
                reqwest::Client::new(),
                self.dir.path().join("base.mp4"),
            )
        }

        fn spec(&self) -> ItemSpec {
            let job_dir = self.dir.path().join("outputs").join("job");
            ItemSpec {
                job_id: JobId::from("job"),
                index: 1,
                text: "Hook: text.".to_string(),
                output_path: job_dir.join("hook_01.mp4"),
                work_dir: job_dir.join(".work_01"),
            }
        }
    }

    #[tokio::test]
    async fn test_successful_item_writes_captioned_clip() {
        let fixture = Fixture::new();
        let spec = fixture.spec();

        let path = fixture.processor(false, false).process(&spec).await.unwrap();

        assert_eq!(path, spec.output_path);
        assert_eq!(std::fs::read(&path).unwrap(), b"video:Hook: text.");
        assert!(!spec.work_dir.exists());
    }

    #[tokio::test]
    async fn test_speech_failure_skips_later_stages() {
        let fixture = Fixture::new();
        let spec = fixture.spec();

        let err = fixture.processor(true, false).process(&spec).await.unwrap_err();

        assert!(matches!(err, WorkerError::SpeechSynthesis(_)));
        assert!(err.to_string().starts_with("Speech synthesis failed: All attempts failed"));
        assert_eq!(fixture.renderer.calls.load(Ordering::SeqCst), 0);
        assert!(!spec.output_path.exists());
    }

    #[tokio::test]
    async fn test_caption_failure_leaves_no_artifact() {
        let fixture = Fixture::new();
        let spec = fixture.spec();

        let err = fixture.processor(false, true).process(&spec).await.unwrap_err();

        assert!(matches!(err, WorkerError::CaptionOverlay(_)));
        assert!(!spec.output_path.exists());
        assert!(!spec.work_dir.exists());
    }

    #[tokio::test]
    async fn test_missing_base_video() {
        let fixture = Fixture::new();
        std::fs::remove_file(fixture.dir.path().join("base.mp4")).unwrap();

        let err = fixture
            .processor(false, false)
            .process(&fixture.spec())
            .await
            .unwrap_err();
        assert!(matches!(err, WorkerError::BaseVideoMissing(_)));
    }
}
