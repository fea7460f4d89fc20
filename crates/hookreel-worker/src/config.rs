//! Worker configuration.

use std::path::PathBuf;

use hookreel_media::captions::DEFAULT_WORDS_PER_LINE;

/// Where hook texts come from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HookStrategy {
    /// Local random composition of fragments
    #[default]
    Template,
    /// Candidates from a remote text-generation model
    Model,
}

impl HookStrategy {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "template" => Some(HookStrategy::Template),
            "model" | "gemini" => Some(HookStrategy::Model),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            HookStrategy::Template => "template",
            HookStrategy::Model => "model",
        }
    }
}

/// Worker configuration.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Root of job state, artifacts and hook history
    pub data_dir: PathBuf,
    /// Video every clip is lip-synced onto
    pub base_video_path: PathBuf,
    /// Captioned clip length in seconds; `None` keeps the rendered length
    pub caption_target_seconds: Option<f64>,
    pub caption_words_per_line: usize,
    pub hook_strategy: HookStrategy,
    /// Upper bound for one FFmpeg caption render
    pub ffmpeg_timeout_secs: u64,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./data"),
            base_video_path: PathBuf::from("./assets/base.mp4"),
            caption_target_seconds: Some(10.0),
            caption_words_per_line: DEFAULT_WORDS_PER_LINE,
            hook_strategy: HookStrategy::Template,
            ffmpeg_timeout_secs: 300,
        }
    }
}

impl WorkerConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();

        Self {
            data_dir: std::env::var("DATA_DIR")
                .ok()
                .filter(|s| !s.trim().is_empty())
                .map(PathBuf::from)
                .unwrap_or(defaults.data_dir),
            base_video_path: std::env::var("BASE_VIDEO_PATH")
                .ok()
                .filter(|s| !s.trim().is_empty())
                .map(PathBuf::from)
                .unwrap_or(defaults.base_video_path),
            caption_target_seconds: match std::env::var("CAPTION_TARGET_SECONDS")
                .ok()
                .and_then(|s| s.trim().parse::<f64>().ok())
            {
                Some(secs) if secs > 0.0 => Some(secs),
                Some(_) => None,
                None => defaults.caption_target_seconds,
            },
            caption_words_per_line: std::env::var("CAPTION_WORDS_PER_LINE")
                .ok()
                .and_then(|s| s.trim().parse().ok())
                .filter(|n: &usize| *n > 0)
                .unwrap_or(defaults.caption_words_per_line),
            hook_strategy: std::env::var("HOOK_STRATEGY")
                .ok()
                .and_then(|s| HookStrategy::parse(&s))
                .unwrap_or(defaults.hook_strategy),
            ffmpeg_timeout_secs: std::env::var("FFMPEG_TIMEOUT_SECS")
                .ok()
                .and_then(|s| s.trim().parse().ok())
                .unwrap_or(defaults.ffmpeg_timeout_secs),
        }
    }
}
