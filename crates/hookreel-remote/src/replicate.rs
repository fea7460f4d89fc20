//! Replicate lip-sync client.
//!
//! Inputs are uploaded through the files API, a prediction is created for
//! the configured model and polled until it settles.

use std::path::Path;
use std::time::{Duration, Instant};

use reqwest::multipart::{Form, Part};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{debug, info};

use crate::env_opt;
use crate::error::{check_status, RemoteError, RemoteResult};
use crate::render_output::RenderOutput;

pub const DEFAULT_REPLICATE_BASE: &str = "https://api.replicate.com";
pub const DEFAULT_REPLICATE_MODEL: &str = "sync/lipsync-2";

#[derive(Debug, Clone)]
pub struct ReplicateConfig {
    pub api_token: Option<String>,
    pub base_url: String,
    /// `owner/name` or `owner/name:version`
    pub model: String,
    pub poll_interval: Duration,
    /// Upper bound for a prediction to settle
    pub timeout: Duration,
    /// Per-request HTTP timeout
    pub request_timeout: Duration,
}

impl Default for ReplicateConfig {
    fn default() -> Self {
        Self {
            api_token: None,
            base_url: DEFAULT_REPLICATE_BASE.to_string(),
            model: DEFAULT_REPLICATE_MODEL.to_string(),
            poll_interval: Duration::from_millis(2000),
            timeout: Duration::from_secs(900),
            request_timeout: Duration::from_secs(120),
        }
    }
}

impl ReplicateConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            api_token: env_opt("REPLICATE_API_TOKEN"),
            base_url: env_opt("REPLICATE_API_BASE")
                .map(|s| s.trim_end_matches('/').to_string())
                .unwrap_or(defaults.base_url),
            model: env_opt("REPLICATE_MODEL").unwrap_or(defaults.model),
            poll_interval: env_opt("REPLICATE_POLL_INTERVAL_MS")
                .and_then(|s| s.parse().ok())
                .map(Duration::from_millis)
                .unwrap_or(defaults.poll_interval),
            timeout: env_opt("REPLICATE_TIMEOUT_SECS")
                .and_then(|s| s.parse().ok())
                .map(Duration::from_secs)
                .unwrap_or(defaults.timeout),
            request_timeout: defaults.request_timeout,
        }
    }

    pub fn has_api_token(&self) -> bool {
        self.api_token.is_some()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PredictionStatus {
    Starting,
    Processing,
    Succeeded,
    Failed,
    Canceled,
    #[serde(other)]
    Unknown,
}

impl PredictionStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            PredictionStatus::Succeeded | PredictionStatus::Failed | PredictionStatus::Canceled
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PredictionStatus::Starting => "starting",
            PredictionStatus::Processing => "processing",
            PredictionStatus::Succeeded => "succeeded",
            PredictionStatus::Failed => "failed",
            PredictionStatus::Canceled => "canceled",
            PredictionStatus::Unknown => "unknown",
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PredictionUrls {
    pub get: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Prediction {
    pub id: String,
    pub status: PredictionStatus,
    #[serde(default)]
    pub output: Value,
    #[serde(default)]
    pub error: Value,
    #[serde(default)]
    pub urls: PredictionUrls,
}

#[derive(Debug, Deserialize)]
struct UploadedFile {
    urls: PredictionUrls,
}

pub struct ReplicateClient {
    http: Client,
    config: ReplicateConfig,
}

impl ReplicateClient {
    pub fn new(config: ReplicateConfig) -> RemoteResult<Self> {
        let http = Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(RemoteError::Network)?;

        Ok(Self { http, config })
    }

    pub fn from_env() -> RemoteResult<Self> {
        Self::new(ReplicateConfig::from_env())
    }

    pub fn config(&self) -> &ReplicateConfig {
        &self.config
    }

    /// HTTP client used for downloads of render results.
    pub fn http(&self) -> &Client {
        &self.http
    }

    fn token(&self) -> RemoteResult<&str> {
        self.config
            .api_token
            .as_deref()
            .ok_or(RemoteError::MissingCredential("REPLICATE_API_TOKEN"))
    }

    /// Lip-sync `video` onto `audio` and return the normalized result.
    pub async fn lipsync(&self, video: &Path, audio: Vec<u8>) -> RemoteResult<RenderOutput> {
        // Fail on a missing token before reading the video.
        self.token()?;

        let video_bytes = tokio::fs::read(video).await?;
        let video_url = self.upload_file(video_bytes, "base.mp4", "video/mp4").await?;
        let audio_url = self.upload_file(audio, "speech.mp3", "audio/mpeg").await?;

        let prediction = self
            .create_prediction(json!({ "video": video_url, "audio": audio_url }))
            .await?;
        let prediction = self.wait_for(prediction).await?;

        RenderOutput::from_value(&prediction.output)
    }

    /// Upload bytes and return the URL predictions can read them from.
    pub async fn upload_file(
        &self,
        bytes: Vec<u8>,
        filename: &str,
        content_type: &str,
    ) -> RemoteResult<String> {
        let token = self.token()?;
        let url = format!("{}/v1/files", self.config.base_url);
        debug!("Uploading {} ({} bytes) to {}", filename, bytes.len(), url);

        let part = Part::bytes(bytes)
            .file_name(filename.to_string())
            .mime_str(content_type)?;
        let form = Form::new().part("content", part);

        let response = self
            .http
            .post(&url)
            .bearer_auth(token)
            .multipart(form)
            .send()
            .await?;
        let uploaded: UploadedFile = check_status("Replicate", response).await?.json().await?;

        uploaded
            .urls
            .get
            .ok_or_else(|| RemoteError::invalid_response("Uploaded file has no urls.get"))
    }

    /// Start a prediction of the configured model.
    pub async fn create_prediction(&self, input: Value) -> RemoteResult<Prediction> {
        let token = self.token()?;
        let (url, body) = prediction_request(&self.config.base_url, &self.config.model, input);

        let response = self
            .http
            .post(&url)
            .bearer_auth(token)
            .json(&body)
            .send()
            .await?;
        let prediction: Prediction = check_status("Replicate", response).await?.json().await?;

        info!(prediction_id = %prediction.id, model = %self.config.model, "Prediction created");
        Ok(prediction)
    }

    /// Poll until the prediction settles; anything but success is an error.
    pub async fn wait_for(&self, mut prediction: Prediction) -> RemoteResult<Prediction> {
        let token = self.token()?;
        let started = Instant::now();

        while !prediction.status.is_terminal() {
            if started.elapsed() >= self.config.timeout {
                return Err(RemoteError::Timeout(self.config.timeout.as_secs()));
            }
            tokio::time::sleep(self.config.poll_interval).await;

            let url = prediction
                .urls
                .get
                .clone()
                .unwrap_or_else(|| format!("{}/v1/predictions/{}", self.config.base_url, prediction.id));
            let response = self.http.get(&url).bearer_auth(token).send().await?;
            prediction = check_status("Replicate", response).await?.json().await?;
            debug!(prediction_id = %prediction.id, status = prediction.status.as_str(), "Polled prediction");
        }

        if prediction.status != PredictionStatus::Succeeded {
            let message = match &prediction.error {
                Value::Null => "no error reported".to_string(),
                Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            return Err(RemoteError::PredictionFailed {
                id: prediction.id,
                status: prediction.status.as_str().to_string(),
                message,
            });
        }

        Ok(prediction)
    }
}

/// Endpoint and body for a new prediction. Versioned model ids go through
/// the generic predictions endpoint.
fn prediction_request(base_url: &str, model: &str, input: Value) -> (String, Value) {
    match model.split_once(':') {
        Some((_, version)) => (
            format!("{}/v1/predictions", base_url),
            json!({ "version": version, "input": input }),
        ),
        None => (
            format!("{}/v1/models/{}/predictions", base_url, model),
            json!({ "input": input }),
        ),
    }
}
