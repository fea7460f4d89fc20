//! Fish Audio text-to-speech client.
//!
//! Deployments differ in which API host and which model a key is entitled
//! to, so synthesis walks every configured base URL and model until one
//! returns audio.

use std::time::Duration;

use reqwest::Client;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::env_opt;
use crate::error::{check_status, RemoteError, RemoteResult};

pub const DEFAULT_FISH_BASE: &str = "https://api.fish.audio";

/// Models tried after the configured one.
const FALLBACK_MODELS: &[&str] = &["s1", "speech-1.6"];

#[derive(Debug, Clone)]
pub struct FishConfig {
    pub api_key: Option<String>,
    /// Base URLs in the order they are tried
    pub base_urls: Vec<String>,
    /// Voice to clone
    pub reference_id: Option<String>,
    /// Preferred model; tried before the fallbacks
    pub model: Option<String>,
    pub timeout: Duration,
}

impl Default for FishConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_urls: vec![DEFAULT_FISH_BASE.to_string()],
            reference_id: None,
            model: None,
            timeout: Duration::from_secs(120),
        }
    }
}

impl FishConfig {
    /// Create config from environment variables.
    ///
    /// `FISH_API_BASE` may list several comma-separated base URLs.
    pub fn from_env() -> Self {
        let mut base_urls: Vec<String> = env_opt("FISH_API_BASE")
            .map(|v| {
                v.split(',')
                    .map(|s| s.trim().trim_end_matches('/').to_string())
                    .filter(|s| !s.is_empty())
                    .collect()
            })
            .unwrap_or_default();
        if base_urls.is_empty() {
            base_urls.push(DEFAULT_FISH_BASE.to_string());
        }

        Self {
            api_key: env_opt("FISH_API_KEY"),
            base_urls,
            reference_id: env_opt("FISH_REFERENCE_ID"),
            model: env_opt("FISH_MODEL"),
            timeout: Duration::from_secs(
                env_opt("FISH_TIMEOUT_SECS")
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(120),
            ),
        }
    }

    pub fn has_api_key(&self) -> bool {
        self.api_key.is_some()
    }

    /// Configured model first, then the fallbacks, without repeats.
    pub fn candidate_models(&self) -> Vec<String> {
        let mut models: Vec<String> = Vec::new();
        for model in self
            .model
            .iter()
            .map(String::as_str)
            .chain(FALLBACK_MODELS.iter().copied())
        {
            if !models.iter().any(|m| m == model) {
                models.push(model.to_string());
            }
        }
        models
    }
}

#[derive(Debug, Serialize)]
struct TtsRequest<'a> {
    text: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    reference_id: Option<&'a str>,
    format: &'static str,
}

pub struct FishClient {
    http: Client,
    config: FishConfig,
}

impl FishClient {
    pub fn new(config: FishConfig) -> RemoteResult<Self> {
        let http = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(RemoteError::Network)?;

        Ok(Self { http, config })
    }

    pub fn from_env() -> RemoteResult<Self> {
        Self::new(FishConfig::from_env())
    }

    pub fn config(&self) -> &FishConfig {
        &self.config
    }

    /// Synthesize `text` to MP3 bytes.
    ///
    /// Fails with every attempt's error when no base URL and model pair
    /// produces audio.
    pub async fn synthesize(&self, text: &str) -> RemoteResult<Vec<u8>> {
        let api_key = self
            .config
            .api_key
            .as_deref()
            .ok_or(RemoteError::MissingCredential("FISH_API_KEY"))?;

        let mut failures = Vec::new();

        for base in &self.config.base_urls {
            for model in self.config.candidate_models() {
                match self.attempt(api_key, base, &model, text).await {
                    Ok(audio) => {
                        info!(base = %base, model = %model, bytes = audio.len(), "Speech synthesized");
                        return Ok(audio);
                    }
                    Err(e) => {
                        warn!(base = %base, model = %model, "Speech synthesis attempt failed: {}", e);
                        failures.push(format!("{} [{}]: {}", base, model, e));
                    }
                }
            }
        }

        Err(RemoteError::AllAttemptsFailed(failures))
    }

    async fn attempt(
        &self,
        api_key: &str,
        base: &str,
        model: &str,
        text: &str,
    ) -> RemoteResult<Vec<u8>> {
        let url = format!("{}/v1/tts", base.trim_end_matches('/'));
        debug!("Sending TTS request to {} with model {}", url, model);

        let request = TtsRequest {
            text,
            reference_id: self.config.reference_id.as_deref(),
            format: "mp3",
        };

        let response = self
            .http
            .post(&url)
            .bearer_auth(api_key)
            .header("model", model)
            .json(&request)
            .send()
            .await?;

        let response = check_status("Fish Audio", response).await?;
        let audio = response.bytes().await?;

        if audio.is_empty() {
            return Err(RemoteError::EmptyResponse("Fish Audio"));
        }

        Ok(audio.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn config(bases: Vec<String>) -> FishConfig {
        FishConfig {
            api_key: Some("secret".to_string()),
            base_urls: bases,
            reference_id: Some("voice-1".to_string()),
            model: Some("custom".to_string()),
            timeout: Duration::from_secs(5),
        }
    }

    #[test]
    fn test_candidate_models_deduplicated() {
        let mut config = FishConfig::default();
        assert_eq!(config.candidate_models(), vec!["s1", "speech-1.6"]);

        config.model = Some("s1".to_string());
        assert_eq!(config.candidate_models(), vec!["s1", "speech-1.6"]);

        config.model = Some("custom".to_string());
        assert_eq!(config.candidate_models(), vec!["custom", "s1", "speech-1.6"]);
    }

    #[tokio::test]
    async fn test_missing_key_fails_at_use() {
        let client = FishClient::new(FishConfig::default()).unwrap();
        let err = client.synthesize("hello").await.unwrap_err();
        assert!(matches!(err, RemoteError::MissingCredential("FISH_API_KEY")));
    }

    #[tokio::test]
    async fn test_falls_back_to_next_model() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v1/tts"))
            .and(header("model", "custom"))
            .respond_with(ResponseTemplate::new(402).set_body_string("no credit"))
            .mount(&server)
            .await;

        Mock::given(method("POST"))
            .and(path("/v1/tts"))
            .and(header("model", "s1"))
            .and(header("authorization", "Bearer secret"))
            .and(body_partial_json(serde_json::json!({
                "text": "hello",
                "reference_id": "voice-1",
                "format": "mp3"
            })))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![1u8, 2, 3]))
            .mount(&server)
            .await;

        let client = FishClient::new(config(vec![server.uri()])).unwrap();
        let audio = client.synthesize("hello").await.unwrap();
        assert_eq!(audio, vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn test_all_attempts_failed_reports_each() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v1/tts"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;

        let client = FishClient::new(config(vec![server.uri()])).unwrap();
        let err = client.synthesize("hello").await.unwrap_err();

        match err {
            RemoteError::AllAttemptsFailed(failures) => {
                assert_eq!(failures.len(), 3);
                assert!(failures[0].contains("[custom]"));
                assert!(failures[0].contains("Empty response"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
