//! Normalized rendering results.
//!
//! A prediction output may be a URL string, a list whose first element is a
//! URL, an object carrying a `url`, or inline `data:` URI bytes. All of them
//! become a [`RenderOutput`] and are resolved to bytes by [`fetch_bytes`].

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use reqwest::Client;
use serde_json::Value;
use tracing::debug;

use crate::error::{check_status, RemoteError, RemoteResult};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RenderOutput {
    /// Bytes delivered inline with the result
    Bytes(Vec<u8>),
    /// Location the result can be downloaded from
    Url(String),
}

impl RenderOutput {
    /// Normalize a provider result.
    pub fn from_value(value: &Value) -> RemoteResult<Self> {
        match value {
            Value::String(s) => Self::from_reference(s),
            Value::Array(items) => items
                .first()
                .ok_or_else(|| RemoteError::invalid_response("Render output is an empty list"))
                .and_then(Self::from_value),
            Value::Object(map) => map
                .get("url")
                .ok_or_else(|| RemoteError::invalid_response("Render output object has no url"))
                .and_then(Self::from_value),
            Value::Null => Err(RemoteError::invalid_response("Render output is missing")),
            other => Err(RemoteError::invalid_response(format!(
                "Unsupported render output: {}",
                other
            ))),
        }
    }

    fn from_reference(reference: &str) -> RemoteResult<Self> {
        let reference = reference.trim();

        if let Some(rest) = reference.strip_prefix("data:") {
            let (meta, payload) = rest
                .split_once(',')
                .ok_or_else(|| RemoteError::invalid_response("Malformed data URI"))?;
            if !meta.ends_with(";base64") {
                return Err(RemoteError::invalid_response("Data URI is not base64 encoded"));
            }
            return Ok(Self::Bytes(STANDARD.decode(payload)?));
        }

        if reference.starts_with("http://") || reference.starts_with("https://") {
            return Ok(Self::Url(reference.to_string()));
        }

        Err(RemoteError::invalid_response(format!(
            "Unrecognized render reference: {}",
            reference.chars().take(80).collect::<String>()
        )))
    }
}

/// Resolve a rendering result to its bytes.
pub async fn fetch_bytes(http: &Client, output: RenderOutput) -> RemoteResult<Vec<u8>> {
    let bytes = match output {
        RenderOutput::Bytes(bytes) => bytes,
        RenderOutput::Url(url) => {
            debug!("Downloading render output from {}", url);
            let response = check_status("render download", http.get(&url).send().await?).await?;
            response.bytes().await?.to_vec()
        }
    };

    if bytes.is_empty() {
        return Err(RemoteError::EmptyResponse("render output"));
    }

    Ok(bytes)
}
