//! Health check handler.

use axum::Json;
use serde::Serialize;

use hookreel_remote::{FishConfig, ReplicateConfig};

/// Health response. Credentials are reported by presence only.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub ok: bool,
    pub has_replicate_token: bool,
    pub has_fish_api_key: bool,
}

/// Liveness plus credential presence, read from the environment per call.
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        ok: true,
        has_replicate_token: ReplicateConfig::from_env().has_api_token(),
        has_fish_api_key: FishConfig::from_env().has_api_key(),
    })
}
