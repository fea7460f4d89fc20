//! Batch job handlers.

use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};
use tracing::info;
use validator::Validate;

use hookreel_models::{Job, JobId, DEFAULT_BATCH_SIZE};

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

/// Body of `POST /api/batches`. An empty body asks for the default size.
#[derive(Debug, Default, Deserialize, Validate)]
pub struct CreateBatchRequest {
    #[validate(range(min = 1, max = 50, message = "total must be between 1 and 50"))]
    pub total: Option<u32>,
}

impl CreateBatchRequest {
    fn parse(body: &[u8]) -> ApiResult<Self> {
        if body.iter().all(u8::is_ascii_whitespace) {
            return Ok(Self::default());
        }
        let request: Self = serde_json::from_slice(body)
            .map_err(|e| ApiError::bad_request(format!("Invalid JSON body: {}", e)))?;
        request.validate()?;
        Ok(request)
    }
}

#[derive(Debug, Serialize)]
pub struct ListBatchesResponse {
    pub jobs: Vec<Job>,
}

/// Create a batch and queue it for processing.
pub async fn create_batch(
    State(state): State<AppState>,
    body: Bytes,
) -> ApiResult<(StatusCode, Json<Job>)> {
    let request = CreateBatchRequest::parse(&body)?;
    let total = request.total.unwrap_or(DEFAULT_BATCH_SIZE);

    let job = state.orchestrator.create(total).await?;
    info!(job_id = %job.id, total, "Batch accepted");

    Ok((StatusCode::ACCEPTED, Json(job)))
}

/// All known batches, newest first.
pub async fn list_batches(State(state): State<AppState>) -> ApiResult<Json<ListBatchesResponse>> {
    let jobs = state.orchestrator.list_all().await?;
    Ok(Json(ListBatchesResponse { jobs }))
}

/// One batch. Ids never seen by this process and absent from disk are 404.
pub async fn get_batch(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<Job>> {
    let id = JobId::from(id);
    let resolved = state.orchestrator.get(&id).await?;

    if resolved.is_placeholder() && !state.orchestrator.was_created(&id) {
        return Err(ApiError::not_found(format!("Batch {} not found", id)));
    }

    Ok(Json(resolved.job))
}
