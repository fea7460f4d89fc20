//! Axum HTTP API server.
//!
//! This crate provides:
//! - Batch creation, listing and status routes
//! - Static serving of finished clips and manifests under `/outputs`
//! - Health reporting and Prometheus metrics

pub mod config;
pub mod error;
pub mod handlers;
pub mod metrics;
pub mod middleware;
pub mod routes;
pub mod state;

pub use config::ApiConfig;
pub use error::{ApiError, ApiResult};
pub use routes::create_router;
pub use state::AppState;
