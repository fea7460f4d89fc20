//! Clients for the external services a clip is produced with.
//!
//! - [`FishClient`]: text to speech
//! - [`ReplicateClient`]: lip-sync rendering of a base video onto speech audio
//! - [`GeminiClient`]: candidate hook texts for the model strategy
//!
//! Every rendering result, whatever shape the provider returns it in, is
//! normalized into a [`RenderOutput`] and resolved with [`fetch_bytes`].

pub mod error;
pub mod fish;
pub mod gemini;
pub mod render_output;
pub mod replicate;

pub use error::{RemoteError, RemoteResult};
pub use fish::{FishClient, FishConfig};
pub use gemini::{GeminiClient, GeminiConfig};
pub use render_output::{fetch_bytes, RenderOutput};
pub use replicate::{Prediction, PredictionStatus, ReplicateClient, ReplicateConfig};

/// Read an optional, non-blank environment variable.
pub(crate) fn env_opt(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
