//! FFmpeg CLI wrapper for the caption stage of clip production.
//!
//! This crate provides:
//! - Type-safe FFmpeg command building with multiple inputs
//! - Media probing via FFprobe
//! - Caption line segmentation and timing
//! - Caption burn-in with a `drawtext` primary path and a PNG card fallback

pub mod captions;
pub mod card;
pub mod command;
pub mod error;
pub mod probe;

pub use captions::{
    overlay_captions, plan_captions, CaptionLine, CaptionOptions, CaptionPlan, CaptionRenderer,
    CaptionStyle,
};
pub use card::{render_card, write_cards, CardFont};
pub use command::{check_ffmpeg, check_ffprobe, ffmpeg_has_filter, FfmpegCommand, FfmpegRunner};
pub use error::{MediaError, MediaResult};
pub use probe::{probe_media, MediaInfo};
