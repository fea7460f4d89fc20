//! Timed caption burn-in.
//!
//! The hook text is split into short word groups shown one after another,
//! spread evenly over the target duration. When the target is longer than
//! the rendered clip, the last video frame is held and the audio padded with
//! silence so the captions can finish.
//!
//! Rendering prefers the `drawtext` filter. Builds of FFmpeg without it get
//! each line rendered to a PNG card that is composited with `overlay`.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::card::write_cards;
use crate::command::{ffmpeg_has_filter, FfmpegCommand, FfmpegRunner};
use crate::error::{MediaError, MediaResult};
use crate::probe::probe_media;

pub const DEFAULT_WORDS_PER_LINE: usize = 5;

/// Text shown when the hook text has no words.
const EMPTY_CAPTION: &str = "...";

/// Fonts tried in order when `CAPTION_FONT_PATH` is not set.
const FONT_CANDIDATES: &[&str] = &[
    "/usr/share/fonts/truetype/dejavu/DejaVuSans-Bold.ttf",
    "/usr/share/fonts/truetype/liberation/LiberationSans-Bold.ttf",
    "/System/Library/Fonts/Supplemental/Arial Bold.ttf",
    "/System/Library/Fonts/Supplemental/Arial.ttf",
];

/// Visual style of the burned-in captions.
#[derive(Debug, Clone, PartialEq)]
pub struct CaptionStyle {
    pub font_size: u32,
    /// Distance between the bottom of the text and the bottom edge
    pub bottom_margin: u32,
    pub border_width: u32,
    /// Font file for `drawtext` and the caption cards. `drawtext` falls back
    /// to fontconfig when unset; cards cannot be rendered without one.
    pub font_file: Option<PathBuf>,
}

impl Default for CaptionStyle {
    fn default() -> Self {
        Self {
            font_size: 56,
            bottom_margin: 250,
            border_width: 3,
            font_file: None,
        }
    }
}

impl CaptionStyle {
    /// Default style with the font taken from `CAPTION_FONT_PATH` or the
    /// first installed candidate font.
    pub fn from_env() -> Self {
        let configured = std::env::var("CAPTION_FONT_PATH")
            .ok()
            .filter(|p| !p.trim().is_empty())
            .map(PathBuf::from);

        let font_file = configured
            .into_iter()
            .chain(FONT_CANDIDATES.iter().map(PathBuf::from))
            .find(|p| p.is_file());

        Self {
            font_file,
            ..Self::default()
        }
    }
}

/// Options for one caption overlay.
#[derive(Debug, Clone)]
pub struct CaptionOptions {
    pub words_per_line: usize,
    /// Seconds the captioned clip should last; `None` keeps the clip length
    pub target_seconds: Option<f64>,
    pub style: CaptionStyle,
    pub timeout_secs: Option<u64>,
}

impl Default for CaptionOptions {
    fn default() -> Self {
        Self {
            words_per_line: DEFAULT_WORDS_PER_LINE,
            target_seconds: Some(10.0),
            style: CaptionStyle::default(),
            timeout_secs: Some(300),
        }
    }
}

/// One caption line and the interval it is visible in.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaptionLine {
    pub text: String,
    pub start: f64,
    pub end: f64,
}

/// Timed caption lines plus the output length.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaptionPlan {
    pub lines: Vec<CaptionLine>,
    /// Length of the captioned output
    pub final_duration: f64,
    /// Seconds appended to the source so it reaches `final_duration`
    pub pad_duration: f64,
}

impl CaptionPlan {
    pub fn needs_padding(&self) -> bool {
        self.pad_duration > 0.0
    }
}

/// Which filter burned the captions in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CaptionRenderer {
    DrawText,
    ImageOverlay,
}

impl CaptionRenderer {
    pub fn as_str(&self) -> &'static str {
        match self {
            CaptionRenderer::DrawText => "drawtext",
            CaptionRenderer::ImageOverlay => "overlay",
        }
    }
}

impl std::fmt::Display for CaptionRenderer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Split `text` into lines of at most `words_per_line` words.
pub fn split_lines(text: &str, words_per_line: usize) -> Vec<String> {
    let words: Vec<&str> = text.split_whitespace().collect();
    if words.is_empty() {
        return vec![EMPTY_CAPTION.to_string()];
    }

    words
        .chunks(words_per_line.max(1))
        .map(|chunk| chunk.join(" "))
        .collect()
}

/// Segment `text` and time the lines evenly over the output length.
///
/// The output lasts `target_seconds` when given and positive, otherwise the
/// source `media_duration`.
pub fn plan_captions(
    text: &str,
    words_per_line: usize,
    target_seconds: Option<f64>,
    media_duration: f64,
) -> CaptionPlan {
    let media_duration = media_duration.max(0.0);
    let final_duration = target_seconds
        .filter(|t| t.is_finite() && *t > 0.0)
        .unwrap_or(media_duration);
    let pad_duration = (final_duration - media_duration).max(0.0);

    let texts = split_lines(text, words_per_line);
    let step = final_duration / texts.len() as f64;
    let last = texts.len() - 1;

    let lines = texts
        .into_iter()
        .enumerate()
        .map(|(i, text)| {
            let start = i as f64 * step;
            let end = if i == last {
                final_duration
            } else {
                ((i + 1) as f64 * step).min(final_duration)
            };
            CaptionLine { text, start, end }
        })
        .collect();

    CaptionPlan {
        lines,
        final_duration,
        pad_duration,
    }
}

/// Escape a path for use as a quoted filter option value.
fn escape_filter_path(path: &Path) -> String {
    path.to_string_lossy()
        .replace('\\', "\\\\")
        .replace('\'', "\\'")
        .replace(':', "\\:")
}

/// One `drawtext` per line, each reading its text from a file.
fn drawtext_chain(plan: &CaptionPlan, text_files: &[PathBuf], style: &CaptionStyle) -> String {
    let font = style
        .font_file
        .as_deref()
        .map(|f| format!("fontfile='{}':", escape_filter_path(f)))
        .unwrap_or_default();

    plan.lines
        .iter()
        .zip(text_files)
        .map(|(line, file)| {
            format!(
                "drawtext={font}textfile='{}':fontsize={}:fontcolor=white:\
                 borderw={}:bordercolor=black:box=1:boxcolor=black@0.59:boxborderw=18:\
                 x=(w-text_w)/2:y=h-text_h-{}:enable='between(t,{:.3},{:.3})'",
                escape_filter_path(file),
                style.font_size,
                style.border_width,
                style.bottom_margin,
                line.start,
                line.end,
            )
        })
        .collect::<Vec<_>>()
        .join(",")
}

/// Video filter graph: optional frame hold, then the caption chain.
fn drawtext_graph(plan: &CaptionPlan, caption_chain: &str) -> String {
    if plan.needs_padding() {
        format!(
            "[0:v]tpad=stop_mode=clone:stop_duration={:.3},{}[vout]",
            plan.pad_duration, caption_chain
        )
    } else {
        format!("[0:v]{}[vout]", caption_chain)
    }
}

/// Video filter graph compositing card `N` (input `N`) over the optionally
/// held source, one `overlay` per line.
fn card_overlay_graph(plan: &CaptionPlan, style: &CaptionStyle) -> String {
    let mut chain = Vec::with_capacity(plan.lines.len() + 1);

    let mut previous = if plan.needs_padding() {
        chain.push(format!(
            "[0:v]tpad=stop_mode=clone:stop_duration={:.3}[vbase]",
            plan.pad_duration
        ));
        "[vbase]".to_string()
    } else {
        "[0:v]".to_string()
    };

    let last = plan.lines.len();
    for (i, line) in plan.lines.iter().enumerate() {
        let input = i + 1;
        let label = if input == last {
            "[vout]".to_string()
        } else {
            format!("[v{}]", input)
        };
        chain.push(format!(
            "{previous}[{input}:v]overlay=x=(W-w)/2:y=H-h-{}:enable='between(t,{:.3},{:.3})'{label}",
            style.bottom_margin, line.start, line.end,
        ));
        previous = label;
    }

    chain.join(";")
}

fn build_overlay_command(
    input: &Path,
    output: &Path,
    plan: &CaptionPlan,
    graph: String,
    cards: &[PathBuf],
    has_audio: bool,
) -> FfmpegCommand {
    let card_length = format!("{:.3}", plan.final_duration);
    let mut cmd = cards.iter().fold(FfmpegCommand::new(input, output), |cmd, card| {
        cmd.add_input(["-loop", "1", "-t", card_length.as_str()], card)
    });

    cmd = cmd.filter_complex(graph).map("[vout]").map("0:a?");

    if has_audio && plan.needs_padding() {
        cmd = cmd.audio_filter(format!("apad=pad_dur={:.3}", plan.pad_duration));
    }

    cmd.output_duration(plan.final_duration)
        .video_codec("libx264")
        .preset("veryfast")
        .crf(20)
        .audio_codec("aac")
        .audio_bitrate("160k")
        .output_args(["-movflags", "+faststart"])
}

/// Burn timed captions of `text` into `input`, writing `output`.
pub async fn overlay_captions(
    input: &Path,
    output: &Path,
    text: &str,
    options: &CaptionOptions,
) -> MediaResult<CaptionRenderer> {
    let media = probe_media(input).await?;
    let plan = plan_captions(text, options.words_per_line, options.target_seconds, media.duration);

    if plan.final_duration <= 0.0 {
        return Err(MediaError::invalid_media(format!(
            "Cannot caption zero-length media: {}",
            input.display()
        )));
    }

    let scratch_root = output.parent().unwrap_or_else(|| Path::new("."));
    let scratch = tempfile::Builder::new()
        .prefix(".captions")
        .tempdir_in(scratch_root)?;

    let renderer = if ffmpeg_has_filter("drawtext").await? {
        CaptionRenderer::DrawText
    } else {
        warn!("FFmpeg has no drawtext filter, overlaying rendered caption cards");
        CaptionRenderer::ImageOverlay
    };

    let (graph, cards) = match renderer {
        CaptionRenderer::DrawText => {
            let mut files = Vec::with_capacity(plan.lines.len());
            for (i, line) in plan.lines.iter().enumerate() {
                let path = scratch.path().join(format!("line_{:02}.txt", i));
                tokio::fs::write(&path, &line.text).await?;
                files.push(path);
            }
            let chain = drawtext_chain(&plan, &files, &options.style);
            (drawtext_graph(&plan, &chain), Vec::new())
        }
        CaptionRenderer::ImageOverlay => {
            let font = options.style.font_file.clone().ok_or_else(|| {
                MediaError::caption("No caption font found, set CAPTION_FONT_PATH")
            })?;
            let lines = plan.lines.clone();
            let dir = scratch.path().to_path_buf();
            let cards = tokio::task::spawn_blocking(move || write_cards(&font, &lines, &dir))
                .await
                .map_err(|e| MediaError::caption(format!("Card rendering task failed: {}", e)))??;
            (card_overlay_graph(&plan, &options.style), cards)
        }
    };

    debug!(
        lines = plan.lines.len(),
        final_duration = plan.final_duration,
        pad_duration = plan.pad_duration,
        renderer = %renderer,
        "Planned captions"
    );

    let cmd = build_overlay_command(input, output, &plan, graph, &cards, media.has_audio);

    let mut runner = FfmpegRunner::new();
    if let Some(secs) = options.timeout_secs {
        runner = runner.with_timeout(secs);
    }
    runner.run(&cmd).await?;

    if !output.exists() {
        return Err(MediaError::FileNotFound(output.to_path_buf()));
    }

    info!(output = %output.display(), renderer = %renderer, "Captions burned in");
    Ok(renderer)
}
