//! Caption cards.
//!
//! Each caption line is rendered to a transparent PNG: a rounded translucent
//! box with white, dark-outlined text centered on it. The cards are overlaid
//! on the video with the `overlay` filter, which every FFmpeg build has.

use std::path::{Path, PathBuf};

use ab_glyph::{point, Font, FontVec, Glyph, PxScale, ScaleFont};
use image::{Rgba, RgbaImage};

use crate::captions::CaptionLine;
use crate::error::{MediaError, MediaResult};

pub const CARD_WIDTH: u32 = 980;
pub const CARD_HEIGHT: u32 = 170;

/// Widest a rendered line may be, outline included.
const MAX_TEXT_WIDTH: f32 = (CARD_WIDTH - 70) as f32;

/// Sizes tried largest first.
const FONT_SIZES: &[f32] = &[62.0, 58.0, 54.0, 50.0, 46.0, 42.0, 38.0, 34.0];
/// Used when no size in `FONT_SIZES` fits; the line may overflow the box.
const MIN_FONT_SIZE: f32 = 30.0;

const BOX_INSET_Y: u32 = 14;
const BOX_RADIUS: f32 = 24.0;
const BOX_COLOR: Rgba<u8> = Rgba([0, 0, 0, 150]);
const TEXT_COLOR: Rgba<u8> = Rgba([255, 255, 255, 255]);
const OUTLINE_COLOR: Rgba<u8> = Rgba([10, 10, 10, 255]);
const OUTLINE_WIDTH: i32 = 3;

/// A parsed TrueType/OpenType font for card text.
pub struct CardFont {
    font: FontVec,
}

impl CardFont {
    pub fn from_bytes(data: Vec<u8>) -> MediaResult<Self> {
        FontVec::try_from_vec(data)
            .map(|font| Self { font })
            .map_err(|e| MediaError::caption(format!("Unreadable font: {}", e)))
    }

    pub fn load(path: &Path) -> MediaResult<Self> {
        let data = std::fs::read(path)?;
        Self::from_bytes(data)
            .map_err(|e| MediaError::caption(format!("{} ({})", e, path.display())))
    }

    /// Glyphs of `text` on one baseline starting at x = 0, plus the advance.
    fn layout(&self, text: &str, size: f32) -> (Vec<Glyph>, f32) {
        let scale = PxScale::from(size);
        let scaled = self.font.as_scaled(scale);

        let mut glyphs = Vec::with_capacity(text.len());
        let mut caret = 0.0;
        let mut previous = None;
        for c in text.chars() {
            let id = scaled.glyph_id(c);
            if let Some(prev) = previous {
                caret += scaled.kern(prev, id);
            }
            glyphs.push(id.with_scale_and_position(scale, point(caret, scaled.ascent())));
            caret += scaled.h_advance(id);
            previous = Some(id);
        }

        (glyphs, caret)
    }

    /// Rendered width of `text`, outline included.
    pub fn text_width(&self, text: &str, size: f32) -> f32 {
        self.layout(text, size).1 + 2.0 * OUTLINE_WIDTH as f32
    }

    /// Largest size whose rendered line fits the card.
    pub fn fit_size(&self, text: &str) -> f32 {
        FONT_SIZES
            .iter()
            .copied()
            .find(|size| self.text_width(text, *size) <= MAX_TEXT_WIDTH)
            .unwrap_or(MIN_FONT_SIZE)
    }

    fn line_height(&self, size: f32) -> f32 {
        let scaled = self.font.as_scaled(PxScale::from(size));
        scaled.ascent() - scaled.descent()
    }
}

/// Source-over blend of `color` at `coverage` into one pixel.
fn blend(card: &mut RgbaImage, x: i32, y: i32, color: Rgba<u8>, coverage: f32) {
    if x < 0 || y < 0 || x as u32 >= card.width() || y as u32 >= card.height() {
        return;
    }

    let src_a = color.0[3] as f32 / 255.0 * coverage.clamp(0.0, 1.0);
    if src_a <= 0.0 {
        return;
    }

    let dst = card.get_pixel_mut(x as u32, y as u32);
    let dst_a = dst.0[3] as f32 / 255.0;
    let out_a = src_a + dst_a * (1.0 - src_a);

    for c in 0..3 {
        let value =
            (color.0[c] as f32 * src_a + dst.0[c] as f32 * dst_a * (1.0 - src_a)) / out_a;
        dst.0[c] = value.round() as u8;
    }
    dst.0[3] = (out_a * 255.0).round() as u8;
}

/// Fill the full-width band `top..bottom` with rounded corners.
fn fill_rounded_box(card: &mut RgbaImage, top: u32, bottom: u32, radius: f32, color: Rgba<u8>) {
    let width = card.width() as f32;
    let (inner_top, inner_bottom) = (top as f32 + radius, bottom as f32 - radius);

    for y in top..bottom.min(card.height()) {
        for x in 0..card.width() {
            let (cx, cy) = (x as f32 + 0.5, y as f32 + 0.5);
            let dx = cx - cx.clamp(radius, width - radius);
            let dy = cy - cy.clamp(inner_top, inner_bottom);
            if dx * dx + dy * dy <= radius * radius {
                card.put_pixel(x, y, color);
            }
        }
    }
}

fn draw_glyphs(card: &mut RgbaImage, font: &FontVec, glyphs: &[Glyph], x: f32, y: f32, color: Rgba<u8>) {
    for glyph in glyphs {
        let mut glyph = glyph.clone();
        glyph.position = point(glyph.position.x + x, glyph.position.y + y);

        if let Some(outlined) = font.outline_glyph(glyph) {
            let bounds = outlined.px_bounds();
            let (left, top) = (bounds.min.x as i32, bounds.min.y as i32);
            outlined.draw(|gx, gy, coverage| {
                blend(card, left + gx as i32, top + gy as i32, color, coverage);
            });
        }
    }
}

/// Render one caption line as a card.
pub fn render_card(font: &CardFont, text: &str) -> RgbaImage {
    let mut card = RgbaImage::new(CARD_WIDTH, CARD_HEIGHT);
    fill_rounded_box(&mut card, BOX_INSET_Y, CARD_HEIGHT - BOX_INSET_Y, BOX_RADIUS, BOX_COLOR);

    let size = font.fit_size(text);
    let (glyphs, advance) = font.layout(text, size);
    let x = (CARD_WIDTH as f32 - advance) / 2.0;
    let y = (CARD_HEIGHT as f32 - font.line_height(size)) / 2.0 - 4.0;

    // Outline: the text stamped at every offset inside the stroke radius
    for dy in -OUTLINE_WIDTH..=OUTLINE_WIDTH {
        for dx in -OUTLINE_WIDTH..=OUTLINE_WIDTH {
            if (dx, dy) == (0, 0) || dx * dx + dy * dy > OUTLINE_WIDTH * OUTLINE_WIDTH {
                continue;
            }
            draw_glyphs(&mut card, &font.font, &glyphs, x + dx as f32, y + dy as f32, OUTLINE_COLOR);
        }
    }
    draw_glyphs(&mut card, &font.font, &glyphs, x, y, TEXT_COLOR);

    card
}

/// Write `cap_N.png` (1-based) into `dir` for every line, in order.
pub fn write_cards(font_path: &Path, lines: &[CaptionLine], dir: &Path) -> MediaResult<Vec<PathBuf>> {
    let font = CardFont::load(font_path)?;

    lines
        .iter()
        .enumerate()
        .map(|(i, line)| -> MediaResult<PathBuf> {
            let path = dir.join(format!("cap_{}.png", i + 1));
            render_card(&font, &line.text).save(&path)?;
            Ok(path)
        })
        .collect()
}
