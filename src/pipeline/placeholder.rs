//! Formula placeholders: mask a formula inside a table crop with a white box
//! carrying a textual marker (`FORMULA_001`, …) large enough for OCR to read
//! back verbatim.
//!
//! Markers are drawn with the first system TrueType font that loads; when
//! none is available a built-in 5×7 bitmap font covering the marker
//! alphabet is scaled up instead, so marker placement never depends on the
//! host's font setup.

use crate::pipeline::geometry::PixelBox;
use crate::segment::BoundingBox;
use ab_glyph::FontVec;
use image::{Rgb, RgbImage};
use imageproc::drawing::{draw_filled_rect_mut, draw_hollow_rect_mut, draw_text_mut, text_size};
use imageproc::rect::Rect;
use once_cell::sync::Lazy;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

static SHARED_FONT: Lazy<Arc<MarkerFont>> = Lazy::new(|| Arc::new(MarkerFont::load()));

const WHITE: Rgb<u8> = Rgb([255, 255, 255]);
const BLACK: Rgb<u8> = Rgb([0, 0, 0]);

pub const MIN_FONT_SIZE: f32 = 16.0;
pub const MAX_FONT_SIZE: f32 = 64.0;

/// Platform font candidates, tried in order.
pub const FONT_CANDIDATES: &[&str] = &[
    "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/truetype/liberation/LiberationSans-Regular.ttf",
    "/usr/share/fonts/TTF/DejaVuSans.ttf",
    "/System/Library/Fonts/Supplemental/Arial.ttf",
    "/System/Library/Fonts/Arial.ttf",
    "C:\\Windows\\Fonts\\arial.ttf",
];

/// Font used to draw markers.
pub enum MarkerFont {
    Vector(FontVec),
    Bitmap,
}

impl fmt::Debug for MarkerFont {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MarkerFont::Vector(_) => f.write_str("MarkerFont::Vector"),
            MarkerFont::Bitmap => f.write_str("MarkerFont::Bitmap"),
        }
    }
}

impl MarkerFont {
    /// Process-wide font, loaded on first use.
    pub fn shared() -> Arc<MarkerFont> {
        Arc::clone(&SHARED_FONT)
    }

    /// First loadable platform font, else the bitmap font.
    pub fn load() -> Self {
        Self::from_candidates(FONT_CANDIDATES)
    }

    pub fn from_candidates(paths: &[&str]) -> Self {
        for path in paths {
            if let Ok(data) = std::fs::read(path) {
                if let Ok(font) = FontVec::try_from_vec(data) {
                    debug!("Marker font: {}", path);
                    return MarkerFont::Vector(font);
                }
            }
        }
        debug!("Marker font: built-in bitmap");
        MarkerFont::Bitmap
    }

    /// Rendered `(width, height)` of `text` at `size` pixels.
    pub fn text_size(&self, size: f32, text: &str) -> (u32, u32) {
        match self {
            MarkerFont::Vector(font) => text_size(size, font, text),
            MarkerFont::Bitmap => {
                let cell = bitmap_cell(size);
                let chars = text.chars().count() as u32;
                let advance = (GLYPH_WIDTH + 1) * cell;
                (
                    (chars * advance).saturating_sub(cell),
                    GLYPH_HEIGHT * cell,
                )
            }
        }
    }

    pub fn draw(&self, img: &mut RgbImage, x: i32, y: i32, size: f32, text: &str) {
        match self {
            MarkerFont::Vector(font) => draw_text_mut(img, BLACK, x, y, size, font, text),
            MarkerFont::Bitmap => draw_bitmap_text(img, x, y, size, text),
        }
    }
}

/// `clamp(0.6 * box_height, 16, 64)`.
pub fn font_size_for(box_height: i64) -> f32 {
    (0.6 * box_height as f32).clamp(MIN_FONT_SIZE, MAX_FONT_SIZE)
}

/// `max(2, floor(0.05 * min(w, h)))`.
pub fn padding_for(width: i64, height: i64) -> i64 {
    ((width.min(height) as f64 * 0.05).floor() as i64).max(2)
}

/// Mask `formula` inside `crop` and draw `marker` centred on it.
///
/// `origin` is the crop's top-left corner in page pixels. Returns `false`
/// without touching the crop when the padded, clamped box is degenerate
/// (width or height ≤ 1).
pub fn draw_formula_placeholder(
    crop: &mut RgbImage,
    origin: (u32, u32),
    formula: &BoundingBox,
    dpi: u32,
    marker: &str,
    font: &MarkerFont,
) -> bool {
    let local = PixelBox::from_points(formula, dpi).translate(origin);
    let pad = padding_for(local.width(), local.height());
    let b = local.expand(pad).clamp_to(crop.width(), crop.height());
    if b.width() <= 1 || b.height() <= 1 {
        debug!("Skipping {}: degenerate box {:?}", marker, b);
        return false;
    }

    let (bw, bh) = (b.width() as u32, b.height() as u32);
    draw_filled_rect_mut(crop, Rect::at(b.left as i32, b.top as i32).of_size(bw, bh), WHITE);

    let (size, tw, th) = fit_marker(font, marker, font_size_for(b.height()), bw);
    let x = b.left as i32 + (bw as i32 - tw as i32) / 2;
    let y = b.top as i32 + (bh as i32 - th as i32) / 2;

    let margin = frame_margin(size);
    let frame = Rect::at(x - margin, y - margin)
        .of_size(tw + 2 * margin as u32, th + 2 * margin as u32);
    draw_filled_rect_mut(crop, frame, WHITE);
    draw_hollow_rect_mut(crop, frame, BLACK);

    font.draw(crop, x, y, size, marker);
    true
}

fn frame_margin(size: f32) -> i32 {
    ((size * 0.15) as i32).max(2)
}

/// Shrink `size` one pixel at a time until the framed marker fits in
/// `box_width`, stopping at [`MIN_FONT_SIZE`]. At the minimum the frame can
/// still be wider than the box.
fn fit_marker(font: &MarkerFont, marker: &str, size: f32, box_width: u32) -> (f32, u32, u32) {
    let mut size = size;
    loop {
        let (tw, th) = font.text_size(size, marker);
        let framed = tw + 2 * frame_margin(size) as u32;
        if framed <= box_width || size <= MIN_FONT_SIZE {
            return (size, tw, th);
        }
        size = (size - 1.0).max(MIN_FONT_SIZE);
    }
}

// ── Bitmap fallback ──────────────────────────────────────────────────────

const GLYPH_WIDTH: u32 = 5;
const GLYPH_HEIGHT: u32 = 7;

/// Pixel size of one glyph cell at `size`.
fn bitmap_cell(size: f32) -> u32 {
    ((size / (GLYPH_HEIGHT + 1) as f32).floor() as u32).max(1)
}

/// Rows of a 5×7 glyph, most significant of the low five bits leftmost.
fn glyph(c: char) -> [u8; 7] {
    match c.to_ascii_uppercase() {
        'A' => [0x0E, 0x11, 0x11, 0x1F, 0x11, 0x11, 0x11],
        'F' => [0x1F, 0x10, 0x10, 0x1E, 0x10, 0x10, 0x10],
        'L' => [0x10, 0x10, 0x10, 0x10, 0x10, 0x10, 0x1F],
        'M' => [0x11, 0x1B, 0x15, 0x15, 0x11, 0x11, 0x11],
        'O' => [0x0E, 0x11, 0x11, 0x11, 0x11, 0x11, 0x0E],
        'R' => [0x1E, 0x11, 0x11, 0x1E, 0x14, 0x12, 0x11],
        'U' => [0x11, 0x11, 0x11, 0x11, 0x11, 0x11, 0x0E],
        '0' => [0x0E, 0x11, 0x13, 0x15, 0x19, 0x11, 0x0E],
        '1' => [0x04, 0x0C, 0x04, 0x04, 0x04, 0x04, 0x0E],
        '2' => [0x0E, 0x11, 0x01, 0x02, 0x04, 0x08, 0x1F],
        '3' => [0x1F, 0x02, 0x04, 0x02, 0x01, 0x11, 0x0E],
        '4' => [0x02, 0x06, 0x0A, 0x12, 0x1F, 0x02, 0x02],
        '5' => [0x1F, 0x10, 0x1E, 0x01, 0x01, 0x11, 0x0E],
        '6' => [0x06, 0x08, 0x10, 0x1E, 0x11, 0x11, 0x0E],
        '7' => [0x1F, 0x01, 0x02, 0x04, 0x08, 0x08, 0x08],
        '8' => [0x0E, 0x11, 0x11, 0x0E, 0x11, 0x11, 0x0E],
        '9' => [0x0E, 0x11, 0x11, 0x0F, 0x01, 0x02, 0x0C],
        '_' => [0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x1F],
        '-' => [0x00, 0x00, 0x00, 0x1F, 0x00, 0x00, 0x00],
        ' ' => [0x00; 7],
        _ => [0x1F, 0x11, 0x11, 0x11, 0x11, 0x11, 0x1F],
    }
}

fn draw_bitmap_text(img: &mut RgbImage, x: i32, y: i32, size: f32, text: &str) {
    let cell = bitmap_cell(size);
    let advance = ((GLYPH_WIDTH + 1) * cell) as i32;
    for (i, c) in text.chars().enumerate() {
        let gx = x + i as i32 * advance;
        for (row, bits) in glyph(c).iter().enumerate() {
            for col in 0..GLYPH_WIDTH {
                if bits & (1 << (GLYPH_WIDTH - 1 - col)) == 0 {
                    continue;
                }
                let px = gx + (col * cell) as i32;
                let py = y + (row as u32 * cell) as i32;
                draw_filled_rect_mut(img, Rect::at(px, py).of_size(cell, cell), BLACK);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn white(w: u32, h: u32) -> RgbImage {
        RgbImage::from_pixel(w, h, Rgb([200, 200, 200]))
    }

    #[test]
    fn font_size_is_clamped() {
        assert_eq!(font_size_for(10), 16.0);
        assert_eq!(font_size_for(50), 30.0);
        assert_eq!(font_size_for(500), 64.0);
    }

    #[test]
    fn padding_has_floor_of_two() {
        assert_eq!(padding_for(10, 30), 2);
        assert_eq!(padding_for(200, 100), 5);
    }

    #[test]
    fn placeholder_masks_box_and_draws_marker() {
        let mut crop = white(400, 200);
        // At 72 dpi points == pixels; crop origin at (100, 100) on the page.
        let formula = BoundingBox::new(150.0, 150.0, 350.0, 230.0);
        let drawn = draw_formula_placeholder(
            &mut crop,
            (100, 100),
            &formula,
            72,
            "FORMULA_001",
            &MarkerFont::Bitmap,
        );
        assert!(drawn);
        // Padded box corner in crop-local pixels: (50-4, 50-4).
        assert_eq!(crop.get_pixel(47, 47), &WHITE);
        assert_eq!(crop.get_pixel(45, 45), &Rgb([200, 200, 200]));
        let black = crop.pixels().filter(|p| **p == BLACK).count();
        assert!(black > 0, "marker text should be drawn");
    }

    #[test]
    fn narrow_box_shrinks_marker_to_fit() {
        let mut crop = white(500, 300);
        // 200x60 formula: the height alone would ask for a 39px font whose
        // marker is wider than the box.
        let formula = BoundingBox::new(100.0, 100.0, 300.0, 160.0);
        let drawn = draw_formula_placeholder(
            &mut crop,
            (0, 0),
            &formula,
            72,
            "FORMULA_001",
            &MarkerFont::Bitmap,
        );
        assert!(drawn);
        // Padded box spans x in [97, 303).
        for x in [60, 90, 95, 305, 330] {
            assert_eq!(crop.get_pixel(x, 130), &Rgb([200, 200, 200]), "x = {x}");
        }
        let black = crop.pixels().filter(|p| **p == BLACK).count();
        assert!(black > 0);
    }

    #[test]
    fn fit_marker_stops_at_min_size() {
        let font = MarkerFont::Bitmap;
        let (size, w, _) = fit_marker(&font, "FORMULA_001", 40.0, 10);
        assert_eq!(size, MIN_FONT_SIZE);
        assert_eq!(w, 11 * 12 - 2);
        let (size, _, _) = fit_marker(&font, "FORMULA_001", 40.0, 1000);
        assert_eq!(size, 40.0);
    }

    #[test]
    fn degenerate_box_is_skipped() {
        let mut crop = white(50, 50);
        let before = crop.clone();
        // Entirely outside the crop after translation.
        let formula = BoundingBox::new(500.0, 500.0, 600.0, 600.0);
        let drawn =
            draw_formula_placeholder(&mut crop, (0, 0), &formula, 72, "FORMULA_001", &MarkerFont::Bitmap);
        assert!(!drawn);
        assert_eq!(crop, before);
    }

    #[test]
    fn bitmap_text_size_scales() {
        let font = MarkerFont::Bitmap;
        let (w, h) = font.text_size(16.0, "FORMULA_001");
        assert_eq!(h, 14);
        assert_eq!(w, 11 * 12 - 2);
    }

    #[test]
    fn missing_font_files_fall_back_to_bitmap() {
        let font = MarkerFont::from_candidates(&["/nonexistent/font.ttf"]);
        assert!(matches!(font, MarkerFont::Bitmap));
    }
}
