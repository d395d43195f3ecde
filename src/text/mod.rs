//! # Text Measurement
//!
//! The layout engine measures text through [`TextMeasurer`] and never
//! computes glyph metrics itself. Two implementations ship with the crate:
//!
//! - [`FixedPitchMetrics`]: every character has the same advance. Used by
//!   the tests and as the CLI default when no font files are given.
//! - [`TtfMetrics`]: real advances from TrueType/OpenType faces via
//!   ttf-parser. Glyph outlines become tiny-skia paths filled into the
//!   offscreen pixmaps graphs and cross-tabs draw into.
//!
//! Widths and heights are in inches. Font sizes are in points.

pub mod splitter;

pub use splitter::TextFlowSplitter;

use std::collections::HashMap;

use tiny_skia::{FillRule, Paint, Path, PathBuilder, Pixmap, Transform};
use ttf_parser::OutlineBuilder;

use crate::error::ReportError;
use crate::model::{Color, Font};

/// Offscreen raster resolution for graphs and cross-tabs.
pub const RASTER_DPI: f64 = 100.0;

/// External text-measurement capability.
pub trait TextMeasurer {
    /// Width of `text` set in `font`, in inches.
    fn text_width(&self, text: &str, font: &Font) -> f64;

    /// Distance between baselines, in inches.
    fn line_height(&self, font: &Font) -> f64 {
        font.size * 1.2 / 72.0
    }

    /// Draw `text` into an offscreen raster with its top-left corner at
    /// pixel `(x, y)`. Measurers without glyph outlines leave the raster
    /// untouched.
    fn draw_text(
        &self,
        _canvas: &mut Pixmap,
        _x: f64,
        _y: f64,
        _text: &str,
        _font: &Font,
        _color: Color,
    ) {
    }
}

/// Monospaced metrics.
#[derive(Debug, Clone, Copy)]
pub struct FixedPitchMetrics {
    advance_em: f64,
    fixed: Option<(f64, f64)>,
}

impl FixedPitchMetrics {
    /// Each character advances `advance_em` times the font size.
    pub fn new(advance_em: f64) -> Self {
        Self {
            advance_em,
            fixed: None,
        }
    }

    /// Every character is `char_width` inches wide and every line
    /// `line_height` inches tall, whatever the font.
    pub fn fixed(char_width: f64, line_height: f64) -> Self {
        Self {
            advance_em: 0.0,
            fixed: Some((char_width, line_height)),
        }
    }
}

impl Default for FixedPitchMetrics {
    fn default() -> Self {
        Self::new(0.5)
    }
}

impl TextMeasurer for FixedPitchMetrics {
    fn text_width(&self, text: &str, font: &Font) -> f64 {
        let count = text.chars().count() as f64;
        match self.fixed {
            Some((w, _)) => count * w,
            None => count * self.advance_em * font.size / 72.0,
        }
    }

    fn line_height(&self, font: &Font) -> f64 {
        match self.fixed {
            Some((_, h)) => h,
            None => font.size * 1.2 / 72.0,
        }
    }
}

#[derive(Debug, Clone, Hash, PartialEq, Eq)]
struct FaceKey {
    family: String,
    weight: u32,
    italic: bool,
}

/// Metrics from registered TrueType/OpenType faces.
///
/// Lookups fall back from the exact face to the weight snapped to 400/700,
/// then to any face of the family, then to the first registered face.
/// With nothing registered, characters advance half an em.
#[derive(Debug, Default)]
pub struct TtfMetrics {
    faces: HashMap<FaceKey, Vec<u8>>,
    order: Vec<FaceKey>,
}

impl TtfMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a face. Fails when the data is not a parseable font.
    pub fn register(
        &mut self,
        family: &str,
        weight: u32,
        italic: bool,
        data: Vec<u8>,
    ) -> Result<(), ReportError> {
        ttf_parser::Face::parse(&data, 0)
            .map_err(|e| ReportError::Font(format!("{family}: {e}")))?;
        let key = FaceKey {
            family: family.to_string(),
            weight,
            italic,
        };
        if !self.faces.contains_key(&key) {
            self.order.push(key.clone());
        }
        self.faces.insert(key, data);
        Ok(())
    }

    pub fn is_empty(&self) -> bool {
        self.faces.is_empty()
    }

    fn resolve(&self, font: &Font) -> Option<ttf_parser::Face<'_>> {
        let exact = FaceKey {
            family: font.family.clone(),
            weight: font.weight,
            italic: font.italic,
        };
        let snapped = FaceKey {
            weight: if font.weight >= 600 { 700 } else { 400 },
            ..exact.clone()
        };
        let data = self
            .faces
            .get(&exact)
            .or_else(|| self.faces.get(&snapped))
            .or_else(|| {
                self.order
                    .iter()
                    .find(|k| k.family == font.family)
                    .and_then(|k| self.faces.get(k))
            })
            .or_else(|| self.order.first().and_then(|k| self.faces.get(k)))?;
        ttf_parser::Face::parse(data, 0).ok()
    }
}

fn advance(face: &ttf_parser::Face<'_>, ch: char) -> u16 {
    face.glyph_index(ch)
        .and_then(|g| face.glyph_hor_advance(g))
        .or_else(|| face.glyph_index(' ').and_then(|g| face.glyph_hor_advance(g)))
        .unwrap_or(face.units_per_em() / 2)
}

impl TextMeasurer for TtfMetrics {
    fn text_width(&self, text: &str, font: &Font) -> f64 {
        let Some(face) = self.resolve(font) else {
            return text.chars().count() as f64 * 0.5 * font.size / 72.0;
        };
        let upem = face.units_per_em() as f64;
        let units: f64 = text.chars().map(|ch| advance(&face, ch) as f64).sum();
        units / upem * font.size / 72.0
    }

    fn line_height(&self, font: &Font) -> f64 {
        let Some(face) = self.resolve(font) else {
            return font.size * 1.2 / 72.0;
        };
        let upem = face.units_per_em() as f64;
        let extent = face.ascender() as f64 - face.descender() as f64 + face.line_gap() as f64;
        extent / upem * font.size / 72.0
    }

    fn draw_text(
        &self,
        canvas: &mut Pixmap,
        x: f64,
        y: f64,
        text: &str,
        font: &Font,
        color: Color,
    ) {
        let Some(face) = self.resolve(font) else {
            return;
        };
        let scale = font.size / 72.0 * RASTER_DPI / face.units_per_em() as f64;
        let baseline = y + face.ascender() as f64 * scale;
        let paint = solid_paint(color);
        let mut pen_x = x;
        for ch in text.chars() {
            if let Some(glyph) = face.glyph_index(ch) {
                let mut outline = GlyphPath::new(pen_x as f32, baseline as f32, scale as f32);
                if face.outline_glyph(glyph, &mut outline).is_some() {
                    if let Some(path) = outline.finish() {
                        canvas.fill_path(&path, &paint, FillRule::Winding, Transform::identity(), None);
                    }
                }
            }
            pen_x += advance(&face, ch) as f64 * scale;
        }
    }
}

/// An opaque anti-aliased paint.
pub(crate) fn solid_paint(color: Color) -> Paint<'static> {
    let mut paint = Paint::default();
    paint.set_color_rgba8(color.r, color.g, color.b, 255);
    paint.anti_alias = true;
    paint
}

/// Glyph outline in raster space: font units scaled to pixels, y flipped
/// so the outline hangs below the pen's top edge.
struct GlyphPath {
    builder: PathBuilder,
    origin_x: f32,
    baseline: f32,
    scale: f32,
}

impl GlyphPath {
    fn new(origin_x: f32, baseline: f32, scale: f32) -> Self {
        Self {
            builder: PathBuilder::new(),
            origin_x,
            baseline,
            scale,
        }
    }

    fn x(&self, x: f32) -> f32 {
        self.origin_x + x * self.scale
    }

    fn y(&self, y: f32) -> f32 {
        self.baseline - y * self.scale
    }

    fn finish(self) -> Option<Path> {
        self.builder.finish()
    }
}

impl OutlineBuilder for GlyphPath {
    fn move_to(&mut self, x: f32, y: f32) {
        let (x, y) = (self.x(x), self.y(y));
        self.builder.move_to(x, y);
    }

    fn line_to(&mut self, x: f32, y: f32) {
        let (x, y) = (self.x(x), self.y(y));
        self.builder.line_to(x, y);
    }

    fn quad_to(&mut self, x1: f32, y1: f32, x: f32, y: f32) {
        let (x1, y1, x, y) = (self.x(x1), self.y(y1), self.x(x), self.y(y));
        self.builder.quad_to(x1, y1, x, y);
    }

    fn curve_to(&mut self, x1: f32, y1: f32, x2: f32, y2: f32, x: f32, y: f32) {
        let (x1, y1) = (self.x(x1), self.y(y1));
        let (x2, y2) = (self.x(x2), self.y(y2));
        let (x, y) = (self.x(x), self.y(y));
        self.builder.cubic_to(x1, y1, x2, y2, x, y);
    }

    fn close(&mut self) {
        self.builder.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixed_pitch_scales_with_font() {
        let m = FixedPitchMetrics::new(0.5);
        let w = m.text_width("abcd", &Font::sized(12.0));
        assert!((w - 4.0 * 6.0 / 72.0).abs() < 1e-12);
        assert!((m.line_height(&Font::sized(10.0)) - 12.0 / 72.0).abs() < 1e-12);
    }

    #[test]
    fn fixed_pitch_absolute() {
        let m = FixedPitchMetrics::fixed(0.1, 0.2);
        assert!((m.text_width("hello", &Font::sized(30.0)) - 0.5).abs() < 1e-12);
        assert_eq!(m.line_height(&Font::sized(30.0)), 0.2);
    }

    #[test]
    fn ttf_without_faces_falls_back() {
        let m = TtfMetrics::new();
        assert!(m.is_empty());
        let w = m.text_width("ab", &Font::sized(72.0));
        assert!((w - 1.0).abs() < 1e-12);
        let mut canvas = Pixmap::new(4, 4).unwrap();
        canvas.fill(tiny_skia::Color::WHITE);
        m.draw_text(&mut canvas, 0.0, 0.0, "ab", &Font::sized(72.0), Color::BLACK);
        assert!(canvas.pixels().iter().all(|p| p.red() == 255 && p.alpha() == 255));
    }

    #[test]
    fn ttf_rejects_garbage() {
        let mut m = TtfMetrics::new();
        assert!(m.register("Bogus", 400, false, vec![0, 1, 2, 3]).is_err());
        assert!(m.is_empty());
    }

    #[test]
    fn glyph_path_flips_font_units_into_raster_space() {
        let mut outline = GlyphPath::new(10.0, 50.0, 0.5);
        outline.move_to(0.0, 0.0);
        outline.line_to(40.0, 0.0);
        outline.line_to(40.0, 60.0);
        outline.line_to(0.0, 60.0);
        outline.close();
        let bounds = outline.finish().unwrap().bounds();
        assert_eq!((bounds.left(), bounds.top()), (10.0, 20.0));
        assert_eq!((bounds.right(), bounds.bottom()), (30.0, 50.0));
    }
}
