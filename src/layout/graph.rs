//! # Graphs
//!
//! A graph element draws its whole query into an offscreen raster at
//! [`RASTER_DPI`]: one category per row along the data axis, one value per
//! series column, drawn as bars, lines and/or points into a tiny-skia
//! pixmap. The raster is PNG encoded and placed as a scaled image
//! primitive. The query cursor is put
//! back where it was afterwards so a surrounding detail section carries on
//! from the same row.

use std::collections::BTreeMap;

use tiny_skia::{Paint, PathBuilder, Pixmap, Stroke, Transform};

use super::{PageCursor, Renderer};
use crate::document::{ImageData, ImagePrimitive, Primitive};
use crate::format::number_text;
use crate::model::{Color, GraphElement};
use crate::query::Query;
use crate::text::{solid_paint, TextMeasurer, RASTER_DPI};

/// Series colors used when the color map has no entry.
const PALETTE: [Color; 6] = [
    Color { r: 0x1f, g: 0x77, b: 0xb4 },
    Color { r: 0xff, g: 0x7f, b: 0x0e },
    Color { r: 0x2c, g: 0xa0, b: 0x2c },
    Color { r: 0xd6, g: 0x27, b: 0x28 },
    Color { r: 0x94, g: 0x67, b: 0xbd },
    Color { r: 0x8c, g: 0x56, b: 0x4b },
];

const POINT_SIZE: i64 = 5;

/// Category labels and one value column per series.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GraphData {
    pub categories: Vec<String>,
    pub values: Vec<Vec<f64>>,
}

impl GraphData {
    /// Read every row of `query`, leaving its cursor where it was.
    pub fn collect<Q: Query + ?Sized>(query: &mut Q, graph: &GraphElement) -> Self {
        let saved = query.at();
        let mut data = GraphData {
            categories: Vec::new(),
            values: vec![Vec::new(); graph.series.len()],
        };
        if query.first() {
            loop {
                let category = query
                    .value(&graph.data.column)
                    .map(|d| d.as_text())
                    .unwrap_or_default();
                data.categories.push(category);
                for (series, values) in graph.series.iter().zip(data.values.iter_mut()) {
                    values.push(query.value(&series.column).map_or(0.0, |d| d.as_f64()));
                }
                if !query.next() {
                    break;
                }
            }
        }
        if let Some(row) = saved {
            query.seek(row);
        }
        data
    }

    fn range(&self, graph: &GraphElement) -> (f64, f64) {
        let (lo, hi) = if graph.value_axis.auto_min_max {
            let all = self.values.iter().flatten().copied();
            let lo = all.clone().fold(0.0_f64, f64::min);
            let hi = all.fold(f64::NEG_INFINITY, f64::max);
            (lo, if hi.is_finite() { hi } else { lo })
        } else {
            (graph.value_axis.min, graph.value_axis.max)
        };
        if hi <= lo {
            (lo, lo + 1.0)
        } else {
            (lo, hi)
        }
    }
}

/// Draw `data` into a white raster the size of the element.
pub fn draw(
    graph: &GraphElement,
    data: &GraphData,
    colors: &BTreeMap<String, Color>,
    measurer: &dyn TextMeasurer,
) -> Option<Pixmap> {
    // Element units are hundredths of an inch, one pixel each at 100 DPI.
    let width = graph.rect.width.round().max(1.0) as u32;
    let height = graph.rect.height.round().max(1.0) as u32;
    let mut canvas = white_canvas(width, height)?;

    let pad = graph.padding.max(0.0);
    let font = &graph.font;
    let line = measurer.line_height(font) * RASTER_DPI;
    let text_px = |s: &str| measurer.text_width(s, font) * RASTER_DPI;

    let mut top = pad;
    if !graph.title.is_empty() {
        let x = (width as f64 - text_px(&graph.title)) / 2.0;
        measurer.draw_text(&mut canvas, x.max(0.0), pad, &graph.title, font, Color::BLACK);
        top += line + pad;
    }

    let (lo, hi) = data.range(graph);
    let (lo_label, hi_label) = (number_text(lo), number_text(hi));
    let label_w = text_px(&lo_label).max(text_px(&hi_label));
    let left = pad + label_w + pad;
    let right = width as f64 - pad;
    let bottom = height as f64 - pad - line;
    if right <= left || bottom <= top {
        log::warn!("graph too small to draw ({width}x{height}px)");
        return Some(canvas);
    }

    let y_of = |v: f64| bottom - (v - lo) / (hi - lo) * (bottom - top);
    measurer.draw_text(&mut canvas, pad, top, &hi_label, font, Color::BLACK);
    measurer.draw_text(&mut canvas, pad, bottom - line, &lo_label, font, Color::BLACK);

    let n = data.categories.len();
    if n > 0 {
        let slot = (right - left) / n as f64;
        let bar_series: Vec<usize> = graph
            .series
            .iter()
            .enumerate()
            .filter(|(_, s)| s.style.bars)
            .map(|(i, _)| i)
            .collect();
        let bar_w = slot * 0.8 / bar_series.len().max(1) as f64;
        let baseline = y_of(0.0_f64.clamp(lo, hi));
        let color_of = |i: usize| {
            colors
                .get(&graph.series[i].color)
                .copied()
                .unwrap_or(PALETTE[i % PALETTE.len()])
        };

        for (j, &s) in bar_series.iter().enumerate() {
            let color = color_of(s);
            for (i, &v) in data.values[s].iter().enumerate() {
                let x0 = left + i as f64 * slot + slot * 0.1 + j as f64 * bar_w;
                let y = y_of(v.clamp(lo, hi));
                fill_rect(&mut canvas, x0, y.min(baseline), x0 + bar_w, y.max(baseline), color);
            }
        }

        for (s, series) in graph.series.iter().enumerate() {
            let color = color_of(s);
            let points: Vec<(f64, f64)> = data.values[s]
                .iter()
                .enumerate()
                .map(|(i, &v)| (left + (i as f64 + 0.5) * slot, y_of(v.clamp(lo, hi))))
                .collect();
            if series.style.lines {
                for pair in points.windows(2) {
                    draw_line(&mut canvas, pair[0], pair[1], color);
                }
            }
            if series.style.points {
                let half = (POINT_SIZE / 2) as f64;
                for &(x, y) in &points {
                    fill_rect(&mut canvas, x - half, y - half, x + half + 1.0, y + half + 1.0, color);
                }
            }
        }

        for (i, category) in data.categories.iter().enumerate() {
            let center = left + (i as f64 + 0.5) * slot;
            let x = center - text_px(category) / 2.0;
            measurer.draw_text(&mut canvas, x, bottom + 1.0, category, font, Color::BLACK);
        }
    }

    draw_line(&mut canvas, (left, top), (left, bottom), Color::BLACK);
    draw_line(&mut canvas, (left, bottom), (right, bottom), Color::BLACK);
    Some(canvas)
}

/// A white pixmap, `None` when a side is zero or too large.
pub(crate) fn white_canvas(width: u32, height: u32) -> Option<Pixmap> {
    let mut canvas = Pixmap::new(width, height)?;
    canvas.fill(tiny_skia::Color::WHITE);
    Some(canvas)
}

/// PNG-encode a raster.
pub fn encode_png(canvas: &Pixmap) -> Option<Vec<u8>> {
    match canvas.encode_png() {
        Ok(bytes) => Some(bytes),
        Err(e) => {
            log::warn!("failed to encode raster: {e}");
            None
        }
    }
}

/// Area fills snap to whole pixels.
fn crisp_paint(color: Color) -> Paint<'static> {
    let mut paint = solid_paint(color);
    paint.anti_alias = false;
    paint
}

pub(crate) fn fill_rect(canvas: &mut Pixmap, x0: f64, y0: f64, x1: f64, y1: f64, color: Color) {
    let Some(rect) = tiny_skia::Rect::from_ltrb(x0 as f32, y0 as f32, x1 as f32, y1 as f32) else {
        return;
    };
    canvas.fill_rect(rect, &crisp_paint(color), Transform::identity(), None);
}

/// One-pixel stroke through pixel centers.
pub(crate) fn draw_line(canvas: &mut Pixmap, from: (f64, f64), to: (f64, f64), color: Color) {
    let mut pb = PathBuilder::new();
    pb.move_to(from.0 as f32 + 0.5, from.1 as f32 + 0.5);
    pb.line_to(to.0 as f32 + 0.5, to.1 as f32 + 0.5);
    let Some(path) = pb.finish() else {
        return;
    };
    let stroke = Stroke {
        width: 1.0,
        ..Stroke::default()
    };
    canvas.stroke_path(&path, &crisp_paint(color), &stroke, Transform::identity(), None);
}

impl Renderer<'_> {
    pub(super) fn render_graph(&mut self, cursor: &mut PageCursor, g: &GraphElement) {
        let Some(query) = self.queries.get_mut(&g.data.query) else {
            log::warn!("graph query '{}' is not available", g.data.query);
            return;
        };
        let data = GraphData::collect(query.as_mut(), g);
        let Some(canvas) = draw(g, &data, &self.def.color_map, self.measurer) else {
            log::warn!("graph raster could not be allocated");
            return;
        };
        let Some(bytes) = encode_png(&canvas) else {
            return;
        };
        cursor.push(Primitive::Image(ImagePrimitive {
            rect: g.rect.to_inches().translated(cursor.margins.left, cursor.y_offset),
            image: ImageData {
                bytes,
                pixel_width: canvas.width(),
                pixel_height: canvas.height(),
            },
            scaled: true,
            keep_aspect: true,
            rotation: g.rotation,
            is_static: false,
        }));
    }
}
