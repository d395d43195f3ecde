//! # Cross-Tabs
//!
//! A cross-tab pivots one query: each distinct value of the column field
//! becomes a table column, each distinct value of the row field a table
//! row, and the value field fills the cells. Keys keep the order in which
//! they first appear in the query.
//!
//! Wide or long tables are cut into parts that each fit the space left on
//! the page. With [`WrapPolicy::RowsFirst`] every column band of a set of
//! rows is emitted before moving down; with [`WrapPolicy::ColumnsFirst`]
//! every row band of a set of columns is emitted before moving across.
//! Headers are repeated on later parts when the element asks for it. Each
//! part is drawn into an offscreen pixmap and placed as an image.

use std::collections::HashMap;
use std::ops::Range;

use tiny_skia::Pixmap;

use super::graph::{draw_line, encode_png, fill_rect, white_canvas};
use super::{PageCursor, Renderer};
use crate::document::{ImageData, ImagePrimitive, Primitive};
use crate::model::{CellMargins, Color, CrossTabElement, Font, WrapPolicy};
use crate::query::Query;
use crate::subtotal::SubtotalScope;
use crate::text::{TextMeasurer, RASTER_DPI};

const HEADER_FILL: Color = Color {
    r: 0xe8,
    g: 0xe8,
    b: 0xe8,
};

/// One rectangular piece of the table, sizes in pixels.
#[derive(Debug, Clone, PartialEq)]
pub struct Part {
    pub rows: Range<usize>,
    pub cols: Range<usize>,
    pub column_header: bool,
    pub row_header: bool,
    pub width: f64,
    pub height: f64,
}

#[derive(Debug, Clone)]
pub struct CrossTab {
    column_keys: Vec<String>,
    row_keys: Vec<String>,
    /// Keyed by (row, column).
    cells: HashMap<(usize, usize), String>,
    font: Font,
    margins: CellMargins,
    policy: WrapPolicy,
    repeat_column_header: bool,
    repeat_row_header: bool,
    col_widths: Vec<f64>,
    row_height: f64,
    row_header_width: f64,
    next_row: usize,
    next_col: usize,
    /// The outer band being swept: rows for RowsFirst, columns for
    /// ColumnsFirst.
    band: Option<Range<usize>>,
}

fn key_index(keys: &mut Vec<String>, key: String) -> usize {
    match keys.iter().position(|k| *k == key) {
        Some(i) => i,
        None => {
            keys.push(key);
            keys.len() - 1
        }
    }
}

impl CrossTab {
    /// Read every row of `query`, leaving its cursor where it was.
    pub fn populate<Q: Query + ?Sized>(query: &mut Q, el: &CrossTabElement) -> Self {
        let mut table = CrossTab {
            column_keys: Vec::new(),
            row_keys: Vec::new(),
            cells: HashMap::new(),
            font: el.font.clone(),
            margins: el.cell_margins,
            policy: el.wrap_policy,
            repeat_column_header: el.show_column_header_again,
            repeat_row_header: el.show_row_header_again,
            col_widths: Vec::new(),
            row_height: 0.0,
            row_header_width: 0.0,
            next_row: 0,
            next_col: 0,
            band: None,
        };
        let saved = query.at();
        if query.first() {
            loop {
                let text = |column: &str| {
                    query
                        .value(column)
                        .map(|d| d.as_text())
                        .unwrap_or_default()
                };
                let col = key_index(&mut table.column_keys, text(&el.column));
                let row = key_index(&mut table.row_keys, text(&el.row));
                table.cells.insert((row, col), text(&el.value));
                if !query.next() {
                    break;
                }
            }
        }
        if let Some(row) = saved {
            query.seek(row);
        }
        table
    }

    /// Size every column, the row header and the row height.
    pub fn measure(&mut self, measurer: &dyn TextMeasurer) {
        let m = self.margins;
        let text_px = |s: &str| measurer.text_width(s, &self.font) * RASTER_DPI;
        self.col_widths = (0..self.column_keys.len())
            .map(|c| {
                let widest = (0..self.row_keys.len())
                    .filter_map(|r| self.cells.get(&(r, c)))
                    .map(|s| text_px(s))
                    .fold(text_px(&self.column_keys[c]), f64::max);
                widest + m.left + m.right
            })
            .collect();
        self.row_header_width = self
            .row_keys
            .iter()
            .map(|k| text_px(k))
            .fold(0.0, f64::max)
            + m.left
            + m.right;
        self.row_height = measurer.line_height(&self.font) * RASTER_DPI + m.top + m.bottom;
    }

    pub fn is_empty(&self) -> bool {
        self.row_keys.is_empty() || self.column_keys.is_empty()
    }

    pub fn all_data_rendered(&self) -> bool {
        let done = match self.policy {
            WrapPolicy::RowsFirst => self.next_row >= self.row_keys.len(),
            WrapPolicy::ColumnsFirst => self.next_col >= self.column_keys.len(),
        };
        done || self.is_empty()
    }

    fn next_rows_start(&self) -> usize {
        match (&self.band, self.policy) {
            (Some(band), WrapPolicy::RowsFirst) => band.start,
            _ => self.next_row,
        }
    }

    fn next_cols_start(&self) -> usize {
        match (&self.band, self.policy) {
            (Some(band), WrapPolicy::ColumnsFirst) => band.start,
            _ => self.next_col,
        }
    }

    fn header_heights(&self) -> (f64, f64) {
        let column_header = self.next_rows_start() == 0 || self.repeat_column_header;
        let row_header = self.next_cols_start() == 0 || self.repeat_row_header;
        (
            if column_header { self.row_height } else { 0.0 },
            if row_header { self.row_header_width } else { 0.0 },
        )
    }

    /// Height the next part needs to show at least one row, zero when
    /// everything has been rendered.
    pub fn next_row_size(&self) -> f64 {
        if self.all_data_rendered() {
            return 0.0;
        }
        self.header_heights().0 + self.row_height
    }

    /// Width and height of everything not yet rendered, as one part.
    pub fn table_size(&self) -> (f64, f64) {
        let (header_h, header_w) = self.header_heights();
        let width = header_w + self.col_widths[self.next_cols_start()..].iter().sum::<f64>();
        let rows = self.row_keys.len().saturating_sub(self.next_rows_start());
        (width, header_h + rows as f64 * self.row_height)
    }

    /// Cut the next part to fit `max_width` x `max_height` pixels. A part
    /// always holds at least one row and one column.
    pub fn plan(&self, max_width: f64, max_height: f64) -> Part {
        let (header_h, header_w) = self.header_heights();

        let fit_cols = |start: usize| {
            let mut used = header_w;
            let mut end = start;
            while end < self.col_widths.len() && used + self.col_widths[end] <= max_width {
                used += self.col_widths[end];
                end += 1;
            }
            start..end.max(start + 1).min(self.col_widths.len())
        };
        let fit_rows = |start: usize| {
            let room = ((max_height - header_h) / self.row_height).floor();
            let count = if room.is_finite() && room > 0.0 { room as usize } else { 0 };
            start..(start + count.max(1)).min(self.row_keys.len())
        };

        let (rows, cols) = match (self.policy, &self.band) {
            (WrapPolicy::RowsFirst, Some(band)) => (band.clone(), fit_cols(self.next_col)),
            (WrapPolicy::ColumnsFirst, Some(band)) => (fit_rows(self.next_row), band.clone()),
            _ => (fit_rows(self.next_row), fit_cols(self.next_col)),
        };

        let width = header_w + self.col_widths[cols.clone()].iter().sum::<f64>();
        let height = header_h + rows.len() as f64 * self.row_height;
        Part {
            rows,
            cols,
            column_header: header_h > 0.0,
            row_header: header_w > 0.0,
            width,
            height,
        }
    }

    /// Mark `part` as rendered.
    pub fn advance(&mut self, part: &Part) {
        match self.policy {
            WrapPolicy::RowsFirst => {
                if part.cols.end < self.column_keys.len() {
                    self.band = Some(part.rows.clone());
                    self.next_col = part.cols.end;
                } else {
                    self.band = None;
                    self.next_col = 0;
                    self.next_row = part.rows.end;
                }
            }
            WrapPolicy::ColumnsFirst => {
                if part.rows.end < self.row_keys.len() {
                    self.band = Some(part.cols.clone());
                    self.next_row = part.rows.end;
                } else {
                    self.band = None;
                    self.next_row = 0;
                    self.next_col = part.cols.end;
                }
            }
        }
    }

    /// Draw one part: header cells shaded, grid lines black.
    pub fn draw(&self, part: &Part, measurer: &dyn TextMeasurer) -> Option<Pixmap> {
        let width = part.width.ceil().max(1.0) as u32;
        let height = part.height.ceil().max(1.0) as u32;
        let mut canvas = white_canvas(width, height)?;
        let m = self.margins;
        let header_h = if part.column_header { self.row_height } else { 0.0 };
        let header_w = if part.row_header { self.row_header_width } else { 0.0 };

        if header_h > 0.0 {
            fill_rect(&mut canvas, 0.0, 0.0, part.width, header_h, HEADER_FILL);
        }
        if header_w > 0.0 {
            fill_rect(&mut canvas, 0.0, 0.0, header_w, part.height, HEADER_FILL);
        }

        let text = |canvas: &mut Pixmap, x: f64, y: f64, s: &str| {
            measurer.draw_text(canvas, x + m.left, y + m.top, s, &self.font, Color::BLACK);
        };

        let mut x = header_w;
        let mut col_x = Vec::with_capacity(part.cols.len());
        for c in part.cols.clone() {
            col_x.push(x);
            if header_h > 0.0 {
                text(&mut canvas, x, 0.0, &self.column_keys[c]);
            }
            x += self.col_widths[c];
        }

        let mut y = header_h;
        for r in part.rows.clone() {
            if header_w > 0.0 {
                text(&mut canvas, 0.0, y, &self.row_keys[r]);
            }
            for (c, &cx) in part.cols.clone().zip(&col_x) {
                if let Some(value) = self.cells.get(&(r, c)) {
                    text(&mut canvas, cx, y, value);
                }
            }
            y += self.row_height;
        }

        let (right, bottom) = (part.width - 1.0, part.height - 1.0);
        let mut ys = vec![0.0];
        let mut y = header_h;
        if part.column_header {
            ys.push(y);
        }
        for _ in part.rows.clone() {
            y += self.row_height;
            ys.push(y.min(bottom));
        }
        for y in ys {
            draw_line(&mut canvas, (0.0, y), (right, y), Color::BLACK);
        }
        let mut xs = Vec::new();
        xs.push(0.0);
        if part.row_header {
            xs.push(header_w);
        }
        let mut x = header_w;
        for c in part.cols.clone() {
            x += self.col_widths[c];
            xs.push(x.min(right));
        }
        for x in xs {
            draw_line(&mut canvas, (x, 0.0), (x, bottom), Color::BLACK);
        }
        Some(canvas)
    }
}

impl Renderer<'_> {
    /// Render a cross-tab part by part, advancing the cursor past each.
    /// Returns false when the query is unavailable and nothing was placed.
    pub(super) fn render_crosstab(
        &mut self,
        cursor: &mut PageCursor,
        c: &CrossTabElement,
        scope: SubtotalScope,
    ) -> bool {
        let Some(query) = self.queries.get_mut(&c.data.query) else {
            log::warn!("cross-tab query '{}' is not available", c.data.query);
            return false;
        };
        let mut table = CrossTab::populate(query.as_mut(), c);
        if table.is_empty() {
            log::debug!("cross-tab over '{}' has no data", c.data.query);
            return true;
        }
        table.measure(self.measurer);
        let max_width =
            (cursor.page_width - cursor.margins.left - cursor.margins.right) * RASTER_DPI;

        loop {
            let mut max_height = self.calculate_remaining_page_size(cursor, true) * RASTER_DPI;
            if max_height < table.table_size().1 {
                max_height = self.calculate_remaining_page_size(cursor, false) * RASTER_DPI;
            }
            let part = table.plan(max_width, max_height);
            let drawn = table.draw(&part, self.measurer);
            if let Some((canvas, bytes)) = drawn.and_then(|c| encode_png(&c).map(|b| (c, b))) {
                cursor.push(Primitive::Image(ImagePrimitive {
                    rect: crate::model::Rect::new(
                        cursor.margins.left,
                        cursor.y_offset,
                        part.width / RASTER_DPI,
                        part.height / RASTER_DPI,
                    ),
                    image: ImageData {
                        bytes,
                        pixel_width: canvas.width(),
                        pixel_height: canvas.height(),
                    },
                    scaled: false,
                    keep_aspect: false,
                    rotation: 0.0,
                    is_static: false,
                }));
            }
            cursor.y_offset += part.height / RASTER_DPI;
            table.advance(&part);
            if table.all_data_rendered() {
                break;
            }

            let room = self.calculate_remaining_page_size(cursor, true) * RASTER_DPI;
            let next = table.next_row_size();
            if !(next > 0.0 && next < room) && self.may_break(cursor, scope) {
                self.create_new_page(cursor);
            }
        }
        true
    }
}
