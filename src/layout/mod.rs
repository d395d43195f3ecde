//! # Banded Pre-Render Engine
//!
//! Turns a [`ReportDefinition`] plus query results into a [`Document`] of
//! positioned primitives. The engine never lays out an infinitely tall
//! canvas and slices it afterwards. It walks the bands top to bottom and
//! before each band asks whether the band, plus the page foot that must
//! still fit below it, fits in the space left on the page:
//!
//! 1. Open a page, draw its background, watermark and page head.
//! 2. Render the report head, then every detail section row by row,
//!    emitting group heads and footers whenever a group key changes.
//! 3. Before a band is placed, measure it. If it would run into the page
//!    foot, close the page (drawing its foot) and open a new one.
//! 4. Wrapping text flows line by line and continues on the next page
//!    when it runs out of room.
//! 5. Render the report foot and close the last page with the "last page"
//!    foot variant. Page-count placeholders are patched at the very end.
//!
//! Label sheets take a different path: the detail band is stamped into a
//! grid of cells, one row per cell, and pages are added when the grid
//! fills up.
//!
//! The vertical cursor is in inches from the top of the page. Element
//! positions are hundredths of an inch relative to their band.

pub mod crosstab;
mod detail;
mod field;
pub mod graph;
pub mod image;
mod page;
pub mod page_break;
mod section;
mod text_flow;

use std::collections::HashMap;

use crate::document::{param_value, Document, ImageData, PageOptions, Primitive, PrinterType};
use crate::error::ReportError;
use crate::media::{self, LabelCatalog, LabelGrid, LabelTemplate};
use crate::model::{BackgroundSpec, DataRef, Margins, ReportDefinition, WatermarkSpec};
use crate::query::memory::MemoryQuery;
use crate::query::{missing_parameters, Database, Datum, ParameterList, Query, PARAMETER_QUERY};
use crate::subtotal::{SubtotalScope, SubtotalTracker};
use crate::text::TextMeasurer;

/// Letter, in inches. Used when a page size name is unknown.
const FALLBACK_PAGE: (f64, f64) = (8.5, 11.0);

/// Caller-supplied inputs that are not part of the definition.
#[derive(Debug, Clone, Default)]
pub struct GenerateOptions {
    /// Values for MetaSQL parameters. Also exposed as the "Parameter Query".
    pub params: ParameterList,
    /// Label-string translations.
    pub translations: Translations,
    /// Label sheets available to "Labels" page setups.
    pub labels: LabelCatalog,
    /// Overrides the printer type and parameters derived from the
    /// definition's `$SATO`/`$ZEBRA` defined parameters.
    pub printer: Option<(PrinterType, Vec<(String, String)>)>,
    /// Replaces the definition's watermark.
    pub watermark: Option<WatermarkSpec>,
    /// Replaces the definition's background.
    pub background: Option<BackgroundSpec>,
}

/// Label translations keyed by report name, then source string.
#[derive(Debug, Clone, Default)]
pub struct Translations {
    entries: HashMap<String, HashMap<String, String>>,
}

impl Translations {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, context: &str, source: &str, translation: &str) {
        self.entries
            .entry(context.to_string())
            .or_default()
            .insert(source.to_string(), translation.to_string());
    }

    /// Translate `source` in `context`, or return it unchanged.
    pub fn translate<'s>(&'s self, context: &str, source: &'s str) -> &'s str {
        self.entries
            .get(context)
            .and_then(|m| m.get(source))
            .map_or(source, |t| t.as_str())
    }

    /// Parse `{ "context": { "source": "translation" } }`.
    pub fn from_json(json: &str) -> Result<Self, ReportError> {
        let entries: HashMap<String, HashMap<String, String>> = serde_json::from_str(json)?;
        Ok(Self { entries })
    }
}

/// Open queries by name, in definition order.
#[derive(Default)]
pub(crate) struct QuerySet {
    queries: Vec<Box<dyn Query>>,
}

impl QuerySet {
    fn insert(&mut self, query: Box<dyn Query>) {
        self.queries.retain(|q| q.name() != query.name());
        self.queries.push(query);
    }

    pub(crate) fn get(&self, name: &str) -> Option<&dyn Query> {
        self.queries
            .iter()
            .find(|q| q.name() == name)
            .map(|q| q.as_ref())
    }

    pub(crate) fn get_mut(&mut self, name: &str) -> Option<&mut Box<dyn Query>> {
        self.queries.iter_mut().find(|q| q.name() == name)
    }

    /// Current value of a bound column.
    pub(crate) fn value(&self, data: &DataRef) -> Option<Datum> {
        self.get(&data.query).and_then(|q| q.value(&data.column))
    }

    pub(crate) fn running_total(&self, key: &DataRef) -> f64 {
        self.get(&key.query)
            .map_or(0.0, |q| q.running_total(&key.column))
    }
}

/// Where we are in the document being built.
pub(crate) struct PageCursor {
    pub doc: Document,
    pub page_width: f64,
    pub page_height: f64,
    pub margins: Margins,
    /// Top of the next band, inches from the top of the page.
    pub y_offset: f64,
    /// Pages created so far. The current page's number.
    pub page_counter: usize,
    pub subtotals: SubtotalTracker,
    /// Text primitives waiting for the final page count.
    page_count_slots: Vec<(usize, usize)>,
    /// Query of the detail section being rendered, for cursor restores.
    detail_query: Option<String>,
    /// Nothing but the page head has been placed on the current page.
    page_is_fresh: bool,
    /// A page head or foot is being rendered. Page breaks are suppressed.
    in_page_band: bool,
}

impl PageCursor {
    fn new(doc: Document, subtotals: SubtotalTracker) -> Self {
        let options = &doc.page_options;
        Self {
            page_width: options.width,
            page_height: options.height,
            margins: options.margins,
            y_offset: 0.0,
            page_counter: 0,
            subtotals,
            page_count_slots: Vec::new(),
            detail_query: None,
            page_is_fresh: true,
            in_page_band: false,
            doc,
        }
    }

    /// Append to the current page.
    pub fn push(&mut self, primitive: Primitive) {
        let Some(page_idx) = self.doc.pages.len().checked_sub(1) else {
            log::debug!("primitive dropped, no page open");
            return;
        };
        let page = &mut self.doc.pages[page_idx];
        if let Primitive::Text(t) = &primitive {
            if t.text == field::PAGE_COUNT_PLACEHOLDER {
                self.page_count_slots.push((page_idx, page.primitives.len()));
            }
        }
        page.primitives.push(primitive);
    }

    fn patch_page_count(&mut self) {
        let count = self.doc.pages.len().to_string();
        for &(page_idx, prim_idx) in &self.page_count_slots {
            let slot = self
                .doc
                .pages
                .get_mut(page_idx)
                .and_then(|p| p.primitives.get_mut(prim_idx));
            if let Some(Primitive::Text(t)) = slot {
                t.text = count.clone();
            }
        }
    }
}

/// Runs one generation pass.
pub(crate) struct Renderer<'a> {
    def: &'a ReportDefinition,
    options: &'a GenerateOptions,
    db: &'a dyn Database,
    measurer: &'a dyn TextMeasurer,
    queries: QuerySet,
    label: Option<LabelTemplate>,
    /// Label printers recalling a stored form: skip static elements.
    recall_mask: bool,
    /// Label printers storing a form: skip dynamic elements.
    store_mask: bool,
    watermark: Option<&'a WatermarkSpec>,
    background: Option<&'a BackgroundSpec>,
    static_background: Option<ImageData>,
}

/// Generate the pre-rendered document for `def`.
///
/// Fails only on definition-level problems: an unknown label template or
/// parameters the queries reference but `options` does not supply. Data
/// problems are logged and rendered around.
pub fn generate(
    def: &ReportDefinition,
    options: &GenerateOptions,
    db: &dyn Database,
    measurer: &dyn TextMeasurer,
) -> Result<Document, ReportError> {
    Renderer::new(def, options, db, measurer)?.run()
}

impl<'a> Renderer<'a> {
    fn new(
        def: &'a ReportDefinition,
        options: &'a GenerateOptions,
        db: &'a dyn Database,
        measurer: &'a dyn TextMeasurer,
    ) -> Result<Self, ReportError> {
        let label = if def.page.is_labels() {
            let name = def.page.label_type.clone().unwrap_or_default();
            match options.labels.get(&name) {
                Some(t) => Some(t.clone()),
                None => return Err(ReportError::UnknownLabelTemplate(name)),
            }
        } else {
            None
        };

        for query in &def.queries {
            let names = missing_parameters(&query.sql, &options.params);
            if !names.is_empty() {
                return Err(ReportError::MissingParameters {
                    query: query.name.clone(),
                    names,
                });
            }
        }

        let mut queries = QuerySet::default();
        for query in &def.queries {
            if query.name == PARAMETER_QUERY {
                continue;
            }
            match db.open(&query.name, &query.sql, &options.params) {
                Ok(mut q) => {
                    // Bands outside detail sections read the first row.
                    q.first();
                    queries.insert(q);
                }
                Err(e) => log::warn!("query '{}' unavailable: {e}", query.name),
            }
        }
        let mut params = MemoryQuery::from_parameters(PARAMETER_QUERY, &options.params);
        params.first();
        queries.insert(Box::new(params));

        let printer_params = match &options.printer {
            Some((_, params)) => params.clone(),
            None => PrinterType::from_defined_params(&def.defined_params).1,
        };
        let has_param =
            |key: &str| param_value(&printer_params, key).is_some_and(|v| !v.is_empty());
        let recall_mask = has_param("recall");
        let store_mask = has_param("store");

        let background = options.background.as_ref().or(def.background.as_ref());
        let static_background = background
            .filter(|b| b.data.is_none() && !b.image.is_empty())
            .and_then(|b| image::decode_text_payload(&b.image))
            .and_then(|bytes| image::load(bytes));

        Ok(Self {
            def,
            options,
            db,
            measurer,
            queries,
            label,
            recall_mask,
            store_mask,
            watermark: options.watermark.as_ref().or(def.watermark.as_ref()),
            background,
            static_background,
        })
    }

    fn run(mut self) -> Result<Document, ReportError> {
        let def = self.def;
        let (printer_type, printer_params) = match &self.options.printer {
            Some((ty, params)) => (*ty, params.clone()),
            None => PrinterType::from_defined_params(&def.defined_params),
        };
        let mut doc = Document::new(&def.title, printer_type);
        doc.printer_params = printer_params;
        doc.page_options = self.page_options();

        let subtotals = SubtotalTracker::new(def);
        for key in subtotals.tracked_keys() {
            if let Some(q) = self.queries.get_mut(&key.query) {
                q.track_total(&key.column);
            }
        }

        let mut cursor = PageCursor::new(doc, subtotals);
        self.create_new_page(&mut cursor);

        if let Some(template) = self.label.clone() {
            let grid = LabelGrid::new(&template, def.page.portrait);
            self.render_labels(&mut cursor, grid);
        } else {
            if let Some(head) = &def.report_head {
                self.render_section(&mut cursor, head, SubtotalScope::None);
            }
            for idx in 0..def.sections.len() {
                self.render_detail_section(&mut cursor, idx);
            }
            if let Some(foot) = &def.report_foot {
                let height = self.measure_section(&cursor, foot, true);
                if self.needs_new_page(&cursor, height, true) {
                    self.create_new_page(&mut cursor);
                }
                self.render_section(&mut cursor, foot, SubtotalScope::None);
            }
        }

        self.finish_cur_page(&mut cursor, true);
        cursor.patch_page_count();
        log::info!(
            "generated '{}': {} page(s)",
            def.name,
            cursor.doc.page_count()
        );
        Ok(cursor.doc)
    }

    /// Page size, orientation and margins in inches.
    fn page_options(&self) -> PageOptions {
        let setup = &self.def.page;
        let (size_name, margins) = match &self.label {
            Some(t) => {
                let grid = LabelGrid::new(t, setup.portrait);
                let margins = Margins {
                    top: grid.top,
                    left: grid.left,
                    bottom: 0.0,
                    right: 0.0,
                };
                (t.paper.clone(), margins)
            }
            None => (setup.size.clone(), setup.margins),
        };

        let (w, h) = if size_name.eq_ignore_ascii_case("Custom") {
            (setup.custom_width, setup.custom_height)
        } else {
            match media::page_size(&size_name) {
                Some((w, h)) => (w / 100.0, h / 100.0),
                None => {
                    log::warn!("unknown page size '{size_name}', using Letter");
                    FALLBACK_PAGE
                }
            }
        };
        let (width, height) = if setup.portrait { (w, h) } else { (h, w) };

        PageOptions {
            page_size: size_name,
            width,
            height,
            portrait: setup.portrait,
            margins,
            label_type: self.label.as_ref().map(|t| t.name.clone()),
        }
    }

    /// Stamp each detail row into the next cell of the label grid.
    fn render_labels(&mut self, cursor: &mut PageCursor, grid: LabelGrid) {
        let def = self.def;
        let mut col = 0;
        let mut row = 0;
        let mut pending_page = false;

        for section in &def.sections {
            let Some(detail) = &section.detail else {
                continue;
            };
            let name = section.key.query.as_str();
            if !self.queries.get_mut(name).is_some_and(|q| q.first()) {
                log::debug!("label query '{name}' has no rows");
                continue;
            }
            cursor.detail_query = Some(name.to_string());

            loop {
                // Pages are added lazily so a full last sheet is not
                // followed by a blank one.
                if pending_page {
                    self.create_new_page(cursor);
                    pending_page = false;
                }
                let y = cursor.y_offset;
                self.render_section(cursor, detail, SubtotalScope::None);
                cursor.y_offset = y;

                col += 1;
                cursor.margins.left += grid.cell_width + grid.x_gap;
                if col >= grid.columns {
                    col = 0;
                    row += 1;
                    cursor.margins.left = grid.left;
                    cursor.y_offset += grid.cell_height + grid.y_gap;
                }
                if row >= grid.rows {
                    row = 0;
                    pending_page = true;
                }

                if !self.queries.get_mut(name).is_some_and(|q| q.next()) {
                    break;
                }
            }
            cursor.detail_query = None;
        }
    }
}
