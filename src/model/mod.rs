//! # Report Definition Model
//!
//! The input representation for the pre-render engine. A report definition is
//! a tree of bands: a report head and foot, up to five page-head and page-foot
//! variants, and an ordered list of detail sections. Each detail section is
//! bound to one query and may be organized into nested groups that emit their
//! own head and foot bands whenever a key column changes.
//!
//! Element geometry is expressed in hundredths of an inch, the unit report
//! designers work in. Page margins and custom page sizes are in inches. The
//! definition is immutable once built and can be reused across generations.

pub mod element;

pub use element::*;

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// A complete, already-validated report definition.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportDefinition {
    /// Internal report name, also the translation context for labels.
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,

    /// Page size, orientation and margins.
    #[serde(default)]
    pub page: PageSetup,

    /// Named query sources the report binds its elements to.
    #[serde(default)]
    pub queries: Vec<QueryDefinition>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub report_head: Option<Section>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub report_foot: Option<Section>,

    /// Page-head variants (first/odd/even/last/any).
    #[serde(default)]
    pub page_head: PageBands,
    /// Page-foot variants (first/odd/even/last/any).
    #[serde(default)]
    pub page_foot: PageBands,

    /// Detail sections rendered in order between report head and foot.
    #[serde(default)]
    pub sections: Vec<DetailSection>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub watermark: Option<WatermarkSpec>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub background: Option<BackgroundSpec>,

    /// Named colors used by graphs and cross-tabs.
    #[serde(default)]
    pub color_map: BTreeMap<String, Color>,

    /// Report-level defined parameters. `$SATO` and `$ZEBRA` select a
    /// label printer and carry its parameters.
    #[serde(default)]
    pub defined_params: Vec<DefinedParam>,
}

impl ReportDefinition {
    /// Every tracked-total key used anywhere in the report, one entry per
    /// field that tracks it.
    pub fn tracked_totals(&self) -> Vec<DataRef> {
        let mut keys = Vec::new();
        let mut collect = |section: &Option<Section>| {
            if let Some(s) = section {
                keys.extend(s.tracked_totals());
            }
        };
        collect(&self.report_head);
        collect(&self.report_foot);
        for band in self.page_head.all().chain(self.page_foot.all()) {
            keys.extend(band.tracked_totals());
        }
        for detail in &self.sections {
            keys.extend(detail.tracked_totals());
        }
        keys
    }

    /// Find a query definition by name.
    pub fn query(&self, name: &str) -> Option<&QueryDefinition> {
        self.queries.iter().find(|q| q.name == name)
    }
}

/// A named, parameterized query source.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryDefinition {
    pub name: String,
    /// Query text handed to the database. May contain MetaSQL
    /// `<? value("param") ?>` references.
    #[serde(default)]
    pub sql: String,
}

/// A report-level defined parameter.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DefinedParam {
    pub name: String,
    /// Key/value pairs attached to the parameter.
    #[serde(default)]
    pub values: Vec<(String, String)>,
}

/// Page geometry.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageSetup {
    /// A named page size ("Letter", "A4", ...), "Custom" or "Labels".
    #[serde(default = "default_page_size")]
    pub size: String,
    /// Label template name, used when `size` is "Labels".
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label_type: Option<String>,
    /// Custom width in inches (when `size` is "Custom").
    #[serde(default)]
    pub custom_width: f64,
    /// Custom height in inches (when `size` is "Custom").
    #[serde(default)]
    pub custom_height: f64,
    #[serde(default = "default_true")]
    pub portrait: bool,
    /// Margins in inches.
    #[serde(default = "Margins::default_page")]
    pub margins: Margins,
}

impl Default for PageSetup {
    fn default() -> Self {
        Self {
            size: default_page_size(),
            label_type: None,
            custom_width: 0.0,
            custom_height: 0.0,
            portrait: true,
            margins: Margins::default_page(),
        }
    }
}

impl PageSetup {
    pub fn is_labels(&self) -> bool {
        self.size == "Labels"
    }
}

fn default_page_size() -> String {
    "Letter".to_string()
}

fn default_true() -> bool {
    true
}

/// Margins (top, bottom, left, right) in inches.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Margins {
    pub top: f64,
    pub bottom: f64,
    pub left: f64,
    pub right: f64,
}

impl Margins {
    pub fn uniform(v: f64) -> Self {
        Self {
            top: v,
            bottom: v,
            left: v,
            right: v,
        }
    }

    fn default_page() -> Self {
        Self::uniform(1.0)
    }
}

/// The five page-head or page-foot variants.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageBands {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub first: Option<Section>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub odd: Option<Section>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub even: Option<Section>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last: Option<Section>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub any: Option<Section>,
}

impl PageBands {
    /// Pick the band for a page. First match wins: last > first > odd >
    /// even > any. Page numbers are 1-based.
    pub fn select(&self, page_number: usize, last_page: bool) -> Option<&Section> {
        if last_page {
            if let Some(s) = &self.last {
                return Some(s);
            }
        }
        if page_number == 1 {
            if let Some(s) = &self.first {
                return Some(s);
            }
        }
        let variant = if page_number % 2 == 1 {
            &self.odd
        } else {
            &self.even
        };
        variant.as_ref().or(self.any.as_ref())
    }

    fn all(&self) -> impl Iterator<Item = &Section> {
        [&self.first, &self.odd, &self.even, &self.last, &self.any]
            .into_iter()
            .flatten()
    }
}

/// A query-bound detail section with optional nested groups.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DetailSection {
    #[serde(default)]
    pub name: String,
    /// The query (and optional column) this section iterates.
    pub key: Key,
    /// Groups, outermost first.
    #[serde(default)]
    pub groups: Vec<Group>,
    /// The repeating row template.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<Section>,
    #[serde(default)]
    pub page_break: SectionBreak,
}

impl DetailSection {
    pub fn tracked_totals(&self) -> Vec<DataRef> {
        let mut keys = Vec::new();
        for group in &self.groups {
            keys.extend(group.tracked_totals());
        }
        if let Some(d) = &self.detail {
            keys.extend(d.tracked_totals());
        }
        keys
    }
}

/// Binding of a detail section to its query.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Key {
    pub query: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub column: Option<String>,
}

/// Page-break policy at the end of a detail section.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum SectionBreak {
    #[default]
    None,
    AtEnd,
}

/// A grouping level within a detail section.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Group {
    #[serde(default)]
    pub name: String,
    /// The key column. An empty column never registers a change.
    #[serde(default)]
    pub column: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub head: Option<Section>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub foot: Option<Section>,
    #[serde(default)]
    pub page_break: GroupBreak,
}

impl Group {
    /// Tracked-total keys used in this group's head and foot. These are the
    /// keys the group keeps subtotal checkpoints for.
    pub fn tracked_totals(&self) -> Vec<DataRef> {
        let mut keys = Vec::new();
        for s in [&self.head, &self.foot].into_iter().flatten() {
            keys.extend(s.tracked_totals());
        }
        keys
    }
}

/// Page-break policy after a group foot.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum GroupBreak {
    #[default]
    None,
    AfterGroupFoot,
}

/// A band: nominal height plus positioned elements.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Section {
    /// Nominal height in hundredths of an inch.
    #[serde(default)]
    pub height: f64,
    #[serde(default)]
    pub elements: Vec<Element>,
}

impl Section {
    pub fn new(height: f64, elements: Vec<Element>) -> Self {
        Self { height, elements }
    }

    /// Nominal height in inches.
    pub fn nominal_height(&self) -> f64 {
        self.height / 100.0
    }

    pub fn tracked_totals(&self) -> Vec<DataRef> {
        self.elements
            .iter()
            .filter_map(|e| match e {
                Element::Field(f) if f.track_total => Some(f.data.clone()),
                _ => None,
            })
            .collect()
    }
}

/// A (query, column) pair identifying a data source.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct DataRef {
    pub query: String,
    pub column: String,
}

impl DataRef {
    pub fn new(query: &str, column: &str) -> Self {
        Self {
            query: query.to_string(),
            column: column.to_string(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.query.is_empty() || self.column.is_empty()
    }
}

/// Watermark drawn behind every page.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WatermarkSpec {
    /// Static text. Ignored when `data` is set.
    #[serde(default)]
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<DataRef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub font: Option<Font>,
    /// 0 (invisible) to 255 (opaque).
    #[serde(default = "default_opacity")]
    pub opacity: u8,
}

/// Background image drawn behind every page.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackgroundSpec {
    /// Static encoded image. Ignored when `data` is set.
    #[serde(default)]
    pub image: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<DataRef>,
    #[serde(default = "default_opacity")]
    pub opacity: u8,
    #[serde(default)]
    pub align: Align,
    /// "clip" draws at natural size, anything else scales to the rectangle.
    #[serde(default)]
    pub mode: String,
    /// Placement on the page, hundredths of an inch.
    #[serde(default = "BackgroundSpec::default_rect")]
    pub rect: Rect,
}

impl BackgroundSpec {
    fn default_rect() -> Rect {
        Rect::new(0.0, 0.0, 100.0, 100.0)
    }
}

fn default_opacity() -> u8 {
    25
}
