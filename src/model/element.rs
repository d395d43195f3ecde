//! Band elements and their shared geometry and style types.
//!
//! Positions and sizes are hundredths of an inch relative to the top-left
//! corner of the band the element sits in. The layout engine divides by 100
//! when it places an element on a page.

use serde::{Deserialize, Serialize};

use super::DataRef;

/// One positioned item inside a band.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Element {
    Label(LabelElement),
    Field(FieldElement),
    Text(TextElement),
    Line(LineElement),
    Rect(RectElement),
    Barcode(BarcodeElement),
    Image(ImageElement),
    Graph(GraphElement),
    CrossTab(CrossTabElement),
}

impl Element {
    /// Static elements render the same regardless of data. Label printers
    /// store them once and recall them for every label.
    pub fn is_static(&self) -> bool {
        match self {
            Element::Label(_) | Element::Line(_) | Element::Rect(_) => true,
            Element::Image(img) => img.inline_data.as_deref().is_some_and(|d| !d.is_empty()),
            _ => false,
        }
    }

    pub fn rotation(&self) -> f64 {
        match self {
            Element::Label(e) => e.rotation,
            Element::Field(e) => e.rotation,
            Element::Text(e) => e.rotation,
            Element::Line(_) => 0.0,
            Element::Rect(e) => e.rotation,
            Element::Barcode(e) => e.rotation,
            Element::Image(e) => e.rotation,
            Element::Graph(e) => e.rotation,
            Element::CrossTab(_) => 0.0,
        }
    }
}

/// Static text, translated through the report's translation table.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LabelElement {
    pub rect: Rect,
    #[serde(default)]
    pub string: String,
    #[serde(default)]
    pub font: Font,
    #[serde(default)]
    pub align: Align,
    #[serde(default)]
    pub color: Color,
    #[serde(default)]
    pub rotation: f64,
}

/// Query-bound text. Optionally a running total, optionally repeated over a
/// grid of cells that each consume one row.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldElement {
    pub rect: Rect,
    pub data: DataRef,
    #[serde(default)]
    pub font: Font,
    #[serde(default)]
    pub align: Align,
    #[serde(default)]
    pub color: Color,
    #[serde(default)]
    pub rotation: f64,

    /// printf-style format (`%.2f`, `%05d`, `Total: %s`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
    /// Named built-in format run through the database (`qty`, `money`, ...).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub builtin_format: Option<String>,

    /// Print the query's running total for the column instead of the value.
    #[serde(default)]
    pub track_total: bool,
    /// With `track_total`, subtract the innermost checkpoint to print a
    /// per-group or per-page subtotal.
    #[serde(default)]
    pub sub_total: bool,

    /// Hyperlink attached to the emitted text.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub href: Option<String>,

    /// Grid repeat: rows of cells.
    #[serde(default = "one")]
    pub lines: u32,
    /// Grid repeat: columns of cells.
    #[serde(default = "one")]
    pub columns: u32,
    /// Horizontal gap between cells, hundredths of an inch.
    #[serde(default)]
    pub x_spacing: f64,
    /// Vertical gap between cells, hundredths of an inch.
    #[serde(default)]
    pub y_spacing: f64,
    /// Request a page break when the grid is full and rows remain.
    #[serde(default)]
    pub trigger_page_break: bool,
    /// Fill the grid column by column (down, then across) instead of row
    /// by row.
    #[serde(default)]
    pub left_to_right: bool,
}

impl FieldElement {
    pub fn new(rect: Rect, data: DataRef) -> Self {
        Self {
            rect,
            data,
            font: Font::default(),
            align: Align::default(),
            color: Color::default(),
            rotation: 0.0,
            format: None,
            builtin_format: None,
            track_total: false,
            sub_total: false,
            href: None,
            lines: 1,
            columns: 1,
            x_spacing: 0.0,
            y_spacing: 0.0,
            trigger_page_break: false,
            left_to_right: false,
        }
    }

    /// True when the field repeats over more than one cell or may break
    /// the page, in which case it consumes rows of its query.
    pub fn is_grid(&self) -> bool {
        self.columns > 1 || self.lines > 1 || self.trigger_page_break
    }
}

fn one() -> u32 {
    1
}

/// A wrapping paragraph bound to a query column.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TextElement {
    pub rect: Rect,
    pub data: DataRef,
    #[serde(default)]
    pub font: Font,
    #[serde(default)]
    pub align: Align,
    #[serde(default)]
    pub color: Color,
    #[serde(default)]
    pub rotation: f64,
    /// Space kept below the last line, hundredths of an inch.
    #[serde(default)]
    pub bottompad: f64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LineElement {
    pub start: Point,
    pub end: Point,
    /// Pen width in points.
    #[serde(default)]
    pub weight: f64,
    #[serde(default)]
    pub color: Color,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RectElement {
    pub rect: Rect,
    #[serde(default)]
    pub pen: Pen,
    /// Fill; `None` leaves the rectangle hollow.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fill: Option<Color>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub border: Option<Pen>,
    #[serde(default)]
    pub rotation: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BarcodeElement {
    pub rect: Rect,
    pub data: DataRef,
    /// Symbology tag ("3of9", "128", "ean13", "datamatrix", ...).
    #[serde(default)]
    pub format: String,
    /// Narrow bar width in inches.
    #[serde(default = "default_narrow_bar")]
    pub narrow_bar_width: f64,
    #[serde(default = "default_max_length")]
    pub max_length: u32,
    #[serde(default)]
    pub align: HAlign,
    #[serde(default)]
    pub rotation: f64,
}

fn default_narrow_bar() -> f64 {
    0.01
}

fn default_max_length() -> u32 {
    5
}

/// Symbologies the output backends know how to draw.
pub const BARCODE_FORMATS: &[&str] = &[
    "3of9", "3of9+", "128", "ean13", "ean8", "upc-a", "upc-e", "i2of5", "pdf417", "qr",
    "datamatrix",
];

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageElement {
    pub rect: Rect,
    /// "clip" draws at natural size, "stretch" scales keeping the aspect.
    #[serde(default)]
    pub mode: String,
    /// Encoded image embedded in the definition.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inline_data: Option<String>,
    /// Query column holding raw or encoded image bytes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<DataRef>,
    #[serde(default)]
    pub rotation: f64,
}

/// A chart drawn from every row of its query.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphElement {
    pub rect: Rect,
    /// Query and category (data-axis) column.
    pub data: DataRef,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub font: Font,
    #[serde(default)]
    pub series: Vec<SeriesSpec>,
    #[serde(default)]
    pub value_axis: ValueAxis,
    /// Inner padding in pixels at 100 DPI.
    #[serde(default = "default_graph_padding")]
    pub padding: f64,
    #[serde(default)]
    pub rotation: f64,
}

fn default_graph_padding() -> f64 {
    5.0
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SeriesSpec {
    #[serde(default)]
    pub name: String,
    pub column: String,
    /// Name in the report color map.
    #[serde(default)]
    pub color: String,
    #[serde(default)]
    pub style: SeriesStyle,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct SeriesStyle {
    #[serde(default)]
    pub bars: bool,
    #[serde(default)]
    pub lines: bool,
    #[serde(default)]
    pub points: bool,
}

impl Default for SeriesStyle {
    fn default() -> Self {
        Self {
            bars: true,
            lines: false,
            points: false,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValueAxis {
    #[serde(default)]
    pub min: f64,
    #[serde(default = "default_axis_max")]
    pub max: f64,
    /// Derive min/max from the data instead.
    #[serde(default = "default_true")]
    pub auto_min_max: bool,
}

impl Default for ValueAxis {
    fn default() -> Self {
        Self {
            min: 0.0,
            max: default_axis_max(),
            auto_min_max: true,
        }
    }
}

fn default_axis_max() -> f64 {
    100.0
}

fn default_true() -> bool {
    true
}

/// A pivot table over one query: distinct `column` values across, distinct
/// `row` values down, `value` in the cells.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CrossTabElement {
    pub rect: Rect,
    /// Only the query name is used.
    pub data: DataRef,
    #[serde(default)]
    pub font: Font,
    pub column: String,
    pub row: String,
    pub value: String,
    /// Cell padding in pixels at 100 DPI.
    #[serde(default)]
    pub cell_margins: CellMargins,
    #[serde(default = "default_true")]
    pub show_column_header_again: bool,
    #[serde(default = "default_true")]
    pub show_row_header_again: bool,
    #[serde(default)]
    pub wrap_policy: WrapPolicy,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct CellMargins {
    #[serde(default)]
    pub left: f64,
    #[serde(default)]
    pub right: f64,
    #[serde(default)]
    pub top: f64,
    #[serde(default)]
    pub bottom: f64,
}

/// Which direction a cross-tab too large for the page is split in first.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum WrapPolicy {
    /// Finish all columns for a band of rows before moving down.
    #[default]
    RowsFirst,
    /// Finish all rows for a band of columns before moving right.
    ColumnsFirst,
}

// ─── Geometry and style ─────────────────────────────────────────

/// A rectangle in hundredths of an inch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// The same rectangle in inches.
    pub fn to_inches(self) -> Rect {
        Rect::new(
            self.x / 100.0,
            self.y / 100.0,
            self.width / 100.0,
            self.height / 100.0,
        )
    }

    pub fn translated(self, dx: f64, dy: f64) -> Rect {
        Rect::new(self.x + dx, self.y + dy, self.width, self.height)
    }

    pub fn bottom(&self) -> f64 {
        self.y + self.height
    }

    pub fn right(&self) -> f64 {
        self.x + self.width
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Font {
    #[serde(default = "default_family")]
    pub family: String,
    /// Size in points.
    #[serde(default = "default_font_size")]
    pub size: f64,
    #[serde(default = "default_weight")]
    pub weight: u32,
    #[serde(default)]
    pub italic: bool,
}

impl Default for Font {
    fn default() -> Self {
        Self {
            family: default_family(),
            size: default_font_size(),
            weight: default_weight(),
            italic: false,
        }
    }
}

impl Font {
    pub fn sized(size: f64) -> Self {
        Self {
            size,
            ..Default::default()
        }
    }
}

fn default_family() -> String {
    "Helvetica".to_string()
}

fn default_font_size() -> f64 {
    10.0
}

fn default_weight() -> u32 {
    400
}

/// An opaque RGB color. Deserializes from `"#rrggbb"`, `"#rgb"` or an
/// `{ r, g, b }` object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "ColorRepr")]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Color {
    pub const BLACK: Color = Color { r: 0, g: 0, b: 0 };
    pub const WHITE: Color = Color {
        r: 255,
        g: 255,
        b: 255,
    };

    pub fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Parse `#rgb` or `#rrggbb`. Anything else is black.
    pub fn hex(hex: &str) -> Self {
        let hex = hex.trim().trim_start_matches('#');
        let channel = |s: &str| u8::from_str_radix(s, 16).unwrap_or(0);
        match hex.len() {
            3 if hex.is_ascii() => Self::rgb(
                channel(&hex[0..1].repeat(2)),
                channel(&hex[1..2].repeat(2)),
                channel(&hex[2..3].repeat(2)),
            ),
            6 if hex.is_ascii() => {
                Self::rgb(channel(&hex[0..2]), channel(&hex[2..4]), channel(&hex[4..6]))
            }
            _ => Self::BLACK,
        }
    }
}

impl Default for Color {
    fn default() -> Self {
        Color::BLACK
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ColorRepr {
    Hex(String),
    Rgb { r: u8, g: u8, b: u8 },
}

impl From<ColorRepr> for Color {
    fn from(repr: ColorRepr) -> Self {
        match repr {
            ColorRepr::Hex(s) => Color::hex(&s),
            ColorRepr::Rgb { r, g, b } => Color::rgb(r, g, b),
        }
    }
}

/// A stroke: color and width in points.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Pen {
    #[serde(default)]
    pub color: Color,
    #[serde(default = "default_pen_width")]
    pub width: f64,
}

impl Default for Pen {
    fn default() -> Self {
        Self {
            color: Color::BLACK,
            width: default_pen_width(),
        }
    }
}

fn default_pen_width() -> f64 {
    1.0
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum HAlign {
    #[default]
    Left,
    Center,
    Right,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum VAlign {
    #[default]
    Top,
    Center,
    Bottom,
}

/// Text alignment inside an element's rectangle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Align {
    #[serde(default)]
    pub h: HAlign,
    #[serde(default)]
    pub v: VAlign,
}
