//! # Output Document
//!
//! The device-independent result of a generation pass: pages of positioned
//! primitives in inches, measured from the top-left corner of the page.
//! A document is complete and immutable once `generate` returns; output
//! backends walk it afterwards.

use base64::Engine as _;
use serde::{Serialize, Serializer};

use crate::error::ReportError;
use crate::model::{Align, Color, DefinedParam, Font, HAlign, Margins, Pen, Point, Rect};

/// Which family of device the document is meant for.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub enum PrinterType {
    #[default]
    Standard,
    Sato,
    Zebra,
}

impl PrinterType {
    /// A `$SATO` or `$ZEBRA` defined parameter selects a label printer and
    /// supplies its parameters. `$SATO` wins when both are present.
    pub fn from_defined_params(params: &[DefinedParam]) -> (PrinterType, Vec<(String, String)>) {
        let find = |name: &str| params.iter().find(|p| p.name == name);
        if let Some(p) = find("$SATO") {
            (PrinterType::Sato, p.values.clone())
        } else if let Some(p) = find("$ZEBRA") {
            (PrinterType::Zebra, p.values.clone())
        } else {
            (PrinterType::Standard, Vec::new())
        }
    }
}

/// Resolved page geometry.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PageOptions {
    /// Paper name ("Letter", "A4", "Custom", ...).
    pub page_size: String,
    /// Width in inches, orientation applied.
    pub width: f64,
    /// Height in inches, orientation applied.
    pub height: f64,
    pub portrait: bool,
    pub margins: Margins,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label_type: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Document {
    pub title: String,
    pub printer_type: PrinterType,
    pub page_options: PageOptions,
    pub printer_params: Vec<(String, String)>,
    pub pages: Vec<Page>,
}

impl Document {
    pub fn new(title: &str, printer_type: PrinterType) -> Self {
        Self {
            title: title.to_string(),
            printer_type,
            ..Default::default()
        }
    }

    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    /// Look up a printer parameter.
    pub fn printer_param(&self, key: &str) -> Option<&str> {
        param_value(&self.printer_params, key)
    }

    /// Pretty JSON dump, image data as base64.
    pub fn to_json(&self) -> Result<String, ReportError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Every text primitive on every page, in order. Handy for assertions.
    pub fn texts(&self) -> impl Iterator<Item = &TextPrimitive> {
        self.pages.iter().flat_map(|p| p.texts())
    }
}

pub(crate) fn param_value<'a>(params: &'a [(String, String)], key: &str) -> Option<&'a str> {
    params
        .iter()
        .find(|(k, _)| k == key)
        .map(|(_, v)| v.as_str())
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Page {
    /// 1-based page number.
    pub number: usize,
    pub primitives: Vec<Primitive>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub background: Option<Background>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub watermark: Option<Watermark>,
}

impl Page {
    pub fn new(number: usize) -> Self {
        Self {
            number,
            ..Default::default()
        }
    }

    pub fn texts(&self) -> impl Iterator<Item = &TextPrimitive> {
        self.primitives.iter().filter_map(|p| match p {
            Primitive::Text(t) => Some(t),
            _ => None,
        })
    }
}

/// Image drawn behind the page content.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Background {
    pub image: ImageData,
    pub rect: Rect,
    pub opacity: u8,
    pub align: Align,
    /// Scale into `rect` keeping the aspect ratio instead of clipping.
    pub scaled: bool,
}

/// Text drawn large and faint across the page.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Watermark {
    pub text: String,
    pub font: Font,
    pub opacity: u8,
}

/// A positioned drawable.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type")]
pub enum Primitive {
    Text(TextPrimitive),
    Line(LinePrimitive),
    Rect(RectPrimitive),
    Image(ImagePrimitive),
    Barcode(BarcodePrimitive),
}

impl Primitive {
    /// Whether the element that produced this primitive is static.
    pub fn is_static(&self) -> bool {
        match self {
            Primitive::Text(p) => p.is_static,
            Primitive::Line(p) => p.is_static,
            Primitive::Rect(p) => p.is_static,
            Primitive::Image(p) => p.is_static,
            Primitive::Barcode(p) => p.is_static,
        }
    }

    /// Top edge in page inches.
    pub fn top(&self) -> f64 {
        match self {
            Primitive::Text(p) => p.rect.y,
            Primitive::Line(p) => p.start.y.min(p.end.y),
            Primitive::Rect(p) => p.rect.y,
            Primitive::Image(p) => p.rect.y,
            Primitive::Barcode(p) => p.rect.y,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TextPrimitive {
    pub rect: Rect,
    pub text: String,
    pub font: Font,
    pub align: Align,
    pub color: Color,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub href: Option<String>,
    pub rotation: f64,
    pub is_static: bool,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LinePrimitive {
    pub start: Point,
    pub end: Point,
    pub pen: Pen,
    pub rotation: f64,
    pub is_static: bool,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RectPrimitive {
    pub rect: Rect,
    pub pen: Pen,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fill: Option<Color>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub border: Option<Pen>,
    pub rotation: f64,
    pub is_static: bool,
}

impl RectPrimitive {
    /// A solid black box. Label printers draw these as reverse
    /// (white-on-black) areas instead of filling them dot by dot.
    pub fn is_reverse(&self) -> bool {
        self.fill == Some(Color::BLACK)
    }
}

/// Encoded image bytes with their decoded pixel size.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageData {
    #[serde(serialize_with = "serialize_base64")]
    pub bytes: Vec<u8>,
    pub pixel_width: u32,
    pub pixel_height: u32,
}

fn serialize_base64<S: Serializer>(bytes: &[u8], s: S) -> Result<S::Ok, S::Error> {
    s.serialize_str(&base64::engine::general_purpose::STANDARD.encode(bytes))
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImagePrimitive {
    pub rect: Rect,
    pub image: ImageData,
    /// Scale into `rect`. Unscaled images draw at natural size, clipped.
    pub scaled: bool,
    pub keep_aspect: bool,
    pub rotation: f64,
    pub is_static: bool,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BarcodePrimitive {
    pub rect: Rect,
    pub format: String,
    pub data: String,
    /// Narrow bar width in inches.
    pub narrow_bar_width: f64,
    pub align: HAlign,
    pub rotation: f64,
    pub is_static: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn printer_type_from_params() {
        let params = vec![DefinedParam {
            name: "$ZEBRA".into(),
            values: vec![("recall".into(), "LBL1".into())],
        }];
        let (ty, values) = PrinterType::from_defined_params(&params);
        assert_eq!(ty, PrinterType::Zebra);
        assert_eq!(param_value(&values, "recall"), Some("LBL1"));
        assert_eq!(param_value(&values, "store"), None);

        let (ty, values) = PrinterType::from_defined_params(&[]);
        assert_eq!(ty, PrinterType::Standard);
        assert!(values.is_empty());
    }

    #[test]
    fn images_dump_as_base64() {
        let mut doc = Document::new("t", PrinterType::Standard);
        let mut page = Page::new(1);
        page.primitives.push(Primitive::Image(ImagePrimitive {
            rect: Rect::new(0.0, 0.0, 1.0, 1.0),
            image: ImageData {
                bytes: b"hi".to_vec(),
                pixel_width: 1,
                pixel_height: 1,
            },
            scaled: false,
            keep_aspect: false,
            rotation: 0.0,
            is_static: true,
        }));
        doc.pages.push(page);
        let json = doc.to_json().unwrap();
        assert!(json.contains("\"bytes\": \"aGk=\""));
        assert!(json.contains("\"type\": \"Image\""));
    }

    #[test]
    fn reverse_rects() {
        let rect = RectPrimitive {
            rect: Rect::default(),
            pen: Pen::default(),
            fill: Some(Color::BLACK),
            border: None,
            rotation: 0.0,
            is_static: true,
        };
        assert!(rect.is_reverse());
        assert!(!RectPrimitive { fill: None, ..rect }.is_reverse());
    }
}
