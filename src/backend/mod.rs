//! # Output Backends
//!
//! A finished [`Document`] is device independent. Backends turn it into
//! something a device understands by implementing [`OutputBackend`];
//! [`render_document`] walks the pages in order and calls one hook per
//! piece of content:
//!
//! ```text
//! begin_document
//!   begin_page
//!     background?          <- behind everything
//!     primitives...        <- in emission order
//!     watermark?           <- over everything
//!   end_page
//!   ...
//! end_document
//! ```
//!
//! Label printers can't fill large areas dot by dot, so on Sato and Zebra
//! documents solid black boxes reach the backend through
//! [`OutputBackend::reverse_rect`] instead of [`OutputBackend::rect`].
//!
//! [`ListingBackend`] writes a plain-text listing, one line per item. The
//! CLI uses it for `--listing`; tests use it to compare whole documents.

use std::fmt::Write as FmtWrite;

use crate::document::{
    Background, BarcodePrimitive, Document, ImagePrimitive, LinePrimitive, Page, PrinterType,
    Primitive, RectPrimitive, TextPrimitive, Watermark,
};
use crate::model::{Color, Rect};

/// Receives a document one item at a time. Hooks with a default do
/// nothing.
pub trait OutputBackend {
    fn begin_document(&mut self, _doc: &Document) {}
    fn begin_page(&mut self, page: &Page, width: f64, height: f64);
    fn background(&mut self, _background: &Background) {}
    fn text(&mut self, text: &TextPrimitive);
    fn line(&mut self, line: &LinePrimitive);
    fn rect(&mut self, rect: &RectPrimitive);
    /// A solid black box on a label printer.
    fn reverse_rect(&mut self, rect: &RectPrimitive) {
        self.rect(rect);
    }
    fn image(&mut self, image: &ImagePrimitive);
    fn barcode(&mut self, barcode: &BarcodePrimitive);
    fn watermark(&mut self, _watermark: &Watermark) {}
    fn end_page(&mut self, _page: &Page) {}
    fn end_document(&mut self, _doc: &Document) {}
}

/// Drive `backend` over every page of `doc`.
pub fn render_document<B: OutputBackend + ?Sized>(doc: &Document, backend: &mut B) {
    let label_printer = doc.printer_type != PrinterType::Standard;
    let (width, height) = (doc.page_options.width, doc.page_options.height);

    backend.begin_document(doc);
    for page in &doc.pages {
        backend.begin_page(page, width, height);
        if let Some(bg) = &page.background {
            backend.background(bg);
        }
        for primitive in &page.primitives {
            match primitive {
                Primitive::Text(t) => backend.text(t),
                Primitive::Line(l) => backend.line(l),
                Primitive::Rect(r) if label_printer && r.is_reverse() => backend.reverse_rect(r),
                Primitive::Rect(r) => backend.rect(r),
                Primitive::Image(i) => backend.image(i),
                Primitive::Barcode(b) => backend.barcode(b),
            }
        }
        if let Some(wm) = &page.watermark {
            backend.watermark(wm);
        }
        backend.end_page(page);
    }
    backend.end_document(doc);
    log::debug!("rendered {} page(s) to backend", doc.page_count());
}

/// Plain-text listing of a document.
#[derive(Debug, Default)]
pub struct ListingBackend {
    out: String,
}

fn rect_text(r: &Rect) -> String {
    format!("({:.2}, {:.2}) {:.2}x{:.2}", r.x, r.y, r.width, r.height)
}

fn color_text(c: Color) -> String {
    format!("#{:02x}{:02x}{:02x}", c.r, c.g, c.b)
}

impl ListingBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// The listing so far.
    pub fn output(&self) -> &str {
        &self.out
    }

    pub fn into_output(self) -> String {
        self.out
    }

    /// List a whole document.
    pub fn listing(doc: &Document) -> String {
        let mut backend = Self::new();
        render_document(doc, &mut backend);
        backend.into_output()
    }
}

impl OutputBackend for ListingBackend {
    fn begin_document(&mut self, doc: &Document) {
        let _ = writeln!(
            self.out,
            "document \"{}\" {:?} {} page(s)",
            doc.title,
            doc.printer_type,
            doc.page_count()
        );
    }

    fn begin_page(&mut self, page: &Page, width: f64, height: f64) {
        let _ = writeln!(self.out, "page {} {:.2}x{:.2}", page.number, width, height);
    }

    fn background(&mut self, bg: &Background) {
        let _ = writeln!(
            self.out,
            "  background {}x{}px {} opacity {}",
            bg.image.pixel_width,
            bg.image.pixel_height,
            rect_text(&bg.rect),
            bg.opacity
        );
    }

    fn text(&mut self, t: &TextPrimitive) {
        let _ = writeln!(
            self.out,
            "  text {} {} {:?}",
            rect_text(&t.rect),
            color_text(t.color),
            t.text
        );
    }

    fn line(&mut self, l: &LinePrimitive) {
        let _ = writeln!(
            self.out,
            "  line ({:.2}, {:.2})-({:.2}, {:.2}) {}",
            l.start.x,
            l.start.y,
            l.end.x,
            l.end.y,
            color_text(l.pen.color)
        );
    }

    fn rect(&mut self, r: &RectPrimitive) {
        let fill = r.fill.map_or_else(|| "none".to_string(), color_text);
        let _ = writeln!(self.out, "  rect {} fill {fill}", rect_text(&r.rect));
    }

    fn reverse_rect(&mut self, r: &RectPrimitive) {
        let _ = writeln!(self.out, "  reverse {}", rect_text(&r.rect));
    }

    fn image(&mut self, i: &ImagePrimitive) {
        let _ = writeln!(
            self.out,
            "  image {}x{}px {}{}",
            i.image.pixel_width,
            i.image.pixel_height,
            rect_text(&i.rect),
            if i.scaled { " scaled" } else { "" }
        );
    }

    fn barcode(&mut self, b: &BarcodePrimitive) {
        let _ = writeln!(
            self.out,
            "  barcode {} {} {:?}",
            b.format,
            rect_text(&b.rect),
            b.data
        );
    }

    fn watermark(&mut self, wm: &Watermark) {
        let _ = writeln!(self.out, "  watermark {:?} opacity {}", wm.text, wm.opacity);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Align, Font, Pen};

    fn text(s: &str) -> Primitive {
        Primitive::Text(TextPrimitive {
            rect: Rect::new(1.0, 1.0, 2.0, 0.2),
            text: s.to_string(),
            font: Font::default(),
            align: Align::default(),
            color: Color::BLACK,
            href: None,
            rotation: 0.0,
            is_static: true,
        })
    }

    fn black_box() -> Primitive {
        Primitive::Rect(RectPrimitive {
            rect: Rect::new(1.0, 2.0, 1.0, 0.5),
            pen: Pen::default(),
            fill: Some(Color::BLACK),
            border: None,
            rotation: 0.0,
            is_static: true,
        })
    }

    fn document(printer_type: PrinterType) -> Document {
        let mut doc = Document::new("Invoice", printer_type);
        doc.page_options.width = 8.5;
        doc.page_options.height = 11.0;
        let mut page = Page::new(1);
        page.primitives = vec![text("Hello"), black_box()];
        page.watermark = Some(Watermark {
            text: "DRAFT".into(),
            font: Font::default(),
            opacity: 25,
        });
        doc.pages.push(page);
        doc
    }

    #[test]
    fn listing_in_drawing_order() {
        let listing = ListingBackend::listing(&document(PrinterType::Standard));
        let lines: Vec<&str> = listing.lines().collect();
        assert_eq!(
            lines,
            vec![
                "document \"Invoice\" Standard 1 page(s)",
                "page 1 8.50x11.00",
                "  text (1.00, 1.00) 2.00x0.20 #000000 \"Hello\"",
                "  rect (1.00, 2.00) 1.00x0.50 fill #000000",
                "  watermark \"DRAFT\" opacity 25",
            ]
        );
    }

    #[test]
    fn label_printers_get_reverse_boxes() {
        let listing = ListingBackend::listing(&document(PrinterType::Zebra));
        assert!(listing.contains("  reverse (1.00, 2.00) 1.00x0.50\n"));
        assert!(!listing.contains("fill #000000"));
    }

    #[derive(Default)]
    struct Counter {
        pages: usize,
        items: usize,
        ended: bool,
    }

    impl OutputBackend for Counter {
        fn begin_page(&mut self, _: &Page, _: f64, _: f64) {
            self.pages += 1;
        }
        fn text(&mut self, _: &TextPrimitive) {
            self.items += 1;
        }
        fn line(&mut self, _: &LinePrimitive) {
            self.items += 1;
        }
        fn rect(&mut self, _: &RectPrimitive) {
            self.items += 1;
        }
        fn image(&mut self, _: &ImagePrimitive) {
            self.items += 1;
        }
        fn barcode(&mut self, _: &BarcodePrimitive) {
            self.items += 1;
        }
        fn end_document(&mut self, _: &Document) {
            self.ended = true;
        }
    }

    #[test]
    fn default_reverse_hook_falls_back_to_rect() {
        let mut counter = Counter::default();
        render_document(&document(PrinterType::Sato), &mut counter);
        assert_eq!((counter.pages, counter.items), (1, 2));
        assert!(counter.ended);
    }
}
