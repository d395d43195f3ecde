//! Band rendering: measuring a section and emitting its elements.

use super::image;
use super::{PageCursor, Renderer};
use crate::document::{
    BarcodePrimitive, ImagePrimitive, LinePrimitive, Primitive, RectPrimitive, TextPrimitive,
};
use crate::model::{
    Align, BarcodeElement, Color, Element, Font, ImageElement, LabelElement, LineElement, Pen,
    Point, RectElement, Section, TextElement, BARCODE_FORMATS,
};
use crate::subtotal::SubtotalScope;
use crate::text::TextFlowSplitter;

impl Renderer<'_> {
    /// Height the section will occupy: the nominal height, grown to fit
    /// its wrapping text unless `ignore_text` is set.
    pub(super) fn measure_section(
        &self,
        cursor: &PageCursor,
        section: &Section,
        ignore_text: bool,
    ) -> f64 {
        let mut height = section.nominal_height();
        if section.elements.is_empty() || ignore_text {
            return height;
        }
        for element in &section.elements {
            let Element::Text(t) = element else {
                continue;
            };
            let text = self.column_text(cursor, &t.data);
            let mut splitter = TextFlowSplitter::new(
                &text,
                t.rect,
                &t.font,
                t.bottompad,
                0.0,
                0.0,
                f64::INFINITY,
                self.measurer,
            );
            while !splitter.end_of_text() {
                splitter.next_line(self.measurer);
            }
            height = height.max(splitter.text_bottom_relative_pos());
        }
        height
    }

    /// Render `section` at the cursor and advance the cursor past it.
    /// Returns the height consumed on the page the section ended on.
    pub(super) fn render_section(
        &mut self,
        cursor: &mut PageCursor,
        section: &Section,
        scope: SubtotalScope,
    ) -> f64 {
        if section.elements.is_empty() {
            return 0.0;
        }
        let mut height = section.nominal_height();
        let mut texts: Vec<&TextElement> = Vec::new();
        let mut page_requested = false;

        for element in &section.elements {
            let is_static = element.is_static();
            if (self.store_mask && !is_static) || (self.recall_mask && is_static) {
                continue;
            }
            match element {
                Element::Label(l) => self.render_label(cursor, l),
                Element::Field(f) => page_requested |= self.render_field(cursor, f, scope),
                Element::Text(t) => texts.push(t),
                Element::Line(l) => self.render_line(cursor, l),
                Element::Rect(r) => self.render_rect(cursor, r),
                Element::Barcode(b) => self.render_barcode(cursor, b),
                Element::Image(i) => self.render_image(cursor, i, is_static),
                Element::Graph(g) => self.render_graph(cursor, g),
                Element::CrossTab(c) => {
                    // The table advances the cursor itself, part by part.
                    if self.render_crosstab(cursor, c, scope) {
                        height = 0.0;
                    }
                }
            }
        }

        let height = self.render_text_elements(cursor, &texts, height, scope);
        cursor.y_offset += height;

        if page_requested {
            self.create_new_page(cursor);
        }
        if scope != SubtotalScope::PageFooter {
            cursor.page_is_fresh = false;
        }
        height
    }

    fn render_label(&self, cursor: &mut PageCursor, l: &LabelElement) {
        let text = self
            .options
            .translations
            .translate(&self.def.name, &l.string)
            .to_string();
        cursor.push(Primitive::Text(TextPrimitive {
            rect: l.rect.to_inches().translated(cursor.margins.left, cursor.y_offset),
            text,
            font: l.font.clone(),
            align: l.align,
            color: l.color,
            href: None,
            rotation: l.rotation,
            is_static: true,
        }));
    }

    fn render_line(&self, cursor: &mut PageCursor, l: &LineElement) {
        let place = |p: Point| {
            Point::new(
                p.x / 100.0 + cursor.margins.left,
                p.y / 100.0 + cursor.y_offset,
            )
        };
        let (start, end) = (place(l.start), place(l.end));
        cursor.push(Primitive::Line(LinePrimitive {
            start,
            end,
            pen: Pen {
                color: l.color,
                width: l.weight,
            },
            rotation: 0.0,
            is_static: true,
        }));
    }

    fn render_rect(&self, cursor: &mut PageCursor, r: &RectElement) {
        cursor.push(Primitive::Rect(RectPrimitive {
            rect: r.rect.to_inches().translated(cursor.margins.left, cursor.y_offset),
            pen: r.pen,
            fill: r.fill,
            border: r.border,
            rotation: r.rotation,
            is_static: true,
        }));
    }

    fn render_barcode(&self, cursor: &mut PageCursor, b: &BarcodeElement) {
        let rect = b.rect.to_inches().translated(cursor.margins.left, cursor.y_offset);
        if !BARCODE_FORMATS.contains(&b.format.as_str()) {
            log::warn!("unknown barcode format '{}'", b.format);
            cursor.push(Primitive::Text(TextPrimitive {
                rect,
                text: format!("ERR: {}", b.format),
                font: Font::default(),
                align: Align::default(),
                color: Color::BLACK,
                href: None,
                rotation: b.rotation,
                is_static: false,
            }));
            return;
        }
        let data = self.column_text(cursor, &b.data);
        cursor.push(Primitive::Barcode(BarcodePrimitive {
            rect,
            format: b.format.clone(),
            data,
            narrow_bar_width: b.narrow_bar_width,
            align: b.align,
            rotation: b.rotation,
            is_static: false,
        }));
    }

    fn render_image(&self, cursor: &mut PageCursor, img: &ImageElement, is_static: bool) {
        let bytes = match (&img.inline_data, &img.data) {
            (Some(inline), _) if !inline.is_empty() => image::decode_text_payload(inline),
            (_, Some(data)) => self
                .queries
                .value(data)
                .and_then(|datum| image::decode_datum(&datum)),
            _ => None,
        };
        let Some(image) = bytes.and_then(image::load) else {
            return;
        };
        let stretch = img.mode == "stretch";
        cursor.push(Primitive::Image(ImagePrimitive {
            rect: img.rect.to_inches().translated(cursor.margins.left, cursor.y_offset),
            image,
            scaled: stretch,
            keep_aspect: stretch,
            rotation: img.rotation,
            is_static,
        }));
    }
}
