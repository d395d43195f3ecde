//! Wrapping text elements. All text elements of a band flow side by side;
//! when any of them reaches the bottom of the page, a new page is opened
//! and every unfinished paragraph continues at the top of it.

use super::{PageCursor, Renderer};
use crate::document::{Primitive, TextPrimitive};
use crate::model::TextElement;
use crate::subtotal::SubtotalScope;
use crate::text::TextFlowSplitter;

impl Renderer<'_> {
    /// Flow `texts` from the cursor down. Returns the band height on the
    /// page the flow ended on, at least `height`.
    pub(super) fn render_text_elements(
        &mut self,
        cursor: &mut PageCursor,
        texts: &[&TextElement],
        height: f64,
        scope: SubtotalScope,
    ) -> f64 {
        if texts.is_empty() {
            return height;
        }
        let page_bottom = self.max_detail_section_y(cursor, scope);
        let breakable = self.may_break(cursor, scope);
        let mut flows: Vec<(&TextElement, TextFlowSplitter)> = texts
            .iter()
            .map(|t| {
                let text = self.column_text(cursor, &t.data);
                let splitter = TextFlowSplitter::new(
                    &text,
                    t.rect,
                    &t.font,
                    t.bottompad,
                    cursor.margins.left,
                    cursor.y_offset,
                    page_bottom,
                    self.measurer,
                );
                (*t, splitter)
            })
            .collect();

        let mut height = height;
        let mut fresh_page = false;
        while !flows.is_empty() {
            let mut page_full = false;
            let mut i = 0;
            while i < flows.len() {
                let (element, splitter) = &mut flows[i];
                let mut emitted = 0;
                // On a fresh page every paragraph places at least one line,
                // even one taller than the page, so the flow always ends.
                while !splitter.end_of_text()
                    && (!breakable || !splitter.end_of_page() || (fresh_page && emitted == 0))
                {
                    splitter.next_line(self.measurer);
                    emitted += 1;
                    cursor.push(Primitive::Text(TextPrimitive {
                        rect: splitter.current_line_rect(),
                        text: splitter.current_line().to_string(),
                        font: element.font.clone(),
                        align: element.align,
                        color: element.color,
                        href: None,
                        rotation: element.rotation,
                        is_static: false,
                    }));
                }
                height = height.max(splitter.text_bottom_relative_pos());
                if splitter.end_of_text() {
                    flows.remove(i);
                } else {
                    page_full = true;
                    i += 1;
                }
            }

            if page_full {
                self.break_page_keeping_row(cursor);
                for (_, splitter) in flows.iter_mut() {
                    splitter.new_page(cursor.y_offset);
                }
                height = 0.0;
                fresh_page = true;
            }
        }
        height
    }
}

#[cfg(test)]
mod tests {
    use crate::layout::tests::{label, metrics};
    use crate::layout::{generate, GenerateOptions};
    use crate::model::{
        DataRef, Element, Margins, PageBands, PageSetup, Rect, ReportDefinition, Section,
        TextElement,
    };
    use crate::query::memory::MemoryDatabase;

    fn small_page() -> PageSetup {
        PageSetup {
            size: "Custom".into(),
            custom_width: 4.0,
            custom_height: 3.0,
            margins: Margins {
                top: 0.5,
                bottom: 0.45,
                left: 0.5,
                right: 0.5,
            },
            ..Default::default()
        }
    }

    fn paragraph(words: usize) -> ReportDefinition {
        let title: Vec<String> = (0..words).map(|i| format!("{:02}", i + 1)).collect();
        ReportDefinition {
            title: title.join(" "),
            page: small_page(),
            report_head: Some(Section::new(
                20.0,
                vec![Element::Text(TextElement {
                    rect: Rect::new(0.0, 0.0, 40.0, 20.0),
                    data: DataRef::new("Context Query", "report_title"),
                    ..Default::default()
                })],
            )),
            report_foot: Some(Section::new(20.0, vec![label("end", 0.0)])),
            ..Default::default()
        }
    }

    #[test]
    fn paragraph_continues_on_next_page() {
        let doc = generate(
            &paragraph(15),
            &GenerateOptions::default(),
            &MemoryDatabase::new(),
            &metrics(),
        )
        .unwrap();
        assert_eq!(doc.page_count(), 2);
        let first: Vec<&str> = doc.pages[0].texts().map(|t| t.text.as_str()).collect();
        assert_eq!(first.len(), 10);
        assert_eq!(first[0], "01");
        assert_eq!(first[9], "10");

        let second: Vec<(&str, f64)> = doc.pages[1]
            .texts()
            .map(|t| (t.text.as_str(), t.rect.y))
            .collect();
        assert_eq!(second.len(), 6);
        assert_eq!(second[0].0, "11");
        assert!((second[0].1 - 0.5).abs() < 1e-9);
        // the report foot follows the five continued lines
        assert_eq!(second[5].0, "end");
        assert!((second[5].1 - 1.5).abs() < 1e-9);
    }

    #[test]
    fn page_foot_space_is_reserved() {
        let mut def = paragraph(15);
        def.page_foot = PageBands {
            any: Some(Section::new(40.0, vec![label("foot", 0.0)])),
            ..Default::default()
        };
        let doc = generate(&def, &GenerateOptions::default(), &MemoryDatabase::new(), &metrics())
            .unwrap();
        // 2.55in usable minus a 0.4in foot leaves room for eight lines
        let first: Vec<&str> = doc.pages[0]
            .texts()
            .map(|t| t.text.as_str())
            .filter(|t| *t != "foot")
            .collect();
        assert_eq!(first.len(), 8);
        assert!(doc.pages.iter().all(|p| p.texts().any(|t| t.text == "foot")));
    }
}
