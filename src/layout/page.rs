//! Page lifecycle: opening and closing pages, page heads and feet, and the
//! space arithmetic every fit check uses.

use super::image;
use super::page_break::{decide_break, BreakDecision};
use super::{PageCursor, Renderer};
use crate::document::{Background, Page, Watermark};
use crate::model::Font;
use crate::subtotal::SubtotalScope;

impl Renderer<'_> {
    /// Close the current page (if any) and open the next one.
    pub(super) fn create_new_page(&mut self, cursor: &mut PageCursor) {
        if cursor.page_counter > 0 {
            self.finish_cur_page(cursor, false);
            let queries = &self.queries;
            cursor
                .subtotals
                .refresh(SubtotalScope::PageFooter, |key| queries.running_total(key));
        }

        cursor.page_counter += 1;
        let mut page = Page::new(cursor.page_counter);
        page.background = self.page_background();
        page.watermark = self.page_watermark(cursor);
        cursor.doc.pages.push(page);
        cursor.y_offset = cursor.margins.top;
        log::debug!("page {} opened", cursor.page_counter);

        let def = self.def;
        if let Some(head) = def.page_head.select(cursor.page_counter, false) {
            cursor.in_page_band = true;
            self.render_section(cursor, head, SubtotalScope::None);
            cursor.in_page_band = false;
        }
        cursor.page_is_fresh = true;
    }

    /// Render the page foot variant that applies, anchored to the bottom
    /// margin.
    pub(super) fn finish_cur_page(&mut self, cursor: &mut PageCursor, last_page: bool) {
        let def = self.def;
        let Some(foot) = def.page_foot.select(cursor.page_counter, last_page) else {
            return;
        };
        cursor.y_offset =
            cursor.page_height - cursor.margins.bottom - self.measure_section(cursor, foot, false);
        cursor.in_page_band = true;
        self.render_section(cursor, foot, SubtotalScope::PageFooter);
        cursor.in_page_band = false;
    }

    /// Height of the page foot that would close the current page.
    pub(super) fn finish_cur_page_size(&self, cursor: &PageCursor, last_page: bool) -> f64 {
        self.def
            .page_foot
            .select(cursor.page_counter, last_page)
            .map_or(0.0, |foot| self.measure_section(cursor, foot, false))
    }

    /// Space left above the page foot.
    pub(super) fn calculate_remaining_page_size(&self, cursor: &PageCursor, last_page: bool) -> f64 {
        let reserved = self.finish_cur_page_size(cursor, last_page) + cursor.margins.bottom;
        (cursor.page_height - (cursor.y_offset + reserved)).max(0.0)
    }

    /// Lowest y wrapping text may reach in `scope`.
    pub(super) fn max_detail_section_y(&self, cursor: &PageCursor, scope: SubtotalScope) -> f64 {
        let bottom = cursor.page_height - cursor.margins.bottom;
        if scope == SubtotalScope::PageFooter {
            return bottom;
        }
        let last_row = cursor
            .detail_query
            .as_deref()
            .and_then(|name| self.queries.get(name))
            .map_or(true, |q| q.at().is_some_and(|row| row + 1 == q.size()));
        bottom - self.finish_cur_page_size(cursor, last_row)
    }

    /// Page breaks are never taken while a page head or foot renders.
    pub(super) fn may_break(&self, cursor: &PageCursor, scope: SubtotalScope) -> bool {
        scope != SubtotalScope::PageFooter && !cursor.in_page_band
    }

    /// Whether a band of `height` needs a new page first. A band too tall
    /// for an empty page is placed anyway.
    pub(super) fn needs_new_page(&self, cursor: &PageCursor, height: f64, last_page: bool) -> bool {
        let required = height + self.finish_cur_page_size(cursor, last_page) + cursor.margins.bottom;
        match decide_break(required, cursor.y_offset, cursor.page_height, cursor.page_is_fresh) {
            BreakDecision::Place => false,
            BreakDecision::NewPage => true,
            BreakDecision::Overflow => {
                log::warn!(
                    "band of {height:.2}in does not fit on page {}, overflowing",
                    cursor.page_counter
                );
                false
            }
        }
    }

    /// Open a new page in the middle of a detail section. The section's
    /// query is stepped back to the last row already printed while the old
    /// page closes, so its foot totals stop at that row, then returned to
    /// the row being rendered.
    pub(super) fn break_page_keeping_row(&mut self, cursor: &mut PageCursor) {
        let name = cursor.detail_query.clone();
        let row = name
            .as_deref()
            .and_then(|n| self.queries.get(n))
            .and_then(|q| q.at());
        let restore = name.as_deref().zip(row);

        if let Some((name, row)) = restore {
            if row > 0 {
                if let Some(q) = self.queries.get_mut(name) {
                    q.seek(row - 1);
                }
            }
        }
        self.create_new_page(cursor);
        if let Some((name, row)) = restore {
            if let Some(q) = self.queries.get_mut(name) {
                q.seek(row);
            }
        }
    }

    fn page_background(&self) -> Option<Background> {
        let spec = self.background?;
        if spec.opacity == 0 {
            return None;
        }
        let image = match &spec.data {
            Some(data) => {
                let datum = self.queries.value(data)?;
                let bytes = image::decode_datum(&datum)?;
                image::load(bytes)?
            }
            None => self.static_background.clone()?,
        };
        Some(Background {
            image,
            rect: spec.rect.to_inches(),
            opacity: spec.opacity,
            align: spec.align,
            scaled: spec.mode != "clip",
        })
    }

    fn page_watermark(&self, cursor: &PageCursor) -> Option<Watermark> {
        let spec = self.watermark?;
        if spec.opacity == 0 {
            return None;
        }
        let text = match &spec.data {
            Some(data) => self.column_text(cursor, data),
            None => spec.text.clone(),
        };
        if text.is_empty() {
            return None;
        }
        Some(Watermark {
            text,
            font: spec.font.clone().unwrap_or_else(|| Font::sized(36.0)),
            opacity: spec.opacity,
        })
    }
}

#[cfg(test)]
mod tests {
    use crate::layout::tests::{label, metrics};
    use crate::layout::{generate, GenerateOptions};
    use crate::model::{PageBands, ReportDefinition, Section, WatermarkSpec};
    use crate::query::memory::MemoryDatabase;

    fn band(text: &str) -> Option<Section> {
        Some(Section::new(20.0, vec![label(text, 0.0)]))
    }

    #[test]
    fn feet_anchor_to_bottom_margin() {
        let def = ReportDefinition {
            page_foot: PageBands {
                any: band("foot"),
                ..Default::default()
            },
            page_head: PageBands {
                any: band("head"),
                ..Default::default()
            },
            ..Default::default()
        };
        let doc = generate(&def, &GenerateOptions::default(), &MemoryDatabase::new(), &metrics())
            .unwrap();
        let page = &doc.pages[0];
        let head = page.texts().find(|t| t.text == "head").unwrap();
        let foot = page.texts().find(|t| t.text == "foot").unwrap();
        assert!((head.rect.y - 1.0).abs() < 1e-9);
        // 11in page, 1in bottom margin, 0.2in foot
        assert!((foot.rect.y - 9.8).abs() < 1e-9);
        assert!((foot.rect.x - 1.0).abs() < 1e-9);
    }

    #[test]
    fn last_page_foot_wins_on_single_page() {
        let def = ReportDefinition {
            page_foot: PageBands {
                first: band("first"),
                last: band("last"),
                any: band("any"),
                ..Default::default()
            },
            ..Default::default()
        };
        let doc = generate(&def, &GenerateOptions::default(), &MemoryDatabase::new(), &metrics())
            .unwrap();
        let texts: Vec<&str> = doc.texts().map(|t| t.text.as_str()).collect();
        assert_eq!(texts, vec!["last"]);
    }

    #[test]
    fn watermark_on_every_page_unless_invisible() {
        let mut def = ReportDefinition {
            watermark: Some(WatermarkSpec {
                text: "DRAFT".into(),
                opacity: 40,
                ..Default::default()
            }),
            ..Default::default()
        };
        let db = MemoryDatabase::new();
        let doc = generate(&def, &GenerateOptions::default(), &db, &metrics()).unwrap();
        let mark = doc.pages[0].watermark.as_ref().unwrap();
        assert_eq!(mark.text, "DRAFT");
        assert_eq!(mark.opacity, 40);

        def.watermark.as_mut().unwrap().opacity = 0;
        let doc = generate(&def, &GenerateOptions::default(), &db, &metrics()).unwrap();
        assert!(doc.pages[0].watermark.is_none());
    }
}
