//! Field evaluation: query values, running totals and subtotals, context
//! values, colors and formatting. Grid fields repeat one field over a
//! block of cells, advancing the query one row per cell.

use super::{PageCursor, Renderer};
use crate::document::{Primitive, TextPrimitive};
use crate::format::{builtin_function, number_text, sprintf, FormatArg};
use crate::model::{Color, DataRef, FieldElement, Rect};
use crate::query::CONTEXT_QUERY;
use crate::subtotal::SubtotalScope;

/// Placeholder printed for `page_count` until the document is complete.
pub(super) const PAGE_COUNT_PLACEHOLDER: &str = "page_count";

/// Suffix of the optional companion column holding a field's text color.
const FOREGROUND_ROLE_SUFFIX: &str = "_qtforegroundrole";

impl Renderer<'_> {
    /// Values of the built-in "Context Query".
    pub(super) fn context_value(&self, cursor: &PageCursor, column: &str) -> Option<String> {
        let def = self.def;
        match column {
            "page_number" => Some(cursor.page_counter.to_string()),
            "page_count" => Some(PAGE_COUNT_PLACEHOLDER.to_string()),
            "report_name" => Some(def.name.clone()),
            "report_title" => Some(def.title.clone()),
            "report_description" => Some(def.description.clone()),
            _ => None,
        }
    }

    /// Plain text of a bound column, empty when unavailable.
    pub(super) fn column_text(&self, cursor: &PageCursor, data: &DataRef) -> String {
        if data.query == CONTEXT_QUERY {
            return self.context_value(cursor, &data.column).unwrap_or_default();
        }
        self.queries
            .value(data)
            .map(|d| d.as_text())
            .unwrap_or_default()
    }

    /// Text and color of one field evaluation on the current row.
    pub(super) fn evaluate_field(
        &self,
        cursor: &PageCursor,
        f: &FieldElement,
        scope: SubtotalScope,
    ) -> (String, Color) {
        let query = self.queries.get(&f.data.query);

        let (text, number) = if f.track_total {
            let total = query.map_or(0.0, |q| q.running_total(&f.data.column));
            let value = if f.sub_total {
                total - cursor.subtotals.resolve(scope, &f.data)
            } else {
                total
            };
            (number_text(value), Some(value))
        } else if f.data.query == CONTEXT_QUERY {
            let text = self
                .context_value(cursor, &f.data.column)
                .unwrap_or_default();
            (text, None)
        } else {
            match query.and_then(|q| q.value(&f.data.column)) {
                Some(datum) => (datum.as_text(), datum.as_number()),
                None => (String::new(), None),
            }
        };

        let role = format!("{}{FOREGROUND_ROLE_SUFFIX}", f.data.column);
        let color = query
            .filter(|q| q.has_column(&role))
            .and_then(|q| q.value(&role))
            .map(|d| d.as_text())
            .filter(|s| !s.trim().is_empty())
            .map_or(f.color, |s| Color::hex(&s));

        let builtin = f.builtin_format.as_deref().filter(|t| !t.is_empty());
        let format = f.format.as_deref().filter(|t| !t.is_empty());
        let text = if let Some(tag) = builtin {
            match builtin_function(tag) {
                Some(function) => self
                    .db
                    .format_value(function, number.unwrap_or(0.0))
                    .unwrap_or_default(),
                None => {
                    log::warn!("unknown built-in format '{tag}'");
                    String::new()
                }
            }
        } else if let Some(format) = format {
            match number {
                Some(n) => sprintf(format, FormatArg::Number(n)),
                None => sprintf(format, FormatArg::Text(&text)),
            }
        } else {
            text
        };
        (text, color)
    }

    /// Emit a field, repeated over its grid. Returns true when the field
    /// asks for a new page because rows remain after the grid filled.
    pub(super) fn render_field(
        &mut self,
        cursor: &mut PageCursor,
        f: &FieldElement,
        scope: SubtotalScope,
    ) -> bool {
        let base = f
            .rect
            .to_inches()
            .translated(cursor.margins.left, cursor.y_offset);
        let columns = f.columns.max(1);
        let lines = f.lines.max(1);
        let single_cell = columns == 1 && lines == 1;
        let from_context = f.data.query == CONTEXT_QUERY;

        let cells: Vec<(u32, u32)> = if f.left_to_right {
            (0..columns)
                .flat_map(|c| (0..lines).map(move |l| (c, l)))
                .collect()
        } else {
            (0..lines)
                .flat_map(|l| (0..columns).map(move |c| (c, l)))
                .collect()
        };

        let mut has_next = true;
        for (col, line) in cells {
            let valid = from_context
                || self
                    .queries
                    .get(&f.data.query)
                    .is_some_and(|q| q.is_valid());
            if !valid && !single_cell {
                break;
            }
            let (text, color) = self.evaluate_field(cursor, f, scope);
            let rect = Rect::new(
                base.x + col as f64 * (base.width + f.x_spacing / 100.0),
                base.y + line as f64 * (base.height + f.y_spacing / 100.0),
                base.width,
                base.height,
            );
            cursor.push(Primitive::Text(TextPrimitive {
                rect,
                text,
                font: f.font.clone(),
                align: f.align,
                color,
                href: f.href.clone(),
                rotation: f.rotation,
                is_static: false,
            }));

            if f.is_grid() && !from_context {
                has_next = self
                    .queries
                    .get_mut(&f.data.query)
                    .is_some_and(|q| q.next());
            }
            if !has_next {
                break;
            }
        }

        has_next && f.trigger_page_break && !from_context && self.may_break(cursor, scope)
    }
}

#[cfg(test)]
mod tests {
    use crate::layout::tests::{metrics, rows};
    use crate::layout::{generate, GenerateOptions};
    use crate::model::{
        Color, DataRef, DetailSection, Element, FieldElement, Key, QueryDefinition, Rect,
        ReportDefinition, Section,
    };
    use crate::query::memory::{Dataset, MemoryDatabase};
    use crate::query::Datum;

    fn field(query: &str, column: &str) -> FieldElement {
        FieldElement::new(Rect::new(0.0, 0.0, 100.0, 20.0), DataRef::new(query, column))
    }

    fn one_section(detail: Vec<Element>) -> ReportDefinition {
        ReportDefinition {
            queries: vec![QueryDefinition {
                name: "detail".into(),
                sql: String::new(),
            }],
            sections: vec![DetailSection {
                key: Key {
                    query: "detail".into(),
                    column: None,
                },
                detail: Some(Section::new(20.0, detail)),
                ..Default::default()
            }],
            ..Default::default()
        }
    }

    fn texts(def: &ReportDefinition, db: &MemoryDatabase) -> Vec<String> {
        let doc = generate(def, &GenerateOptions::default(), db, &metrics()).unwrap();
        doc.texts().map(|t| t.text.clone()).collect()
    }

    #[test]
    fn formats_apply() {
        let mut money = field("detail", "amount");
        money.format = Some("%.2f".into());
        let mut padded = field("detail", "name");
        padded.format = Some("[%-5s]".into());
        let mut builtin = field("detail", "amount");
        builtin.builtin_format = Some("money".into());
        let def = one_section(vec![
            Element::Field(money),
            Element::Field(padded),
            Element::Field(builtin),
        ]);
        let db = rows("detail", &["amount", "name"], &[&["1234.5", "ab"]]);
        assert_eq!(texts(&def, &db), vec!["1234.50", "[ab   ]", "1,234.50"]);
    }

    #[test]
    fn unknown_builtin_format_prints_nothing() {
        let mut f = field("detail", "amount");
        f.builtin_format = Some("furlongs".into());
        let def = one_section(vec![Element::Field(f)]);
        let db = rows("detail", &["amount"], &[&["3"]]);
        assert_eq!(texts(&def, &db), vec![""]);
    }

    #[test]
    fn running_total_per_row() {
        let mut f = field("detail", "amount");
        f.track_total = true;
        let def = one_section(vec![Element::Field(f)]);
        let db = rows("detail", &["amount"], &[&["1"], &["2.5"], &["3"]]);
        assert_eq!(texts(&def, &db), vec!["1", "3.5", "6.5"]);
    }

    #[test]
    fn foreground_role_column_colors_text() {
        let def = one_section(vec![Element::Field(field("detail", "name"))]);
        let db = rows(
            "detail",
            &["name", "name_qtforegroundrole"],
            &[&["red", "#ff0000"], &["plain", ""]],
        );
        let doc = generate(&def, &GenerateOptions::default(), &db, &metrics()).unwrap();
        let colors: Vec<Color> = doc.texts().map(|t| t.color).collect();
        assert_eq!(colors, vec![Color::rgb(255, 0, 0), Color::BLACK]);
    }

    fn grid_report(trigger_page_break: bool) -> ReportDefinition {
        let mut f = field("items", "sku");
        f.lines = 2;
        f.columns = 2;
        f.x_spacing = 10.0;
        f.left_to_right = true;
        f.trigger_page_break = trigger_page_break;
        ReportDefinition {
            queries: vec![QueryDefinition {
                name: "items".into(),
                sql: String::new(),
            }],
            report_head: Some(Section::new(50.0, vec![Element::Field(f)])),
            ..Default::default()
        }
    }

    fn items() -> MemoryDatabase {
        let mut set = Dataset::new(&["sku"]);
        for sku in ["a", "b", "c", "d", "e"] {
            set.push(vec![Datum::from(sku)]);
        }
        let mut db = MemoryDatabase::new();
        db.insert("items", set);
        db
    }

    #[test]
    fn grid_fills_column_by_column() {
        let doc = generate(&grid_report(false), &GenerateOptions::default(), &items(), &metrics())
            .unwrap();
        assert_eq!(doc.page_count(), 1);
        let cells: Vec<(&str, f64, f64)> = doc.pages[0]
            .texts()
            .map(|t| (t.text.as_str(), t.rect.x, t.rect.y))
            .collect();
        let expected = [("a", 1.0, 1.0), ("b", 1.0, 1.2), ("c", 2.1, 1.0), ("d", 2.1, 1.2)];
        assert_eq!(cells.len(), expected.len());
        for ((text, x, y), (etext, ex, ey)) in cells.iter().zip(expected) {
            assert_eq!(*text, etext);
            assert!((x - ex).abs() < 1e-9);
            assert!((y - ey).abs() < 1e-9);
        }
    }

    #[test]
    fn full_grid_with_rows_left_requests_page() {
        let doc = generate(&grid_report(true), &GenerateOptions::default(), &items(), &metrics())
            .unwrap();
        assert_eq!(doc.page_count(), 2);
        assert_eq!(doc.pages[0].texts().count(), 4);
    }

    #[test]
    fn row_by_row_fill() {
        let mut def = grid_report(false);
        if let Some(Element::Field(f)) = def
            .report_head
            .as_mut()
            .and_then(|s| s.elements.first_mut())
        {
            f.left_to_right = false;
        }
        let doc = generate(&def, &GenerateOptions::default(), &items(), &metrics()).unwrap();
        let order: Vec<&str> = doc.texts().map(|t| t.text.as_str()).collect();
        assert_eq!(order, vec!["a", "b", "c", "d"]);
        let second = doc.texts().nth(1).unwrap();
        assert!((second.rect.x - 2.1).abs() < 1e-9);
        assert!((second.rect.y - 1.0).abs() < 1e-9);
    }
}
