//! Paper sizes and label-sheet templates.
//!
//! All dimensions are hundredths of an inch.

/// Named paper sizes, portrait width x height.
const PAGE_SIZES: &[(&str, f64, f64)] = &[
    ("Letter", 850.0, 1100.0),
    ("Legal", 850.0, 1400.0),
    ("A4", 827.0, 1169.0),
    ("A3", 1169.0, 1654.0),
    ("A5", 583.0, 827.0),
    ("Tabloid", 1100.0, 1700.0),
    ("Statement", 550.0, 850.0),
    ("Executive", 725.0, 1050.0),
];

/// Portrait size of a named paper, in hundredths of an inch.
pub fn page_size(name: &str) -> Option<(f64, f64)> {
    PAGE_SIZES
        .iter()
        .find(|(n, _, _)| n.eq_ignore_ascii_case(name))
        .map(|&(_, w, h)| (w, h))
}

/// One label-sheet layout: a grid of equal cells on a sheet of paper.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LabelTemplate {
    pub name: String,
    /// Paper the sheet is printed on.
    #[serde(default = "default_paper")]
    pub paper: String,
    pub columns: u32,
    pub rows: u32,
    pub width: f64,
    pub height: f64,
    pub start_x: f64,
    pub start_y: f64,
    #[serde(default)]
    pub x_gap: f64,
    #[serde(default)]
    pub y_gap: f64,
}

fn default_paper() -> String {
    "Letter".to_string()
}

impl LabelTemplate {
    #[allow(clippy::too_many_arguments)]
    fn builtin(
        name: &str,
        columns: u32,
        rows: u32,
        width: f64,
        height: f64,
        start_x: f64,
        start_y: f64,
        x_gap: f64,
        y_gap: f64,
    ) -> Self {
        Self {
            name: name.to_string(),
            paper: default_paper(),
            columns,
            rows,
            width,
            height,
            start_x,
            start_y,
            x_gap,
            y_gap,
        }
    }
}

/// Cell layout of a label sheet in inches, orientation applied.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LabelGrid {
    pub columns: u32,
    pub rows: u32,
    pub cell_width: f64,
    pub cell_height: f64,
    pub x_gap: f64,
    pub y_gap: f64,
    pub left: f64,
    pub top: f64,
}

impl LabelGrid {
    /// Landscape sheets swap width/height, gaps, rows/columns and the start
    /// offsets.
    pub fn new(template: &LabelTemplate, portrait: bool) -> Self {
        let t = template;
        if portrait {
            Self {
                columns: t.columns,
                rows: t.rows,
                cell_width: t.width / 100.0,
                cell_height: t.height / 100.0,
                x_gap: t.x_gap / 100.0,
                y_gap: t.y_gap / 100.0,
                left: t.start_x / 100.0,
                top: t.start_y / 100.0,
            }
        } else {
            Self {
                columns: t.rows,
                rows: t.columns,
                cell_width: t.height / 100.0,
                cell_height: t.width / 100.0,
                x_gap: t.y_gap / 100.0,
                y_gap: t.x_gap / 100.0,
                left: t.start_y / 100.0,
                top: t.start_x / 100.0,
            }
        }
    }

    pub fn per_page(&self) -> u32 {
        self.columns * self.rows
    }
}

/// Known label templates: the built-in Avery sheets plus any the caller adds.
#[derive(Debug, Clone)]
pub struct LabelCatalog {
    templates: Vec<LabelTemplate>,
}

impl Default for LabelCatalog {
    fn default() -> Self {
        Self {
            templates: vec![
                LabelTemplate::builtin("Avery 5160", 3, 10, 262.5, 100.0, 18.75, 50.0, 12.5, 0.0),
                LabelTemplate::builtin("Avery 8160", 3, 10, 262.5, 100.0, 18.75, 50.0, 12.5, 0.0),
                LabelTemplate::builtin("Avery 5161", 2, 10, 400.0, 100.0, 15.6, 50.0, 18.75, 0.0),
                LabelTemplate::builtin("Avery 5163", 2, 5, 400.0, 200.0, 15.6, 50.0, 18.75, 0.0),
            ],
        }
    }
}

impl LabelCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a template.
    pub fn add(&mut self, template: LabelTemplate) {
        match self.templates.iter_mut().find(|t| t.name == template.name) {
            Some(existing) => *existing = template,
            None => self.templates.push(template),
        }
    }

    pub fn get(&self, name: &str) -> Option<&LabelTemplate> {
        self.templates.iter().find(|t| t.name == name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.templates.iter().map(|t| t.name.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn named_sizes() {
        assert_eq!(page_size("Letter"), Some((850.0, 1100.0)));
        assert_eq!(page_size("a4"), Some((827.0, 1169.0)));
        assert_eq!(page_size("Napkin"), None);
    }

    #[test]
    fn catalog_lookup_and_override() {
        let mut catalog = LabelCatalog::new();
        let t = catalog.get("Avery 5160").unwrap();
        assert_eq!((t.columns, t.rows), (3, 10));
        assert!(catalog.get("Avery 9999").is_none());

        catalog.add(LabelTemplate::builtin("Test 2x3", 2, 3, 400.0, 300.0, 25.0, 50.0, 0.0, 10.0));
        catalog.add(LabelTemplate::builtin("Avery 5160", 3, 9, 262.5, 100.0, 18.75, 50.0, 12.5, 0.0));
        assert_eq!(catalog.get("Test 2x3").map(|t| t.rows), Some(3));
        assert_eq!(catalog.get("Avery 5160").map(|t| t.rows), Some(9));
        assert_eq!(catalog.names().filter(|n| *n == "Avery 5160").count(), 1);
    }

    #[test]
    fn landscape_grid_swaps_axes() {
        let t = LabelTemplate::builtin("x", 2, 3, 400.0, 300.0, 25.0, 50.0, 5.0, 10.0);
        let p = LabelGrid::new(&t, true);
        assert_eq!((p.columns, p.rows), (2, 3));
        assert_eq!((p.cell_width, p.cell_height), (4.0, 3.0));
        assert_eq!((p.left, p.top), (0.25, 0.5));
        assert_eq!(p.per_page(), 6);

        let l = LabelGrid::new(&t, false);
        assert_eq!((l.columns, l.rows), (3, 2));
        assert_eq!((l.cell_width, l.cell_height), (3.0, 4.0));
        assert_eq!((l.x_gap, l.y_gap), (0.1, 0.05));
        assert_eq!((l.left, l.top), (0.5, 0.25));
    }
}
