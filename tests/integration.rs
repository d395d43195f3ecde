//! Integration tests for the rptflow pre-render pipeline.
//!
//! These drive the public API end to end with the in-memory query engine
//! and fixed-pitch metrics. They verify:
//! - JSON definitions and datasets generate the expected bands
//! - Group feet and subtotals follow key changes
//! - Page feet reserve space, pick the right variant and print page totals
//! - Label sheets tile rows into a grid and add pages when it fills
//! - Definition-level problems surface as errors before any page is built

use rptflow::backend::ListingBackend;
use rptflow::media::{LabelCatalog, LabelTemplate};
use rptflow::model::*;
use rptflow::query::memory::{Dataset, MemoryDatabase};
use rptflow::query::{Datum, ParameterList};
use rptflow::text::FixedPitchMetrics;
use rptflow::{generate, generate_json, Document, GenerateOptions, ReportError};

// ─── Helpers ────────────────────────────────────────────────────

fn metrics() -> FixedPitchMetrics {
    FixedPitchMetrics::fixed(0.1, 0.2)
}

fn label(text: &str) -> Element {
    Element::Label(LabelElement {
        rect: Rect::new(0.0, 0.0, 200.0, 20.0),
        string: text.to_string(),
        ..Default::default()
    })
}

fn field(query: &str, column: &str) -> FieldElement {
    FieldElement::new(Rect::new(0.0, 0.0, 200.0, 20.0), DataRef::new(query, column))
}

fn band(height: f64, elements: Vec<Element>) -> Option<Section> {
    Some(Section::new(height, elements))
}

fn small_page() -> PageSetup {
    PageSetup {
        size: "Custom".into(),
        custom_width: 4.0,
        custom_height: 3.0,
        margins: Margins::uniform(0.5),
        ..Default::default()
    }
}

fn numbered_rows(count: usize) -> MemoryDatabase {
    let mut set = Dataset::new(&["n"]);
    for i in 1..=count {
        set.push(vec![Datum::Int(i as i64)]);
    }
    let mut db = MemoryDatabase::new();
    db.insert("detail", set);
    db
}

fn detail_report(detail: Section) -> ReportDefinition {
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
            detail: Some(detail),
            ..Default::default()
        }],
        ..Default::default()
    }
}

fn run(def: &ReportDefinition, db: &MemoryDatabase) -> Document {
    generate(def, &GenerateOptions::default(), db, &metrics()).unwrap()
}

fn page_texts(doc: &Document, page: usize) -> Vec<String> {
    doc.pages[page].texts().map(|t| t.text.clone()).collect()
}

// ─── JSON pipeline ──────────────────────────────────────────────

const GROUPED_REPORT: &str = r#"{
  "name": "by_region",
  "title": "By Region",
  "queries": [{ "name": "detail" }],
  "sections": [{
    "key": { "query": "detail" },
    "groups": [{
      "name": "region",
      "column": "region",
      "head": { "height": 20, "elements": [
        { "type": "Field", "rect": { "x": 0, "y": 0, "width": 100, "height": 20 },
          "data": { "query": "detail", "column": "region" } }
      ]},
      "foot": { "height": 20, "elements": [
        { "type": "Field", "rect": { "x": 0, "y": 0, "width": 100, "height": 20 },
          "data": { "query": "detail", "column": "amount" },
          "trackTotal": true, "subTotal": true, "format": "%.2f" }
      ]}
    }],
    "detail": { "height": 20, "elements": [
      { "type": "Field", "rect": { "x": 0, "y": 0, "width": 100, "height": 20 },
        "data": { "query": "detail", "column": "amount" } }
    ]}
  }]
}"#;

const GROUPED_DATA: &str = r#"{
  "detail": [
    { "region": "East", "amount": 10 },
    { "region": "East", "amount": 20 },
    { "region": "West", "amount": 5 }
  ]
}"#;

#[test]
fn test_json_grouped_report() {
    let doc = generate_json(GROUPED_REPORT, GROUPED_DATA, &GenerateOptions::default()).unwrap();
    assert_eq!(doc.page_count(), 1);
    assert_eq!(doc.title, "By Region");
    let texts: Vec<&str> = doc.texts().map(|t| t.text.as_str()).collect();
    assert_eq!(texts, vec!["East", "10", "20", "30.00", "West", "5", "5.00"]);
}

#[test]
fn test_document_dump_is_json() {
    let doc = generate_json(GROUPED_REPORT, GROUPED_DATA, &GenerateOptions::default()).unwrap();
    let json: serde_json::Value = serde_json::from_str(&doc.to_json().unwrap()).unwrap();
    assert_eq!(json["pages"].as_array().map(Vec::len), Some(1));
}

#[test]
fn test_bad_json_is_a_parse_error() {
    let err = generate_json("{ \"sections\": 3 }", "{}", &GenerateOptions::default()).unwrap_err();
    assert!(matches!(err, ReportError::Parse { .. }));
}

#[test]
fn test_generation_is_repeatable() {
    let def: ReportDefinition = serde_json::from_str(GROUPED_REPORT).unwrap();
    let db = MemoryDatabase::from_json(GROUPED_DATA).unwrap();
    let first = ListingBackend::listing(&run(&def, &db));
    let second = ListingBackend::listing(&run(&def, &db));
    assert_eq!(first, second);
}

#[test]
fn test_group_break_splits_page_totals() {
    let mut def: ReportDefinition = serde_json::from_str(GROUPED_REPORT).unwrap();
    def.sections[0].groups[0].page_break = GroupBreak::AfterGroupFoot;
    let mut total = field("detail", "amount");
    total.track_total = true;
    total.sub_total = true;
    def.page_foot.any = band(20.0, vec![Element::Field(total)]);
    let db = MemoryDatabase::from_json(GROUPED_DATA).unwrap();

    let doc = run(&def, &db);
    assert_eq!(doc.page_count(), 2);
    assert_eq!(page_texts(&doc, 0), vec!["East", "10", "20", "30.00", "30"]);
    assert_eq!(page_texts(&doc, 1), vec!["West", "5", "5.00", "5"]);
}

// ─── Pagination ─────────────────────────────────────────────────

/// Detail rows a quarter inch tall on a 4x3 page with half-inch margins,
/// above a 0.2in page foot: seven rows fit per page.
fn paged_report() -> ReportDefinition {
    let mut def = detail_report(Section::new(25.0, vec![Element::Field(field("detail", "n"))]));
    def.page = small_page();
    def
}

#[test]
fn test_page_count_is_patched_everywhere() {
    let mut def = paged_report();
    let mut count = field("Context Query", "page_count");
    count.rect.x = 200.0;
    def.page_foot.any = band(
        20.0,
        vec![
            Element::Field(field("Context Query", "page_number")),
            Element::Field(count),
        ],
    );
    let doc = run(&def, &numbered_rows(20));
    assert_eq!(doc.page_count(), 3);
    for (i, page) in doc.pages.iter().enumerate() {
        let texts: Vec<&str> = page.texts().map(|t| t.text.as_str()).collect();
        let foot = &texts[texts.len() - 2..];
        assert_eq!(foot, [(i + 1).to_string().as_str(), "3"]);
    }
    assert_eq!(doc.pages[0].texts().count(), 7 + 2);
    assert_eq!(doc.pages[2].texts().count(), 6 + 2);
}

#[test]
fn test_page_foot_variants() {
    let mut def = paged_report();
    def.page_foot = PageBands {
        first: band(20.0, vec![label("first")]),
        odd: band(20.0, vec![label("odd")]),
        even: band(20.0, vec![label("even")]),
        ..Default::default()
    };
    let doc = run(&def, &numbered_rows(20));
    assert_eq!(doc.page_count(), 3);
    let feet: Vec<String> = (0..3)
        .map(|p| page_texts(&doc, p).pop().unwrap_or_default())
        .collect();
    assert_eq!(feet, vec!["first", "even", "odd"]);
}

#[test]
fn test_page_heads_on_every_page() {
    let mut def = paged_report();
    def.page_head.any = band(25.0, vec![label("head")]);
    let doc = run(&def, &numbered_rows(20));
    for page in &doc.pages {
        let first = page.texts().next().unwrap();
        assert_eq!(first.text, "head");
        assert!((first.rect.y - 0.5).abs() < 1e-9);
    }
    // the head takes one row's worth of space on each page
    assert_eq!(doc.pages[0].texts().count(), 1 + 6);
}

#[test]
fn test_oversize_row_overflows_instead_of_looping() {
    // a 4in row on a 3in page
    let def = {
        let mut def = detail_report(Section::new(400.0, vec![Element::Field(field("detail", "n"))]));
        def.page = small_page();
        def
    };
    let doc = run(&def, &numbered_rows(2));
    assert_eq!(doc.page_count(), 2);
    assert_eq!(page_texts(&doc, 0), vec!["1"]);
    assert_eq!(page_texts(&doc, 1), vec!["2"]);
}

#[test]
fn test_unbreakable_token_is_split() {
    let def = ReportDefinition {
        title: "abcdefgh".into(),
        report_head: band(
            20.0,
            vec![Element::Text(TextElement {
                rect: Rect::new(0.0, 0.0, 35.0, 20.0),
                data: DataRef::new("Context Query", "report_title"),
                ..Default::default()
            })],
        ),
        ..Default::default()
    };
    let doc = run(&def, &MemoryDatabase::new());
    let lines: Vec<(&str, f64)> = doc.texts().map(|t| (t.text.as_str(), t.rect.y)).collect();
    assert_eq!(lines.len(), 3);
    assert_eq!(
        lines.iter().map(|l| l.0).collect::<Vec<_>>(),
        vec!["abc", "def", "gh"]
    );
    assert!((lines[2].1 - 1.4).abs() < 1e-9);
}

// ─── Empty data ─────────────────────────────────────────────────

#[test]
fn test_zero_rows_keeps_report_bands() {
    let mut def = detail_report(Section::new(20.0, vec![label("row")]));
    def.sections[0].groups = vec![Group {
        name: "g".into(),
        column: "n".into(),
        head: band(20.0, vec![label("group head")]),
        foot: band(20.0, vec![label("group foot")]),
        ..Default::default()
    }];
    def.report_head = band(20.0, vec![label("report head")]);
    def.report_foot = band(20.0, vec![label("report foot")]);
    let doc = run(&def, &numbered_rows(0));
    assert_eq!(doc.page_count(), 1);
    assert_eq!(page_texts(&doc, 0), vec!["report head", "report foot"]);
}

// ─── Labels ─────────────────────────────────────────────────────

fn label_options() -> GenerateOptions {
    let mut labels = LabelCatalog::new();
    labels.add(LabelTemplate {
        name: "Test 2x3".into(),
        paper: "Letter".into(),
        columns: 2,
        rows: 3,
        width: 200.0,
        height: 100.0,
        start_x: 50.0,
        start_y: 50.0,
        x_gap: 25.0,
        y_gap: 0.0,
    });
    GenerateOptions {
        labels,
        ..Default::default()
    }
}

#[test]
fn test_label_grid_tiling() {
    let mut def = detail_report(Section::new(100.0, vec![Element::Field(field("detail", "n"))]));
    def.page = PageSetup {
        size: "Labels".into(),
        label_type: Some("Test 2x3".into()),
        ..Default::default()
    };
    let doc = generate(&def, &label_options(), &numbered_rows(7), &metrics()).unwrap();
    assert_eq!(doc.page_count(), 2);
    assert_eq!(doc.page_options.label_type.as_deref(), Some("Test 2x3"));

    let cells: Vec<(String, f64, f64)> = doc.pages[0]
        .texts()
        .map(|t| (t.text.clone(), t.rect.x, t.rect.y))
        .collect();
    assert_eq!(cells.len(), 6);
    let at = |i: usize| (cells[i].1, cells[i].2);
    assert_eq!(at(0), (0.5, 0.5));
    assert_eq!(at(1), (2.75, 0.5));
    assert_eq!(at(2), (0.5, 1.5));
    assert_eq!(at(5), (2.75, 2.5));
    assert_eq!(page_texts(&doc, 1), vec!["7"]);
}

#[test]
fn test_full_label_sheet_adds_no_blank_page() {
    let mut def = detail_report(Section::new(100.0, vec![Element::Field(field("detail", "n"))]));
    def.page = PageSetup {
        size: "Labels".into(),
        label_type: Some("Test 2x3".into()),
        ..Default::default()
    };
    let doc = generate(&def, &label_options(), &numbered_rows(6), &metrics()).unwrap();
    assert_eq!(doc.page_count(), 1);
}

// ─── Errors and options ─────────────────────────────────────────

#[test]
fn test_missing_parameters_abort_generation() {
    let mut def = detail_report(Section::new(20.0, vec![Element::Field(field("detail", "n"))]));
    def.queries[0].sql = r#"SELECT n FROM t WHERE y = <? value("year") ?>"#.into();
    let db = numbered_rows(1);

    let err = generate(&def, &GenerateOptions::default(), &db, &metrics()).unwrap_err();
    match err {
        ReportError::MissingParameters { query, names } => {
            assert_eq!(query, "detail");
            assert_eq!(names, vec!["year"]);
        }
        other => panic!("unexpected error: {other}"),
    }

    let mut params = ParameterList::new();
    params.parse_arg("year:int=2024");
    let options = GenerateOptions {
        params,
        ..Default::default()
    };
    assert!(generate(&def, &options, &db, &metrics()).is_ok());
}

#[test]
fn test_parameters_are_queryable() {
    let mut params = ParameterList::new();
    params.set("customer", Datum::from("ACME"));
    let def = ReportDefinition {
        report_head: band(
            20.0,
            vec![Element::Field(field("Parameter Query", "customer"))],
        ),
        ..Default::default()
    };
    let options = GenerateOptions {
        params,
        ..Default::default()
    };
    let doc = generate(&def, &options, &MemoryDatabase::new(), &metrics()).unwrap();
    assert_eq!(page_texts(&doc, 0), vec!["ACME"]);
}

#[test]
fn test_label_printer_listing() {
    let mut def = detail_report(Section::new(
        50.0,
        vec![Element::Rect(RectElement {
            rect: Rect::new(0.0, 0.0, 100.0, 50.0),
            fill: Some(Color::BLACK),
            ..Default::default()
        })],
    ));
    def.defined_params = vec![DefinedParam {
        name: "$ZEBRA".into(),
        values: vec![("dpi".into(), "203".into())],
    }];
    let doc = run(&def, &numbered_rows(1));
    assert_eq!(doc.printer_param("dpi"), Some("203"));
    let listing = ListingBackend::listing(&doc);
    assert!(listing.starts_with("document \"\" Zebra 1 page(s)\n"));
    assert!(listing.contains("  reverse (1.00, 1.00) 1.00x0.50\n"));
}
