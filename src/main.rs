//! # rptflow CLI
//!
//! Usage:
//!   rptflow report.json --data data.json -o document.json
//!   rptflow report.json --data data.json --param custid:int=42 --listing
//!   rptflow report.json -e --listing        (missing parameters print "Missing")
//!   rptflow report.json --font Helvetica=helv.ttf --font Helvetica:700=helvb.ttf
//!   rptflow --example > report.json
//!
//! Without `--font` text is measured with fixed-pitch metrics. A font spec
//! is `family[:weight][:italic]=path`.
//!
//! Log output goes to stderr. Set `RPTFLOW_LOG` to `error`, `warn`, `info`,
//! `debug` or `trace` (default `warn`).

use std::env;
use std::fs;
use std::process;

use log::{LevelFilter, Log, Metadata, Record};

use rptflow::backend::ListingBackend;
use rptflow::query::memory::MemoryDatabase;
use rptflow::query::{missing_parameters, Datum, ParameterList};
use rptflow::text::{FixedPitchMetrics, TextMeasurer, TtfMetrics};
use rptflow::{generate, GenerateOptions, ReportDefinition, ReportError};

struct StderrLogger;

impl Log for StderrLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &Record) {
        if self.enabled(record.metadata()) {
            eprintln!("[{}] {}", record.level(), record.args());
        }
    }

    fn flush(&self) {}
}

static LOGGER: StderrLogger = StderrLogger;

fn init_logging() {
    let level = env::var("RPTFLOW_LOG")
        .ok()
        .and_then(|v| v.parse::<LevelFilter>().ok())
        .unwrap_or(LevelFilter::Warn);
    if log::set_logger(&LOGGER).is_ok() {
        log::set_max_level(level);
    }
}

#[derive(Debug, Clone, PartialEq)]
struct FontSpec {
    family: String,
    weight: u32,
    italic: bool,
    path: String,
}

fn parse_font(spec: &str) -> Result<FontSpec, String> {
    let (face, path) = spec
        .split_once('=')
        .ok_or_else(|| format!("font '{spec}' needs family=path"))?;
    let mut parts = face.split(':');
    let family = parts.next().unwrap_or_default().to_string();
    let mut font = FontSpec {
        family,
        weight: 400,
        italic: false,
        path: path.to_string(),
    };
    for part in parts {
        match part {
            "italic" => font.italic = true,
            w => {
                font.weight = w
                    .parse()
                    .map_err(|_| format!("bad font weight '{w}' in '{spec}'"))?
            }
        }
    }
    if font.family.is_empty() || font.path.is_empty() {
        return Err(format!("font '{spec}' needs family=path"));
    }
    Ok(font)
}

#[derive(Debug, Default)]
struct Args {
    report: Option<String>,
    data: Option<String>,
    params: ParameterList,
    fonts: Vec<FontSpec>,
    fill_missing: bool,
    output: Option<String>,
    listing: bool,
}

fn parse_args(args: &[String]) -> Result<Args, String> {
    let mut parsed = Args::default();
    let mut iter = args.iter().skip(1);
    while let Some(arg) = iter.next() {
        let mut value = |flag: &str| {
            iter.next()
                .cloned()
                .ok_or_else(|| format!("{flag} needs a value"))
        };
        match arg.as_str() {
            "--data" => parsed.data = Some(value("--data")?),
            "--param" => parsed.params.parse_arg(&value("--param")?),
            "--font" => parsed.fonts.push(parse_font(&value("--font")?)?),
            "-o" => parsed.output = Some(value("-o")?),
            "-e" => parsed.fill_missing = true,
            "--listing" => parsed.listing = true,
            a if a.starts_with('-') => return Err(format!("unknown option '{a}'")),
            a => parsed.report = Some(a.to_string()),
        }
    }
    Ok(parsed)
}

fn load_fonts(fonts: &[FontSpec]) -> Result<TtfMetrics, ReportError> {
    let mut metrics = TtfMetrics::new();
    for font in fonts {
        metrics.register(&font.family, font.weight, font.italic, fs::read(&font.path)?)?;
        log::info!("loaded font {} {} from {}", font.family, font.weight, font.path);
    }
    Ok(metrics)
}

fn run(args: Args) -> Result<(), ReportError> {
    let report = args
        .report
        .ok_or_else(|| ReportError::InvalidDefinition("no report file given".to_string()))?;
    let def: ReportDefinition = serde_json::from_str(&fs::read_to_string(&report)?)?;
    let db = match &args.data {
        Some(path) => MemoryDatabase::from_json(&fs::read_to_string(path)?)?,
        None => MemoryDatabase::new(),
    };

    let mut params = args.params;
    if args.fill_missing {
        for query in &def.queries {
            for name in missing_parameters(&query.sql, &params) {
                log::info!("parameter '{name}' not given, using \"Missing\"");
                params.set(&name, Datum::Text("Missing".to_string()));
            }
        }
    }

    let options = GenerateOptions {
        params,
        ..Default::default()
    };
    let measurer: Box<dyn TextMeasurer> = if args.fonts.is_empty() {
        Box::new(FixedPitchMetrics::default())
    } else {
        Box::new(load_fonts(&args.fonts)?)
    };
    let doc = generate(&def, &options, &db, measurer.as_ref())?;

    let out = if args.listing {
        ListingBackend::listing(&doc)
    } else {
        doc.to_json()?
    };
    match &args.output {
        Some(path) => {
            fs::write(path, &out)?;
            eprintln!("Wrote {} page(s) to {path}", doc.page_count());
        }
        None => print!("{out}"),
    }
    Ok(())
}

fn main() {
    init_logging();
    let args: Vec<String> = env::args().collect();

    if args.iter().any(|a| a == "--example") {
        print!("{}", example_report_json());
        return;
    }

    let parsed = match parse_args(&args) {
        Ok(a) => a,
        Err(e) => {
            eprintln!("rptflow: {e}");
            process::exit(2);
        }
    };
    if let Err(e) = run(parsed) {
        eprintln!("rptflow: {e}");
        process::exit(1);
    }
}

fn example_report_json() -> &'static str {
    r##"{
  "name": "sales_by_region",
  "title": "Sales by Region",
  "page": { "size": "Letter", "margins": { "top": 0.5, "bottom": 0.5, "left": 0.75, "right": 0.75 } },
  "queries": [
    { "name": "detail", "sql": "SELECT region, customer, amount FROM sales WHERE year = <? value(\"year\") ?>" }
  ],
  "reportHead": {
    "height": 40,
    "elements": [
      { "type": "Field", "rect": { "x": 0, "y": 0, "width": 400, "height": 30 },
        "data": { "query": "Context Query", "column": "report_title" },
        "font": { "family": "Helvetica", "size": 18, "weight": 700 } }
    ]
  },
  "pageFoot": {
    "any": {
      "height": 20,
      "elements": [
        { "type": "Label", "rect": { "x": 0, "y": 0, "width": 100, "height": 20 }, "string": "Page total:" },
        { "type": "Field", "rect": { "x": 100, "y": 0, "width": 100, "height": 20 },
          "data": { "query": "detail", "column": "amount" },
          "trackTotal": true, "subTotal": true, "format": "%.2f" },
        { "type": "Field", "rect": { "x": 500, "y": 0, "width": 100, "height": 20 },
          "data": { "query": "Context Query", "column": "page_number" } }
      ]
    }
  },
  "sections": [
    {
      "name": "detail",
      "key": { "query": "detail" },
      "groups": [
        {
          "name": "region",
          "column": "region",
          "head": {
            "height": 25,
            "elements": [
              { "type": "Field", "rect": { "x": 0, "y": 5, "width": 300, "height": 20 },
                "data": { "query": "detail", "column": "region" },
                "font": { "family": "Helvetica", "size": 12, "weight": 700 } }
            ]
          },
          "foot": {
            "height": 25,
            "elements": [
              { "type": "Line", "start": { "x": 300, "y": 0 }, "end": { "x": 500, "y": 0 } },
              { "type": "Field", "rect": { "x": 400, "y": 5, "width": 100, "height": 20 },
                "data": { "query": "detail", "column": "amount" },
                "trackTotal": true, "subTotal": true, "builtinFormat": "money" }
            ]
          }
        }
      ],
      "detail": {
        "height": 20,
        "elements": [
          { "type": "Field", "rect": { "x": 20, "y": 0, "width": 300, "height": 20 },
            "data": { "query": "detail", "column": "customer" } },
          { "type": "Field", "rect": { "x": 400, "y": 0, "width": 100, "height": 20 },
            "data": { "query": "detail", "column": "amount" }, "builtinFormat": "money" }
        ]
      }
    }
  ]
}
"##
}
