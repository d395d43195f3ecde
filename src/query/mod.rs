//! # Query Engine Seam
//!
//! The layout engine never executes query text itself. It asks a
//! [`Database`] to open a named query with the report parameters and then
//! walks the returned [`Query`] cursor: positioning, reading column values and
//! reading running totals.
//!
//! Two query names are reserved. `Context Query` exposes values the engine
//! knows about itself (page number, report title, ...) and never reaches the
//! database. `Parameter Query` exposes the parameter list as a one-row
//! result set.
//!
//! [`memory`] provides an in-memory engine over JSON row sets, used by the
//! CLI and the tests.

pub mod memory;

use std::fmt;
use std::sync::OnceLock;

use regex::Regex;

use crate::error::ReportError;

/// Name of the pseudo-query resolved from generation state.
pub const CONTEXT_QUERY: &str = "Context Query";
/// Name of the built-in query over the parameter list.
pub const PARAMETER_QUERY: &str = "Parameter Query";

/// A single column value.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Datum {
    #[default]
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    Bytes(Vec<u8>),
}

impl Datum {
    pub fn is_null(&self) -> bool {
        matches!(self, Datum::Null)
    }

    /// Display form used when a value is printed.
    pub fn as_text(&self) -> String {
        match self {
            Datum::Null => String::new(),
            Datum::Bool(b) => b.to_string(),
            Datum::Int(i) => i.to_string(),
            Datum::Float(f) => crate::format::number_text(*f),
            Datum::Text(s) => s.clone(),
            Datum::Bytes(b) => String::from_utf8_lossy(b).into_owned(),
        }
    }

    /// Numeric value, when the datum has one. Text is parsed.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Datum::Int(i) => Some(*i as f64),
            Datum::Float(f) => Some(*f),
            Datum::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
            Datum::Text(s) => s.trim().parse::<f64>().ok(),
            Datum::Null | Datum::Bytes(_) => None,
        }
    }

    /// Numeric value with non-numbers counted as zero, as running totals do.
    pub fn as_f64(&self) -> f64 {
        self.as_number().unwrap_or(0.0)
    }
}

impl fmt::Display for Datum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.as_text())
    }
}

impl From<&serde_json::Value> for Datum {
    fn from(v: &serde_json::Value) -> Self {
        use serde_json::Value;
        match v {
            Value::Null => Datum::Null,
            Value::Bool(b) => Datum::Bool(*b),
            Value::Number(n) => match n.as_i64() {
                Some(i) => Datum::Int(i),
                None => Datum::Float(n.as_f64().unwrap_or(0.0)),
            },
            Value::String(s) => Datum::Text(s.clone()),
            Value::Array(items) => Datum::Bytes(
                items
                    .iter()
                    .map(|i| i.as_u64().unwrap_or(0).min(255) as u8)
                    .collect(),
            ),
            Value::Object(_) => Datum::Text(v.to_string()),
        }
    }
}

impl From<&str> for Datum {
    fn from(s: &str) -> Self {
        Datum::Text(s.to_string())
    }
}

impl From<f64> for Datum {
    fn from(f: f64) -> Self {
        Datum::Float(f)
    }
}

impl From<i64> for Datum {
    fn from(i: i64) -> Self {
        Datum::Int(i)
    }
}

/// A cursor over an ordered result set.
///
/// Rows are addressed by zero-based index. The cursor starts before the
/// first row. `next` past the last row leaves the cursor after the last row,
/// from where `prev` returns to the last row.
pub trait Query {
    fn name(&self) -> &str;

    /// Number of rows.
    fn size(&self) -> usize;

    /// Current row index, `None` when the cursor is not on a row.
    fn at(&self) -> Option<usize>;

    fn first(&mut self) -> bool;
    fn next(&mut self) -> bool;
    fn prev(&mut self) -> bool;

    /// Position the cursor on `row`. Returns false, leaving the cursor where
    /// it was, when the row does not exist.
    fn seek(&mut self, row: usize) -> bool;

    fn is_valid(&self) -> bool {
        self.at().is_some()
    }

    fn has_column(&self, column: &str) -> bool;

    /// Value of `column` on the current row. `None` when the cursor is not
    /// on a row or the column does not exist.
    fn value(&self, column: &str) -> Option<Datum>;

    /// Ask the engine to maintain a running total for `column`.
    fn track_total(&mut self, column: &str);

    /// Sum of `column` over every row up to and including the current one.
    /// Zero before the first row, the full sum after the last.
    fn running_total(&self, column: &str) -> f64;
}

/// A source of queries.
pub trait Database {
    /// Open `sql` under `name` with the report parameters bound.
    fn open(
        &self,
        name: &str,
        sql: &str,
        params: &ParameterList,
    ) -> Result<Box<dyn Query>, ReportError>;

    /// Run a named formatting function over a value, the way a report
    /// database formats quantities and money. `None` when the function is
    /// unknown.
    fn format_value(&self, function: &str, value: f64) -> Option<String>;
}

/// Ordered, named report parameters.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParameterList {
    entries: Vec<(String, Datum)>,
}

impl ParameterList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a parameter, keeping first-insertion order.
    pub fn set(&mut self, name: &str, value: Datum) {
        match self.entries.iter_mut().find(|(n, _)| n == name) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((name.to_string(), value)),
        }
    }

    pub fn get(&self, name: &str) -> Option<&Datum> {
        self.entries.iter().find(|(n, _)| n == name).map(|(_, v)| v)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Datum)> {
        self.entries.iter().map(|(n, v)| (n.as_str(), v))
    }

    /// Parse a `[+-]name[:type][=value]` command-line argument. A leading
    /// `-` marks the parameter inactive and it is skipped. Types are
    /// `string`, `int`, `double` and `bool`; untyped values are text and a
    /// missing value is boolean true.
    pub fn parse_arg(&mut self, arg: &str) {
        let (active, rest) = match arg.as_bytes().first() {
            Some(b'-') => (false, &arg[1..]),
            Some(b'+') => (true, &arg[1..]),
            _ => (true, arg),
        };
        if !active {
            return;
        }
        let (decl, value) = match rest.split_once('=') {
            Some((d, v)) => (d, Some(v)),
            None => (rest, None),
        };
        let (name, ty) = match decl.split_once(':') {
            Some((n, t)) => (n, t.to_ascii_lowercase()),
            None => (decl, String::new()),
        };
        let datum = match (value, ty.as_str()) {
            (None, _) => Datum::Bool(true),
            (Some(v), "int") => v.parse().map(Datum::Int).unwrap_or(Datum::Null),
            (Some(v), "double") => v.parse().map(Datum::Float).unwrap_or(Datum::Null),
            (Some(v), "bool") => Datum::Bool(matches!(v, "true" | "1" | "yes")),
            (Some(v), _) => Datum::Text(v.to_string()),
        };
        self.set(name, datum);
    }
}

fn tag_patterns() -> Option<&'static (Regex, Regex)> {
    static PATTERNS: OnceLock<Option<(Regex, Regex)>> = OnceLock::new();
    PATTERNS
        .get_or_init(|| {
            let tag = Regex::new(r"(?s)<\?(.*?)\?>").ok()?;
            let call = Regex::new(r#"\b(value|literal|exists)\s*\(\s*["']([^"']*)["']"#).ok()?;
            Some((tag, call))
        })
        .as_ref()
}

/// Every `(function, parameter)` reference inside `<? ... ?>` tags, in
/// source order.
fn scan_tags(sql: &str) -> Vec<(String, String)> {
    let Some((tag, call)) = tag_patterns() else {
        return Vec::new();
    };
    tag.captures_iter(sql)
        .flat_map(|t| {
            let body = t.get(1).map_or("", |m| m.as_str());
            call.captures_iter(body)
                .map(|c| (c[1].to_string(), c[2].to_string()))
                .collect::<Vec<_>>()
        })
        .collect()
}

/// Names referenced by MetaSQL `<? value("name") ?>` style tags in `sql`,
/// in first-seen order.
pub fn referenced_parameters(sql: &str) -> Vec<String> {
    let mut names: Vec<String> = Vec::new();
    for (_, name) in scan_tags(sql) {
        if !names.contains(&name) {
            names.push(name);
        }
    }
    names
}

/// Parameters referenced by `sql` through `value(...)` tags that `params`
/// does not supply. `exists` and `literal` tags are optional by nature.
pub fn missing_parameters(sql: &str, params: &ParameterList) -> Vec<String> {
    let mut missing: Vec<String> = Vec::new();
    for (func, name) in scan_tags(sql) {
        if func == "value" && !params.contains(&name) && !missing.contains(&name) {
            missing.push(name);
        }
    }
    missing
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn datum_text_and_numbers() {
        assert_eq!(Datum::Int(42).as_text(), "42");
        assert_eq!(Datum::Float(2.5).as_text(), "2.5");
        assert_eq!(Datum::Float(3.0).as_text(), "3");
        assert_eq!(Datum::Null.as_text(), "");
        assert_eq!(Datum::Text(" 7.25 ".into()).as_number(), Some(7.25));
        assert_eq!(Datum::Text("abc".into()).as_number(), None);
        assert_eq!(Datum::Text("abc".into()).as_f64(), 0.0);
    }

    #[test]
    fn datum_from_json() {
        let v: serde_json::Value = serde_json::json!([1, "x", 2.5, null, true, [104, 105]]);
        let items: Vec<Datum> = v.as_array().unwrap().iter().map(Datum::from).collect();
        assert_eq!(
            items,
            vec![
                Datum::Int(1),
                Datum::Text("x".into()),
                Datum::Float(2.5),
                Datum::Null,
                Datum::Bool(true),
                Datum::Bytes(b"hi".to_vec()),
            ]
        );
    }

    #[test]
    fn parameter_args() {
        let mut p = ParameterList::new();
        p.parse_arg("custid:int=42");
        p.parse_arg("+asof=2024-01-01");
        p.parse_arg("-ignored=1");
        p.parse_arg("showcosts");
        p.parse_arg("rate:double=0.5");
        assert_eq!(p.get("custid"), Some(&Datum::Int(42)));
        assert_eq!(p.get("asof"), Some(&Datum::Text("2024-01-01".into())));
        assert!(!p.contains("ignored"));
        assert_eq!(p.get("showcosts"), Some(&Datum::Bool(true)));
        assert_eq!(p.get("rate"), Some(&Datum::Float(0.5)));
        assert_eq!(p.len(), 4);
    }

    #[test]
    fn set_replaces_in_place() {
        let mut p = ParameterList::new();
        p.set("a", Datum::Int(1));
        p.set("b", Datum::Int(2));
        p.set("a", Datum::Int(3));
        let names: Vec<&str> = p.iter().map(|(n, _)| n).collect();
        assert_eq!(names, vec!["a", "b"]);
        assert_eq!(p.get("a"), Some(&Datum::Int(3)));
    }

    #[test]
    fn metasql_scan() {
        let sql = r#"SELECT * FROM cust WHERE id = <? value("custid") ?>
            <? if exists("showall") ?> OR true <? endif ?>
            AND d > <? value('asof') ?> AND e = <? value("custid") ?>"#;
        assert_eq!(
            referenced_parameters(sql),
            vec!["custid".to_string(), "showall".to_string(), "asof".to_string()]
        );

        let mut params = ParameterList::new();
        params.set("custid", Datum::Int(1));
        assert_eq!(missing_parameters(sql, &params), vec!["asof".to_string()]);
        params.set("asof", Datum::Text("2024".into()));
        assert!(missing_parameters(sql, &params).is_empty());
    }

    #[test]
    fn unterminated_tag_is_ignored() {
        assert!(referenced_parameters("SELECT <? value(\"x\")").is_empty());
    }

    #[test]
    fn metasql_calls_need_a_word_boundary() {
        let sql = r#"<? myvalue("a") ?> <? foreach( 'b' ) ?> <? literal ( 'c' ) ?>"#;
        assert_eq!(referenced_parameters(sql), vec!["c".to_string()]);
    }
}
