//! In-memory query engine over JSON row sets.
//!
//! A dataset file is a JSON object mapping query names to arrays of row
//! objects:
//!
//! ```json
//! { "detail": [ { "cust": "A", "amount": 10 }, { "cust": "B", "amount": 5 } ] }
//! ```
//!
//! The query text is not interpreted; a query is found by name.

use std::collections::HashMap;

use super::{Database, Datum, ParameterList, Query};
use crate::error::ReportError;

/// A named, ordered row set.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Dataset {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Datum>>,
}

impl Dataset {
    pub fn new(columns: &[&str]) -> Self {
        Self {
            columns: columns.iter().map(|c| c.to_string()).collect(),
            rows: Vec::new(),
        }
    }

    /// Append a row. Short rows are padded with nulls.
    pub fn push(&mut self, mut row: Vec<Datum>) {
        row.resize(self.columns.len(), Datum::Null);
        self.rows.push(row);
    }

    /// Build from an array of JSON row objects. Columns are the union of the
    /// row keys in first-seen order.
    pub fn from_json_rows(rows: &[serde_json::Value]) -> Self {
        let mut columns: Vec<String> = Vec::new();
        for row in rows {
            if let Some(obj) = row.as_object() {
                for key in obj.keys() {
                    if !columns.contains(key) {
                        columns.push(key.clone());
                    }
                }
            }
        }
        let rows = rows
            .iter()
            .map(|row| {
                columns
                    .iter()
                    .map(|c| row.get(c).map(Datum::from).unwrap_or_default())
                    .collect()
            })
            .collect();
        Self { columns, rows }
    }

    fn column_index(&self, column: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == column)
    }
}

/// A database holding every query result in memory.
#[derive(Debug, Clone, Default)]
pub struct MemoryDatabase {
    datasets: HashMap<String, Dataset>,
}

impl MemoryDatabase {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: &str, dataset: Dataset) {
        self.datasets.insert(name.to_string(), dataset);
    }

    /// Parse a dataset document.
    pub fn from_json(json: &str) -> Result<Self, ReportError> {
        let value: serde_json::Value = serde_json::from_str(json)?;
        let obj = value.as_object().ok_or_else(|| {
            ReportError::Query("dataset must be an object of query name to rows".to_string())
        })?;
        let mut db = Self::new();
        for (name, rows) in obj {
            let rows = rows.as_array().ok_or_else(|| {
                ReportError::Query(format!("dataset '{name}' must be an array of rows"))
            })?;
            db.insert(name, Dataset::from_json_rows(rows));
        }
        Ok(db)
    }
}

impl Database for MemoryDatabase {
    fn open(
        &self,
        name: &str,
        _sql: &str,
        _params: &ParameterList,
    ) -> Result<Box<dyn Query>, ReportError> {
        let dataset = self
            .datasets
            .get(name)
            .ok_or_else(|| ReportError::Query(format!("no data for query '{name}'")))?;
        Ok(Box::new(MemoryQuery::new(name, dataset.clone())))
    }

    fn format_value(&self, function: &str, value: f64) -> Option<String> {
        let (scale, decimals) = match function {
            "formatQty" | "formatMoney" | "formatExtPrice" | "formatWeight" => (1.0, 2),
            "formatCost" | "formatPrice" | "formatSalesPrice" | "formatPurchPrice" => (1.0, 4),
            "formatQtyPer" | "formatUOMRatio" => (1.0, 6),
            "formatPrcnt" => (100.0, 2),
            _ => return None,
        };
        Some(group_thousands(&format!("{:.*}", decimals, value * scale)))
    }
}

/// Insert `,` separators into the integer part of a formatted number.
fn group_thousands(number: &str) -> String {
    let (sign, body) = match number.strip_prefix('-') {
        Some(rest) => ("-", rest),
        None => ("", number),
    };
    let (int, frac) = match body.split_once('.') {
        Some((i, f)) => (i, Some(f)),
        None => (body, None),
    };
    let mut grouped = String::with_capacity(int.len() + int.len() / 3);
    for (i, ch) in int.chars().enumerate() {
        if i > 0 && (int.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }
    match frac {
        Some(f) => format!("{sign}{grouped}.{f}"),
        None => format!("{sign}{grouped}"),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Position {
    BeforeFirst,
    Row(usize),
    AfterLast,
}

/// A cursor over a [`Dataset`].
#[derive(Debug, Clone)]
pub struct MemoryQuery {
    name: String,
    data: Dataset,
    pos: Position,
    /// Prefix sums for tracked columns.
    totals: HashMap<String, Vec<f64>>,
}

impl MemoryQuery {
    pub fn new(name: &str, data: Dataset) -> Self {
        Self {
            name: name.to_string(),
            data,
            pos: Position::BeforeFirst,
            totals: HashMap::new(),
        }
    }

    /// The one-row query over the report parameters. Each parameter is a
    /// column under its name and under its 1-based position.
    pub fn from_parameters(name: &str, params: &ParameterList) -> Self {
        let mut data = Dataset::default();
        let mut row = Vec::new();
        for (i, (pname, value)) in params.iter().enumerate() {
            data.columns.push((i + 1).to_string());
            row.push(value.clone());
            data.columns.push(pname.to_string());
            row.push(value.clone());
        }
        data.rows.push(row);
        Self::new(name, data)
    }

    fn prefix_sums(&self, column: &str) -> Vec<f64> {
        let Some(idx) = self.data.column_index(column) else {
            return vec![0.0; self.data.rows.len()];
        };
        let mut acc = 0.0;
        self.data
            .rows
            .iter()
            .map(|row| {
                acc += row[idx].as_f64();
                acc
            })
            .collect()
    }
}

impl Query for MemoryQuery {
    fn name(&self) -> &str {
        &self.name
    }

    fn size(&self) -> usize {
        self.data.rows.len()
    }

    fn at(&self) -> Option<usize> {
        match self.pos {
            Position::Row(i) => Some(i),
            _ => None,
        }
    }

    fn first(&mut self) -> bool {
        if self.data.rows.is_empty() {
            self.pos = Position::AfterLast;
            return false;
        }
        self.pos = Position::Row(0);
        true
    }

    fn next(&mut self) -> bool {
        let next = match self.pos {
            Position::BeforeFirst => 0,
            Position::Row(i) => i + 1,
            Position::AfterLast => return false,
        };
        if next < self.data.rows.len() {
            self.pos = Position::Row(next);
            true
        } else {
            self.pos = Position::AfterLast;
            false
        }
    }

    fn prev(&mut self) -> bool {
        match self.pos {
            Position::BeforeFirst => false,
            Position::Row(0) => {
                self.pos = Position::BeforeFirst;
                false
            }
            Position::Row(i) => {
                self.pos = Position::Row(i - 1);
                true
            }
            Position::AfterLast => match self.data.rows.len() {
                0 => {
                    self.pos = Position::BeforeFirst;
                    false
                }
                n => {
                    self.pos = Position::Row(n - 1);
                    true
                }
            },
        }
    }

    fn seek(&mut self, row: usize) -> bool {
        if row < self.data.rows.len() {
            self.pos = Position::Row(row);
            true
        } else {
            false
        }
    }

    fn has_column(&self, column: &str) -> bool {
        self.data.column_index(column).is_some()
    }

    fn value(&self, column: &str) -> Option<Datum> {
        let row = self.at()?;
        let idx = self.data.column_index(column)?;
        self.data.rows.get(row).map(|r| r[idx].clone())
    }

    fn track_total(&mut self, column: &str) {
        if !self.totals.contains_key(column) {
            let sums = self.prefix_sums(column);
            self.totals.insert(column.to_string(), sums);
        }
    }

    fn running_total(&self, column: &str) -> f64 {
        let upto = match self.pos {
            Position::BeforeFirst => return 0.0,
            Position::Row(i) => i,
            Position::AfterLast => match self.data.rows.len() {
                0 => return 0.0,
                n => n - 1,
            },
        };
        match self.totals.get(column) {
            Some(sums) => sums.get(upto).copied().unwrap_or(0.0),
            None => self.prefix_sums(column).get(upto).copied().unwrap_or(0.0),
        }
    }
}
