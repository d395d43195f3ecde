//! # rptflow
//!
//! A banded report pre-render engine.
//!
//! A report definition describes bands (report head and foot, page heads
//! and feet, detail rows, group heads and feet) filled with positioned
//! elements bound to query columns. The engine walks the query rows and
//! places every band on a page, deciding page breaks band by band, so the
//! page boundary is respected while the document is built rather than
//! sliced in afterwards. Group totals, page totals and wrapping text all
//! follow the page they land on.
//!
//! ## Architecture
//!
//! ```text
//! ReportDefinition (JSON)      Database + TextMeasurer
//!          \                      /
//!           [layout]  pre-render engine
//!               |   detail driver -> section renderer -> text flow
//!               |   subtotal checkpoints per page / group
//!               v
//!           [document]  pages of positioned primitives (inches)
//!               |
//!           [backend]   devices, listings
//! ```
//!
//! Queries and text metrics are seams: the engine never runs SQL and never
//! reads font files itself. [`query::memory`] and [`text::FixedPitchMetrics`]
//! provide in-memory stand-ins.

pub mod backend;
pub mod document;
pub mod error;
pub mod format;
pub mod layout;
pub mod media;
pub mod model;
pub mod query;
pub mod subtotal;
pub mod text;

pub use document::Document;
pub use error::ReportError;
pub use layout::{generate, GenerateOptions, Translations};
pub use model::ReportDefinition;

use query::memory::MemoryDatabase;
use text::FixedPitchMetrics;

/// Generate a report from JSON: a definition and a dataset document
/// (`{ "query name": [ { "column": value, ... }, ... ] }`), measured with
/// fixed-pitch metrics.
pub fn generate_json(
    definition: &str,
    data: &str,
    options: &GenerateOptions,
) -> Result<Document, ReportError> {
    let def: ReportDefinition = serde_json::from_str(definition)?;
    let db = MemoryDatabase::from_json(data)?;
    generate(&def, options, &db, &FixedPitchMetrics::default())
}
