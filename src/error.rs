//! Structured error types for the rptflow pre-render engine.
//!
//! Only definition-level problems are errors. Data problems met while walking
//! rows (an empty query, a malformed image, an unknown barcode format) are
//! logged and recovered where they happen and never reach the caller.

use thiserror::Error;

/// The unified error type returned by the public generation API.
#[derive(Debug, Error)]
pub enum ReportError {
    /// JSON input failed to parse as a report definition or dataset.
    #[error("failed to parse input: {source}{}", hint_suffix(.hint))]
    Parse {
        #[source]
        source: serde_json::Error,
        hint: String,
    },

    /// The page setup names a label template the catalog does not know.
    #[error("unknown label template '{0}'")]
    UnknownLabelTemplate(String),

    /// A query references parameters that were not supplied.
    #[error("query '{query}' is missing parameters: {}", .names.join(", "))]
    MissingParameters { query: String, names: Vec<String> },

    /// The definition tree is structurally unusable.
    #[error("invalid report definition: {0}")]
    InvalidDefinition(String),

    /// Font data could not be parsed.
    #[error("font error: {0}")]
    Font(String),

    /// The query engine refused to open a query source.
    #[error("query error: {0}")]
    Query(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

fn hint_suffix(hint: &str) -> String {
    if hint.is_empty() {
        String::new()
    } else {
        format!("\n  Hint: {hint}")
    }
}

impl From<serde_json::Error> for ReportError {
    fn from(e: serde_json::Error) -> Self {
        let hint = match e.classify() {
            serde_json::error::Category::Syntax => {
                "Check for trailing commas, missing quotes, or unescaped characters.".to_string()
            }
            serde_json::error::Category::Data => {
                "The JSON is valid but doesn't match the report schema. Check field names and types."
                    .to_string()
            }
            serde_json::error::Category::Eof => {
                "Unexpected end of input, is the JSON truncated?".to_string()
            }
            serde_json::error::Category::Io => String::new(),
        };
        ReportError::Parse { source: e, hint }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_error_carries_hint() {
        let err: ReportError = serde_json::from_str::<serde_json::Value>("{\"a\": 1,}")
            .unwrap_err()
            .into();
        let msg = err.to_string();
        assert!(msg.contains("failed to parse input"));
        assert!(msg.contains("trailing commas"));
    }

    #[test]
    fn missing_parameters_lists_names() {
        let err = ReportError::MissingParameters {
            query: "detail".to_string(),
            names: vec!["custid".to_string(), "asof".to_string()],
        };
        assert_eq!(
            err.to_string(),
            "query 'detail' is missing parameters: custid, asof"
        );
    }
}
