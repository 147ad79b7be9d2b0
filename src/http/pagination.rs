//! Pagination descriptor and dot-path extraction.
//!
//! A descriptor names the strategy plus up to three companions: `nextPath`
//! (where the next-page URL lives in the body), `paginationParams` (request
//! parameter name → body path of its next value), and `paramTranslation`
//! (body paths to page size and total size, used to estimate the total page
//! count up front).

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Supported pagination strategies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaginationStrategy {
    #[serde(alias = "PAGE")]
    Page,
    #[serde(alias = "CURSOR")]
    Cursor,
    #[serde(alias = "OFFSET")]
    Offset,
    #[serde(alias = "KEYSET", alias = "seek", alias = "SEEK")]
    Keyset,
    #[serde(alias = "TIME")]
    Time,
}

/// Maps the page-counting parameters a strategy needs onto the response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParamTranslation {
    /// Name of the query parameter that carries the page number.
    #[serde(rename = "pageRef")]
    pub page_ref: String,
    /// Dot-path in the response body to the page size.
    #[serde(rename = "pageSizePath")]
    pub page_size_path: String,
    /// Dot-path in the response body to the total item count.
    #[serde(rename = "totalSizePath")]
    pub total_size_path: String,
}

/// Full pagination descriptor as written in an endpoint specification.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Pagination {
    #[serde(rename = "type", default)]
    pub strategy: Option<PaginationStrategy>,
    #[serde(rename = "nextPath", alias = "next_path", default)]
    pub next_path: Option<String>,
    #[serde(rename = "paginationParams", alias = "pagination_params", default)]
    pub pagination_params: Option<BTreeMap<String, String>>,
    #[serde(rename = "paramTranslation", alias = "param_translation", default)]
    pub param_translation: Option<ParamTranslation>,
}

/// Walks a dot-separated path through nested JSON objects.
///
/// Array indexing is deliberately unsupported; paths address object keys
/// only, and a non-object midway yields `None`.
#[must_use]
pub fn extract_json_path<'a>(data: &'a Value, path: &str) -> Option<&'a Value> {
    let mut current = data;
    for part in path.split('.') {
        current = current.as_object()?.get(part)?;
    }
    Some(current)
}

/// Renders a JSON value as a query-parameter string: string values keep
/// their content (no quotes), scalars use their JSON text.
#[must_use]
pub fn value_to_param(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
