//! Endpoint specification data model, parsing, and fingerprinting.
//!
//! A specification arrives as YAML or JSON text. Parsing is permissive about
//! unknown top-level fields (forward compatibility) and strict about the
//! parts the planner consumes: the API call table, the output section, and
//! the server list.

pub mod planner;

use crate::error::Error;
use crate::http::pagination::Pagination;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;

/// Where an argument is carried in the HTTP request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArgLocation {
    /// Path placeholder or query parameter, split at URL composition.
    Parameter,
    Header,
    /// JSON body member.
    Data,
}

/// Where an argument's value comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArgSource {
    Constant,
    Runtime,
    Reference,
}

/// HTTP method of an API call. `put` parses for compatibility but the
/// planner rejects it as unimplemented.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MethodKind {
    Get,
    Post,
    Put,
}

impl MethodKind {
    #[must_use]
    pub const fn as_reqwest(self) -> reqwest::Method {
        match self {
            Self::Get => reqwest::Method::GET,
            Self::Post => reqwest::Method::POST,
            Self::Put => reqwest::Method::PUT,
        }
    }
}

/// One argument of an API call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Argument {
    pub name: String,
    #[serde(rename = "argLocation")]
    pub location: ArgLocation,
    #[serde(rename = "type", default)]
    pub value_type: Option<String>,
    pub source: ArgSource,
    #[serde(default)]
    pub value: Value,
}

/// A `{api, path}` selector into a prerequisite call's output, used as the
/// value of a reference argument.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReferenceSelector {
    pub api: String,
    #[serde(default)]
    pub path: String,
}

/// One upstream API call definition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiCall {
    #[serde(rename = "type", default = "default_call_type")]
    pub call_type: String,
    pub endpoint: String,
    pub method: MethodKind,
    #[serde(default)]
    pub arguments: Vec<Argument>,
    #[serde(default)]
    pub pagination: Option<Pagination>,
}

fn default_call_type() -> String {
    "url".to_string()
}

/// Output selector: which API a dataset comes from and the JSON path to it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatasetSelector {
    pub api: String,
    #[serde(default)]
    pub path: String,
    #[serde(default)]
    pub metadata: Option<Vec<String>>,
}

/// One step of a field's transformation chain.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransformStep {
    pub function: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub params: BTreeMap<String, Value>,
}

/// How one export is produced: the input dataset and per-field chains.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportSpec {
    /// Input dataset name, or `"."` for the root dataset.
    pub dataframe: String,
    pub fields: BTreeMap<String, Vec<TransformStep>>,
}

/// Output section: dataset selectors plus export definitions.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Output {
    #[serde(default)]
    pub data: BTreeMap<String, DatasetSelector>,
    #[serde(default)]
    pub exports: BTreeMap<String, ExportSpec>,
    #[serde(rename = "runtimeType", default)]
    pub runtime_type: Option<String>,
    #[serde(default)]
    pub execution: Option<String>,
}

/// The `spec` block: call table, output section, default timeout.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallSpec {
    #[serde(rename = "apiCalls")]
    pub api_calls: BTreeMap<String, ApiCall>,
    pub output: Output,
    #[serde(default)]
    pub timeout: Option<u64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Metadata {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(rename = "inputPrompt", default)]
    pub input_prompt: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Server {
    pub url: String,
    #[serde(default)]
    pub description: Option<String>,
}

/// A parsed endpoint specification. Unknown top-level fields (`auth`,
/// `apiKey`, vendor extensions) are ignored.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EndpointSpec {
    #[serde(rename = "apiVersion", default)]
    pub api_version: Option<String>,
    #[serde(default)]
    pub kind: Option<String>,
    #[serde(default)]
    pub metadata: Metadata,
    pub spec: CallSpec,
    #[serde(default)]
    pub servers: Vec<Server>,
}

impl EndpointSpec {
    /// Parses a YAML or JSON specification string.
    ///
    /// # Errors
    ///
    /// Returns a spec error when the text is not valid YAML/JSON or the
    /// required structure is missing.
    pub fn parse(raw: &str) -> Result<Self, Error> {
        let value = raw_to_value(raw)?;
        serde_json::from_value(value).map_err(|e| Error::spec_invalid(e.to_string()))
    }
}

fn raw_to_value(raw: &str) -> Result<Value, Error> {
    serde_yaml::from_str::<Value>(raw).map_err(|e| Error::spec_invalid(e.to_string()))
}

/// Computes the response-cache fingerprint of a specification string.
///
/// The canonical form is compact JSON with sorted keys, lowercased, so two
/// spec strings differing only in key order, whitespace, or letter case map
/// to the same SHA-256 key. Numeric normalization is deliberately omitted.
///
/// # Errors
///
/// Returns a spec error when the text cannot be parsed.
pub fn fingerprint(raw: &str) -> Result<String, Error> {
    let value = raw_to_value(raw)?;
    // serde_json maps are sorted, so to_string is already canonical-ordered
    let canonical = value.to_string().to_lowercase();
    let mut hasher = Sha256::new();
    hasher.update(canonical.as_bytes());
    Ok(format!("{:x}", hasher.finalize()))
}
