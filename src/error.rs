//! Error handling module for the weft runtime
//!
//! This module provides a consolidated error handling system that categorizes
//! all runtime errors into a small set of kinds. The design follows these
//! principles:
//!
//! 1. **Error Consolidation**: internal errors map to one of the `ErrorKind`
//!    categories of the pipeline taxonomy (spec, resolve, fetch, cache,
//!    transform, encode)
//! 2. **Structured Context**: external errors (I/O, network, parsing) keep
//!    their source via `#[from]` conversions
//! 3. **Constructor Helpers**: call sites build errors through named
//!    constructors instead of assembling variants inline

use std::borrow::Cow;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    // Essential external errors that can't be consolidated
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),
    #[error("YAML parsing error: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),

    // Consolidated variant carrying the pipeline taxonomy
    #[error("{kind}: {message}")]
    Internal {
        kind: ErrorKind,
        message: Cow<'static, str>,
    },
}

/// Error categories mirroring the pipeline stages.
///
/// Every internal error belongs to exactly one category; the executor folds
/// all of them into the error envelope, except `Cache` which is absorbed by
/// the cache facade and only surfaces from the cache factory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Structurally invalid specification: parse failure, dependency cycle,
    /// unknown API reference, conflicting output selectors
    Spec,
    /// Argument resolution failure: unbound runtime argument
    Resolve,
    /// Origin fetch failure: retries exhausted, terminal status,
    /// unsupported content type, cross-host pagination
    Fetch,
    /// Cache backend or construction failure
    Cache,
    /// Transform failure: unknown function or function error
    Transform,
    /// Final-result encoding failure
    Encode,
}

impl ErrorKind {
    /// Get the string identifier for this error kind
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Spec => "Spec",
            Self::Resolve => "Resolve",
            Self::Fetch => "Fetch",
            Self::Cache => "Cache",
            Self::Transform => "Transform",
            Self::Encode => "Encode",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl Error {
    /// Returns the taxonomy kind for consolidated errors.
    #[must_use]
    pub const fn kind(&self) -> Option<ErrorKind> {
        match self {
            Self::Internal { kind, .. } => Some(*kind),
            _ => None,
        }
    }

    fn internal(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self::Internal {
            kind,
            message: Cow::Owned(message.into()),
        }
    }

    /// Create a structurally-invalid-spec error
    pub fn spec_invalid(reason: impl Into<String>) -> Self {
        Self::internal(ErrorKind::Spec, reason)
    }

    /// Create an unknown-API-reference error (output selector or argument
    /// reference names an API absent from the call table)
    pub fn unknown_api(api: impl Into<String>, referrer: impl Into<String>) -> Self {
        Self::internal(
            ErrorKind::Spec,
            format!(
                "'{}' references API '{}', not in the api calls list",
                referrer.into(),
                api.into()
            ),
        )
    }

    /// Create a dependency-cycle error, reporting the APIs left unordered
    pub fn dependency_cycle(apis: &[String]) -> Self {
        Self::internal(
            ErrorKind::Spec,
            format!("dependency cycle among API calls: {}", apis.join(", ")),
        )
    }

    /// Create an unbound-runtime-argument error
    pub fn unbound_runtime_arg(api: impl Into<String>, arg: impl Into<String>) -> Self {
        Self::internal(
            ErrorKind::Resolve,
            format!(
                "runtime argument '{}' of API '{}' has no bound value",
                arg.into(),
                api.into()
            ),
        )
    }

    /// Create a missing-path-parameter error (URL template placeholder with
    /// no argument to fill it)
    pub fn missing_path_parameter(name: impl Into<String>) -> Self {
        Self::internal(
            ErrorKind::Resolve,
            format!("missing path parameter '{}'", name.into()),
        )
    }

    /// Create an output-selector-path-not-found error
    pub fn selector_not_found(dataset: impl Into<String>, path: impl Into<String>) -> Self {
        Self::internal(
            ErrorKind::Fetch,
            format!(
                "output selector for dataset '{}' found nothing at path '{}'",
                dataset.into(),
                path.into()
            ),
        )
    }

    /// Create a fetch-failed error for a concrete URL
    pub fn fetch_failed(url: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::internal(
            ErrorKind::Fetch,
            format!("failed to fetch data from {}: {}", url.into(), reason.into()),
        )
    }

    /// Create a retries-exhausted error
    pub fn retries_exhausted(url: impl Into<String>, attempts: usize, last: impl Into<String>) -> Self {
        Self::internal(
            ErrorKind::Fetch,
            format!(
                "no good response from {} after {} attempts: {}",
                url.into(),
                attempts,
                last.into()
            ),
        )
    }

    /// Create the no-data error: every origin call completed yet no dataset
    /// was produced
    pub fn no_origin_data() -> Self {
        Self::internal(ErrorKind::Fetch, "could not get endpoint data")
    }

    /// Create an unsupported-content-type error (pagination requires JSON)
    pub fn unsupported_content_type(content_type: impl Into<String>) -> Self {
        Self::internal(
            ErrorKind::Fetch,
            format!("unsupported media type: {}", content_type.into()),
        )
    }

    /// Create a cache construction/backend error
    pub fn cache_failed(reason: impl Into<String>) -> Self {
        Self::internal(ErrorKind::Cache, reason)
    }

    /// Create a transform-failed error
    pub fn transform_failed(reason: impl Into<String>) -> Self {
        Self::internal(ErrorKind::Transform, reason)
    }

    /// Create an unknown-transform-function error
    pub fn unknown_transform(name: impl Into<String>) -> Self {
        Self::internal(
            ErrorKind::Transform,
            format!("unsupported function: {}", name.into()),
        )
    }

    /// Create an encode-failed error
    pub fn encode_failed(reason: impl Into<String>) -> Self {
        Self::internal(ErrorKind::Encode, reason)
    }
}
