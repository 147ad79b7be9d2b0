//! Runtime configuration models
//!
//! All settings are plain serde-deserializable structs with defaults, so an
//! embedder can build them from a config file, environment layer, or code.
//! `Settings::default()` yields a cacheless, identity-encoded runtime that
//! needs no external services — the configuration used by most tests.

use crate::serialize::Encoding;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Log output flavor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFlavor {
    Text,
    Json,
}

/// Logging settings: filter directive and output flavor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingSettings {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default = "default_log_flavor")]
    pub flavor: LogFlavor,
}

fn default_log_level() -> String {
    "info".to_string()
}

const fn default_log_flavor() -> LogFlavor {
    LogFlavor::Text
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            flavor: default_log_flavor(),
        }
    }
}

/// HTTP client budget: per-request timeout, page and retry bounds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpSettings {
    /// Per-request timeout in seconds. Overridden per call by the spec.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Upper bound on pages fetched per origin source.
    #[serde(default = "default_max_pages")]
    pub max_pages: usize,
    /// Attempts per single request before surfacing the last error.
    #[serde(default = "default_max_retries")]
    pub max_retries: usize,
    /// Base backoff in seconds; attempt `n` sleeps `retry_backoff * 2^n`.
    #[serde(default = "default_retry_backoff")]
    pub retry_backoff: f64,
}

const fn default_timeout_secs() -> u64 {
    10
}

const fn default_max_pages() -> usize {
    10
}

const fn default_max_retries() -> usize {
    3
}

const fn default_retry_backoff() -> f64 {
    0.5
}

impl Default for HttpSettings {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
            max_pages: default_max_pages(),
            max_retries: default_max_retries(),
            retry_backoff: default_retry_backoff(),
        }
    }
}

/// Selects a cache storage backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheBackendKind {
    Lru,
    Disk,
    Redis,
}

/// What a cache instance is used for. A routing hint only: it names the
/// disk subdirectory and the log context, never the behavior.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheRole {
    Response,
    Origin,
}

impl CacheRole {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Response => "response",
            Self::Origin => "origin",
        }
    }
}

/// Configuration for one cache tier (response or origin).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheSettings {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_cache_backend")]
    pub backend: CacheBackendKind,
    /// Capacity bound for the LRU backend.
    #[serde(default = "default_lru_max_items")]
    pub lru_max_items: usize,
    /// Directory root for the disk backend; the cache owns a per-role
    /// subdirectory beneath it.
    #[serde(default = "default_disk_path")]
    pub disk_path: PathBuf,
    /// Connection URL for the redis backend.
    #[serde(default = "default_redis_url")]
    pub redis_url: String,
    /// Default TTL in seconds for backends that support expiry.
    #[serde(default)]
    pub ttl_secs: Option<u64>,
}

const fn default_cache_backend() -> CacheBackendKind {
    CacheBackendKind::Lru
}

const fn default_lru_max_items() -> usize {
    1024
}

fn default_disk_path() -> PathBuf {
    PathBuf::from("./.cache")
}

fn default_redis_url() -> String {
    "redis://127.0.0.1:6379/".to_string()
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            backend: default_cache_backend(),
            lru_max_items: default_lru_max_items(),
            disk_path: default_disk_path(),
            redis_url: default_redis_url(),
            ttl_secs: None,
        }
    }
}

/// Top-level runtime settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub logging: LoggingSettings,
    #[serde(default)]
    pub http: HttpSettings,
    #[serde(default)]
    pub response_cache: CacheSettings,
    #[serde(default)]
    pub origin_cache: CacheSettings,
    /// Encoding used for the final response artifact (and response cache).
    #[serde(default)]
    pub response_encoding: Encoding,
    /// Encoding used for origin cache entries.
    #[serde(default)]
    pub origin_encoding: Encoding,
    /// Cap on plan entries produced by expanding one list-valued reference
    /// argument.
    #[serde(default = "default_max_reference_expansion")]
    pub max_reference_expansion: usize,
}

const fn default_max_reference_expansion() -> usize {
    20
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            logging: LoggingSettings::default(),
            http: HttpSettings::default(),
            response_cache: CacheSettings::default(),
            origin_cache: CacheSettings::default(),
            response_encoding: Encoding::default(),
            origin_encoding: Encoding::default(),
            max_reference_expansion: default_max_reference_expansion(),
        }
    }
}
