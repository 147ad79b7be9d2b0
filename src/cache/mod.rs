//! Pluggable keyed blob store with TTL and a validator sidecar protocol.
//!
//! Two levels of abstraction:
//!
//! - [`CacheBackend`] — dyn-compatible trait over raw [`Payload`] operations,
//!   implemented by the LRU, disk, and redis backends
//! - [`Cache`] — the facade wrapping a backend and a [`Serializer`], adding
//!   hit/miss accounting and the `::headers` validator sidecar
//!
//! Backends are selected by a tagged variant in configuration; construction
//! goes through [`create_cache`], which enforces the encoding capability
//! policy and runs async initialization where a backend needs it.

pub mod disk;
pub mod facade;
pub mod lru;
pub mod redis;

use crate::config::{CacheBackendKind, CacheRole, CacheSettings};
use crate::error::Error;
use crate::serialize::{Encoding, Payload, Serializer};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub use facade::Cache;

/// Revalidation material cached alongside a body entry.
///
/// Stored under the body key suffixed with `::headers`. A sidecar without a
/// live body entry is inert: readers must treat it as absent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Validators {
    pub etag: Option<String>,
    pub last_modified: Option<String>,
}

impl Validators {
    /// True when neither validator is present.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.etag.is_none() && self.last_modified.is_none()
    }
}

/// Raw keyed storage contract implemented by every backend.
///
/// All operations are asynchronous for parity across backends, even where
/// the underlying store is synchronous. Backend failures carry
/// [`ErrorKind::Cache`](crate::error::ErrorKind::Cache); the facade decides
/// whether they are fatal.
#[async_trait]
pub trait CacheBackend: Send + Sync {
    /// Reads a stored payload. `Ok(None)` is a miss.
    async fn get(&self, key: &str) -> Result<Option<Payload>, Error>;

    /// Stores a payload, optionally bounded by a TTL. Backends without
    /// expiry support ignore the TTL.
    async fn set(&self, key: &str, value: Payload, ttl: Option<Duration>) -> Result<(), Error>;

    /// Removes a key. Removing an absent key is not an error.
    async fn delete(&self, key: &str) -> Result<(), Error>;

    /// Whether a key currently exists (without promoting or decoding it).
    async fn has(&self, key: &str) -> Result<bool, Error>;

    /// Enumerates the stored keys.
    async fn keys(&self) -> Result<Vec<String>, Error>;

    /// Drops every entry.
    async fn clear(&self) -> Result<(), Error>;

    /// Verifies readiness for backends that need a live connection.
    async fn init(&self) -> Result<(), Error> {
        Ok(())
    }

    /// Stable identifier used in logs and `describe` output.
    fn backend_id(&self) -> &'static str;
}

/// Whether a backend kind stores opaque bytes and therefore needs an
/// encoding-capable serializer.
#[must_use]
pub const fn requires_encoding(kind: CacheBackendKind) -> bool {
    match kind {
        CacheBackendKind::Lru => false,
        CacheBackendKind::Disk | CacheBackendKind::Redis => true,
    }
}

/// Whether a backend kind must be initialized (pinged) before first use.
#[must_use]
pub const fn requires_async_init(kind: CacheBackendKind) -> bool {
    matches!(kind, CacheBackendKind::Redis)
}

/// Builds a cache facade from configuration.
///
/// # Errors
///
/// Returns a cache error when the backend requires encoding but the chosen
/// serializer cannot encode, when the disk directory cannot be created, or
/// when an async-init backend fails its readiness check.
pub async fn create_cache(
    settings: &CacheSettings,
    encoding: Encoding,
    role: CacheRole,
) -> Result<Cache, Error> {
    let serializer = Serializer::new(encoding);

    if requires_encoding(settings.backend) && !serializer.supports_encoding() {
        return Err(Error::cache_failed(format!(
            "{:?} backend requires encoding, but the {:?} serializer does not support it",
            settings.backend, encoding
        )));
    }

    let backend: Box<dyn CacheBackend> = match settings.backend {
        CacheBackendKind::Lru => Box::new(lru::LruBackend::new(settings.lru_max_items)?),
        CacheBackendKind::Disk => Box::new(disk::DiskBackend::new(
            settings.disk_path.join(role.as_str()),
        )?),
        CacheBackendKind::Redis => Box::new(redis::RedisBackend::connect(&settings.redis_url).await?),
    };

    if requires_async_init(settings.backend) {
        backend.init().await?;
    }

    let ttl = settings.ttl_secs.map(Duration::from_secs);
    Ok(Cache::new(backend, serializer, role, ttl))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CacheSettings;

    #[tokio::test]
    async fn lru_accepts_identity_serializer() {
        let settings = CacheSettings {
            enabled: true,
            backend: CacheBackendKind::Lru,
            ..CacheSettings::default()
        };
        let cache = create_cache(&settings, Encoding::Identity, CacheRole::Response).await;
        assert!(cache.is_ok());
    }

    #[tokio::test]
    async fn disk_rejects_identity_serializer() {
        let dir = tempfile::tempdir().unwrap();
        let settings = CacheSettings {
            enabled: true,
            backend: CacheBackendKind::Disk,
            disk_path: dir.path().to_path_buf(),
            ..CacheSettings::default()
        };
        let result = create_cache(&settings, Encoding::Identity, CacheRole::Origin).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn disk_accepts_binary_serializer() {
        let dir = tempfile::tempdir().unwrap();
        let settings = CacheSettings {
            enabled: true,
            backend: CacheBackendKind::Disk,
            disk_path: dir.path().to_path_buf(),
            ..CacheSettings::default()
        };
        let result = create_cache(&settings, Encoding::Binary, CacheRole::Origin).await;
        assert!(result.is_ok());
    }

    #[test]
    fn capability_table() {
        assert!(!requires_encoding(CacheBackendKind::Lru));
        assert!(requires_encoding(CacheBackendKind::Disk));
        assert!(requires_encoding(CacheBackendKind::Redis));
        assert!(requires_async_init(CacheBackendKind::Redis));
        assert!(!requires_async_init(CacheBackendKind::Lru));
    }
}
