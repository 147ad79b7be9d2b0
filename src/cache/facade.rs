//! Cache facade: serializer composition, accounting, validator sidecar.
//!
//! The facade owns the protocol details the backends stay ignorant of:
//!
//! - values are encoded on `set` and decoded on `get`;
//! - a nil encoded body is never written (no tombstones);
//! - `hits` counts only gets that decode to a non-nil value, `misses`
//!   counts gets where the backend had nothing;
//! - validators live under the data key suffixed with `::headers`, written
//!   after the body; a sidecar whose body entry is gone is reported absent;
//! - backend failures degrade: a failing `get` is a miss, a failing `set`
//!   is logged and swallowed. The cache is best-effort by contract.

use crate::cache::{CacheBackend, Validators};
use crate::config::CacheRole;
use crate::constants::VALIDATORS_KEY_SUFFIX;
use crate::error::Error;
use crate::serialize::{Payload, Serializer};
use crate::stats::{CacheStats, CacheStatsSnapshot};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Forms the sidecar key for a data key.
#[must_use]
pub fn validators_key(data_key: &str) -> String {
    format!("{data_key}{VALIDATORS_KEY_SUFFIX}")
}

pub struct Cache {
    backend: Box<dyn CacheBackend>,
    serializer: Serializer,
    role: CacheRole,
    default_ttl: Option<Duration>,
    stats: Arc<CacheStats>,
}

impl Cache {
    #[must_use]
    pub fn new(
        backend: Box<dyn CacheBackend>,
        serializer: Serializer,
        role: CacheRole,
        default_ttl: Option<Duration>,
    ) -> Self {
        Self {
            backend,
            serializer,
            role,
            default_ttl,
            stats: Arc::new(CacheStats::default()),
        }
    }

    #[must_use]
    pub const fn role(&self) -> CacheRole {
        self.role
    }

    #[must_use]
    pub fn backend_id(&self) -> &'static str {
        self.backend.backend_id()
    }

    #[must_use]
    pub fn stats(&self) -> CacheStatsSnapshot {
        self.stats.snapshot()
    }

    /// Looks up and decodes the body stored under `key`.
    ///
    /// Returns `None` on miss, on decode failure, and on backend failure;
    /// the latter two are logged.
    pub async fn get_data(&self, key: &str) -> Option<Value> {
        let payload = match self.backend.get(key).await {
            Ok(Some(payload)) => payload,
            Ok(None) => {
                self.stats.record_miss();
                return None;
            }
            Err(e) => {
                warn!(role = self.role.as_str(), key, error = %e, "cache get failed, treating as miss");
                self.stats.record_miss();
                return None;
            }
        };

        match self.serializer.decode(&payload) {
            Ok(Some(value)) => {
                self.stats.record_hit();
                Some(value)
            }
            Ok(None) => None,
            Err(e) => {
                warn!(role = self.role.as_str(), key, error = %e, "cache entry failed to decode");
                None
            }
        }
    }

    /// Looks up an already-encoded artifact without decoding it.
    ///
    /// Used by the response cache, which stores the final encoded result
    /// rather than an intermediate shape. Counted like `get_data`.
    pub async fn get_payload(&self, key: &str) -> Option<Payload> {
        match self.backend.get(key).await {
            Ok(Some(payload)) => {
                self.stats.record_hit();
                Some(payload)
            }
            Ok(None) => {
                self.stats.record_miss();
                None
            }
            Err(e) => {
                warn!(role = self.role.as_str(), key, error = %e, "cache get failed, treating as miss");
                self.stats.record_miss();
                None
            }
        }
    }

    /// Stores an already-encoded artifact as-is. Best-effort, like `set`.
    pub async fn set_payload(&self, key: &str, payload: Payload, ttl: Option<Duration>) {
        let ttl = ttl.or(self.default_ttl);
        if let Err(e) = self.backend.set(key, payload, ttl).await {
            warn!(role = self.role.as_str(), key, error = %e, "cache set failed");
            return;
        }
        self.stats.record_set();
    }

    /// Looks up the body and its validator sidecar.
    ///
    /// A sidecar without a body entry is reported absent: callers never see
    /// validators for data that no longer exists.
    pub async fn get_data_with_validators(&self, key: &str) -> (Option<Value>, Option<Validators>) {
        let data = self.get_data(key).await;
        if data.is_none() {
            return (None, None);
        }
        let validators = self.get_validators(key).await;
        (data, validators)
    }

    /// Reads the validator sidecar alone. Not counted in hit/miss stats.
    pub async fn get_validators(&self, key: &str) -> Option<Validators> {
        let payload = match self.backend.get(&validators_key(key)).await {
            Ok(Some(payload)) => payload,
            Ok(None) => return None,
            Err(e) => {
                warn!(role = self.role.as_str(), key, error = %e, "validator sidecar get failed");
                return None;
            }
        };

        let value = match self.serializer.decode(&payload) {
            Ok(Some(value)) => value,
            Ok(None) => return None,
            Err(e) => {
                warn!(role = self.role.as_str(), key, error = %e, "validator sidecar failed to decode");
                return None;
            }
        };

        serde_json::from_value(value).ok()
    }

    /// Encodes and stores a body, then its validators when provided.
    ///
    /// Best-effort: nil encodings are skipped, backend failures are logged
    /// and swallowed. The body write always precedes the sidecar write.
    pub async fn set(
        &self,
        key: &str,
        value: &Value,
        validators: Option<&Validators>,
        ttl: Option<Duration>,
    ) {
        let payload = match self.serializer.encode(value) {
            Ok(Some(payload)) => payload,
            Ok(None) => {
                debug!(role = self.role.as_str(), key, "value is nil, won't cache");
                return;
            }
            Err(e) => {
                warn!(role = self.role.as_str(), key, error = %e, "cache encode failed, skipping set");
                return;
            }
        };

        let ttl = ttl.or(self.default_ttl);
        if let Err(e) = self.backend.set(key, payload, ttl).await {
            warn!(role = self.role.as_str(), key, error = %e, "cache set failed");
            return;
        }
        self.stats.record_set();

        if let Some(validators) = validators {
            self.set_validators(key, validators).await;
        }
    }

    /// Stores validators under the sidecar key. Best-effort.
    pub async fn set_validators(&self, key: &str, validators: &Validators) {
        let value = match serde_json::to_value(validators) {
            Ok(value) => value,
            Err(e) => {
                warn!(role = self.role.as_str(), key, error = %e, "validators failed to serialize");
                return;
            }
        };
        let payload = match self.serializer.encode(&value) {
            Ok(Some(payload)) => payload,
            Ok(None) => return,
            Err(e) => {
                warn!(role = self.role.as_str(), key, error = %e, "validators failed to encode");
                return;
            }
        };
        if let Err(e) = self
            .backend
            .set(&validators_key(key), payload, self.default_ttl)
            .await
        {
            warn!(role = self.role.as_str(), key, error = %e, "validator sidecar set failed");
        }
    }

    /// Removes a body entry, and optionally its sidecar.
    ///
    /// # Errors
    ///
    /// Returns a cache error if the backend delete fails.
    pub async fn delete(&self, key: &str, with_validators: bool) -> Result<(), Error> {
        self.backend.delete(key).await?;
        self.stats.record_delete();
        if with_validators {
            self.backend.delete(&validators_key(key)).await?;
        }
        Ok(())
    }

    /// Whether a body entry exists for `key`.
    ///
    /// # Errors
    ///
    /// Returns a cache error if the backend lookup fails.
    pub async fn has(&self, key: &str) -> Result<bool, Error> {
        self.backend.has(key).await
    }

    /// Enumerates stored keys, sidecars included.
    ///
    /// # Errors
    ///
    /// Returns a cache error if the backend enumeration fails.
    pub async fn keys(&self) -> Result<Vec<String>, Error> {
        self.backend.keys().await
    }

    /// Empties the cache and resets the stats.
    ///
    /// # Errors
    ///
    /// Returns a cache error if the backend clear fails.
    pub async fn clear(&self) -> Result<(), Error> {
        self.backend.clear().await?;
        self.stats.reset();
        Ok(())
    }
}
