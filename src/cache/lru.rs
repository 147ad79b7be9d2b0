//! In-memory strict-LRU backend.
//!
//! Bounded by entry count rather than TTL: eviction is least-recently-used
//! on both read and write, so a TTL passed to `set` is ignored. Because the
//! store holds structured [`Payload`] values directly, it does not require
//! an encoding-capable serializer.

use crate::cache::CacheBackend;
use crate::error::Error;
use crate::serialize::Payload;
use async_trait::async_trait;
use lru::LruCache;
use std::num::NonZeroUsize;
use std::sync::Mutex;
use std::time::Duration;

pub struct LruBackend {
    entries: Mutex<LruCache<String, Payload>>,
}

impl LruBackend {
    /// Creates a backend bounded to `max_items` entries.
    ///
    /// # Errors
    ///
    /// Returns a cache error if `max_items` is zero.
    pub fn new(max_items: usize) -> Result<Self, Error> {
        let capacity = NonZeroUsize::new(max_items)
            .ok_or_else(|| Error::cache_failed("lru cache capacity must be non-zero"))?;
        Ok(Self {
            entries: Mutex::new(LruCache::new(capacity)),
        })
    }

    /// Current number of stored entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.lock().map_or(0, |entries| entries.len())
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, LruCache<String, Payload>>, Error> {
        self.entries
            .lock()
            .map_err(|_| Error::cache_failed("lru cache mutex poisoned"))
    }
}

#[async_trait]
impl CacheBackend for LruBackend {
    async fn get(&self, key: &str) -> Result<Option<Payload>, Error> {
        // `get` promotes the entry, keeping eviction strictly LRU on read
        Ok(self.lock()?.get(key).cloned())
    }

    async fn set(&self, key: &str, value: Payload, _ttl: Option<Duration>) -> Result<(), Error> {
        self.lock()?.put(key.to_string(), value);
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), Error> {
        self.lock()?.pop(key);
        Ok(())
    }

    async fn has(&self, key: &str) -> Result<bool, Error> {
        Ok(self.lock()?.contains(key))
    }

    async fn keys(&self) -> Result<Vec<String>, Error> {
        Ok(self.lock()?.iter().map(|(key, _)| key.clone()).collect())
    }

    async fn clear(&self) -> Result<(), Error> {
        self.lock()?.clear();
        Ok(())
    }

    fn backend_id(&self) -> &'static str {
        "lru"
    }
}
