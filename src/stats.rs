//! Aggregated per-component counters.
//!
//! Each pipeline component owns one counter block, shared behind `Arc` and
//! updated with relaxed atomics so concurrent requests never contend on a
//! lock for bookkeeping. `snapshot()` produces the serializable view used by
//! embedders for stats endpoints and by tests for assertions.

use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

fn add_duration(cell: &AtomicU64, elapsed: Duration) {
    let micros = u64::try_from(elapsed.as_micros()).unwrap_or(u64::MAX);
    cell.fetch_add(micros, Ordering::Relaxed);
}

#[allow(clippy::cast_precision_loss)]
fn micros_to_secs(micros: u64) -> f64 {
    micros as f64 / 1_000_000.0
}

/// Top-level request accounting for the executor.
#[derive(Debug, Default)]
pub struct AppStats {
    requests_received: AtomicU64,
    requests_served: AtomicU64,
    requests_failed: AtomicU64,
    bytes_served: AtomicU64,
    processing_micros: AtomicU64,
}

impl AppStats {
    pub fn record_received(&self) {
        self.requests_received.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_served(&self, bytes: usize) {
        self.requests_served.fetch_add(1, Ordering::Relaxed);
        self.bytes_served
            .fetch_add(bytes as u64, Ordering::Relaxed);
    }

    pub fn record_failed(&self) {
        self.requests_failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_processing_time(&self, elapsed: Duration) {
        add_duration(&self.processing_micros, elapsed);
    }

    #[must_use]
    pub fn snapshot(&self) -> AppStatsSnapshot {
        AppStatsSnapshot {
            requests_received: self.requests_received.load(Ordering::Relaxed),
            requests_served: self.requests_served.load(Ordering::Relaxed),
            requests_failed: self.requests_failed.load(Ordering::Relaxed),
            bytes_served: self.bytes_served.load(Ordering::Relaxed),
            processing_time_secs: micros_to_secs(self.processing_micros.load(Ordering::Relaxed)),
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct AppStatsSnapshot {
    pub requests_received: u64,
    pub requests_served: u64,
    pub requests_failed: u64,
    pub bytes_served: u64,
    pub processing_time_secs: f64,
}

/// Hit/miss and operation accounting for one cache instance.
#[derive(Debug, Default)]
pub struct CacheStats {
    hits: AtomicU64,
    misses: AtomicU64,
    get_ops: AtomicU64,
    set_ops: AtomicU64,
    del_ops: AtomicU64,
}

impl CacheStats {
    pub fn record_hit(&self) {
        self.hits.fetch_add(1, Ordering::Relaxed);
        self.get_ops.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_miss(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_set(&self) {
        self.set_ops.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_delete(&self) {
        self.del_ops.fetch_add(1, Ordering::Relaxed);
    }

    pub fn reset(&self) {
        self.hits.store(0, Ordering::Relaxed);
        self.misses.store(0, Ordering::Relaxed);
        self.get_ops.store(0, Ordering::Relaxed);
        self.set_ops.store(0, Ordering::Relaxed);
        self.del_ops.store(0, Ordering::Relaxed);
    }

    #[must_use]
    pub fn snapshot(&self) -> CacheStatsSnapshot {
        CacheStatsSnapshot {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            get_ops: self.get_ops.load(Ordering::Relaxed),
            set_ops: self.set_ops.load(Ordering::Relaxed),
            del_ops: self.del_ops.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct CacheStatsSnapshot {
    pub hits: u64,
    pub misses: u64,
    pub get_ops: u64,
    pub set_ops: u64,
    pub del_ops: u64,
}

/// Encode/decode accounting for one serializer instance.
#[derive(Debug, Default)]
pub struct SerializerStats {
    encodes: AtomicU64,
    decodes: AtomicU64,
    raw_size: AtomicU64,
    enc_size: AtomicU64,
    enc_micros: AtomicU64,
    dec_micros: AtomicU64,
}

impl SerializerStats {
    pub fn record_encode(&self, raw_size: usize, enc_size: usize, elapsed: Duration) {
        self.encodes.fetch_add(1, Ordering::Relaxed);
        self.raw_size.fetch_add(raw_size as u64, Ordering::Relaxed);
        self.enc_size.fetch_add(enc_size as u64, Ordering::Relaxed);
        add_duration(&self.enc_micros, elapsed);
    }

    pub fn record_decode(&self, elapsed: Duration) {
        self.decodes.fetch_add(1, Ordering::Relaxed);
        add_duration(&self.dec_micros, elapsed);
    }

    #[must_use]
    pub fn snapshot(&self) -> SerializerStatsSnapshot {
        SerializerStatsSnapshot {
            encodes: self.encodes.load(Ordering::Relaxed),
            decodes: self.decodes.load(Ordering::Relaxed),
            raw_size: self.raw_size.load(Ordering::Relaxed),
            enc_size: self.enc_size.load(Ordering::Relaxed),
            enc_time_secs: micros_to_secs(self.enc_micros.load(Ordering::Relaxed)),
            dec_time_secs: micros_to_secs(self.dec_micros.load(Ordering::Relaxed)),
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct SerializerStatsSnapshot {
    pub encodes: u64,
    pub decodes: u64,
    pub raw_size: u64,
    pub enc_size: u64,
    pub enc_time_secs: f64,
    pub dec_time_secs: f64,
}

/// Outbound HTTP accounting for the origin fetcher.
#[derive(Debug, Default)]
pub struct FetchStats {
    requests_issued: AtomicU64,
    bytes_received: AtomicU64,
    fetching_micros: AtomicU64,
}

impl FetchStats {
    pub fn record_fetch(&self, requests_issued: usize, bytes_received: usize, elapsed: Duration) {
        self.requests_issued
            .fetch_add(requests_issued as u64, Ordering::Relaxed);
        self.bytes_received
            .fetch_add(bytes_received as u64, Ordering::Relaxed);
        add_duration(&self.fetching_micros, elapsed);
    }

    #[must_use]
    pub fn snapshot(&self) -> FetchStatsSnapshot {
        FetchStatsSnapshot {
            requests_issued: self.requests_issued.load(Ordering::Relaxed),
            bytes_received: self.bytes_received.load(Ordering::Relaxed),
            fetching_time_secs: micros_to_secs(self.fetching_micros.load(Ordering::Relaxed)),
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct FetchStatsSnapshot {
    pub requests_issued: u64,
    pub bytes_received: u64,
    pub fetching_time_secs: f64,
}

/// Combined snapshot across all components of one runtime.
#[derive(Debug, Clone, Serialize)]
pub struct RuntimeStats {
    pub app: AppStatsSnapshot,
    pub fetcher: FetchStatsSnapshot,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_cache: Option<CacheStatsSnapshot>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub origin_cache: Option<CacheStatsSnapshot>,
    pub response_encoder: SerializerStatsSnapshot,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn app_stats_accumulate() {
        let stats = AppStats::default();
        stats.record_received();
        stats.record_received();
        stats.record_served(128);
        stats.record_failed();
        stats.record_processing_time(Duration::from_millis(250));

        let snap = stats.snapshot();
        assert_eq!(snap.requests_received, 2);
        assert_eq!(snap.requests_served, 1);
        assert_eq!(snap.requests_failed, 1);
        assert_eq!(snap.bytes_served, 128);
        assert!((snap.processing_time_secs - 0.25).abs() < 1e-6);
    }

    #[test]
    fn cache_hit_counts_a_get_op_but_miss_does_not() {
        let stats = CacheStats::default();
        stats.record_hit();
        stats.record_miss();
        stats.record_miss();

        let snap = stats.snapshot();
        assert_eq!(snap.hits, 1);
        assert_eq!(snap.misses, 2);
        assert_eq!(snap.get_ops, 1);
    }

    #[test]
    fn cache_reset_zeroes_everything() {
        let stats = CacheStats::default();
        stats.record_hit();
        stats.record_set();
        stats.reset();

        let snap = stats.snapshot();
        assert_eq!(snap.hits, 0);
        assert_eq!(snap.set_ops, 0);
    }

    #[test]
    fn fetch_stats_accumulate_across_calls() {
        let stats = FetchStats::default();
        stats.record_fetch(3, 1024, Duration::from_millis(10));
        stats.record_fetch(1, 512, Duration::from_millis(5));

        let snap = stats.snapshot();
        assert_eq!(snap.requests_issued, 4);
        assert_eq!(snap.bytes_received, 1536);
    }
}
