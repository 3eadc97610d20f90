//! Cache Metrics
//!
//! Lock-free counters for the tiered cache, with point-in-time snapshots.

use chrono::Utc;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};

// =============================================================================
// Cache Metrics
// =============================================================================

/// Counters shared by every reader and writer of the tiered cache
#[derive(Debug, Default)]
pub struct CacheMetrics {
    /// Reads answered from the cache
    pub hits: AtomicU64,
    /// Reads that found nothing live
    pub misses: AtomicU64,
    /// Entries written
    pub writes: AtomicU64,
    /// Writes skipped because the upstream result was empty
    pub skipped_empty: AtomicU64,
    /// Keys removed by invalidation
    pub deletes: AtomicU64,
    /// Backend failures treated as misses
    pub backend_errors: AtomicU64,
    /// Last update timestamp (Unix millis)
    pub last_update_ms: AtomicU64,
}

impl CacheMetrics {
    /// Create new zeroed metrics
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn record_hit(&self) {
        self.hits.fetch_add(1, Ordering::Relaxed);
        self.touch();
    }

    #[inline]
    pub fn record_miss(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
        self.touch();
    }

    #[inline]
    pub fn record_write(&self) {
        self.writes.fetch_add(1, Ordering::Relaxed);
        self.touch();
    }

    #[inline]
    pub fn record_skipped_empty(&self) {
        self.skipped_empty.fetch_add(1, Ordering::Relaxed);
        self.touch();
    }

    #[inline]
    pub fn record_deletes(&self, count: u64) {
        self.deletes.fetch_add(count, Ordering::Relaxed);
        self.touch();
    }

    #[inline]
    pub fn record_backend_error(&self) {
        self.backend_errors.fetch_add(1, Ordering::Relaxed);
        self.touch();
    }

    #[inline]
    fn touch(&self) {
        self.last_update_ms
            .store(Utc::now().timestamp_millis() as u64, Ordering::Release);
    }

    /// Create a snapshot of current metrics
    pub fn snapshot(&self) -> CacheStatsSnapshot {
        CacheStatsSnapshot {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            writes: self.writes.load(Ordering::Relaxed),
            skipped_empty: self.skipped_empty.load(Ordering::Relaxed),
            deletes: self.deletes.load(Ordering::Relaxed),
            backend_errors: self.backend_errors.load(Ordering::Relaxed),
        }
    }
}

// =============================================================================
// Snapshot
// =============================================================================

/// Point-in-time snapshot of cache metrics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CacheStatsSnapshot {
    pub hits: u64,
    pub misses: u64,
    pub writes: u64,
    pub skipped_empty: u64,
    pub deletes: u64,
    pub backend_errors: u64,
}

impl CacheStatsSnapshot {
    /// Get total lookups
    pub fn total_requests(&self) -> u64 {
        self.hits + self.misses
    }

    /// Calculate hit ratio (0.0 to 1.0)
    pub fn hit_ratio(&self) -> f64 {
        let total = self.total_requests();
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hit_ratio() {
        let metrics = CacheMetrics::new();
        assert_eq!(metrics.snapshot().hit_ratio(), 0.0);

        metrics.record_hit();
        metrics.record_hit();
        metrics.record_hit();
        metrics.record_miss();

        let snap = metrics.snapshot();
        assert_eq!(snap.total_requests(), 4);
        assert!((snap.hit_ratio() - 0.75).abs() < f64::EPSILON);
    }

    #[test]
    fn test_write_counters() {
        let metrics = CacheMetrics::new();
        metrics.record_write();
        metrics.record_skipped_empty();
        metrics.record_skipped_empty();
        metrics.record_deletes(3);

        let snap = metrics.snapshot();
        assert_eq!(snap.writes, 1);
        assert_eq!(snap.skipped_empty, 2);
        assert_eq!(snap.deletes, 3);
        assert!(metrics.last_update_ms.load(Ordering::Acquire) > 0);
    }
}
