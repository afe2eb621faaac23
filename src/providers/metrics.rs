//! Per-provider operation counters

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// Thread-safe per-provider metrics.
///
/// Atomic counters only; aggregation and export belong to whoever scrapes
/// them.
#[derive(Debug, Default)]
pub struct StorageMetrics {
    store_count: AtomicU64,
    store_latency_sum_ms: AtomicU64,
    load_count: AtomicU64,
    load_latency_sum_ms: AtomicU64,
    delete_count: AtomicU64,
    list_count: AtomicU64,
    error_count: AtomicU64,
    fallback_count: AtomicU64,
}

impl StorageMetrics {
    /// Create a zeroed metrics instance.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one operation: `"store"`, `"load"`, `"delete"`, or `"list"`.
    pub fn record_operation(&self, operation: &str, duration: Duration, success: bool) {
        let latency_ms = duration.as_millis() as u64;

        match operation {
            "store" => {
                self.store_count.fetch_add(1, Ordering::Relaxed);
                self.store_latency_sum_ms
                    .fetch_add(latency_ms, Ordering::Relaxed);
            }
            "load" => {
                self.load_count.fetch_add(1, Ordering::Relaxed);
                self.load_latency_sum_ms
                    .fetch_add(latency_ms, Ordering::Relaxed);
            }
            "delete" => {
                self.delete_count.fetch_add(1, Ordering::Relaxed);
            }
            "list" => {
                self.list_count.fetch_add(1, Ordering::Relaxed);
            }
            _ => {}
        }

        if !success {
            self.error_count.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Record one fall-through to the local fallback provider.
    pub fn record_fallback(&self) {
        self.fallback_count.fetch_add(1, Ordering::Relaxed);
    }

    /// Total store operations.
    pub fn store_count(&self) -> u64 {
        self.store_count.load(Ordering::Relaxed)
    }

    /// Total load operations.
    pub fn load_count(&self) -> u64 {
        self.load_count.load(Ordering::Relaxed)
    }

    /// Total delete operations.
    pub fn delete_count(&self) -> u64 {
        self.delete_count.load(Ordering::Relaxed)
    }

    /// Total list operations.
    pub fn list_count(&self) -> u64 {
        self.list_count.load(Ordering::Relaxed)
    }

    /// Total failed operations.
    pub fn error_count(&self) -> u64 {
        self.error_count.load(Ordering::Relaxed)
    }

    /// Total fallback activations.
    pub fn fallback_count(&self) -> u64 {
        self.fallback_count.load(Ordering::Relaxed)
    }

    /// Mean store latency in milliseconds, 0 when nothing recorded.
    pub fn avg_store_latency_ms(&self) -> u64 {
        let count = self.store_count.load(Ordering::Relaxed);
        if count == 0 {
            return 0;
        }
        self.store_latency_sum_ms.load(Ordering::Relaxed) / count
    }

    /// Errors over total operations, in `[0.0, 1.0]`.
    pub fn error_rate(&self) -> f64 {
        let total = self.store_count.load(Ordering::Relaxed)
            + self.load_count.load(Ordering::Relaxed)
            + self.delete_count.load(Ordering::Relaxed)
            + self.list_count.load(Ordering::Relaxed);
        if total == 0 {
            return 0.0;
        }
        self.error_count.load(Ordering::Relaxed) as f64 / total as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_store_latency() {
        let metrics = StorageMetrics::new();
        metrics.record_operation("store", Duration::from_millis(10), true);
        metrics.record_operation("store", Duration::from_millis(20), true);
        assert_eq!(metrics.store_count(), 2);
        assert_eq!(metrics.avg_store_latency_ms(), 15);
        assert_eq!(metrics.error_count(), 0);
    }

    #[test]
    fn test_error_rate() {
        let metrics = StorageMetrics::new();
        metrics.record_operation("store", Duration::from_millis(1), true);
        metrics.record_operation("load", Duration::from_millis(1), false);
        assert_eq!(metrics.error_count(), 1);
        assert_eq!(metrics.error_rate(), 0.5);
    }

    #[test]
    fn test_unknown_operation_ignored() {
        let metrics = StorageMetrics::new();
        metrics.record_operation("compact", Duration::from_millis(1), true);
        assert_eq!(metrics.error_rate(), 0.0);
        assert_eq!(metrics.store_count(), 0);
    }

    #[test]
    fn test_fallback_counter() {
        let metrics = StorageMetrics::new();
        metrics.record_fallback();
        metrics.record_fallback();
        assert_eq!(metrics.fallback_count(), 2);
    }
}
