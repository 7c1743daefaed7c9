//! Request counters and the response-time reservoir.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use parking_lot::RwLock;
use stratus_types::models::{ProxyStats, ResponseTimes, StatsSnapshot};

/// Per-process telemetry. Counters are lock-free; only the reservoir
/// takes a short write lock. Snapshots are safe for concurrent readers.
pub struct RequestMonitor {
    total_requests: AtomicU64,
    cache_hits: AtomicU64,
    cache_writes: AtomicU64,
    upstream_calls: AtomicU64,
    errors: AtomicU64,
    times: RwLock<ResponseTimes>,
}

impl RequestMonitor {
    pub fn new() -> Self {
        RequestMonitor {
            total_requests: AtomicU64::new(0),
            cache_hits: AtomicU64::new(0),
            cache_writes: AtomicU64::new(0),
            upstream_calls: AtomicU64::new(0),
            errors: AtomicU64::new(0),
            times: RwLock::new(ResponseTimes::default()),
        }
    }

    pub fn record_request(&self) {
        self.total_requests.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_cache_hit(&self) {
        self.cache_hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_cache_write(&self) {
        self.cache_writes.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_upstream_call(&self) {
        self.upstream_calls.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_error(&self) {
        self.errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_response_time(&self, elapsed: Duration) {
        let ms = elapsed.as_millis() as u64;
        let mut times = self.times.write();
        times.total_ms += ms;
        times.max_ms = times.max_ms.max(ms);
        times.min_ms = if times.count == 0 { ms } else { times.min_ms.min(ms) };
        times.count += 1;
    }

    pub fn stats(&self) -> ProxyStats {
        ProxyStats {
            total_requests: self.total_requests.load(Ordering::Relaxed),
            cache_hits: self.cache_hits.load(Ordering::Relaxed),
            cache_writes: self.cache_writes.load(Ordering::Relaxed),
            upstream_calls: self.upstream_calls.load(Ordering::Relaxed),
            error_count: self.errors.load(Ordering::Relaxed),
        }
    }

    pub fn response_times(&self) -> ResponseTimes {
        *self.times.read()
    }

    /// Point-in-time view for the stats endpoints. `in_flight` comes
    /// from the coalescer gauge at call time.
    pub fn snapshot(&self, in_flight: usize) -> StatsSnapshot {
        let stats = self.stats();
        let response_times = self.response_times();
        StatsSnapshot {
            avg_response_ms: response_times.avg_ms(),
            cache_hit_rate: stats.cache_hit_rate(),
            stats,
            response_times,
            in_flight,
        }
    }

    pub fn reset(&self) {
        self.total_requests.store(0, Ordering::Relaxed);
        self.cache_hits.store(0, Ordering::Relaxed);
        self.cache_writes.store(0, Ordering::Relaxed);
        self.upstream_calls.store(0, Ordering::Relaxed);
        self.errors.store(0, Ordering::Relaxed);
        *self.times.write() = ResponseTimes::default();
    }
}

impl Default for RequestMonitor {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters_accumulate() {
        let monitor = RequestMonitor::new();
        monitor.record_request();
        monitor.record_request();
        monitor.record_cache_hit();
        monitor.record_upstream_call();
        monitor.record_error();

        let stats = monitor.stats();
        assert_eq!(stats.total_requests, 2);
        assert_eq!(stats.cache_hits, 1);
        assert_eq!(stats.upstream_calls, 1);
        assert_eq!(stats.error_count, 1);
    }

    #[test]
    fn test_reservoir_tracks_extrema() {
        let monitor = RequestMonitor::new();
        monitor.record_response_time(Duration::from_millis(30));
        monitor.record_response_time(Duration::from_millis(10));
        monitor.record_response_time(Duration::from_millis(20));

        let times = monitor.response_times();
        assert_eq!(times.count, 3);
        assert_eq!(times.total_ms, 60);
        assert_eq!(times.min_ms, 10);
        assert_eq!(times.max_ms, 30);
        assert!((times.avg_ms() - 20.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_snapshot_combines_sources() {
        let monitor = RequestMonitor::new();
        monitor.record_request();
        monitor.record_cache_hit();
        monitor.record_response_time(Duration::from_millis(5));

        let snapshot = monitor.snapshot(2);
        assert_eq!(snapshot.in_flight, 2);
        assert!((snapshot.cache_hit_rate - 1.0).abs() < f64::EPSILON);
        assert!((snapshot.avg_response_ms - 5.0).abs() < f64::EPSILON);
    }
}
