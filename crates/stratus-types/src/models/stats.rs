//! Statistics and monitoring models.

use serde::Serialize;

/// Request counters maintained by the monitor.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq, Default)]
pub struct ProxyStats {
    /// Total client requests processed (cache hits included).
    pub total_requests: u64,
    /// Requests served from the result cache.
    pub cache_hits: u64,
    /// Successful upstream responses written to the cache.
    pub cache_writes: u64,
    /// Upstream HTTP calls issued (one per credential attempt).
    pub upstream_calls: u64,
    /// Requests that terminated with an error.
    pub error_count: u64,
}

impl ProxyStats {
    /// Cache hit rate as a fraction of total requests (0.0 to 1.0).
    pub fn cache_hit_rate(&self) -> f64 {
        if self.total_requests == 0 {
            0.0
        } else {
            self.cache_hits as f64 / self.total_requests as f64
        }
    }
}

/// Response-time reservoir: cumulative sum plus extrema.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq, Default)]
pub struct ResponseTimes {
    pub count: u64,
    pub total_ms: u64,
    pub min_ms: u64,
    pub max_ms: u64,
}

impl ResponseTimes {
    pub fn avg_ms(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.total_ms as f64 / self.count as f64
        }
    }
}

/// Cache counters as exposed by the stats endpoints.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq, Default)]
pub struct CacheStats {
    pub enabled: bool,
    pub size: usize,
    pub max_keys: usize,
    pub ttl_secs: u64,
    pub hits: u64,
    pub writes: u64,
}

/// Per-credential ledger state for one day, as served by `/stats/keys`.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct KeyStatus {
    pub id: String,
    pub priority: usize,
    pub usage: u64,
    pub errors: u64,
    /// Both quota-eligible and error-eligible.
    pub selectable: bool,
}

/// Read-only point-in-time view combining all telemetry sources.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct StatsSnapshot {
    pub stats: ProxyStats,
    pub response_times: ResponseTimes,
    pub avg_response_ms: f64,
    pub cache_hit_rate: f64,
    /// Fingerprints currently being fetched upstream.
    pub in_flight: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cache_hit_rate() {
        let stats = ProxyStats { total_requests: 10, cache_hits: 4, ..Default::default() };
        assert!((stats.cache_hit_rate() - 0.4).abs() < f64::EPSILON);
        assert_eq!(ProxyStats::default().cache_hit_rate(), 0.0);
    }

    #[test]
    fn test_avg_response_time() {
        let times = ResponseTimes { count: 4, total_ms: 100, min_ms: 10, max_ms: 40 };
        assert!((times.avg_ms() - 25.0).abs() < f64::EPSILON);
        assert_eq!(ResponseTimes::default().avg_ms(), 0.0);
    }
}
