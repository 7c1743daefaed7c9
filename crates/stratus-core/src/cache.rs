//! Bounded TTL map from request fingerprint to upstream response body.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use bytes::Bytes;
use dashmap::DashMap;
use stratus_types::models::CacheStats;

struct CacheEntry {
    body: Bytes,
    inserted_at: Instant,
}

/// In-memory result cache.
///
/// Bodies are stored as [`Bytes`] so reads hand out reference-counted
/// views instead of copies; callers must treat them as immutable. When
/// the cache is disabled every `get` misses and `insert` is a no-op.
pub struct ResponseCache {
    entries: DashMap<String, CacheEntry>,
    enabled: bool,
    ttl: Duration,
    max_keys: usize,
    hits: AtomicU64,
    writes: AtomicU64,
}

impl ResponseCache {
    pub fn new(enabled: bool, ttl: Duration, max_keys: usize) -> Self {
        ResponseCache {
            entries: DashMap::new(),
            enabled,
            ttl,
            max_keys,
            hits: AtomicU64::new(0),
            writes: AtomicU64::new(0),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn get(&self, fingerprint: &str) -> Option<Bytes> {
        if !self.enabled {
            return None;
        }
        let entry = self.entries.get(fingerprint)?;
        if entry.inserted_at.elapsed() >= self.ttl {
            // Expired but not yet swept; report a miss and let the
            // sweeper reclaim it.
            return None;
        }
        self.hits.fetch_add(1, Ordering::Relaxed);
        Some(entry.body.clone())
    }

    pub fn insert(&self, fingerprint: String, body: Bytes) {
        if !self.enabled {
            return;
        }
        if self.entries.len() >= self.max_keys && !self.entries.contains_key(&fingerprint) {
            self.evict_one();
        }
        self.entries.insert(fingerprint, CacheEntry { body, inserted_at: Instant::now() });
        self.writes.fetch_add(1, Ordering::Relaxed);
    }

    /// Expired entries go first; otherwise the oldest insertion.
    fn evict_one(&self) {
        if self.sweep() > 0 {
            return;
        }
        let oldest = self
            .entries
            .iter()
            .min_by_key(|entry| entry.inserted_at)
            .map(|entry| entry.key().clone());
        if let Some(key) = oldest {
            self.entries.remove(&key);
        }
    }

    /// Drops all expired entries, returning how many were removed.
    pub fn sweep(&self) -> usize {
        let ttl = self.ttl;
        let before = self.entries.len();
        self.entries.retain(|_, entry| entry.inserted_at.elapsed() < ttl);
        before - self.entries.len()
    }

    pub fn clear(&self) -> usize {
        let count = self.entries.len();
        self.entries.clear();
        count
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            enabled: self.enabled,
            size: self.entries.len(),
            max_keys: self.max_keys,
            ttl_secs: self.ttl.as_secs(),
            hits: self.hits.load(Ordering::Relaxed),
            writes: self.writes.load(Ordering::Relaxed),
        }
    }

    /// Background task reclaiming expired entries so stale keys do not
    /// occupy the size bound indefinitely.
    pub fn start_sweeper(self: &Arc<Self>) {
        if !self.enabled {
            return;
        }
        let cache = Arc::clone(self);
        let interval = cache.ttl.min(Duration::from_secs(60)).max(Duration::from_secs(1));
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let swept = cache.sweep();
                if swept > 0 {
                    tracing::debug!(swept, remaining = cache.len(), "cache sweep");
                }
            }
        });
        tracing::info!(interval_secs = interval.as_secs(), "cache sweeper started");
    }
}
