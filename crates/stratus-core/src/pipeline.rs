//! Fetch pipeline: cache lookup -> coalescing -> credential iteration ->
//! upstream call -> backoff -> ledger update -> cache insert.

use std::sync::Arc;
use std::time::{Duration, Instant};

use bytes::Bytes;
use stratus_types::models::{KeyStatus, StatsSnapshot};
use stratus_types::ProxyError;

use crate::cache::ResponseCache;
use crate::coalescer::Inflight;
use crate::config::Settings;
use crate::day::DayClock;
use crate::ledger::UsageLedger;
use crate::selector::KeySelector;
use crate::telemetry::RequestMonitor;
use crate::upstream::UpstreamClient;

pub const EXCLUDE_PARTS: [&str; 5] = ["current", "minutely", "hourly", "daily", "alerts"];
pub const UNITS: [&str; 3] = ["standard", "metric", "imperial"];

/// Validated, normalized parameters of one logical weather request.
#[derive(Debug, Clone, PartialEq)]
pub struct WeatherQuery {
    pub lat: f64,
    pub lon: f64,
    /// Normalized: parts trimmed, lowercased, sorted, deduplicated.
    pub exclude: Option<String>,
    pub units: Option<String>,
    pub lang: Option<String>,
}

impl WeatherQuery {
    pub fn new(
        lat: f64,
        lon: f64,
        exclude: Option<String>,
        units: Option<String>,
        lang: Option<String>,
    ) -> Result<WeatherQuery, ProxyError> {
        if !lat.is_finite() || !(-90.0..=90.0).contains(&lat) {
            return Err(ProxyError::Validation(format!(
                "lat must be a number between -90 and 90, got {lat}"
            )));
        }
        if !lon.is_finite() || !(-180.0..=180.0).contains(&lon) {
            return Err(ProxyError::Validation(format!(
                "lon must be a number between -180 and 180, got {lon}"
            )));
        }

        let exclude = match exclude {
            Some(raw) => {
                let mut parts: Vec<String> = raw
                    .split(',')
                    .map(|p| p.trim().to_ascii_lowercase())
                    .filter(|p| !p.is_empty())
                    .collect();
                for part in &parts {
                    if !EXCLUDE_PARTS.contains(&part.as_str()) {
                        return Err(ProxyError::Validation(format!(
                            "exclude part '{part}' is not one of {EXCLUDE_PARTS:?}"
                        )));
                    }
                }
                parts.sort();
                parts.dedup();
                if parts.is_empty() { None } else { Some(parts.join(",")) }
            },
            None => None,
        };

        let units = match units {
            Some(raw) => {
                let normalized = raw.trim().to_ascii_lowercase();
                if !UNITS.contains(&normalized.as_str()) {
                    return Err(ProxyError::Validation(format!(
                        "units must be one of {UNITS:?}, got '{raw}'"
                    )));
                }
                Some(normalized)
            },
            None => None,
        };

        let lang = match lang {
            Some(raw) => {
                let normalized = raw.trim().to_ascii_lowercase();
                if !(2..=5).contains(&normalized.len()) {
                    return Err(ProxyError::Validation(
                        "lang must be 2 to 5 characters".to_string(),
                    ));
                }
                Some(normalized)
            },
            None => None,
        };

        Ok(WeatherQuery { lat, lon, exclude, units, lang })
    }

    /// Deterministic identity of this request for caching and
    /// coalescing. Coordinates are rounded to four decimal places (~11m)
    /// so textual variants of the same point coalesce.
    pub fn fingerprint(&self) -> String {
        format!(
            "{:.4}:{:.4}:{}:{}:{}",
            self.lat,
            self.lon,
            self.exclude.as_deref().unwrap_or(""),
            self.units.as_deref().unwrap_or(""),
            self.lang.as_deref().unwrap_or(""),
        )
    }
}

/// Top-level orchestration of one logical request.
pub struct WeatherService {
    selector: KeySelector,
    ledger: Arc<dyn UsageLedger>,
    cache: Arc<ResponseCache>,
    inflight: Inflight,
    upstream: UpstreamClient,
    monitor: RequestMonitor,
    clock: DayClock,
    retry_count: u32,
    retry_delay: Duration,
}

impl WeatherService {
    pub fn new(
        settings: &Settings,
        ledger: Arc<dyn UsageLedger>,
    ) -> Result<Arc<WeatherService>, ProxyError> {
        let cache = Arc::new(ResponseCache::new(
            settings.enable_cache,
            settings.cache_ttl,
            settings.cache_max_keys,
        ));
        let upstream = UpstreamClient::new(&settings.upstream_base_url, settings.api_timeout)?;
        let selector =
            KeySelector::new(settings.credentials.clone(), Arc::clone(&ledger), settings.daily_limit);

        Ok(Arc::new(WeatherService {
            selector,
            ledger,
            cache,
            inflight: Inflight::new(),
            upstream,
            monitor: RequestMonitor::new(),
            clock: DayClock::new(settings.day_key_tz),
            retry_count: settings.retry_count.max(1),
            retry_delay: settings.retry_delay,
        }))
    }

    pub fn cache(&self) -> &Arc<ResponseCache> {
        &self.cache
    }

    pub fn clock(&self) -> DayClock {
        self.clock
    }

    pub fn pool_size(&self) -> usize {
        self.selector.pool_size()
    }

    pub fn in_flight(&self) -> usize {
        self.inflight.len()
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        self.monitor.snapshot(self.inflight.len())
    }

    pub fn monitor(&self) -> &RequestMonitor {
        &self.monitor
    }

    pub async fn key_statuses(&self) -> Result<Vec<KeyStatus>, ProxyError> {
        self.selector.key_statuses(&self.clock.today()).await
    }

    pub async fn ledger_ping(&self) -> Result<(), ProxyError> {
        self.ledger.ping().await
    }

    /// Serves one logical request. Duplicate concurrent requests for the
    /// same fingerprint share a single upstream fetch.
    pub async fn get_weather(self: &Arc<Self>, query: WeatherQuery) -> Result<Bytes, ProxyError> {
        let fingerprint = query.fingerprint();
        self.monitor.record_request();
        let started = Instant::now();

        if let Some(body) = self.cache.get(&fingerprint) {
            self.monitor.record_cache_hit();
            self.monitor.record_response_time(started.elapsed());
            tracing::debug!(fingerprint = %fingerprint, "cache hit");
            return Ok(body);
        }

        let service = Arc::clone(self);
        let fp = fingerprint.clone();
        let result = self
            .inflight
            .get_or_run(&fingerprint, async move {
                service.fetch_with_failover(fp, query).await
            })
            .await;

        self.monitor.record_response_time(started.elapsed());
        if result.is_err() {
            self.monitor.record_error();
        }
        result
    }

    /// Credential iteration with bounded retry. Backoff is linear in the
    /// attempt index (`delay x attempt`).
    async fn fetch_with_failover(
        &self,
        fingerprint: String,
        query: WeatherQuery,
    ) -> Result<Bytes, ProxyError> {
        let mut last_error: Option<ProxyError> = None;

        for attempt in 1..=self.retry_count {
            // Re-derived every attempt so a midnight rollover mid-request
            // charges the correct day.
            let day = self.clock.today();

            let candidates = match self.selector.select_all(&day).await {
                Ok(candidates) => candidates,
                Err(err @ ProxyError::NoCredentialsAvailable) => {
                    last_error = Some(err);
                    Vec::new()
                },
                // Without a readable ledger quotas cannot be enforced.
                Err(err) => return Err(err),
            };

            for cred in &candidates {
                self.monitor.record_upstream_call();
                match self.upstream.fetch_onecall(cred, &query).await {
                    Ok(body) => {
                        self.ledger.increment_usage(&cred.id, &day).await;
                        if self.cache.is_enabled() {
                            self.cache.insert(fingerprint.clone(), body.clone());
                            self.monitor.record_cache_write();
                        }
                        tracing::debug!(key = %cred.id, attempt, "upstream success");
                        return Ok(body);
                    },
                    Err(err) => {
                        let errors = self.ledger.increment_error(&cred.id, &day).await;
                        tracing::warn!(
                            key = %cred.id,
                            attempt,
                            consecutive_errors = errors,
                            error = %err,
                            "upstream attempt failed"
                        );
                        last_error = Some(err);
                    },
                }
            }

            if attempt < self.retry_count {
                let backoff = self.retry_delay * attempt;
                tracing::debug!(
                    attempt,
                    backoff_ms = backoff.as_millis() as u64,
                    "all candidates failed, backing off"
                );
                tokio::time::sleep(backoff).await;
            }
        }

        Err(last_error.unwrap_or(ProxyError::NoCredentialsAvailable))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn query(lat: f64, lon: f64) -> WeatherQuery {
        WeatherQuery::new(lat, lon, None, None, None).unwrap()
    }

    #[test]
    fn test_fingerprint_is_deterministic() {
        let a = WeatherQuery::new(
            51.5074,
            -0.1278,
            Some("hourly,daily".into()),
            Some("metric".into()),
            Some("en".into()),
        )
        .unwrap();
        let b = WeatherQuery::new(
            51.5074,
            -0.1278,
            Some("daily, hourly".into()),
            Some("Metric".into()),
            Some("EN".into()),
        )
        .unwrap();
        assert_eq!(a.fingerprint(), b.fingerprint());
    }

    #[test]
    fn test_fingerprint_varies_per_parameter() {
        let base = WeatherQuery::new(10.0, 20.0, None, Some("metric".into()), Some("en".into()))
            .unwrap()
            .fingerprint();

        let variants = [
            query(10.1, 20.0).fingerprint(),
            query(10.0, 20.1).fingerprint(),
            WeatherQuery::new(10.0, 20.0, Some("daily".into()), Some("metric".into()), Some("en".into()))
                .unwrap()
                .fingerprint(),
            WeatherQuery::new(10.0, 20.0, None, Some("imperial".into()), Some("en".into()))
                .unwrap()
                .fingerprint(),
            WeatherQuery::new(10.0, 20.0, None, Some("metric".into()), Some("de".into()))
                .unwrap()
                .fingerprint(),
        ];
        for variant in variants {
            assert_ne!(base, variant);
        }
    }

    #[test]
    fn test_coordinates_rounded_in_fingerprint() {
        assert_eq!(query(10.00001, 20.0).fingerprint(), query(10.00004, 20.0).fingerprint());
        assert_ne!(query(10.0001, 20.0).fingerprint(), query(10.0002, 20.0).fingerprint());
    }

    #[test]
    fn test_out_of_range_coordinates_rejected() {
        assert!(WeatherQuery::new(90.01, 0.0, None, None, None).is_err());
        assert!(WeatherQuery::new(-90.01, 0.0, None, None, None).is_err());
        assert!(WeatherQuery::new(0.0, 180.01, None, None, None).is_err());
        assert!(WeatherQuery::new(0.0, f64::NAN, None, None, None).is_err());
        assert!(WeatherQuery::new(90.0, -180.0, None, None, None).is_ok());
    }

    #[test]
    fn test_exclude_subset_enforced() {
        assert!(WeatherQuery::new(0.0, 0.0, Some("daily,weekly".into()), None, None).is_err());
        let ok = WeatherQuery::new(0.0, 0.0, Some("alerts,daily,alerts".into()), None, None)
            .unwrap();
        assert_eq!(ok.exclude.as_deref(), Some("alerts,daily"));
    }

    #[test]
    fn test_units_and_lang_validated() {
        assert!(WeatherQuery::new(0.0, 0.0, None, Some("kelvin".into()), None).is_err());
        assert!(WeatherQuery::new(0.0, 0.0, None, None, Some("x".into())).is_err());
        assert!(WeatherQuery::new(0.0, 0.0, None, None, Some("toolong".into())).is_err());
        assert!(WeatherQuery::new(0.0, 0.0, None, Some("standard".into()), Some("pt_br".into()))
            .is_ok());
    }
}
