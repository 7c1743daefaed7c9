//! Environment-driven settings.
//!
//! Required keys fail fast at startup; optional keys carry the documented
//! defaults. Unparsable numerics are an error rather than a silent
//! fallback.

use std::time::Duration;

use stratus_types::{Credential, ProxyError};

use crate::day::DayZone;

pub const DEFAULT_DAILY_LIMIT: u64 = 1000;
pub const DEFAULT_API_TIMEOUT_MS: u64 = 10_000;
pub const DEFAULT_RETRY_COUNT: u32 = 3;
pub const DEFAULT_RETRY_DELAY_MS: u64 = 1000;
pub const DEFAULT_CACHE_TTL_SECS: u64 = 300;
pub const DEFAULT_CACHE_MAX_KEYS: usize = 10_000;
pub const DEFAULT_UPSTREAM_BASE_URL: &str = "https://api.openweathermap.org";

/// Runtime configuration, resolved once at startup.
#[derive(Debug, Clone)]
pub struct Settings {
    /// Ordered credential pool parsed from `OPENWEATHER_API_KEYS`.
    pub credentials: Vec<Credential>,
    /// Opaque client identifier compared for equality against `appid`.
    pub app_id_key: String,

    pub daily_limit: u64,
    pub api_timeout: Duration,
    pub retry_count: u32,
    pub retry_delay: Duration,

    pub enable_cache: bool,
    pub cache_ttl: Duration,
    pub cache_max_keys: usize,

    pub redis_url: String,
    pub redis_password: Option<String>,
    pub redis_db: Option<i64>,

    pub host: String,
    pub port: u16,
    pub rate_limit_max: u32,
    pub rate_limit_window: Duration,
    pub cors_origin: String,
    pub keepalive_timeout: Duration,
    pub log_level: String,

    pub day_key_tz: DayZone,
    /// Overridable for integration tests against a mock upstream.
    pub upstream_base_url: String,
}

impl Settings {
    /// Loads settings from process environment variables.
    pub fn from_env() -> Result<Settings, ProxyError> {
        let raw_keys = require("OPENWEATHER_API_KEYS")?;
        let secrets: Vec<String> = raw_keys
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(String::from)
            .collect();
        if secrets.is_empty() {
            return Err(ProxyError::Config(
                "OPENWEATHER_API_KEYS contains no usable keys".to_string(),
            ));
        }

        let day_key_tz = match optional("DAY_KEY_TZ").as_deref() {
            None | Some("local") => DayZone::Local,
            Some("utc") => DayZone::Utc,
            Some(other) => {
                return Err(ProxyError::Config(format!(
                    "DAY_KEY_TZ must be 'local' or 'utc', got '{other}'"
                )))
            },
        };

        Ok(Settings {
            credentials: Credential::pool_from_secrets(secrets),
            app_id_key: require("APP_ID_KEY")?,

            daily_limit: parse("API_DAILY_LIMIT", DEFAULT_DAILY_LIMIT)?,
            api_timeout: Duration::from_millis(parse("API_TIMEOUT", DEFAULT_API_TIMEOUT_MS)?),
            retry_count: parse("API_RETRY_COUNT", DEFAULT_RETRY_COUNT)?,
            retry_delay: Duration::from_millis(parse("API_RETRY_DELAY", DEFAULT_RETRY_DELAY_MS)?),

            enable_cache: parse_bool("ENABLE_CACHE", true)?,
            cache_ttl: Duration::from_secs(parse("CACHE_TTL", DEFAULT_CACHE_TTL_SECS)?),
            cache_max_keys: parse("CACHE_MAX_KEYS", DEFAULT_CACHE_MAX_KEYS)?,

            redis_url: optional("REDIS_URL")
                .unwrap_or_else(|| "redis://127.0.0.1:6379".to_string()),
            redis_password: optional("REDIS_PASSWORD"),
            redis_db: optional("REDIS_DB")
                .map(|raw| {
                    raw.parse::<i64>().map_err(|_| {
                        ProxyError::Config(format!("REDIS_DB is not an integer: '{raw}'"))
                    })
                })
                .transpose()?,

            host: optional("HOST").unwrap_or_else(|| "0.0.0.0".to_string()),
            port: parse("PORT", 3000)?,
            rate_limit_max: parse("RATE_LIMIT_MAX", 100)?,
            rate_limit_window: Duration::from_millis(parse("RATE_LIMIT_WINDOW", 60_000)?),
            cors_origin: optional("CORS_ORIGIN").unwrap_or_else(|| "*".to_string()),
            keepalive_timeout: Duration::from_millis(parse("KEEPALIVE_TIMEOUT", 65_000)?),
            log_level: optional("LOG_LEVEL").unwrap_or_else(|| "info".to_string()),

            day_key_tz,
            upstream_base_url: optional("UPSTREAM_BASE_URL")
                .unwrap_or_else(|| DEFAULT_UPSTREAM_BASE_URL.to_string()),
        })
    }

    /// Redis connection URL with password/db applied when they are given
    /// as separate variables.
    pub fn effective_redis_url(&self) -> String {
        let mut url = self.redis_url.clone();
        if let Some(password) = &self.redis_password {
            if !url.contains('@') {
                if let Some(rest) = url.strip_prefix("redis://") {
                    url = format!("redis://:{password}@{rest}");
                }
            }
        }
        if let Some(db) = self.redis_db {
            // A path segment on the URL already selects a database.
            let has_db = url.rsplit('/').next().is_some_and(|tail| tail.parse::<i64>().is_ok());
            if !has_db {
                url = format!("{}/{db}", url.trim_end_matches('/'));
            }
        }
        url
    }
}

fn require(key: &str) -> Result<String, ProxyError> {
    match std::env::var(key) {
        Ok(value) if !value.trim().is_empty() => Ok(value),
        _ => Err(ProxyError::Config(format!("missing required environment variable {key}"))),
    }
}

fn optional(key: &str) -> Option<String> {
    std::env::var(key).ok().map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

fn parse<T: std::str::FromStr>(key: &str, default: T) -> Result<T, ProxyError> {
    match optional(key) {
        Some(raw) => raw
            .parse::<T>()
            .map_err(|_| ProxyError::Config(format!("{key} is not a valid value: '{raw}'"))),
        None => Ok(default),
    }
}

fn parse_bool(key: &str, default: bool) -> Result<bool, ProxyError> {
    match optional(key).as_deref() {
        None => Ok(default),
        Some("true") | Some("1") | Some("yes") => Ok(true),
        Some("false") | Some("0") | Some("no") => Ok(false),
        Some(other) => Err(ProxyError::Config(format!("{key} is not a boolean: '{other}'"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_effective_redis_url_weaves_password_and_db() {
        let mut settings = Settings {
            credentials: Credential::pool_from_secrets(["k"]),
            app_id_key: "app".into(),
            daily_limit: DEFAULT_DAILY_LIMIT,
            api_timeout: Duration::from_millis(DEFAULT_API_TIMEOUT_MS),
            retry_count: DEFAULT_RETRY_COUNT,
            retry_delay: Duration::from_millis(DEFAULT_RETRY_DELAY_MS),
            enable_cache: true,
            cache_ttl: Duration::from_secs(DEFAULT_CACHE_TTL_SECS),
            cache_max_keys: DEFAULT_CACHE_MAX_KEYS,
            redis_url: "redis://localhost:6379".into(),
            redis_password: Some("hunter2".into()),
            redis_db: Some(3),
            host: "0.0.0.0".into(),
            port: 3000,
            rate_limit_max: 100,
            rate_limit_window: Duration::from_secs(60),
            cors_origin: "*".into(),
            keepalive_timeout: Duration::from_secs(65),
            log_level: "info".into(),
            day_key_tz: DayZone::Local,
            upstream_base_url: DEFAULT_UPSTREAM_BASE_URL.into(),
        };

        assert_eq!(settings.effective_redis_url(), "redis://:hunter2@localhost:6379/3");

        settings.redis_password = None;
        settings.redis_db = None;
        assert_eq!(settings.effective_redis_url(), "redis://localhost:6379");
    }
}
