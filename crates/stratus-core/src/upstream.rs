//! Connection-reusing HTTP client for the weather upstream.

use std::time::Duration;

use bytes::Bytes;
use stratus_types::{Credential, ProxyError};

use crate::pipeline::WeatherQuery;

pub const ONECALL_PATH: &str = "/data/3.0/onecall";

const USER_AGENT: &str = concat!("stratus-proxy/", env!("CARGO_PKG_VERSION"));

/// One shared client for the whole process. Per-request clients would
/// defeat connection reuse, so construction happens once at startup.
pub struct UpstreamClient {
    http: reqwest::Client,
    base_url: String,
}

impl UpstreamClient {
    pub fn new(base_url: &str, request_timeout: Duration) -> Result<UpstreamClient, ProxyError> {
        let http = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .pool_max_idle_per_host(16)
            .pool_idle_timeout(Duration::from_secs(90))
            .tcp_keepalive(Duration::from_secs(60))
            .timeout(request_timeout)
            .redirect(reqwest::redirect::Policy::limited(2))
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| ProxyError::Config(format!("failed to build HTTP client: {e}")))?;

        Ok(UpstreamClient { http, base_url: base_url.trim_end_matches('/').to_string() })
    }

    /// One Call request with `cred`'s secret appended. All other
    /// parameters pass through untouched; the body comes back verbatim.
    pub async fn fetch_onecall(
        &self,
        cred: &Credential,
        query: &WeatherQuery,
    ) -> Result<Bytes, ProxyError> {
        let url = format!("{}{ONECALL_PATH}", self.base_url);

        let mut params: Vec<(&str, String)> = vec![
            ("lat", query.lat.to_string()),
            ("lon", query.lon.to_string()),
            ("appid", cred.secret.clone()),
        ];
        if let Some(exclude) = &query.exclude {
            params.push(("exclude", exclude.clone()));
        }
        if let Some(units) = &query.units {
            params.push(("units", units.clone()));
        }
        if let Some(lang) = &query.lang {
            params.push(("lang", lang.clone()));
        }

        let response = self
            .http
            .get(&url)
            .query(&params)
            .send()
            .await
            .map_err(|e| ProxyError::UpstreamTransport(sanitize(e)))?;

        let status = response.status();
        if status.is_success() {
            let body = response
                .bytes()
                .await
                .map_err(|e| ProxyError::UpstreamTransport(sanitize(e)))?;
            Ok(body)
        } else {
            let body = response.text().await.unwrap_or_default();
            Err(ProxyError::UpstreamHttp { status: status.as_u16(), body })
        }
    }
}

/// reqwest errors render their URL, which carries the appid secret.
fn sanitize(err: reqwest::Error) -> String {
    err.without_url().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_builds_with_short_timeout() {
        let client = UpstreamClient::new("https://api.openweathermap.org", Duration::from_secs(1));
        assert!(client.is_ok());
    }

    #[test]
    fn test_trailing_slash_is_normalized() {
        let client =
            UpstreamClient::new("http://127.0.0.1:9999/", Duration::from_secs(1)).unwrap();
        assert_eq!(client.base_url, "http://127.0.0.1:9999");
    }
}
