//! Unified error type for the request pipeline.

use serde::Serialize;
use thiserror::Error;

/// Main error type for pipeline operations.
///
/// Every variant is cheap to clone so that coalesced waiters can each
/// receive the same terminal outcome.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ProxyError {
    /// Bad or missing request parameter. Surfaced as 400.
    #[error("invalid request: {0}")]
    Validation(String),

    /// The `appid` parameter did not match the configured identifier. 401.
    #[error("invalid app identifier")]
    Auth,

    /// Every credential is quota- or error-blocked for the current day. 429.
    #[error("no API credentials available")]
    NoCredentialsAvailable,

    /// Upstream returned a non-2xx response. Propagated transparently
    /// with the original status and body.
    #[error("upstream returned HTTP {status}")]
    UpstreamHttp { status: u16, body: String },

    /// Network-level failure talking to the upstream. 503 after retries.
    #[error("upstream transport failure: {0}")]
    UpstreamTransport(String),

    /// The usage ledger could not be read on a path that requires it. 503.
    #[error("usage ledger unavailable: {0}")]
    LedgerUnavailable(String),

    /// Configuration loading or validation failed at startup.
    #[error("configuration error: {0}")]
    Config(String),
}

impl ProxyError {
    /// HTTP status code this error maps to on the client-facing surface.
    pub fn status_code(&self) -> u16 {
        match self {
            ProxyError::Validation(_) => 400,
            ProxyError::Auth => 401,
            ProxyError::NoCredentialsAvailable => 429,
            ProxyError::UpstreamHttp { status, .. } => *status,
            ProxyError::UpstreamTransport(_) => 503,
            ProxyError::LedgerUnavailable(_) => 503,
            ProxyError::Config(_) => 500,
        }
    }

    /// Whether the fetch pipeline may recover from this error by rotating
    /// to another credential or retrying.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            ProxyError::UpstreamHttp { .. } | ProxyError::UpstreamTransport(_)
        )
    }
}

impl Serialize for ProxyError {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(self.to_string().as_str())
    }
}

/// Result type alias for pipeline operations.
pub type ProxyResult<T> = Result<T, ProxyError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_code_mapping() {
        assert_eq!(ProxyError::Validation("lat".into()).status_code(), 400);
        assert_eq!(ProxyError::Auth.status_code(), 401);
        assert_eq!(ProxyError::NoCredentialsAvailable.status_code(), 429);
        assert_eq!(
            ProxyError::UpstreamHttp { status: 502, body: String::new() }.status_code(),
            502
        );
        assert_eq!(ProxyError::UpstreamTransport("timeout".into()).status_code(), 503);
        assert_eq!(ProxyError::LedgerUnavailable("down".into()).status_code(), 503);
    }

    #[test]
    fn test_recoverable_classification() {
        assert!(ProxyError::UpstreamTransport("reset".into()).is_recoverable());
        assert!(ProxyError::UpstreamHttp { status: 500, body: String::new() }.is_recoverable());
        assert!(!ProxyError::NoCredentialsAvailable.is_recoverable());
        assert!(!ProxyError::Auth.is_recoverable());
    }
}
