//! REST API routes.

mod cache;
mod health;
mod stats;
mod weather;

use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use stratus_types::ProxyError;

use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        // Main endpoint
        .route("/data/3.0/onecall", get(weather::get_onecall))
        // Cache administration
        .route("/data/3.0/cache", delete(cache::clear))
        .route("/data/3.0/cache/warmup", post(cache::warmup))
        .route("/data/3.0/cache/info", get(cache::info))
        // Stats
        .route("/stats", get(stats::overview))
        .route("/stats/detailed", get(stats::detailed))
        .route("/stats/keys", get(stats::keys))
        .route("/stats/cache", get(stats::cache))
        .route("/stats/performance", get(stats::performance))
        .route("/stats/export", get(stats::export))
        // Health
        .route("/health", get(health::basic))
        .route("/health/detailed", get(health::detailed))
        .route("/ready", get(health::ready))
        .route("/live", get(health::live))
        .route("/uptime", get(health::uptime))
        .route("/version", get(health::version))
        .fallback(not_found)
}

async fn not_found() -> impl IntoResponse {
    (StatusCode::NOT_FOUND, Json(serde_json::json!({"error": "Not found"})))
}

/// Terminal error as sent to the client: either the upstream response
/// passed through verbatim, or the JSON envelope with a request id.
pub(crate) struct ApiError {
    pub error: ProxyError,
    pub request_id: String,
    /// Seconds until the next day rollover, attached to 429 responses.
    pub retry_after: Option<u64>,
}

impl ApiError {
    pub fn new(error: ProxyError, request_id: String) -> Self {
        ApiError { error, request_id, retry_after: None }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        // The proxy is transparent for upstream HTTP errors.
        if let ProxyError::UpstreamHttp { status, body } = &self.error {
            let status =
                StatusCode::from_u16(*status).unwrap_or(StatusCode::BAD_GATEWAY);
            return (
                status,
                [(header::CONTENT_TYPE, HeaderValue::from_static("application/json"))],
                body.clone(),
            )
                .into_response();
        }

        let status = StatusCode::from_u16(self.error.status_code())
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        let body = Json(serde_json::json!({
            "success": false,
            "error": self.error.to_string(),
            "timestamp": chrono::Utc::now().to_rfc3339(),
            "requestId": self.request_id,
        }));

        match self.retry_after {
            Some(secs) => {
                let value = HeaderValue::from_str(&secs.to_string())
                    .unwrap_or(HeaderValue::from_static("3600"));
                (status, [(header::RETRY_AFTER, value)], body).into_response()
            },
            None => (status, body).into_response(),
        }
    }
}

pub(crate) fn new_request_id() -> String {
    uuid::Uuid::new_v4().to_string()
}
