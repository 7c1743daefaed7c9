//! Health and liveness endpoints.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;

use crate::state::AppState;

pub async fn basic(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(serde_json::json!({"status": "ok", "uptimeSecs": state.uptime_secs()}))
}

pub async fn detailed(State(state): State<AppState>) -> Json<serde_json::Value> {
    let ledger_ok = state.service.ledger_ping().await.is_ok();
    let (selectable, statuses) = match state.service.key_statuses().await {
        Ok(statuses) => {
            (statuses.iter().filter(|s| s.selectable).count(), Some(statuses))
        },
        Err(_) => (0, None),
    };
    let cache = state.service.cache().stats();

    Json(serde_json::json!({
        "status": if ledger_ok && selectable > 0 { "ok" } else { "degraded" },
        "uptimeSecs": state.uptime_secs(),
        "day": state.service.clock().today(),
        "ledger": {"reachable": ledger_ok},
        "credentials": {
            "pool": state.service.pool_size(),
            "selectable": selectable,
            "keys": statuses,
        },
        "cache": cache,
        "rateLimit": {
            "max": state.settings.rate_limit_max,
            "windowMs": state.settings.rate_limit_window.as_millis() as u64,
        },
    }))
}

/// Ready means: the ledger answers and at least one credential is
/// selectable. Requests would fail otherwise, so load balancers should
/// route elsewhere.
pub async fn ready(State(state): State<AppState>) -> Response {
    let ledger_ok = state.service.ledger_ping().await.is_ok();
    let selectable = match state.service.key_statuses().await {
        Ok(statuses) => statuses.iter().any(|s| s.selectable),
        Err(_) => false,
    };

    if ledger_ok && selectable {
        (StatusCode::OK, Json(serde_json::json!({"ready": true}))).into_response()
    } else {
        (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(serde_json::json!({
                "ready": false,
                "ledger": ledger_ok,
                "credentialsAvailable": selectable,
            })),
        )
            .into_response()
    }
}

pub async fn live() -> Json<serde_json::Value> {
    Json(serde_json::json!({"alive": true}))
}

pub async fn uptime(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "uptimeSecs": state.uptime_secs(),
        "startedAt": state.started_at().to_rfc3339(),
    }))
}

pub async fn version() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "name": env!("CARGO_PKG_NAME"),
        "version": env!("CARGO_PKG_VERSION"),
    }))
}
