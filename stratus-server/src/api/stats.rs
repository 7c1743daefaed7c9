//! Telemetry endpoints.

use axum::extract::{Query, State};
use axum::http::header;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Deserialize;

use super::{new_request_id, ApiError};
use crate::state::AppState;

pub async fn overview(State(state): State<AppState>) -> Response {
    let snapshot = state.service.snapshot();
    match state.service.key_statuses().await {
        Ok(keys) => Json(serde_json::json!({
            "success": true,
            "timestamp": chrono::Utc::now().to_rfc3339(),
            "stats": snapshot.stats,
            "cacheHitRate": snapshot.cache_hit_rate,
            "keys": keys,
        }))
        .into_response(),
        Err(error) => ApiError::new(error, new_request_id()).into_response(),
    }
}

pub async fn detailed(State(state): State<AppState>) -> Response {
    let snapshot = state.service.snapshot();
    let cache = state.service.cache().stats();
    match state.service.key_statuses().await {
        Ok(keys) => Json(serde_json::json!({
            "success": true,
            "timestamp": chrono::Utc::now().to_rfc3339(),
            "uptimeSecs": state.uptime_secs(),
            "day": state.service.clock().today(),
            "stats": snapshot.stats,
            "responseTimes": snapshot.response_times,
            "avgResponseMs": snapshot.avg_response_ms,
            "cacheHitRate": snapshot.cache_hit_rate,
            "inFlight": snapshot.in_flight,
            "cache": cache,
            "keys": keys,
        }))
        .into_response(),
        Err(error) => ApiError::new(error, new_request_id()).into_response(),
    }
}

pub async fn keys(State(state): State<AppState>) -> Response {
    match state.service.key_statuses().await {
        Ok(keys) => Json(serde_json::json!({
            "success": true,
            "day": state.service.clock().today(),
            "keys": keys,
        }))
        .into_response(),
        Err(error) => ApiError::new(error, new_request_id()).into_response(),
    }
}

pub async fn cache(State(state): State<AppState>) -> Json<serde_json::Value> {
    let stats = state.service.cache().stats();
    let snapshot = state.service.snapshot();
    Json(serde_json::json!({
        "success": true,
        "cache": stats,
        "hitRate": snapshot.cache_hit_rate,
    }))
}

pub async fn performance(State(state): State<AppState>) -> Json<serde_json::Value> {
    let snapshot = state.service.snapshot();
    Json(serde_json::json!({
        "success": true,
        "responseTimes": snapshot.response_times,
        "avgResponseMs": snapshot.avg_response_ms,
        "inFlight": snapshot.in_flight,
    }))
}

#[derive(Deserialize)]
pub struct ExportParams {
    format: Option<String>,
}

pub async fn export(
    State(state): State<AppState>,
    Query(params): Query<ExportParams>,
) -> Response {
    let snapshot = state.service.snapshot();

    match params.format.as_deref().unwrap_or("json") {
        "json" => Json(serde_json::json!({
            "exportedAt": chrono::Utc::now().to_rfc3339(),
            "uptimeSecs": state.uptime_secs(),
            "snapshot": snapshot,
        }))
        .into_response(),
        "csv" => {
            let stats = snapshot.stats;
            let times = snapshot.response_times;
            let mut csv = String::from("metric,value\n");
            for (metric, value) in [
                ("total_requests", stats.total_requests),
                ("cache_hits", stats.cache_hits),
                ("cache_writes", stats.cache_writes),
                ("upstream_calls", stats.upstream_calls),
                ("error_count", stats.error_count),
                ("response_time_count", times.count),
                ("response_time_total_ms", times.total_ms),
                ("response_time_min_ms", times.min_ms),
                ("response_time_max_ms", times.max_ms),
                ("in_flight", snapshot.in_flight as u64),
                ("uptime_secs", state.uptime_secs()),
            ] {
                csv.push_str(&format!("{metric},{value}\n"));
            }
            ([(header::CONTENT_TYPE, "text/csv")], csv).into_response()
        },
        other => ApiError::new(
            stratus_types::ProxyError::Validation(format!(
                "format must be json or csv, got '{other}'"
            )),
            new_request_id(),
        )
        .into_response(),
    }
}
