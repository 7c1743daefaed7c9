//! Cache administration endpoints.

use axum::extract::State;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Deserialize;
use stratus_core::WeatherQuery;
use stratus_types::ProxyError;
use tokio::task::JoinSet;

use super::{new_request_id, ApiError};
use crate::state::AppState;

const WARMUP_MAX_LOCATIONS: usize = 100;

pub async fn clear(State(state): State<AppState>) -> Json<serde_json::Value> {
    let cleared = state.service.cache().clear();
    tracing::info!(cleared, "cache cleared via API");
    Json(serde_json::json!({"success": true, "cleared": cleared}))
}

pub async fn info(State(state): State<AppState>) -> Json<serde_json::Value> {
    let stats = state.service.cache().stats();
    Json(serde_json::json!({"success": true, "cache": stats}))
}

#[derive(Deserialize)]
pub struct WarmupLocation {
    lat: f64,
    lon: f64,
    units: Option<String>,
    lang: Option<String>,
}

#[derive(Deserialize)]
pub struct WarmupRequest {
    locations: Vec<WarmupLocation>,
}

/// Pre-populates the cache through the normal pipeline, so warmup calls
/// are charged against credentials like any other request.
pub async fn warmup(
    State(state): State<AppState>,
    Json(payload): Json<WarmupRequest>,
) -> Response {
    let request_id = new_request_id();

    if payload.locations.is_empty() {
        return ApiError::new(
            ProxyError::Validation("locations must not be empty".to_string()),
            request_id,
        )
        .into_response();
    }
    if payload.locations.len() > WARMUP_MAX_LOCATIONS {
        return ApiError::new(
            ProxyError::Validation(format!(
                "at most {WARMUP_MAX_LOCATIONS} locations per warmup, got {}",
                payload.locations.len()
            )),
            request_id,
        )
        .into_response();
    }

    let total = payload.locations.len();
    let mut join_set: JoinSet<Result<(), ProxyError>> = JoinSet::new();

    for location in payload.locations {
        let query = match WeatherQuery::new(
            location.lat,
            location.lon,
            None,
            location.units,
            location.lang,
        ) {
            Ok(query) => query,
            Err(error) => return ApiError::new(error, request_id).into_response(),
        };
        let service = state.service.clone();
        join_set.spawn(async move { service.get_weather(query).await.map(|_| ()) });
    }

    let mut warmed = 0usize;
    let mut failed = 0usize;
    let mut errors: Vec<String> = Vec::new();

    while let Some(result) = join_set.join_next().await {
        match result {
            Ok(Ok(())) => warmed += 1,
            Ok(Err(error)) => {
                failed += 1;
                errors.push(error.to_string());
            },
            Err(join_error) => {
                failed += 1;
                tracing::error!(error = %join_error, "warmup task panicked");
            },
        }
    }

    tracing::info!(total, warmed, failed, "cache warmup finished");
    Json(serde_json::json!({
        "success": failed == 0,
        "total": total,
        "warmed": warmed,
        "failed": failed,
        "errors": errors,
        "requestId": request_id,
    }))
    .into_response()
}
