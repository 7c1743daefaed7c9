//! The main proxied endpoint.

use axum::extract::{Query, State};
use axum::http::header;
use axum::response::{IntoResponse, Response};
use serde::Deserialize;
use stratus_core::WeatherQuery;
use stratus_types::ProxyError;

use super::{new_request_id, ApiError};
use crate::state::AppState;

/// Raw query parameters. Everything arrives as a string so that parse
/// failures produce this service's 400 envelope instead of the
/// extractor's default rejection.
#[derive(Deserialize)]
pub struct OneCallParams {
    lat: Option<String>,
    lon: Option<String>,
    appid: Option<String>,
    exclude: Option<String>,
    units: Option<String>,
    lang: Option<String>,
}

pub async fn get_onecall(
    State(state): State<AppState>,
    Query(params): Query<OneCallParams>,
) -> Response {
    let request_id = new_request_id();

    let query = match validate(&state, params) {
        Ok(query) => query,
        Err(error) => {
            tracing::debug!(request_id = %request_id, error = %error, "request rejected");
            return ApiError::new(error, request_id).into_response();
        },
    };

    match state.service.get_weather(query).await {
        Ok(body) => {
            ([(header::CONTENT_TYPE, "application/json")], body).into_response()
        },
        Err(error) => {
            tracing::warn!(request_id = %request_id, error = %error, "request failed");
            let mut api_error = ApiError::new(error, request_id);
            if matches!(api_error.error, ProxyError::NoCredentialsAvailable) {
                api_error.retry_after = Some(state.service.clock().secs_until_rollover());
            }
            api_error.into_response()
        },
    }
}

fn validate(state: &AppState, params: OneCallParams) -> Result<WeatherQuery, ProxyError> {
    match params.appid.as_deref() {
        Some(appid) if appid == state.settings.app_id_key => {},
        Some(_) => return Err(ProxyError::Auth),
        None => return Err(ProxyError::Validation("appid is required".to_string())),
    }

    let lat = parse_coord(params.lat.as_deref(), "lat")?;
    let lon = parse_coord(params.lon.as_deref(), "lon")?;

    WeatherQuery::new(lat, lon, params.exclude, params.units, params.lang)
}

fn parse_coord(raw: Option<&str>, name: &str) -> Result<f64, ProxyError> {
    let raw = raw.ok_or_else(|| ProxyError::Validation(format!("{name} is required")))?;
    raw.trim()
        .parse::<f64>()
        .map_err(|_| ProxyError::Validation(format!("{name} is not a number: '{raw}'")))
}
