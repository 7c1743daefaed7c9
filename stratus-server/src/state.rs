//! Shared application state, passed explicitly through the router.

use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use stratus_core::{Settings, WeatherService};

#[derive(Clone)]
pub struct AppState {
    pub service: Arc<WeatherService>,
    pub settings: Arc<Settings>,
    started_at: Instant,
    started_at_utc: DateTime<Utc>,
}

impl AppState {
    pub fn new(service: Arc<WeatherService>, settings: Arc<Settings>) -> Self {
        AppState { service, settings, started_at: Instant::now(), started_at_utc: Utc::now() }
    }

    pub fn uptime_secs(&self) -> u64 {
        self.started_at.elapsed().as_secs()
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at_utc
    }
}
