//! Stratus core: the request pipeline of a credential-rotating weather
//! proxy.
//!
//! The pieces compose as cache lookup -> in-flight coalescing ->
//! credential selection over the shared ledger -> upstream call with
//! failover and bounded linear backoff -> bookkeeping. Everything here is
//! per-process except the [`ledger::UsageLedger`], which is the only
//! cross-process shared state.

pub mod cache;
pub mod coalescer;
pub mod config;
pub mod day;
pub mod ledger;
pub mod pipeline;
pub mod selector;
pub mod telemetry;
pub mod upstream;

pub use cache::ResponseCache;
pub use coalescer::Inflight;
pub use config::Settings;
pub use day::{DayClock, DayZone};
pub use pipeline::{WeatherQuery, WeatherService};
pub use selector::KeySelector;
pub use telemetry::RequestMonitor;
pub use upstream::UpstreamClient;
