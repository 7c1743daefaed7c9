//! Data models shared between the core pipeline and the HTTP surface.

pub mod credential;
pub mod stats;

pub use credential::Credential;
pub use stats::{CacheStats, KeyStatus, ProxyStats, ResponseTimes, StatsSnapshot};
