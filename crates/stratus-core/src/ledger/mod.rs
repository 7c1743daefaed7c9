//! Shared per-credential per-day counters.
//!
//! The ledger is the only cross-process state in the system. Counters are
//! scoped by (credential, DayKey) and stored under deterministic keys:
//! `ow:usage:<credId>:<day>` and `ow:errors:<credId>:<day>`, each with a
//! 48-hour TTL refreshed on write. Correctness derives from the DayKey in
//! the key itself; the TTL is only a garbage-collection ceiling.
//!
//! Failure semantics split by path: increments fail soft (log and return
//! a best-effort count) because losing a count is preferable to failing a
//! request that already succeeded upstream, while snapshot reads fail
//! hard because the selector cannot enforce quotas without them.

mod memory;
mod redis;

pub use memory::MemoryLedger;
pub use redis::RedisLedger;

use async_trait::async_trait;
use stratus_types::ProxyError;

/// Counter TTL: a safe ceiling of two calendar days.
pub const LEDGER_TTL_SECS: i64 = 48 * 3600;

const KEY_PREFIX: &str = "ow";

pub(crate) fn usage_key(cred_id: &str, day: &str) -> String {
    format!("{KEY_PREFIX}:usage:{cred_id}:{day}")
}

pub(crate) fn errors_key(cred_id: &str, day: &str) -> String {
    format!("{KEY_PREFIX}:errors:{cred_id}:{day}")
}

/// Usage and consecutive-error counts for one credential on one day.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyCounters {
    pub cred_id: String,
    pub usage: u64,
    pub errors: u64,
}

/// Atomic cross-process counters for usage and error tracking.
#[async_trait]
pub trait UsageLedger: Send + Sync {
    /// Atomically increments the usage counter, refreshing the TTL.
    /// Fails soft: on backend trouble this logs and returns 0.
    async fn increment_usage(&self, cred_id: &str, day: &str) -> u64;

    /// Atomically increments the consecutive-error counter, refreshing
    /// the TTL. Fails soft like [`increment_usage`](Self::increment_usage).
    async fn increment_error(&self, cred_id: &str, day: &str) -> u64;

    /// Current usage count; 0 when the key is absent.
    async fn get_usage(&self, cred_id: &str, day: &str) -> Result<u64, ProxyError>;

    /// Current error count; 0 when the key is absent.
    async fn get_errors(&self, cred_id: &str, day: &str) -> Result<u64, ProxyError>;

    /// Snapshot of both counters for every given credential. Reads are
    /// not atomic with each other; the selector's priority tie-break
    /// resolves races.
    async fn list_counters(
        &self,
        cred_ids: &[String],
        day: &str,
    ) -> Result<Vec<KeyCounters>, ProxyError>;

    /// Clears counters for the given credentials. Test fixtures only.
    async fn reset(&self, cred_ids: &[String], day: &str);

    /// Backend reachability probe for readiness checks.
    async fn ping(&self) -> Result<(), ProxyError>;
}
