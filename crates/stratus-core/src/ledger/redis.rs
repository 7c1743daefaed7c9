//! Redis-backed ledger. The single production implementation.

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use stratus_types::ProxyError;

use super::{errors_key, usage_key, KeyCounters, UsageLedger, LEDGER_TTL_SECS};

/// Ledger over a single Redis instance. `ConnectionManager` reconnects
/// transparently and clones cheaply, so one instance serves all tasks.
#[derive(Clone)]
pub struct RedisLedger {
    conn: ConnectionManager,
}

impl RedisLedger {
    /// Connects to the backend, verifying reachability once.
    pub async fn connect(url: &str) -> Result<RedisLedger, ProxyError> {
        let client = redis::Client::open(url)
            .map_err(|e| ProxyError::LedgerUnavailable(format!("invalid redis url: {e}")))?;
        let conn = client
            .get_connection_manager()
            .await
            .map_err(|e| ProxyError::LedgerUnavailable(format!("redis connect failed: {e}")))?;
        Ok(RedisLedger { conn })
    }

    /// INCR + EXPIRE in one atomic round trip. The refresh on every write
    /// is idempotent; the key's day component does the real scoping.
    async fn increment(&self, key: &str) -> Result<u64, redis::RedisError> {
        let mut conn = self.conn.clone();
        let (count, _): (u64, i64) = redis::pipe()
            .atomic()
            .incr(key, 1u64)
            .expire(key, LEDGER_TTL_SECS)
            .query_async(&mut conn)
            .await?;
        Ok(count)
    }

    async fn read(&self, key: &str) -> Result<u64, ProxyError> {
        let mut conn = self.conn.clone();
        let value: Option<u64> = conn
            .get(key)
            .await
            .map_err(|e| ProxyError::LedgerUnavailable(e.to_string()))?;
        Ok(value.unwrap_or(0))
    }
}

#[async_trait]
impl UsageLedger for RedisLedger {
    async fn increment_usage(&self, cred_id: &str, day: &str) -> u64 {
        match self.increment(&usage_key(cred_id, day)).await {
            Ok(count) => count,
            Err(e) => {
                tracing::warn!(key = %cred_id, day = %day, error = %e, "usage increment lost");
                0
            },
        }
    }

    async fn increment_error(&self, cred_id: &str, day: &str) -> u64 {
        match self.increment(&errors_key(cred_id, day)).await {
            Ok(count) => count,
            Err(e) => {
                tracing::warn!(key = %cred_id, day = %day, error = %e, "error increment lost");
                0
            },
        }
    }

    async fn get_usage(&self, cred_id: &str, day: &str) -> Result<u64, ProxyError> {
        self.read(&usage_key(cred_id, day)).await
    }

    async fn get_errors(&self, cred_id: &str, day: &str) -> Result<u64, ProxyError> {
        self.read(&errors_key(cred_id, day)).await
    }

    async fn list_counters(
        &self,
        cred_ids: &[String],
        day: &str,
    ) -> Result<Vec<KeyCounters>, ProxyError> {
        if cred_ids.is_empty() {
            return Ok(Vec::new());
        }

        let usage_keys: Vec<String> = cred_ids.iter().map(|id| usage_key(id, day)).collect();
        let error_keys: Vec<String> = cred_ids.iter().map(|id| errors_key(id, day)).collect();

        let mut conn = self.conn.clone();
        let usage: Vec<Option<u64>> = conn
            .mget(&usage_keys)
            .await
            .map_err(|e| ProxyError::LedgerUnavailable(e.to_string()))?;
        let errors: Vec<Option<u64>> = conn
            .mget(&error_keys)
            .await
            .map_err(|e| ProxyError::LedgerUnavailable(e.to_string()))?;

        Ok(cred_ids
            .iter()
            .enumerate()
            .map(|(i, id)| KeyCounters {
                cred_id: id.clone(),
                usage: usage.get(i).copied().flatten().unwrap_or(0),
                errors: errors.get(i).copied().flatten().unwrap_or(0),
            })
            .collect())
    }

    async fn reset(&self, cred_ids: &[String], day: &str) {
        if cred_ids.is_empty() {
            return;
        }
        let mut conn = self.conn.clone();
        let keys: Vec<String> = cred_ids
            .iter()
            .flat_map(|id| [usage_key(id, day), errors_key(id, day)])
            .collect();
        if let Err(e) = conn.del::<_, ()>(keys).await {
            tracing::warn!(error = %e, "ledger reset failed");
        }
    }

    async fn ping(&self) -> Result<(), ProxyError> {
        let mut conn = self.conn.clone();
        redis::cmd("PING")
            .query_async::<String>(&mut conn)
            .await
            .map(|_| ())
            .map_err(|e| ProxyError::LedgerUnavailable(e.to_string()))
    }
}
