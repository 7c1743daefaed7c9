//! In-memory ledger for tests. Never used in production deployments,
//! where quota state must be shared across worker processes.

use async_trait::async_trait;
use dashmap::DashMap;
use stratus_types::ProxyError;

use super::{errors_key, usage_key, KeyCounters, UsageLedger};

#[derive(Default)]
pub struct MemoryLedger {
    counters: DashMap<String, u64>,
}

impl MemoryLedger {
    pub fn new() -> Self {
        MemoryLedger { counters: DashMap::new() }
    }

    fn bump(&self, key: String) -> u64 {
        let mut entry = self.counters.entry(key).or_insert(0);
        *entry += 1;
        *entry
    }

    fn read(&self, key: &str) -> u64 {
        self.counters.get(key).map(|v| *v).unwrap_or(0)
    }
}

#[async_trait]
impl UsageLedger for MemoryLedger {
    async fn increment_usage(&self, cred_id: &str, day: &str) -> u64 {
        self.bump(usage_key(cred_id, day))
    }

    async fn increment_error(&self, cred_id: &str, day: &str) -> u64 {
        self.bump(errors_key(cred_id, day))
    }

    async fn get_usage(&self, cred_id: &str, day: &str) -> Result<u64, ProxyError> {
        Ok(self.read(&usage_key(cred_id, day)))
    }

    async fn get_errors(&self, cred_id: &str, day: &str) -> Result<u64, ProxyError> {
        Ok(self.read(&errors_key(cred_id, day)))
    }

    async fn list_counters(
        &self,
        cred_ids: &[String],
        day: &str,
    ) -> Result<Vec<KeyCounters>, ProxyError> {
        Ok(cred_ids
            .iter()
            .map(|id| KeyCounters {
                cred_id: id.clone(),
                usage: self.read(&usage_key(id, day)),
                errors: self.read(&errors_key(id, day)),
            })
            .collect())
    }

    async fn reset(&self, cred_ids: &[String], day: &str) {
        for id in cred_ids {
            self.counters.remove(&usage_key(id, day));
            self.counters.remove(&errors_key(id, day));
        }
    }

    async fn ping(&self) -> Result<(), ProxyError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_counters_start_absent_and_increment() {
        let ledger = MemoryLedger::new();
        assert_eq!(ledger.get_usage("key_1", "2026-08-02").await.unwrap(), 0);

        assert_eq!(ledger.increment_usage("key_1", "2026-08-02").await, 1);
        assert_eq!(ledger.increment_usage("key_1", "2026-08-02").await, 2);
        assert_eq!(ledger.increment_error("key_1", "2026-08-02").await, 1);

        assert_eq!(ledger.get_usage("key_1", "2026-08-02").await.unwrap(), 2);
        assert_eq!(ledger.get_errors("key_1", "2026-08-02").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_day_keys_are_independent() {
        let ledger = MemoryLedger::new();
        ledger.increment_usage("key_1", "2026-08-02").await;
        assert_eq!(ledger.get_usage("key_1", "2026-08-03").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_list_and_reset() {
        let ledger = MemoryLedger::new();
        let ids = vec!["key_1".to_string(), "key_2".to_string()];
        ledger.increment_usage("key_1", "2026-08-02").await;
        ledger.increment_error("key_2", "2026-08-02").await;

        let counters = ledger.list_counters(&ids, "2026-08-02").await.unwrap();
        assert_eq!(counters.len(), 2);
        assert_eq!(counters[0].usage, 1);
        assert_eq!(counters[1].errors, 1);

        ledger.reset(&ids, "2026-08-02").await;
        let counters = ledger.list_counters(&ids, "2026-08-02").await.unwrap();
        assert!(counters.iter().all(|c| c.usage == 0 && c.errors == 0));
    }
}
