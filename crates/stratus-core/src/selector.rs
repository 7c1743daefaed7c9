//! Credential selection over the shared ledger.

use std::sync::Arc;

use stratus_types::models::KeyStatus;
use stratus_types::{Credential, ProxyError};

use crate::ledger::UsageLedger;

/// Consecutive upstream failures after which a credential sits out the
/// rest of the day.
pub const MAX_ERRORS: u64 = 3;

/// Chooses the ordered list of credentials to try for one attempt.
///
/// Selection works on snapshot reads; concurrent workers may overshoot
/// the nominal daily limit by their in-flight count. The system is
/// quota-protective, not quota-exact.
pub struct KeySelector {
    pool: Vec<Credential>,
    ledger: Arc<dyn UsageLedger>,
    daily_limit: u64,
}

impl KeySelector {
    pub fn new(pool: Vec<Credential>, ledger: Arc<dyn UsageLedger>, daily_limit: u64) -> Self {
        KeySelector { pool, ledger, daily_limit }
    }

    pub fn pool_size(&self) -> usize {
        self.pool.len()
    }

    fn pool_ids(&self) -> Vec<String> {
        self.pool.iter().map(|c| c.id.clone()).collect()
    }

    /// All selectable credentials for `day`, least-used first with
    /// priority as the deterministic tie-break. Usage-ascending gradually
    /// equalizes load; priority keeps ordering stable under concurrent
    /// selection across workers.
    pub async fn select_all(&self, day: &str) -> Result<Vec<Credential>, ProxyError> {
        let counters = self.ledger.list_counters(&self.pool_ids(), day).await?;

        let mut eligible: Vec<(u64, &Credential)> = Vec::with_capacity(self.pool.len());
        for (cred, counts) in self.pool.iter().zip(counters.iter()) {
            debug_assert_eq!(cred.id, counts.cred_id);
            if counts.usage < self.daily_limit && counts.errors < MAX_ERRORS {
                eligible.push((counts.usage, cred));
            }
        }

        if eligible.is_empty() {
            tracing::warn!(day = %day, pool = self.pool.len(), "no selectable credentials");
            return Err(ProxyError::NoCredentialsAvailable);
        }

        eligible.sort_by(|a, b| a.0.cmp(&b.0).then(a.1.priority.cmp(&b.1.priority)));
        Ok(eligible.into_iter().map(|(_, cred)| cred.clone()).collect())
    }

    /// Per-credential ledger view for the stats surface.
    pub async fn key_statuses(&self, day: &str) -> Result<Vec<KeyStatus>, ProxyError> {
        let counters = self.ledger.list_counters(&self.pool_ids(), day).await?;
        Ok(self
            .pool
            .iter()
            .zip(counters.iter())
            .map(|(cred, counts)| KeyStatus {
                id: cred.id.clone(),
                priority: cred.priority,
                usage: counts.usage,
                errors: counts.errors,
                selectable: counts.usage < self.daily_limit && counts.errors < MAX_ERRORS,
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::MemoryLedger;

    const DAY: &str = "2026-08-02";

    fn selector(limit: u64) -> (KeySelector, Arc<MemoryLedger>) {
        let ledger = Arc::new(MemoryLedger::new());
        let pool = Credential::pool_from_secrets(["s1", "s2", "s3"]);
        (KeySelector::new(pool, ledger.clone(), limit), ledger)
    }

    #[tokio::test]
    async fn test_fresh_day_orders_by_priority() {
        let (selector, _ledger) = selector(10);
        let picked = selector.select_all(DAY).await.unwrap();
        let ids: Vec<&str> = picked.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, ["key_1", "key_2", "key_3"]);
    }

    #[tokio::test]
    async fn test_least_used_comes_first() {
        let (selector, ledger) = selector(10);
        ledger.increment_usage("key_1", DAY).await;
        ledger.increment_usage("key_1", DAY).await;
        ledger.increment_usage("key_2", DAY).await;

        let picked = selector.select_all(DAY).await.unwrap();
        let ids: Vec<&str> = picked.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, ["key_3", "key_2", "key_1"]);
    }

    #[tokio::test]
    async fn test_quota_exhaustion_excludes() {
        let (selector, ledger) = selector(2);
        ledger.increment_usage("key_1", DAY).await;
        ledger.increment_usage("key_1", DAY).await;

        let picked = selector.select_all(DAY).await.unwrap();
        assert!(picked.iter().all(|c| c.id != "key_1"));
    }

    #[tokio::test]
    async fn test_error_blocked_excludes() {
        let (selector, ledger) = selector(10);
        for _ in 0..MAX_ERRORS {
            ledger.increment_error("key_2", DAY).await;
        }

        let picked = selector.select_all(DAY).await.unwrap();
        assert!(picked.iter().all(|c| c.id != "key_2"));

        // Two errors keep the credential in play.
        ledger.increment_error("key_3", DAY).await;
        ledger.increment_error("key_3", DAY).await;
        let picked = selector.select_all(DAY).await.unwrap();
        assert!(picked.iter().any(|c| c.id == "key_3"));
    }

    #[tokio::test]
    async fn test_empty_pool_is_no_credentials() {
        let (selector, ledger) = selector(1);
        for id in ["key_1", "key_2", "key_3"] {
            ledger.increment_usage(id, DAY).await;
        }
        assert_eq!(selector.select_all(DAY).await, Err(ProxyError::NoCredentialsAvailable));
    }

    #[tokio::test]
    async fn test_next_day_restores_eligibility() {
        let (selector, ledger) = selector(1);
        for id in ["key_1", "key_2", "key_3"] {
            ledger.increment_usage(id, DAY).await;
        }
        assert!(selector.select_all(DAY).await.is_err());

        let picked = selector.select_all("2026-08-03").await.unwrap();
        assert_eq!(picked.len(), 3);
    }

    #[tokio::test]
    async fn test_key_statuses_reports_eligibility() {
        let (selector, ledger) = selector(2);
        ledger.increment_usage("key_1", DAY).await;
        ledger.increment_usage("key_1", DAY).await;

        let statuses = selector.key_statuses(DAY).await.unwrap();
        assert_eq!(statuses.len(), 3);
        assert!(!statuses[0].selectable);
        assert_eq!(statuses[0].usage, 2);
        assert!(statuses[1].selectable);
    }
}
