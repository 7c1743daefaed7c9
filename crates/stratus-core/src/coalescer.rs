//! Single-flight broker for identical in-flight requests.
//!
//! At most one upstream fetch runs per fingerprint per process. The
//! produce future is detached onto the runtime, so a disconnecting client
//! cannot cancel it: cache fills and ledger increments always complete,
//! and late waiters still receive the outcome.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use bytes::Bytes;
use dashmap::DashMap;
use futures::future::Shared;
use futures::FutureExt;
use stratus_types::ProxyError;

type Outcome = Result<Bytes, ProxyError>;
type SharedFetch = Shared<Pin<Box<dyn Future<Output = Outcome> + Send>>>;

#[derive(Default)]
pub struct Inflight {
    pending: Arc<DashMap<String, SharedFetch>>,
}

impl Inflight {
    pub fn new() -> Self {
        Inflight { pending: Arc::new(DashMap::new()) }
    }

    /// Fingerprints currently being fetched. Telemetry gauge.
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Joins the pending fetch for `fingerprint`, or registers `produce`
    /// as the one fetch all concurrent callers share.
    pub async fn get_or_run<F>(&self, fingerprint: &str, produce: F) -> Outcome
    where
        F: Future<Output = Outcome> + Send + 'static,
    {
        use dashmap::mapref::entry::Entry;

        let fetch = match self.pending.entry(fingerprint.to_string()) {
            Entry::Occupied(existing) => existing.get().clone(),
            Entry::Vacant(slot) => {
                let task = tokio::spawn(produce);
                let boxed: Pin<Box<dyn Future<Output = Outcome> + Send>> =
                    Box::pin(async move {
                        match task.await {
                            Ok(outcome) => outcome,
                            Err(join_err) => Err(ProxyError::UpstreamTransport(format!(
                                "fetch task failed: {join_err}"
                            ))),
                        }
                    });
                let fetch = boxed.shared();
                slot.insert(fetch.clone());

                // Janitor: removes the entry once the fetch settles, even
                // if every waiter has gone away.
                let pending = Arc::clone(&self.pending);
                let key = fingerprint.to_string();
                let watched = fetch.clone();
                tokio::spawn(async move {
                    let _ = watched.clone().await;
                    pending.remove_if(&key, |_, current| current.ptr_eq(&watched));
                });

                fetch
            },
        };

        fetch.await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    fn ok(text: &str) -> Outcome {
        Ok(Bytes::from(text.to_string()))
    }

    #[tokio::test]
    async fn test_concurrent_callers_share_one_run() {
        let inflight = Arc::new(Inflight::new());
        let calls = Arc::new(AtomicU32::new(0));

        let mut handles = Vec::new();
        for _ in 0..8 {
            let inflight = inflight.clone();
            let calls = calls.clone();
            handles.push(tokio::spawn(async move {
                inflight
                    .get_or_run("fp", async move {
                        calls.fetch_add(1, Ordering::SeqCst);
                        tokio::time::sleep(Duration::from_millis(50)).await;
                        ok("body")
                    })
                    .await
            }));
        }

        for handle in handles {
            assert_eq!(handle.await.unwrap().unwrap(), Bytes::from("body"));
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_errors_reach_every_waiter() {
        let inflight = Arc::new(Inflight::new());

        let first = {
            let inflight = inflight.clone();
            tokio::spawn(async move {
                inflight
                    .get_or_run("fp", async {
                        tokio::time::sleep(Duration::from_millis(30)).await;
                        Err(ProxyError::UpstreamTransport("boom".into()))
                    })
                    .await
            })
        };
        tokio::time::sleep(Duration::from_millis(5)).await;
        let second = inflight.get_or_run("fp", async { ok("unused") }).await;

        assert!(first.await.unwrap().is_err());
        assert_eq!(second, Err(ProxyError::UpstreamTransport("boom".into())));
    }

    #[tokio::test]
    async fn test_entry_removed_after_completion() {
        let inflight = Inflight::new();
        let _ = inflight.get_or_run("fp", async { ok("x") }).await;
        // Janitor runs on its own task.
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(inflight.is_empty());
    }

    #[tokio::test]
    async fn test_run_survives_cancelled_initiator() {
        let inflight = Arc::new(Inflight::new());
        let completed = Arc::new(AtomicU32::new(0));

        let initiator = {
            let inflight = inflight.clone();
            let completed = completed.clone();
            tokio::spawn(async move {
                inflight
                    .get_or_run("fp", async move {
                        tokio::time::sleep(Duration::from_millis(40)).await;
                        completed.fetch_add(1, Ordering::SeqCst);
                        ok("body")
                    })
                    .await
            })
        };

        tokio::time::sleep(Duration::from_millis(5)).await;
        initiator.abort();

        // Side effects still land and late waiters still get the body.
        tokio::time::sleep(Duration::from_millis(60)).await;
        assert_eq!(completed.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_distinct_fingerprints_run_independently() {
        let inflight = Arc::new(Inflight::new());
        let calls = Arc::new(AtomicU32::new(0));

        for fp in ["a", "b"] {
            let calls = calls.clone();
            let _ = inflight
                .get_or_run(fp, async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    ok("body")
                })
                .await;
        }
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }
}
