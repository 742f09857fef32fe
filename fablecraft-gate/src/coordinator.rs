//! Request Coordination
//!
//! Coalesces concurrent requests that share a fingerprint onto a single
//! upstream computation. The first caller for a key becomes the leader
//! and runs the computation exactly once; every caller that arrives
//! before completion becomes a waiter and receives the leader's outcome
//! verbatim - success or failure alike.
//!
//! The correctness-critical invariant lives in `coordinate`: the
//! check-for-existing and create-new steps happen under one map-entry
//! guard with no await point in between, so no interleaving (or true
//! parallelism) can start two computations for one key.

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use fablecraft_core::{GateError, GateResult};
use serde_json::Value;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::watch;

/// Outcome of an in-flight computation, shared by leader and waiters.
type FlightOutcome = GateResult<Arc<Value>>;

/// Result of a coordinated call.
#[derive(Debug, Clone)]
pub struct CoordinatedOutcome {
    /// The computation's outcome - identical for every caller.
    pub outcome: FlightOutcome,
    /// Whether this caller was coalesced onto another caller's
    /// computation rather than running it itself.
    pub coalesced: bool,
}

enum Role {
    Leader(watch::Sender<Option<FlightOutcome>>),
    Waiter(watch::Receiver<Option<FlightOutcome>>),
}

/// Removes the in-flight entry when the leader's scope ends.
///
/// The explicit drop in the normal path keeps the ordering "remove,
/// then publish"; the guard also covers leader cancellation, which
/// would otherwise leave a dead entry that blocks the key forever.
struct FlightGuard<'a> {
    coordinator: &'a RequestCoordinator,
    key: &'a str,
}

impl Drop for FlightGuard<'_> {
    fn drop(&mut self) {
        self.coordinator.inflight.remove(self.key);
    }
}

/// Tracks in-flight computations by fingerprint.
#[derive(Debug, Default)]
pub struct RequestCoordinator {
    inflight: DashMap<String, watch::Receiver<Option<FlightOutcome>>>,
    led: AtomicU64,
    coalesced: AtomicU64,
}

impl RequestCoordinator {
    /// Create an empty coordinator.
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `compute` for `key`, or join a computation already in
    /// flight for the same key.
    ///
    /// The leader runs `compute` exactly once and its outcome is
    /// delivered to every waiter registered before completion. The
    /// in-flight record is discarded the moment the computation
    /// finishes - it never outlives its own request. A computation
    /// always runs to completion once started, even if every waiter
    /// disappears, because late waiters may still hold the receiver.
    pub async fn coordinate<F, Fut>(&self, key: &str, compute: F) -> CoordinatedOutcome
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = GateResult<Value>>,
    {
        // Indivisible check-then-create: the entry guard is held across
        // both steps and nothing awaits while it is held.
        let role = match self.inflight.entry(key.to_string()) {
            Entry::Occupied(existing) => Role::Waiter(existing.get().clone()),
            Entry::Vacant(vacant) => {
                let (tx, rx) = watch::channel(None);
                vacant.insert(rx);
                Role::Leader(tx)
            }
        };

        match role {
            Role::Leader(tx) => {
                self.led.fetch_add(1, Ordering::Relaxed);
                let guard = FlightGuard {
                    coordinator: self,
                    key,
                };

                let outcome: FlightOutcome = compute().await.map(Arc::new);

                // Remove before publishing so a caller arriving after
                // completion starts a fresh computation instead of
                // latching onto a finished one.
                drop(guard);
                let _ = tx.send(Some(outcome.clone()));

                CoordinatedOutcome {
                    outcome,
                    coalesced: false,
                }
            }
            Role::Waiter(mut rx) => {
                self.coalesced.fetch_add(1, Ordering::Relaxed);
                tracing::debug!(key = %key, "Coalescing onto in-flight computation");

                let outcome = loop {
                    if let Some(outcome) = rx.borrow_and_update().clone() {
                        break outcome;
                    }
                    if rx.changed().await.is_err() {
                        // Leader dropped without publishing (cancelled
                        // mid-flight). Surface as an upstream failure
                        // rather than hanging forever.
                        break Err(GateError::upstream("in-flight computation was abandoned"));
                    }
                };

                CoordinatedOutcome {
                    outcome,
                    coalesced: true,
                }
            }
        }
    }

    /// Number of computations currently in flight.
    pub fn in_flight(&self) -> usize {
        self.inflight.len()
    }

    /// Total computations this coordinator has led.
    pub fn led_count(&self) -> u64 {
        self.led.load(Ordering::Relaxed)
    }

    /// Total callers that were coalesced onto another computation.
    pub fn coalesced_count(&self) -> u64 {
        self.coalesced.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;

    #[tokio::test]
    async fn test_concurrent_identical_requests_compute_once() {
        let coordinator = Arc::new(RequestCoordinator::new());
        let invocations = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for _ in 0..5 {
            let coordinator = Arc::clone(&coordinator);
            let invocations = Arc::clone(&invocations);
            handles.push(tokio::spawn(async move {
                coordinator
                    .coordinate("GET /projects/42/characters?limit=20", || async move {
                        invocations.fetch_add(1, Ordering::SeqCst);
                        tokio::time::sleep(Duration::from_millis(100)).await;
                        Ok(json!([{"id": 1}, {"id": 2}]))
                    })
                    .await
            }));
        }

        let mut coalesced = 0;
        for handle in handles {
            let result = handle.await.unwrap();
            let payload = result.outcome.unwrap();
            assert_eq!(*payload, json!([{"id": 1}, {"id": 2}]));
            if result.coalesced {
                coalesced += 1;
            }
        }

        assert_eq!(invocations.load(Ordering::SeqCst), 1);
        assert_eq!(coalesced, 4);
        assert_eq!(coordinator.in_flight(), 0, "record must not outlive the request");
    }

    #[tokio::test]
    async fn test_failure_propagates_to_every_waiter() {
        let coordinator = Arc::new(RequestCoordinator::new());
        let invocations = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for _ in 0..4 {
            let coordinator = Arc::clone(&coordinator);
            let invocations = Arc::clone(&invocations);
            handles.push(tokio::spawn(async move {
                coordinator
                    .coordinate("GET /projects/missing", || async move {
                        invocations.fetch_add(1, Ordering::SeqCst);
                        tokio::time::sleep(Duration::from_millis(50)).await;
                        Err(GateError::upstream("project not found"))
                    })
                    .await
            }));
        }

        for handle in handles {
            let result = handle.await.unwrap();
            // Every caller sees the leader's exact error, not a
            // substituted coordination failure.
            assert_eq!(
                result.outcome.unwrap_err(),
                GateError::upstream("project not found")
            );
        }
        assert_eq!(invocations.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_distinct_keys_do_not_coalesce() {
        let coordinator = Arc::new(RequestCoordinator::new());
        let invocations = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for i in 0..3 {
            let coordinator = Arc::clone(&coordinator);
            let invocations = Arc::clone(&invocations);
            handles.push(tokio::spawn(async move {
                coordinator
                    .coordinate(&format!("GET /projects/{}", i), || async move {
                        invocations.fetch_add(1, Ordering::SeqCst);
                        tokio::time::sleep(Duration::from_millis(30)).await;
                        Ok(json!(i))
                    })
                    .await
            }));
        }

        for handle in handles {
            assert!(!handle.await.unwrap().coalesced);
        }
        assert_eq!(invocations.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_sequential_calls_compute_each_time() {
        let coordinator = RequestCoordinator::new();
        let invocations = AtomicUsize::new(0);

        for _ in 0..2 {
            let result = coordinator
                .coordinate("GET /projects/7", || async {
                    invocations.fetch_add(1, Ordering::SeqCst);
                    Ok(json!({"id": 7}))
                })
                .await;
            assert!(!result.coalesced);
            assert!(result.outcome.is_ok());
        }

        // Coalescing only applies to overlapping requests; caching
        // repeated results is the cache store's job.
        assert_eq!(invocations.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_abandoned_leader_unblocks_waiters() {
        let coordinator = Arc::new(RequestCoordinator::new());

        let leader = {
            let coordinator = Arc::clone(&coordinator);
            tokio::spawn(async move {
                coordinator
                    .coordinate("GET /projects/slow", || async {
                        tokio::time::sleep(Duration::from_secs(60)).await;
                        Ok(json!(null))
                    })
                    .await
            })
        };

        // Let the leader register before the waiter joins
        tokio::time::sleep(Duration::from_millis(20)).await;

        let waiter = {
            let coordinator = Arc::clone(&coordinator);
            tokio::spawn(async move {
                coordinator
                    .coordinate("GET /projects/slow", || async { Ok(json!("never runs")) })
                    .await
            })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;

        leader.abort();
        let result = waiter.await.unwrap();
        assert!(result.coalesced);
        assert!(result.outcome.is_err());
        assert_eq!(coordinator.in_flight(), 0);
    }
}
