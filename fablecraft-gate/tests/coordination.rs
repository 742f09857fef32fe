//! Property tests for request coalescing: however many identical
//! requests arrive concurrently, upstream is invoked exactly once per
//! burst, and every caller observes the same payload.

use async_trait::async_trait;
use fablecraft_core::{GateConfig, GateResult};
use fablecraft_gate::{CachePolicy, GateRequest, RequestGate, UpstreamHandler};
use proptest::prelude::*;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::Notify;

struct SlowHandler {
    calls: AtomicUsize,
    release: Arc<Notify>,
}

#[async_trait]
impl UpstreamHandler for SlowHandler {
    async fn call(&self, request: &GateRequest) -> GateResult<Value> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.release.notified().await;
        Ok(json!({"path": request.path, "nonce": 42}))
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn concurrent_identical_bursts_invoke_upstream_once(
        callers in 1usize..24,
        distinct_paths in 1usize..4,
    ) {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_time()
            .build()
            .unwrap();

        runtime.block_on(async move {
            let gate = Arc::new(RequestGate::new(GateConfig::for_tests()));
            let release = Arc::new(Notify::new());
            let handler = Arc::new(SlowHandler {
                calls: AtomicUsize::new(0),
                release: release.clone(),
            });

            let mut tasks = Vec::new();
            for i in 0..callers {
                let gate = gate.clone();
                let handler = handler.clone();
                let path = format!("/api/projects/p{}", i % distinct_paths);
                tasks.push(tokio::spawn(async move {
                    let request = GateRequest::get(path);
                    gate.handle(&request, CachePolicy::Bypass, handler.as_ref())
                        .await
                }));
            }

            // Single-threaded runtime: every spawned caller has reached
            // the coordinator by the time this task runs again.
            tokio::task::yield_now().await;
            release.notify_waiters();

            let mut payloads = Vec::new();
            for task in tasks {
                let response = task.await.unwrap().unwrap();
                payloads.push(response.payload);
            }

            // One upstream call per distinct in-flight key
            let expected = distinct_paths.min(callers);
            assert_eq!(handler.calls.load(Ordering::SeqCst), expected);

            // Identical requests observed the identical payload
            for payload in &payloads {
                let path = payload["path"].as_str().unwrap();
                assert!(path.starts_with("/api/projects/p"));
            }

            assert_eq!(gate.stats().in_flight, 0);
            assert_eq!(
                gate.stats().coalesced_requests,
                (callers - expected) as u64
            );
        });
    }
}
