//! Request Gate
//!
//! The composed front door for non-streaming reads: fingerprint the
//! request, serve fresh cached responses, coalesce concurrent identical
//! misses down to one upstream call, cache successful results under the
//! route's policy, and time the whole span.
//!
//! Cacheability is a two-step contract. The upstream handler only
//! produces a payload; whether and how long that payload is cached is
//! decided here by the route's [`CachePolicy`]. Handlers never patch
//! cache metadata into responses.

use crate::cache::CacheStore;
use crate::coordinator::RequestCoordinator;
use crate::fingerprint::RequestFingerprint;
use crate::monitor::{MemoryProbe, MonitorSnapshot, PerformanceMonitor, PerformanceSample};
use async_trait::async_trait;
use fablecraft_core::{GateConfig, GateError, GateResult};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

// ============================================================================
// REQUEST / RESPONSE
// ============================================================================

/// The gate's view of an incoming request, already reduced to the
/// parts that identify its result.
#[derive(Debug, Clone, PartialEq)]
pub struct GateRequest {
    pub method: String,
    pub path: String,
    pub query: BTreeMap<String, String>,
    pub body: Option<Value>,
}

impl GateRequest {
    pub fn get(path: impl Into<String>) -> Self {
        Self {
            method: "GET".to_string(),
            path: path.into(),
            query: BTreeMap::new(),
            body: None,
        }
    }

    pub fn post(path: impl Into<String>, body: Value) -> Self {
        Self {
            method: "POST".to_string(),
            path: path.into(),
            query: BTreeMap::new(),
            body: Some(body),
        }
    }

    pub fn with_query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.insert(key.into(), value.into());
        self
    }

    fn fingerprint(&self) -> RequestFingerprint {
        RequestFingerprint::compute(&self.method, &self.path, &self.query, self.body.as_ref())
    }
}

/// Per-route caching decision, owned by the route table rather than
/// the handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CachePolicy {
    /// Never consult or populate the cache; still coalesced.
    Bypass,
    /// Cache successful payloads for `ttl`, or the configured default
    /// when `None`.
    Cache { ttl: Option<Duration> },
}

/// How the gate satisfied a request, surfaced to clients as the
/// `X-Cache` header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum CacheStatus {
    Hit,
    Miss,
    Bypass,
}

impl CacheStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CacheStatus::Hit => "HIT",
            CacheStatus::Miss => "MISS",
            CacheStatus::Bypass => "BYPASS",
        }
    }
}

#[derive(Debug, Clone)]
pub struct GateResponse {
    pub payload: Arc<Value>,
    pub cache: CacheStatus,
    /// Whether this caller awaited another caller's in-flight
    /// computation instead of invoking upstream itself.
    pub coalesced: bool,
    /// Timing and memory measurement of the span, for debug response
    /// headers and logs.
    pub sample: PerformanceSample,
}

/// Aggregate view across the gate's components.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GateStats {
    pub cache_entries: u64,
    pub cache_hits: u64,
    pub cache_misses: u64,
    pub cache_expired_evictions: u64,
    pub in_flight: u64,
    pub coalesced_requests: u64,
    pub led_requests: u64,
    pub monitor: MonitorSnapshot,
}

// ============================================================================
// UPSTREAM CONTRACT
// ============================================================================

/// The narrow seam to business logic, persistence, or AI generation.
///
/// Implementations return the full payload for the request; they are
/// invoked at most once per coalesced burst of identical requests.
#[async_trait]
pub trait UpstreamHandler: Send + Sync {
    async fn call(&self, request: &GateRequest) -> GateResult<Value>;
}

// ============================================================================
// GATE
// ============================================================================

/// Composition of cache, coordinator, and monitor behind one `handle`
/// call. Explicitly constructed and injected; cloning shares state.
#[derive(Debug, Clone)]
pub struct RequestGate {
    config: GateConfig,
    cache: Arc<CacheStore>,
    coordinator: Arc<RequestCoordinator>,
    monitor: Arc<PerformanceMonitor>,
}

impl RequestGate {
    pub fn new(config: GateConfig) -> Self {
        let monitor = Arc::new(PerformanceMonitor::with_proc_probe(&config));
        Self::with_probe_monitor(config, monitor)
    }

    pub fn with_memory_probe(config: GateConfig, probe: Arc<dyn MemoryProbe>) -> Self {
        let monitor = Arc::new(PerformanceMonitor::new(&config, probe));
        Self::with_probe_monitor(config, monitor)
    }

    fn with_probe_monitor(config: GateConfig, monitor: Arc<PerformanceMonitor>) -> Self {
        Self {
            config,
            cache: Arc::new(CacheStore::new()),
            coordinator: Arc::new(RequestCoordinator::new()),
            monitor,
        }
    }

    pub fn config(&self) -> &GateConfig {
        &self.config
    }

    pub fn cache(&self) -> &Arc<CacheStore> {
        &self.cache
    }

    /// Serve a request through cache, coalescing, and timing.
    ///
    /// On an upstream failure every coalesced caller receives the same
    /// error and nothing is cached.
    pub async fn handle<H>(
        &self,
        request: &GateRequest,
        policy: CachePolicy,
        handler: &H,
    ) -> GateResult<GateResponse>
    where
        H: UpstreamHandler + ?Sized,
    {
        let started = Instant::now();
        let memory_before = self.monitor.sample_memory();
        let fingerprint = request.fingerprint();
        let key = fingerprint.as_str();

        let result = self.dispatch(request, policy, handler, key).await;
        let sample = self.monitor.record(
            &format!("{} {}", request.method, request.path),
            started,
            memory_before,
        );

        match result {
            Ok((payload, cache, coalesced)) => {
                tracing::debug!(
                    key,
                    cache = cache.as_str(),
                    coalesced,
                    "Request served"
                );
                Ok(GateResponse {
                    payload,
                    cache,
                    coalesced,
                    sample,
                })
            }
            Err(e) => {
                tracing::debug!(key, error = %e, "Request failed");
                Err(e)
            }
        }
    }

    async fn dispatch<H>(
        &self,
        request: &GateRequest,
        policy: CachePolicy,
        handler: &H,
        key: &str,
    ) -> GateResult<(Arc<Value>, CacheStatus, bool)>
    where
        H: UpstreamHandler + ?Sized,
    {
        if let CachePolicy::Cache { .. } = policy {
            if let Some(payload) = self.cache.get(key) {
                return Ok((payload, CacheStatus::Hit, false));
            }
        }

        let coordinated = self
            .coordinator
            .coordinate(key, || handler.call(request))
            .await;
        let payload = coordinated.outcome?;

        // The leader populates the cache; waiters received the same
        // payload and would only overwrite it with identical data.
        if let CachePolicy::Cache { ttl } = policy {
            if !coordinated.coalesced {
                let ttl = ttl.unwrap_or(self.config.ttl_default);
                self.cache.put(key, payload.clone(), ttl);
            }
        }

        let cache = match policy {
            CachePolicy::Cache { .. } => CacheStatus::Miss,
            CachePolicy::Bypass => CacheStatus::Bypass,
        };
        Ok((payload, cache, coordinated.coalesced))
    }

    pub fn stats(&self) -> GateStats {
        let cache = self.cache.stats();
        GateStats {
            cache_entries: cache.entries as u64,
            cache_hits: cache.hits,
            cache_misses: cache.misses,
            cache_expired_evictions: cache.expired_evictions,
            in_flight: self.coordinator.in_flight() as u64,
            coalesced_requests: self.coordinator.coalesced_count(),
            led_requests: self.coordinator.led_count(),
            monitor: self.monitor.snapshot(),
        }
    }

    /// One pass of expired-entry eviction; driven by the sweeper task.
    pub fn sweep_cache(&self) -> usize {
        self.cache.sweep()
    }
}
