//! Fablecraft Request Gate
//!
//! Concurrent API middleware for the Fablecraft worldbuilding service:
//!
//! - [`CacheStore`]: time-bounded response cache keyed by request fingerprint
//! - [`RequestCoordinator`]: coalesces concurrent identical requests onto
//!   one upstream computation
//! - [`StreamingChannel`]: incremental frame delivery for paginated and
//!   progressively-produced results
//! - [`PerformanceMonitor`]: per-request latency/memory sampling
//! - [`RequestGate`]: the per-request composition root wiring the above
//!
//! All shared state is explicitly constructed and owned - there are no
//! ambient singletons, so tests can instantiate isolated instances.

pub mod cache;
pub mod coordinator;
pub mod fingerprint;
pub mod gate;
pub mod monitor;
pub mod stream;
pub mod sweeper;

pub use cache::{CacheStats, CacheStore};
pub use coordinator::{CoordinatedOutcome, RequestCoordinator};
pub use fingerprint::RequestFingerprint;
pub use gate::{
    CachePolicy, CacheStatus, GateRequest, GateResponse, GateStats, RequestGate, UpstreamHandler,
};
pub use monitor::{
    MemoryProbe, MonitorSnapshot, PerformanceMonitor, PerformanceSample, ProcMemoryProbe,
};
pub use stream::{
    stream_generation, stream_pages, Page, PageFetcher, SessionState, StoryGenerator, StreamFrame,
    StreamSession, StreamSummary, StreamingChannel,
};
pub use sweeper::cache_sweeper_task;
