//! Gate Configuration Module
//!
//! Configuration for caching, performance thresholds, and streaming.
//! Loaded from environment variables with sensible defaults for
//! development; invalid values are rejected at setup time rather than
//! silently defaulted.

use crate::error::{GateError, GateResult};
use std::time::Duration;

/// Default cache lifetime when a route does not specify one.
pub const DEFAULT_TTL_SECS: u64 = 30;

/// Default slow-request warning threshold.
pub const DEFAULT_SLOW_REQUEST_THRESHOLD_MS: u64 = 1000;

/// Default high-memory warning threshold (10 MiB).
pub const DEFAULT_HIGH_MEMORY_THRESHOLD_BYTES: u64 = 10 * 1024 * 1024;

/// Default cadence of the background cache sweep.
pub const DEFAULT_SWEEP_INTERVAL_SECS: u64 = 60;

/// Default bounded backlog of stream frames per session.
pub const DEFAULT_STREAM_BUFFER: usize = 32;

/// Default page size hint for paginated streaming.
pub const DEFAULT_STREAM_CHUNK_SIZE: usize = 50;

/// Configuration for the request gate.
#[derive(Debug, Clone)]
pub struct GateConfig {
    /// Cache lifetime when a route doesn't specify one.
    pub ttl_default: Duration,

    /// Requests slower than this trigger a warning-level observation.
    pub slow_request_threshold: Duration,

    /// Memory deltas above this trigger a warning-level observation.
    pub high_memory_threshold_bytes: u64,

    /// Cadence of the background cache cleanup task.
    pub sweep_interval: Duration,

    /// Bounded frame backlog per stream session. A slow consumer
    /// suspends the producer once this many frames are buffered.
    pub stream_buffer: usize,

    /// Page size hint passed to paginated fetchers.
    pub stream_chunk_size: usize,
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            ttl_default: Duration::from_secs(DEFAULT_TTL_SECS),
            slow_request_threshold: Duration::from_millis(DEFAULT_SLOW_REQUEST_THRESHOLD_MS),
            high_memory_threshold_bytes: DEFAULT_HIGH_MEMORY_THRESHOLD_BYTES,
            sweep_interval: Duration::from_secs(DEFAULT_SWEEP_INTERVAL_SECS),
            stream_buffer: DEFAULT_STREAM_BUFFER,
            stream_chunk_size: DEFAULT_STREAM_CHUNK_SIZE,
        }
    }
}

impl GateConfig {
    /// Create GateConfig from environment variables.
    ///
    /// Environment variables:
    /// - `FABLECRAFT_TTL_DEFAULT_SECS`: default cache lifetime (default: 30)
    /// - `FABLECRAFT_SLOW_REQUEST_THRESHOLD_MS`: slow-request warning trigger (default: 1000)
    /// - `FABLECRAFT_HIGH_MEMORY_THRESHOLD_BYTES`: high-memory warning trigger (default: 10485760)
    /// - `FABLECRAFT_SWEEP_INTERVAL_SECS`: cache cleanup cadence (default: 60)
    /// - `FABLECRAFT_STREAM_BUFFER`: per-session frame backlog (default: 32)
    /// - `FABLECRAFT_STREAM_CHUNK_SIZE`: page size hint (default: 50)
    pub fn from_env() -> Self {
        let ttl_default = Duration::from_secs(
            std::env::var("FABLECRAFT_TTL_DEFAULT_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(DEFAULT_TTL_SECS),
        );

        let slow_request_threshold = Duration::from_millis(
            std::env::var("FABLECRAFT_SLOW_REQUEST_THRESHOLD_MS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(DEFAULT_SLOW_REQUEST_THRESHOLD_MS),
        );

        let high_memory_threshold_bytes = std::env::var("FABLECRAFT_HIGH_MEMORY_THRESHOLD_BYTES")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(DEFAULT_HIGH_MEMORY_THRESHOLD_BYTES);

        let sweep_interval = Duration::from_secs(
            std::env::var("FABLECRAFT_SWEEP_INTERVAL_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(DEFAULT_SWEEP_INTERVAL_SECS),
        );

        let stream_buffer = std::env::var("FABLECRAFT_STREAM_BUFFER")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(DEFAULT_STREAM_BUFFER);

        let stream_chunk_size = std::env::var("FABLECRAFT_STREAM_CHUNK_SIZE")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(DEFAULT_STREAM_CHUNK_SIZE);

        Self {
            ttl_default,
            slow_request_threshold,
            high_memory_threshold_bytes,
            sweep_interval,
            stream_buffer,
            stream_chunk_size,
        }
    }

    /// Validate the configuration, rejecting non-positive values.
    ///
    /// Called once at setup; a rejected value is an error with a log
    /// entry, never a silent fallback.
    pub fn validate(&self) -> GateResult<()> {
        if self.ttl_default.is_zero() {
            tracing::error!("ttl_default must be a positive duration");
            return Err(GateError::config("ttl_default must be positive"));
        }
        if self.slow_request_threshold.is_zero() {
            tracing::error!("slow_request_threshold must be a positive duration");
            return Err(GateError::config("slow_request_threshold must be positive"));
        }
        if self.high_memory_threshold_bytes == 0 {
            tracing::error!("high_memory_threshold_bytes must be positive");
            return Err(GateError::config("high_memory_threshold_bytes must be positive"));
        }
        if self.sweep_interval.is_zero() {
            tracing::error!("sweep_interval must be a positive duration");
            return Err(GateError::config("sweep_interval must be positive"));
        }
        if self.stream_buffer == 0 {
            tracing::error!("stream_buffer must be positive");
            return Err(GateError::config("stream_buffer must be positive"));
        }
        if self.stream_chunk_size == 0 {
            tracing::error!("stream_chunk_size must be positive");
            return Err(GateError::config("stream_chunk_size must be positive"));
        }
        Ok(())
    }

    /// Configuration for tests: short ttl, tiny buffers.
    pub fn for_tests() -> Self {
        Self {
            ttl_default: Duration::from_millis(100),
            slow_request_threshold: Duration::from_millis(50),
            high_memory_threshold_bytes: 1024 * 1024,
            sweep_interval: Duration::from_millis(20),
            stream_buffer: 4,
            stream_chunk_size: 2,
        }
    }
}
