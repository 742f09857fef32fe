//! Performance Monitoring
//!
//! Per-operation timing and memory sampling with slow-request and
//! high-memory flagging. Memory is judged by the resident-set DELTA
//! across the span, not the absolute reading: a long-lived process
//! holds tens of megabytes at steady state, and only growth
//! attributable to the span is worth a warning. Counters are lock-free
//! atomics so recording a sample never contends with request handling;
//! snapshots are point-in-time reads and may be mutually slightly
//! stale under load.

use fablecraft_core::GateConfig;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

// ============================================================================
// MEMORY PROBE
// ============================================================================

/// Source of the process resident set size.
///
/// Injected so tests can script memory readings; production uses the
/// procfs-backed probe. A probe that cannot read its source reports
/// `None` and memory flagging is skipped for that sample.
pub trait MemoryProbe: Send + Sync {
    fn resident_bytes(&self) -> Option<u64>;
}

/// Reads `VmRSS` from `/proc/self/status`.
///
/// The kernel reports the value in kB directly, so no page-size
/// assumption is involved.
#[derive(Debug, Default, Clone, Copy)]
pub struct ProcMemoryProbe;

impl MemoryProbe for ProcMemoryProbe {
    fn resident_bytes(&self) -> Option<u64> {
        let status = std::fs::read_to_string("/proc/self/status").ok()?;
        let line = status.lines().find(|l| l.starts_with("VmRSS:"))?;
        let kilobytes: u64 = line.split_whitespace().nth(1)?.parse().ok()?;
        Some(kilobytes * 1024)
    }
}

// ============================================================================
// SAMPLES
// ============================================================================

/// One recorded operation measurement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerformanceSample {
    pub operation: String,
    pub duration_ms: u64,
    /// Resident-set growth across the span; `None` when either end of
    /// the span could not be read.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub memory_delta_bytes: Option<i64>,
    pub slow: bool,
    pub high_memory: bool,
}

/// Point-in-time view of the monitor's counters.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MonitorSnapshot {
    pub samples: u64,
    pub slow_requests: u64,
    pub high_memory_events: u64,
    pub total_duration_ms: u64,
    pub max_duration_ms: u64,
}

impl MonitorSnapshot {
    /// Mean duration across recorded samples, zero when empty.
    pub fn avg_duration_ms(&self) -> u64 {
        if self.samples == 0 {
            0
        } else {
            self.total_duration_ms / self.samples
        }
    }
}

// ============================================================================
// MONITOR
// ============================================================================

/// Records operation timings and flags outliers.
pub struct PerformanceMonitor {
    slow_threshold: Duration,
    high_memory_bytes: u64,
    probe: Arc<dyn MemoryProbe>,
    samples: AtomicU64,
    slow_requests: AtomicU64,
    high_memory_events: AtomicU64,
    total_duration_ms: AtomicU64,
    max_duration_ms: AtomicU64,
}

impl PerformanceMonitor {
    pub fn new(config: &GateConfig, probe: Arc<dyn MemoryProbe>) -> Self {
        Self {
            slow_threshold: config.slow_request_threshold,
            high_memory_bytes: config.high_memory_threshold_bytes,
            probe,
            samples: AtomicU64::new(0),
            slow_requests: AtomicU64::new(0),
            high_memory_events: AtomicU64::new(0),
            total_duration_ms: AtomicU64::new(0),
            max_duration_ms: AtomicU64::new(0),
        }
    }

    pub fn with_proc_probe(config: &GateConfig) -> Self {
        Self::new(config, Arc::new(ProcMemoryProbe))
    }

    /// Read the resident set at span start; the caller hands the value
    /// back to [`record`](Self::record) when the span completes.
    pub fn sample_memory(&self) -> Option<u64> {
        self.probe.resident_bytes()
    }

    /// Record one completed operation, flagging it when it crossed the
    /// slow threshold or grew the resident set past the high-memory
    /// threshold.
    pub fn record(
        &self,
        operation: &str,
        started_at: Instant,
        memory_before: Option<u64>,
    ) -> PerformanceSample {
        let duration = started_at.elapsed();
        let duration_ms = duration.as_millis() as u64;
        let memory_delta_bytes = match (memory_before, self.probe.resident_bytes()) {
            (Some(before), Some(after)) => Some(after as i64 - before as i64),
            _ => None,
        };

        let slow = duration >= self.slow_threshold;
        let high_memory =
            memory_delta_bytes.is_some_and(|delta| delta >= self.high_memory_bytes as i64);

        self.samples.fetch_add(1, Ordering::Relaxed);
        self.total_duration_ms.fetch_add(duration_ms, Ordering::Relaxed);
        self.max_duration_ms.fetch_max(duration_ms, Ordering::Relaxed);

        if slow {
            self.slow_requests.fetch_add(1, Ordering::Relaxed);
            tracing::warn!(
                operation,
                duration_ms,
                threshold_ms = self.slow_threshold.as_millis() as u64,
                "Slow request"
            );
        }
        if high_memory {
            self.high_memory_events.fetch_add(1, Ordering::Relaxed);
            tracing::warn!(
                operation,
                memory_delta_bytes = memory_delta_bytes.unwrap_or(0),
                threshold_bytes = self.high_memory_bytes,
                "High memory growth"
            );
        }

        PerformanceSample {
            operation: operation.to_string(),
            duration_ms,
            memory_delta_bytes,
            slow,
            high_memory,
        }
    }

    pub fn snapshot(&self) -> MonitorSnapshot {
        MonitorSnapshot {
            samples: self.samples.load(Ordering::Relaxed),
            slow_requests: self.slow_requests.load(Ordering::Relaxed),
            high_memory_events: self.high_memory_events.load(Ordering::Relaxed),
            total_duration_ms: self.total_duration_ms.load(Ordering::Relaxed),
            max_duration_ms: self.max_duration_ms.load(Ordering::Relaxed),
        }
    }
}

impl std::fmt::Debug for PerformanceMonitor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PerformanceMonitor")
            .field("slow_threshold", &self.slow_threshold)
            .field("high_memory_bytes", &self.high_memory_bytes)
            .field("samples", &self.samples.load(Ordering::Relaxed))
            .finish()
    }
}
