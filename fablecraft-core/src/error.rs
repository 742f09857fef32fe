//! Error types for the request gate subsystem
//!
//! The taxonomy mirrors how failures propagate through the gate:
//! upstream failures travel verbatim to every coalesced waiter, stream
//! aborts are a client-side event rather than a server error, and
//! configuration problems are rejected at setup time.
//!
//! A cache miss is deliberately NOT an error - it is a normal
//! control-flow outcome expressed as `Option` in the cache API.

use thiserror::Error;

/// Result alias used throughout the gate crates.
pub type GateResult<T> = Result<T, GateError>;

/// Errors produced by the request gate and its collaborators.
///
/// `Clone` is required so a single failure can be delivered identically
/// to the original caller and every coalesced waiter.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum GateError {
    /// The wrapped handler (business logic, persistence, AI backend)
    /// failed. Propagated verbatim, never cached.
    #[error("Upstream handler failed: {message}")]
    Upstream { message: String },

    /// The consumer of a streaming response disconnected mid-stream.
    /// Logged at debug level; not a server error.
    #[error("Stream consumer disconnected")]
    StreamAbort,

    /// A frame was emitted after the session reached a terminal state.
    /// This is a programming error in the producer, not a recoverable
    /// runtime condition.
    #[error("Stream session is closed: {state}")]
    StreamClosed { state: String },

    /// Invalid ttl or threshold value supplied at setup time.
    #[error("Invalid configuration: {message}")]
    Config { message: String },

    /// A payload or frame could not be serialized.
    #[error("Serialization failed: {message}")]
    Serialization { message: String },
}

impl GateError {
    /// Construct an upstream failure from anything displayable.
    pub fn upstream(message: impl Into<String>) -> Self {
        GateError::Upstream {
            message: message.into(),
        }
    }

    /// Construct a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        GateError::Config {
            message: message.into(),
        }
    }

    /// Whether this error came from the wrapped handler rather than
    /// the gate machinery itself.
    pub fn is_upstream(&self) -> bool {
        matches!(self, GateError::Upstream { .. })
    }
}

impl From<serde_json::Error> for GateError {
    fn from(e: serde_json::Error) -> Self {
        GateError::Serialization {
            message: e.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_upstream_error_clones_identically() {
        let err = GateError::upstream("database unreachable");
        let waiter_copy = err.clone();
        assert_eq!(err, waiter_copy);
        assert_eq!(
            waiter_copy.to_string(),
            "Upstream handler failed: database unreachable"
        );
    }

    #[test]
    fn test_is_upstream() {
        assert!(GateError::upstream("boom").is_upstream());
        assert!(!GateError::StreamAbort.is_upstream());
        assert!(!GateError::config("bad ttl").is_upstream());
    }
}
