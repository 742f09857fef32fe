//! Application State
//!
//! Shared state for route handlers. Everything is injected at
//! construction so tests can assemble a state from fixtures without
//! environment setup.

use crate::catalog::EntityCatalog;
use fablecraft_gate::{RequestGate, StoryGenerator};
use std::sync::Arc;
use std::time::Instant;

/// Shared application state, cheap to clone.
#[derive(Clone)]
pub struct AppState {
    pub gate: Arc<RequestGate>,
    pub catalog: Arc<dyn EntityCatalog>,
    pub generator: Arc<dyn StoryGenerator>,
    pub start_time: Instant,
}

impl AppState {
    pub fn new(
        gate: RequestGate,
        catalog: Arc<dyn EntityCatalog>,
        generator: Arc<dyn StoryGenerator>,
    ) -> Self {
        Self {
            gate: Arc::new(gate),
            catalog,
            generator,
            start_time: Instant::now(),
        }
    }

    pub fn uptime_seconds(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }
}
