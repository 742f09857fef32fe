//! Fablecraft Core - Shared Data Types
//!
//! Pure data structures shared across the Fablecraft service crates.
//! This crate contains entity summary types, the error taxonomy, and
//! gate configuration - no I/O and no business logic.

use chrono::{DateTime, Utc};
use uuid::Uuid;

pub mod config;
pub mod entities;
pub mod error;

pub use config::GateConfig;
pub use entities::{CharacterSummary, ProjectSummary, WorldEntityKind, WorldEntitySummary};
pub use error::{GateError, GateResult};

// ============================================================================
// IDENTITY TYPES
// ============================================================================

/// Entity identifier using UUIDv7 for timestamp-sortable IDs.
pub type EntityId = Uuid;

/// Project identifier.
pub type ProjectId = Uuid;

/// Character identifier.
pub type CharacterId = Uuid;

/// World entity identifier.
pub type WorldEntityId = Uuid;

/// Timestamp type using UTC timezone.
pub type Timestamp = DateTime<Utc>;

/// Generate a new UUIDv7 EntityId (timestamp-sortable).
pub fn new_entity_id() -> EntityId {
    Uuid::now_v7()
}
