//! Entity summary structures
//!
//! These are the narrow payload shapes exchanged with the persistence
//! layer and the UI. Field schemas, validation rules, and template
//! catalogs live with the storage collaborator, not here.

use crate::{CharacterId, ProjectId, Timestamp, WorldEntityId};
use serde::{Deserialize, Serialize};

/// Project - top-level container for a writing/worldbuilding effort.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectSummary {
    pub project_id: ProjectId,
    pub name: String,
    pub description: Option<String>,
    pub genre: Option<String>,
    pub character_count: u64,
    pub world_entity_count: u64,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// Character card data as delivered to list/detail screens.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CharacterSummary {
    pub character_id: CharacterId,
    pub project_id: ProjectId,
    pub name: String,
    pub role: Option<String>,
    pub one_line: Option<String>,
    pub portrait_url: Option<String>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// Category of a world entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorldEntityKind {
    Location,
    Faction,
    Item,
    Creature,
    Culture,
    MagicSystem,
    Language,
    Prophecy,
    Timeline,
}

/// World entity card data (locations, factions, items, ...).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorldEntitySummary {
    pub entity_id: WorldEntityId,
    pub project_id: ProjectId,
    pub kind: WorldEntityKind,
    pub name: String,
    pub summary: Option<String>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}
