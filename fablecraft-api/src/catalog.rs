//! Entity Catalog
//!
//! The API's seam to persistence. Route handlers never talk to storage
//! directly; they go through [`EntityCatalog`], which returns typed
//! summaries or typed errors, never partial payloads. The in-memory
//! [`FixtureCatalog`] backs tests and local development.

use async_trait::async_trait;
use chrono::Utc;
use fablecraft_core::{
    new_entity_id, CharacterSummary, GateError, GateResult, ProjectId, ProjectSummary,
    WorldEntityKind, WorldEntitySummary,
};
use fablecraft_gate::{Page, PageFetcher, StoryGenerator};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::mpsc;

// ============================================================================
// CONTRACT
// ============================================================================

/// Read access to worldbuilding entities.
#[async_trait]
pub trait EntityCatalog: Send + Sync {
    /// Look up one project; `None` when it does not exist.
    async fn project(&self, id: ProjectId) -> GateResult<Option<ProjectSummary>>;

    /// One page of a project's characters, ordered by creation.
    async fn characters_page(
        &self,
        project_id: ProjectId,
        cursor: Option<String>,
        limit: usize,
    ) -> GateResult<Page>;

    /// One page of a project's world entities, ordered by creation.
    async fn world_entities_page(
        &self,
        project_id: ProjectId,
        cursor: Option<String>,
        limit: usize,
    ) -> GateResult<Page>;
}

/// Adapter presenting one project's characters as a paginated stream
/// source.
pub struct CharacterPages {
    pub catalog: Arc<dyn EntityCatalog>,
    pub project_id: ProjectId,
}

#[async_trait]
impl PageFetcher for CharacterPages {
    async fn fetch_page(&self, cursor: Option<String>, limit: usize) -> GateResult<Page> {
        self.catalog
            .characters_page(self.project_id, cursor, limit)
            .await
    }
}

/// Adapter presenting one project's world entities as a paginated
/// stream source.
pub struct WorldEntityPages {
    pub catalog: Arc<dyn EntityCatalog>,
    pub project_id: ProjectId,
}

#[async_trait]
impl PageFetcher for WorldEntityPages {
    async fn fetch_page(&self, cursor: Option<String>, limit: usize) -> GateResult<Page> {
        self.catalog
            .world_entities_page(self.project_id, cursor, limit)
            .await
    }
}

// ============================================================================
// FIXTURES
// ============================================================================

/// In-memory catalog for tests and local development.
///
/// Contents are fixed at construction; pagination cursors are plain
/// offsets into the stored order.
#[derive(Default)]
pub struct FixtureCatalog {
    projects: HashMap<ProjectId, ProjectSummary>,
    characters: HashMap<ProjectId, Vec<CharacterSummary>>,
    world_entities: HashMap<ProjectId, Vec<WorldEntitySummary>>,
}

impl FixtureCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// A catalog with one project holding `characters` characters and
    /// `world_entities` world entities. Returns the catalog and the
    /// project id.
    pub fn with_project(characters: usize, world_entities: usize) -> (Self, ProjectId) {
        let mut catalog = Self::new();
        let project_id = new_entity_id();
        let now = Utc::now();

        catalog.projects.insert(
            project_id,
            ProjectSummary {
                project_id,
                name: "The Sundered Realms".to_string(),
                description: Some("An epic of broken kingdoms".to_string()),
                genre: Some("fantasy".to_string()),
                character_count: characters as u64,
                world_entity_count: world_entities as u64,
                created_at: now,
                updated_at: now,
            },
        );

        let kinds = [
            WorldEntityKind::Location,
            WorldEntityKind::Faction,
            WorldEntityKind::Item,
            WorldEntityKind::Creature,
            WorldEntityKind::Culture,
        ];

        catalog.characters.insert(
            project_id,
            (0..characters)
                .map(|i| CharacterSummary {
                    character_id: new_entity_id(),
                    project_id,
                    name: format!("Character {}", i + 1),
                    role: Some(if i == 0 { "protagonist" } else { "supporting" }.to_string()),
                    one_line: None,
                    portrait_url: None,
                    created_at: now,
                    updated_at: now,
                })
                .collect(),
        );

        catalog.world_entities.insert(
            project_id,
            (0..world_entities)
                .map(|i| WorldEntitySummary {
                    entity_id: new_entity_id(),
                    project_id,
                    kind: kinds[i % kinds.len()],
                    name: format!("Entity {}", i + 1),
                    summary: None,
                    created_at: now,
                    updated_at: now,
                })
                .collect(),
        );

        (catalog, project_id)
    }

    fn page_of<T: serde::Serialize>(items: &[T], cursor: Option<String>, limit: usize) -> GateResult<Page> {
        let offset: usize = cursor.and_then(|c| c.parse().ok()).unwrap_or(0);
        let limit = limit.max(1);
        let end = (offset + limit).min(items.len());
        let has_more = end < items.len();

        let items = items[offset.min(items.len())..end]
            .iter()
            .map(serde_json::to_value)
            .collect::<Result<Vec<Value>, _>>()?;

        Ok(Page {
            items,
            has_more,
            next_cursor: has_more.then(|| end.to_string()),
        })
    }
}

#[async_trait]
impl EntityCatalog for FixtureCatalog {
    async fn project(&self, id: ProjectId) -> GateResult<Option<ProjectSummary>> {
        Ok(self.projects.get(&id).cloned())
    }

    async fn characters_page(
        &self,
        project_id: ProjectId,
        cursor: Option<String>,
        limit: usize,
    ) -> GateResult<Page> {
        let items = self.characters.get(&project_id).map(Vec::as_slice).unwrap_or(&[]);
        Self::page_of(items, cursor, limit)
    }

    async fn world_entities_page(
        &self,
        project_id: ProjectId,
        cursor: Option<String>,
        limit: usize,
    ) -> GateResult<Page> {
        let items = self
            .world_entities
            .get(&project_id)
            .map(Vec::as_slice)
            .unwrap_or(&[]);
        Self::page_of(items, cursor, limit)
    }
}

/// Generator producing a fixed draft with a few progress steps, for
/// tests and local development.
#[derive(Default)]
pub struct FixtureGenerator;

#[async_trait]
impl StoryGenerator for FixtureGenerator {
    async fn generate(&self, request: Value, progress: mpsc::Sender<Value>) -> GateResult<Value> {
        let prompt = request
            .get("prompt")
            .and_then(Value::as_str)
            .unwrap_or("an untitled tale");

        for (step, stage) in ["outlining", "drafting", "polishing"].iter().enumerate() {
            if progress
                .send(json!({"step": step, "stage": stage}))
                .await
                .is_err()
            {
                return Err(GateError::StreamAbort);
            }
            tokio::task::yield_now().await;
        }

        Ok(json!({
            "prompt": prompt,
            "draft": format!("A story begins: {}", prompt),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[tokio::test]
    async fn test_fixture_project_lookup() {
        let (catalog, project_id) = FixtureCatalog::with_project(3, 2);

        let project = catalog.project(project_id).await.unwrap().unwrap();
        assert_eq!(project.character_count, 3);

        let missing = catalog.project(Uuid::now_v7()).await.unwrap();
        assert!(missing.is_none());
    }

    #[tokio::test]
    async fn test_fixture_pagination() {
        let (catalog, project_id) = FixtureCatalog::with_project(5, 0);

        let first = catalog
            .characters_page(project_id, None, 2)
            .await
            .unwrap();
        assert_eq!(first.items.len(), 2);
        assert!(first.has_more);

        let second = catalog
            .characters_page(project_id, first.next_cursor, 2)
            .await
            .unwrap();
        assert_eq!(second.items.len(), 2);
        assert!(second.has_more);

        let last = catalog
            .characters_page(project_id, second.next_cursor, 2)
            .await
            .unwrap();
        assert_eq!(last.items.len(), 1);
        assert!(!last.has_more);
        assert!(last.next_cursor.is_none());
    }

    #[tokio::test]
    async fn test_unknown_project_pages_empty() {
        let (catalog, _) = FixtureCatalog::with_project(5, 0);
        let page = catalog
            .characters_page(Uuid::now_v7(), None, 10)
            .await
            .unwrap();
        assert!(page.items.is_empty());
        assert!(!page.has_more);
    }
}
