//! Project REST API Routes
//!
//! Single-project reads served through the request gate: responses are
//! cached for the configured TTL and concurrent identical reads are
//! coalesced onto one catalog lookup. The `X-Cache` header reports how
//! the response was satisfied; `X-Response-Time` and `X-Memory-Delta`
//! carry the span measurement.
//!
//! The overview route assembles a project's opening screen in one
//! round trip: the project plus its first page of characters and world
//! entities, with the three catalog calls issued concurrently.

use axum::{
    extract::{Path, Query, State},
    response::Response,
};
use std::sync::Arc;
use uuid::Uuid;

use crate::{
    catalog::EntityCatalog,
    error::{ApiError, ApiResult},
    routes::{gated_json_response, ListQuery},
    state::AppState,
};
use async_trait::async_trait;
use fablecraft_core::{GateResult, ProjectId};
use fablecraft_gate::{CachePolicy, GateRequest, UpstreamHandler};
use serde_json::{json, Value};

/// Catalog lookup for one project. A missing project is encoded as a
/// JSON null so the gate can cache the outcome either way; the route
/// maps null back to 404.
struct ProjectLookup {
    catalog: Arc<dyn EntityCatalog>,
    project_id: ProjectId,
}

#[async_trait]
impl UpstreamHandler for ProjectLookup {
    async fn call(&self, _request: &GateRequest) -> GateResult<Value> {
        match self.catalog.project(self.project_id).await? {
            Some(project) => Ok(serde_json::to_value(project)?),
            None => Ok(Value::Null),
        }
    }
}

/// GET /api/projects/:project_id - Fetch one project summary
pub async fn get_project(
    State(state): State<AppState>,
    Path(project_id): Path<Uuid>,
) -> ApiResult<Response> {
    let request = GateRequest::get(format!("/api/projects/{}", project_id));
    let lookup = ProjectLookup {
        catalog: state.catalog.clone(),
        project_id,
    };

    let gated = state
        .gate
        .handle(&request, CachePolicy::Cache { ttl: None }, &lookup)
        .await?;

    if gated.payload.is_null() {
        return Err(ApiError::project_not_found(project_id));
    }
    Ok(gated_json_response(&gated))
}

/// Concurrent load of a project with its leading characters and world
/// entities. The three catalog calls run simultaneously; a missing
/// project short-circuits to null regardless of what the listings
/// returned.
struct OverviewLookup {
    catalog: Arc<dyn EntityCatalog>,
    project_id: ProjectId,
    limit: usize,
}

#[async_trait]
impl UpstreamHandler for OverviewLookup {
    async fn call(&self, _request: &GateRequest) -> GateResult<Value> {
        let (project, characters, world_entities) = tokio::join!(
            self.catalog.project(self.project_id),
            self.catalog.characters_page(self.project_id, None, self.limit),
            self.catalog.world_entities_page(self.project_id, None, self.limit),
        );

        let Some(project) = project? else {
            return Ok(Value::Null);
        };

        Ok(json!({
            "project": project,
            "characters": characters?,
            "world_entities": world_entities?,
        }))
    }
}

/// GET /api/projects/:project_id/overview - Combined project load
pub async fn get_project_overview(
    State(state): State<AppState>,
    Path(project_id): Path<Uuid>,
    Query(query): Query<ListQuery>,
) -> ApiResult<Response> {
    let limit = query.limit.unwrap_or(state.gate.config().stream_chunk_size);
    let request = GateRequest::get(format!("/api/projects/{}/overview", project_id))
        .with_query("limit", limit.to_string());
    let lookup = OverviewLookup {
        catalog: state.catalog.clone(),
        project_id,
        limit,
    };

    let gated = state
        .gate
        .handle(&request, CachePolicy::Cache { ttl: None }, &lookup)
        .await?;

    if gated.payload.is_null() {
        return Err(ApiError::project_not_found(project_id));
    }
    Ok(gated_json_response(&gated))
}
