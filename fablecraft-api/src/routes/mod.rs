//! REST API Routes Module
//!
//! Route handlers organized by entity type, plus the shared pieces
//! they compose:
//! - Gated single-payload reads (projects) with cache status headers
//! - Gated or NDJSON-streamed listings (characters, world entities)
//! - AI generation with streamed progress
//! - Gate statistics and health endpoints
//! - CORS support for the browser client

pub mod character;
pub mod generate;
pub mod health;
pub mod project;
pub mod stats;
pub mod world_entity;

use axum::{
    http::{HeaderValue, Method},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::state::AppState;
use async_trait::async_trait;
use fablecraft_core::GateResult;
use fablecraft_gate::{GateRequest, GateResponse, PageFetcher, UpstreamHandler};
use serde::Deserialize;
use serde_json::Value;

/// How the cache satisfied the request, on cacheable routes only.
pub const HEADER_CACHE_STATUS: &str = "x-cache";
/// Span duration in milliseconds.
pub const HEADER_RESPONSE_TIME: &str = "x-response-time";
/// Resident-set growth across the span in bytes, when measurable.
pub const HEADER_MEMORY_DELTA: &str = "x-memory-delta";

// ============================================================================
// ROUTER
// ============================================================================

/// Assemble the full application router.
pub fn create_api_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers(Any);

    Router::new()
        .route("/api/projects/:project_id", get(project::get_project))
        .route(
            "/api/projects/:project_id/overview",
            get(project::get_project_overview),
        )
        .route(
            "/api/projects/:project_id/characters",
            get(character::list_characters),
        )
        .route(
            "/api/projects/:project_id/world-entities",
            get(world_entity::list_world_entities),
        )
        .route(
            "/api/projects/:project_id/generate",
            post(generate::generate),
        )
        .route("/api/stats", get(stats::get_stats))
        .route("/health/ping", get(health::ping))
        .route("/health/live", get(health::liveness))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

// ============================================================================
// SHARED QUERY / HANDLER PIECES
// ============================================================================

/// Query parameters accepted by listing endpoints.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ListQuery {
    /// Deliver results as NDJSON frames instead of one JSON page.
    #[serde(default)]
    pub stream: bool,
    /// Opaque pagination cursor from a previous page.
    pub cursor: Option<String>,
    /// Page size; defaults to the configured chunk size.
    pub limit: Option<usize>,
}

/// Upstream adapter serving one page of a paginated source, used by
/// the non-streaming listing path.
pub(crate) struct PageLookup<F> {
    pub fetcher: F,
    pub cursor: Option<String>,
    pub limit: usize,
}

#[async_trait]
impl<F> UpstreamHandler for PageLookup<F>
where
    F: PageFetcher,
{
    async fn call(&self, _request: &GateRequest) -> GateResult<Value> {
        let page = self.fetcher.fetch_page(self.cursor.clone(), self.limit).await?;
        Ok(serde_json::to_value(page)?)
    }
}

/// Render a gated payload as JSON with the cache status and span
/// measurement headers attached.
pub(crate) fn gated_json_response(gated: &GateResponse) -> Response {
    let mut response = Json(Value::clone(&gated.payload)).into_response();
    let headers = response.headers_mut();
    headers.insert(
        HEADER_CACHE_STATUS,
        HeaderValue::from_static(gated.cache.as_str()),
    );
    // Numeric renderings are always valid header values
    if let Ok(value) = HeaderValue::from_str(&gated.sample.duration_ms.to_string()) {
        headers.insert(HEADER_RESPONSE_TIME, value);
    }
    if let Some(delta) = gated.sample.memory_delta_bytes {
        if let Ok(value) = HeaderValue::from_str(&delta.to_string()) {
            headers.insert(HEADER_MEMORY_DELTA, value);
        }
    }
    response
}

/// Build the gate's view of a listing request from its route and
/// pagination parameters.
pub(crate) fn listing_gate_request(path: String, query: &ListQuery, limit: usize) -> GateRequest {
    let mut request = GateRequest::get(path);
    if let Some(cursor) = &query.cursor {
        request = request.with_query("cursor", cursor.clone());
    }
    request.with_query("limit", limit.to_string())
}
