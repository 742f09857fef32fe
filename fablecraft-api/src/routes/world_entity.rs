//! World Entity REST API Routes
//!
//! Same two renditions as character listings: NDJSON streaming with
//! `?stream=true`, one gated JSON page otherwise.

use axum::{
    extract::{Path, Query, State},
    response::Response,
};
use uuid::Uuid;

use crate::{
    catalog::WorldEntityPages,
    error::ApiResult,
    routes::{gated_json_response, listing_gate_request, ListQuery, PageLookup},
    state::AppState,
    streaming::ndjson_response,
};
use fablecraft_gate::{stream_pages, CachePolicy, StreamingChannel};

/// GET /api/projects/:project_id/world-entities - List or stream world entities
pub async fn list_world_entities(
    State(state): State<AppState>,
    Path(project_id): Path<Uuid>,
    Query(query): Query<ListQuery>,
) -> ApiResult<Response> {
    let config = state.gate.config();
    let limit = query.limit.unwrap_or(config.stream_chunk_size);
    let fetcher = WorldEntityPages {
        catalog: state.catalog.clone(),
        project_id,
    };

    if query.stream {
        let (channel, rx) = StreamingChannel::open(config.stream_buffer);
        let cursor = query.cursor.clone();
        tokio::spawn(async move {
            if let Err(e) = stream_pages(channel, &fetcher, cursor, limit).await {
                tracing::debug!(%project_id, error = %e, "World entity stream ended early");
            }
        });
        return Ok(ndjson_response(rx));
    }

    let request = listing_gate_request(
        format!("/api/projects/{}/world-entities", project_id),
        &query,
        limit,
    );
    let lookup = PageLookup {
        fetcher,
        cursor: query.cursor,
        limit,
    };

    let gated = state
        .gate
        .handle(&request, CachePolicy::Cache { ttl: None }, &lookup)
        .await?;

    Ok(gated_json_response(&gated))
}
