//! Character REST API Routes
//!
//! Character listings come in two renditions selected by the caller:
//! `?stream=true` delivers NDJSON frames as catalog pages arrive, the
//! default delivers one gated JSON page with cursor pagination.

use axum::{
    extract::{Path, Query, State},
    response::Response,
};
use uuid::Uuid;

use crate::{
    catalog::CharacterPages,
    error::ApiResult,
    routes::{gated_json_response, listing_gate_request, ListQuery, PageLookup},
    state::AppState,
    streaming::ndjson_response,
};
use fablecraft_gate::{stream_pages, CachePolicy, StreamingChannel};

/// GET /api/projects/:project_id/characters - List or stream characters
pub async fn list_characters(
    State(state): State<AppState>,
    Path(project_id): Path<Uuid>,
    Query(query): Query<ListQuery>,
) -> ApiResult<Response> {
    let config = state.gate.config();
    let limit = query.limit.unwrap_or(config.stream_chunk_size);
    let fetcher = CharacterPages {
        catalog: state.catalog.clone(),
        project_id,
    };

    if query.stream {
        let (channel, rx) = StreamingChannel::open(config.stream_buffer);
        let cursor = query.cursor.clone();
        tokio::spawn(async move {
            // A disconnected consumer surfaces as StreamAbort; the
            // session is already Failed and there is nobody to tell
            if let Err(e) = stream_pages(channel, &fetcher, cursor, limit).await {
                tracing::debug!(%project_id, error = %e, "Character stream ended early");
            }
        });
        return Ok(ndjson_response(rx));
    }

    let request = listing_gate_request(
        format!("/api/projects/{}/characters", project_id),
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
