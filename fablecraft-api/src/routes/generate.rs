//! Generation REST API Routes
//!
//! AI generation requests. With `?stream=true` progress events are
//! delivered as `generation_progress` NDJSON frames followed by a
//! completion frame carrying the result; otherwise the route blocks
//! until generation finishes and returns one JSON payload.
//!
//! Generation is never cached. Concurrent identical non-streaming
//! requests are still coalesced onto one backend call; volatile
//! parameters like `request_id` do not defeat that.

use axum::{
    extract::{Path, Query, State},
    response::{IntoResponse, Response},
    Json,
};
use serde::Deserialize;
use std::sync::Arc;
use uuid::Uuid;

use crate::{
    error::{ApiError, ApiResult},
    state::AppState,
    streaming::ndjson_response,
};
use async_trait::async_trait;
use fablecraft_core::GateResult;
use fablecraft_gate::{
    stream_generation, CachePolicy, GateRequest, StoryGenerator, StreamingChannel, UpstreamHandler,
};
use serde_json::Value;
use tokio::sync::mpsc;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct GenerateQuery {
    #[serde(default)]
    pub stream: bool,
}

/// Runs the generator to completion for the non-streaming path,
/// draining progress events nobody is watching.
struct GenerateUpstream {
    generator: Arc<dyn StoryGenerator>,
    body: Value,
    progress_buffer: usize,
}

#[async_trait]
impl UpstreamHandler for GenerateUpstream {
    async fn call(&self, _request: &GateRequest) -> GateResult<Value> {
        let (progress_tx, mut progress_rx) = mpsc::channel(self.progress_buffer.max(1));
        let drain = tokio::spawn(async move { while progress_rx.recv().await.is_some() {} });
        let result = self.generator.generate(self.body.clone(), progress_tx).await;
        drain.abort();
        result
    }
}

/// POST /api/projects/:project_id/generate - Generate story content
pub async fn generate(
    State(state): State<AppState>,
    Path(project_id): Path<Uuid>,
    Query(query): Query<GenerateQuery>,
    Json(body): Json<Value>,
) -> ApiResult<Response> {
    let prompt = body.get("prompt").and_then(Value::as_str).unwrap_or("");
    if prompt.trim().is_empty() {
        return Err(ApiError::missing_field("prompt"));
    }

    let config = state.gate.config();

    if query.stream {
        let (channel, rx) = StreamingChannel::open(config.stream_buffer);
        let generator = state.generator.clone();
        let buffer = config.stream_buffer;
        tokio::spawn(async move {
            if let Err(e) = stream_generation(channel, generator.as_ref(), body, buffer).await {
                tracing::debug!(%project_id, error = %e, "Generation stream ended early");
            }
        });
        return Ok(ndjson_response(rx));
    }

    let request = GateRequest::post(format!("/api/projects/{}/generate", project_id), body.clone());
    let upstream = GenerateUpstream {
        generator: state.generator.clone(),
        body,
        progress_buffer: config.stream_buffer,
    };

    let gated = state
        .gate
        .handle(&request, CachePolicy::Bypass, &upstream)
        .await?;

    Ok(Json(Value::clone(&gated.payload)).into_response())
}
