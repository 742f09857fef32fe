//! Router-level tests exercising the HTTP surface end to end against
//! fixture collaborators: cache status headers, NDJSON streaming,
//! generation, statistics, and the error surface.

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    Router,
};
use fablecraft_api::{create_api_router, AppState, FixtureCatalog, FixtureGenerator};
use fablecraft_core::{GateConfig, ProjectId};
use fablecraft_gate::RequestGate;
use http_body_util::BodyExt;
use serde_json::Value;
use std::sync::Arc;
use tower::ServiceExt;
use uuid::Uuid;

fn test_app(characters: usize, world_entities: usize) -> (Router, ProjectId) {
    let (catalog, project_id) = FixtureCatalog::with_project(characters, world_entities);
    let state = AppState::new(
        RequestGate::new(GateConfig::for_tests()),
        Arc::new(catalog),
        Arc::new(FixtureGenerator),
    );
    (create_api_router(state), project_id)
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

async fn body_lines(response: axum::response::Response) -> Vec<Value> {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    String::from_utf8(bytes.to_vec())
        .unwrap()
        .lines()
        .map(|line| serde_json::from_str(line).unwrap())
        .collect()
}

#[tokio::test]
async fn test_get_project_miss_then_hit() {
    let (app, project_id) = test_app(2, 0);
    let uri = format!("/api/projects/{}", project_id);

    let first = app
        .clone()
        .oneshot(Request::get(&uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(first.status(), StatusCode::OK);
    assert_eq!(first.headers().get("x-cache").unwrap(), "MISS");
    assert!(first.headers().contains_key("x-response-time"));
    let payload = body_json(first).await;
    assert_eq!(payload["name"], "The Sundered Realms");

    let second = app
        .oneshot(Request::get(&uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(second.headers().get("x-cache").unwrap(), "HIT");
}

#[tokio::test]
async fn test_get_project_not_found() {
    let (app, _) = test_app(0, 0);
    let uri = format!("/api/projects/{}", Uuid::now_v7());

    let response = app
        .oneshot(Request::get(&uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let payload = body_json(response).await;
    assert_eq!(payload["code"], "PROJECT_NOT_FOUND");
}

#[tokio::test]
async fn test_project_overview_loads_concurrently() {
    let (app, project_id) = test_app(5, 3);
    let uri = format!("/api/projects/{}/overview?limit=4", project_id);

    let first = app
        .clone()
        .oneshot(Request::get(&uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(first.status(), StatusCode::OK);
    assert_eq!(first.headers().get("x-cache").unwrap(), "MISS");
    assert!(first.headers().contains_key("x-response-time"));

    let payload = body_json(first).await;
    assert_eq!(payload["project"]["name"], "The Sundered Realms");
    assert_eq!(payload["characters"]["items"].as_array().unwrap().len(), 4);
    assert_eq!(payload["characters"]["has_more"], true);
    assert_eq!(
        payload["world_entities"]["items"].as_array().unwrap().len(),
        3
    );
    assert_eq!(payload["world_entities"]["has_more"], false);

    let second = app
        .oneshot(Request::get(&uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(second.headers().get("x-cache").unwrap(), "HIT");
}

#[tokio::test]
async fn test_project_overview_not_found() {
    let (app, _) = test_app(2, 2);
    let uri = format!("/api/projects/{}/overview", Uuid::now_v7());

    let response = app
        .oneshot(Request::get(&uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_characters_single_page() {
    let (app, project_id) = test_app(3, 0);
    let uri = format!("/api/projects/{}/characters?limit=10", project_id);

    let response = app
        .oneshot(Request::get(&uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers().get("x-cache").unwrap(), "MISS");

    let payload = body_json(response).await;
    assert_eq!(payload["items"].as_array().unwrap().len(), 3);
    assert_eq!(payload["has_more"], false);
}

#[tokio::test]
async fn test_characters_streamed_as_ndjson() {
    // 6 characters streamed in pages of 2: sequences 0..=5 then a
    // completion frame with total_count 6
    let (app, project_id) = test_app(6, 0);
    let uri = format!("/api/projects/{}/characters?stream=true&limit=2", project_id);

    let response = app
        .oneshot(Request::get(&uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers().get(header::CONTENT_TYPE).unwrap(),
        "application/x-ndjson"
    );
    assert_eq!(response.headers().get("x-streaming").unwrap(), "true");

    let frames = body_lines(response).await;
    assert_eq!(frames.first().unwrap()["type"], "stream_start");

    let sequences: Vec<u64> = frames
        .iter()
        .filter(|f| f["type"] == "data")
        .map(|f| f["sequence"].as_u64().unwrap())
        .collect();
    assert_eq!(sequences, vec![0, 1, 2, 3, 4, 5]);

    let last = frames.last().unwrap();
    assert_eq!(last["type"], "stream_complete");
    assert_eq!(last["summary"]["total_count"], 6);
}

#[tokio::test]
async fn test_world_entities_streamed() {
    let (app, project_id) = test_app(0, 4);
    let uri = format!(
        "/api/projects/{}/world-entities?stream=true&limit=3",
        project_id
    );

    let response = app
        .oneshot(Request::get(&uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    let frames = body_lines(response).await;

    let kinds: Vec<&str> = frames
        .iter()
        .filter(|f| f["type"] == "data")
        .map(|f| f["payload"]["kind"].as_str().unwrap())
        .collect();
    assert_eq!(kinds.len(), 4);
    assert_eq!(kinds[0], "location");
}

#[tokio::test]
async fn test_generate_streams_progress() {
    let (app, project_id) = test_app(0, 0);
    let uri = format!("/api/projects/{}/generate?stream=true", project_id);

    let request = Request::post(&uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(r#"{"prompt": "a tale of two moons"}"#))
        .unwrap();
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let frames = body_lines(response).await;
    let progress_count = frames
        .iter()
        .filter(|f| f["type"] == "generation_progress")
        .count();
    assert_eq!(progress_count, 3);

    let last = frames.last().unwrap();
    assert_eq!(last["type"], "stream_complete");
    assert_eq!(last["summary"]["total_steps"], 3);
    assert!(last["summary"]["result"]["draft"]
        .as_str()
        .unwrap()
        .contains("two moons"));
}

#[tokio::test]
async fn test_generate_blocking_returns_payload() {
    let (app, project_id) = test_app(0, 0);
    let uri = format!("/api/projects/{}/generate", project_id);

    let request = Request::post(&uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(r#"{"prompt": "a quiet harbor"}"#))
        .unwrap();
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    // Generation responses are never cached
    assert!(response.headers().get("x-cache").is_none());

    let payload = body_json(response).await;
    assert!(payload["draft"].as_str().unwrap().contains("quiet harbor"));
}

#[tokio::test]
async fn test_generate_requires_prompt() {
    let (app, project_id) = test_app(0, 0);
    let uri = format!("/api/projects/{}/generate", project_id);

    let request = Request::post(&uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(r#"{"notes": "no prompt here"}"#))
        .unwrap();
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let payload = body_json(response).await;
    assert_eq!(payload["code"], "MISSING_FIELD");
}

#[tokio::test]
async fn test_stats_reflect_traffic() {
    let (app, project_id) = test_app(1, 0);
    let uri = format!("/api/projects/{}", project_id);

    for _ in 0..2 {
        app.clone()
            .oneshot(Request::get(&uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
    }

    let response = app
        .oneshot(Request::get("/api/stats").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let payload = body_json(response).await;
    assert_eq!(payload["gate"]["cache_hits"], 1);
    assert_eq!(payload["gate"]["cache_misses"], 1);
    assert_eq!(payload["gate"]["monitor"]["samples"], 2);
    assert!(payload["uptime_seconds"].is_u64());
}

#[tokio::test]
async fn test_health_endpoints() {
    let (app, _) = test_app(0, 0);

    let ping = app
        .clone()
        .oneshot(Request::get("/health/ping").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(ping.status(), StatusCode::OK);

    let live = app
        .oneshot(Request::get("/health/live").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(live.status(), StatusCode::OK);
    let payload = body_json(live).await;
    assert_eq!(payload["status"], "healthy");
}
