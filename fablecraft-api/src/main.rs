//! Fablecraft API Server Entry Point
//!
//! Bootstraps configuration and logging, wires the request gate to its
//! collaborators, starts the cache sweeper, and serves the Axum router
//! until a shutdown signal arrives.

use std::net::SocketAddr;
use std::sync::Arc;

use fablecraft_api::{
    create_api_router, ApiError, ApiResult, AppState, FixtureCatalog, FixtureGenerator,
};
use fablecraft_core::GateConfig;
use fablecraft_gate::{cache_sweeper_task, RequestGate};
use tokio::sync::watch;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> ApiResult<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = GateConfig::from_env();
    config
        .validate()
        .map_err(|e| ApiError::internal_error(format!("Invalid configuration: {}", e)))?;

    let gate = RequestGate::new(config.clone());

    // The binary has no storage backend of its own; it serves the
    // built-in fixture catalog, sized from the environment
    let characters = std::env::var("FABLECRAFT_FIXTURE_CHARACTERS")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(24);
    let world_entities = std::env::var("FABLECRAFT_FIXTURE_WORLD_ENTITIES")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(40);
    let (catalog, project_id) = FixtureCatalog::with_project(characters, world_entities);
    tracing::info!(%project_id, characters, world_entities, "Serving built-in fixture catalog");

    let state = AppState::new(gate, Arc::new(catalog), Arc::new(FixtureGenerator));

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let sweeper = tokio::spawn(cache_sweeper_task(
        state.gate.as_ref().clone(),
        config.sweep_interval,
        shutdown_rx,
    ));

    let app = create_api_router(state);

    let addr = resolve_bind_addr()?;
    tracing::info!(%addr, "Starting Fablecraft API server");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| ApiError::internal_error(format!("Failed to bind {}: {}", addr, e)))?;

    let server = axum::serve(listener, app);
    tokio::select! {
        result = server => {
            result.map_err(|e| ApiError::internal_error(format!("Server error: {}", e)))?;
        }
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Shutdown signal received");
        }
    }

    let _ = shutdown_tx.send(true);
    let _ = sweeper.await;
    Ok(())
}

fn resolve_bind_addr() -> ApiResult<SocketAddr> {
    let host = std::env::var("FABLECRAFT_API_BIND").unwrap_or_else(|_| "0.0.0.0".to_string());
    let port_str = std::env::var("PORT")
        .ok()
        .or_else(|| std::env::var("FABLECRAFT_API_PORT").ok())
        .unwrap_or_else(|| "3000".to_string());
    let port = port_str
        .parse::<u16>()
        .map_err(|_| ApiError::invalid_input(format!("Invalid port value: {}", port_str)))?;

    let addr = format!("{}:{}", host, port);
    addr.parse::<SocketAddr>()
        .map_err(|e| ApiError::invalid_input(format!("Invalid bind address {}: {}", addr, e)))
}
