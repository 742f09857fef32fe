//! Gate Statistics Endpoint
//!
//! Point-in-time view of cache, coordination, and timing counters for
//! dashboards and smoke checks.

use axum::{extract::State, response::IntoResponse, Json};
use serde::Serialize;

use crate::state::AppState;
use fablecraft_gate::GateStats;

#[derive(Debug, Clone, Serialize)]
pub struct StatsResponse {
    pub gate: GateStats,
    pub uptime_seconds: u64,
    pub version: &'static str,
}

/// GET /api/stats - Gate statistics snapshot
pub async fn get_stats(State(state): State<AppState>) -> impl IntoResponse {
    Json(StatsResponse {
        gate: state.gate.stats(),
        uptime_seconds: state.uptime_seconds(),
        version: env!("CARGO_PKG_VERSION"),
    })
}
