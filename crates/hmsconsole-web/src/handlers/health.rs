//! Liveness of the web server and the supervised daemon.

use axum::{extract::State, Json};
use serde::Serialize;
use crate::state::SharedState;
use crate::supervisor::DaemonState;

#[derive(Debug, Serialize)]
pub struct HealthReport {
    pub status: &'static str,
    pub daemon: DaemonState,
}

/// GET /health
pub async fn health(State(state): State<SharedState>) -> Json<HealthReport> {
    Json(HealthReport {
        status: "ok",
        daemon: state.supervisor.state(),
    })
}
