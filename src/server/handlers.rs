// HTTP request handlers

use axum::{
    extract::State,
    response::Json,
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::tmpl_handler::handle_tmpl;
use super::ControlServer;

/// Create the control router
pub fn create_router(server: Arc<ControlServer>) -> Router {
    Router::new()
        .route("/tmpl", post(handle_tmpl))
        .route("/health", get(health_check))
        .with_state(server)
}

/// Response body for /health
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthStatus {
    pub status: String,
    pub uptime_seconds: u64,
    pub build_variables: usize,
    pub parameters: usize,
}

/// Handle GET /health
pub async fn health_check(State(server): State<Arc<ControlServer>>) -> Json<HealthStatus> {
    Json(HealthStatus {
        status: "healthy".to_string(),
        uptime_seconds: server.uptime().as_secs(),
        build_variables: server.job().build_variables.len(),
        parameters: server.job().parameters.len(),
    })
}
