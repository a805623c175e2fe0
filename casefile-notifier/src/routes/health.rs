use std::sync::Arc;

use axum::extract::State;
use axum::response::{IntoResponse, Response};
use axum::Json;

use casefile_shared::{HealthCheck, HealthResponse};

use crate::AppState;

/// GET /health
/// Probes the recipient database.
pub async fn health_check(State(state): State<Arc<AppState>>) -> Response {
    let database = match state.recipients.ping().await {
        Ok(()) => HealthCheck::healthy("database"),
        Err(e) => HealthCheck::unhealthy("database", e.to_string()),
    };

    let response = HealthResponse::healthy("casefile-notifier", env!("CARGO_PKG_VERSION"))
        .with_checks(vec![database]);

    (response.http_status(), Json(response)).into_response()
}

/// GET /metrics
pub async fn metrics(State(state): State<Arc<AppState>>) -> String {
    state.metrics_handle.render()
}
