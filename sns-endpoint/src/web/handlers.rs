//! HTTP handlers.
//!
//! The SNS route accepts every method so the dispatch state machine can
//! answer non-POST requests itself with 405.

use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, Method},
    response::{IntoResponse, Response},
    routing::{any, get},
    Json, Router,
};
use serde::Serialize;

use crate::web::endpoint::SnsEndpoint;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub endpoint: Arc<SnsEndpoint>,
}

impl AppState {
    pub fn new(endpoint: SnsEndpoint) -> Self {
        Self {
            endpoint: Arc::new(endpoint),
        }
    }
}

// =============================================================================
// Health Check
// =============================================================================

/// Health check response.
#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
}

/// Health check endpoint.
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse { status: "ok" })
}

// =============================================================================
// SNS Webhook
// =============================================================================

/// SNS delivery endpoint.
pub async fn sns_webhook(
    State(state): State<AppState>,
    method: Method,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    match state.endpoint.dispatch(&method, &headers, &body).await {
        Ok(response) => response.into_response(),
        Err(e) => e.into_response(),
    }
}

/// Build the router serving `/health` and the SNS endpoint at `path`.
pub fn router(state: AppState, path: &str) -> Router {
    Router::new()
        .route("/health", get(health))
        .route(path, any(sns_webhook))
        .with_state(state)
}
