use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json},
};
use serde_json::json;

use super::observability_api::ObservabilityState;

/// Health check endpoint
/// Returns 200 OK if the service is running
pub async fn health_check() -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(json!({
            "status": "healthy",
            "service": "ops-dashboard",
            "version": env!("CARGO_PKG_VERSION"),
        })),
    )
}

/// Readiness check endpoint
/// Ready once at least one provider is registered
pub async fn readiness_check(State(state): State<ObservabilityState>) -> impl IntoResponse {
    let listing = state.controller.providers();
    let registered = listing.logs.len() + listing.traces.len() + listing.metrics.len();

    let status = if registered > 0 {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (
        status,
        Json(json!({
            "status": if registered > 0 { "ready" } else { "no providers registered" },
            "service": "ops-dashboard",
            "providers": listing,
        })),
    )
}
