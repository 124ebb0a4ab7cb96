pub mod orders;
pub mod payments;
pub mod tickets;
pub mod transactions;
pub mod verification;
pub mod webhook;

use axum::{Json, http::StatusCode, response::IntoResponse};
use serde_json::json;
use service_core::auth::AuthUser;
use service_core::error::AppError;
use uuid::Uuid;

use crate::services::metrics::render_metrics;

/// Health check endpoint for liveness probes.
pub async fn health_check() -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(json!({
            "status": "ok",
            "service": "marketplace-service",
            "version": env!("CARGO_PKG_VERSION")
        })),
    )
}

/// Readiness check endpoint.
pub async fn readiness_check() -> impl IntoResponse {
    (StatusCode::OK, Json(json!({ "status": "ready" })))
}

/// Prometheus metrics endpoint.
pub async fn metrics_endpoint() -> impl IntoResponse {
    (
        StatusCode::OK,
        [("content-type", "text/plain; charset=utf-8")],
        render_metrics(),
    )
}

/// Token subjects are the identity provider's user UUIDs.
pub(crate) fn caller_id(auth: &AuthUser) -> Result<Uuid, AppError> {
    Uuid::parse_str(&auth.0.sub)
        .map_err(|_| AppError::Unauthorized(anyhow::anyhow!("Token subject is not a valid user id")))
}

/// Collect the names of absent required fields into a single 400, so the
/// client learns everything that is missing at once.
pub(crate) fn require_fields(missing: Vec<&'static str>) -> Result<(), AppError> {
    if missing.is_empty() {
        return Ok(());
    }
    Err(AppError::BadRequest(anyhow::anyhow!(
        "Missing required fields: {}",
        missing.join(", ")
    )))
}
