//! System endpoints: readiness probe and manual expiration sweep.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::Utc;
use serde::Serialize;
use utoipa::ToSchema;

use crate::api::dto::SweepResponse;
use crate::app_state::AppState;
use crate::domain::StoreHealth;
use crate::error::{ErrorResponse, StoreError};

/// Health check response.
#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    /// `"healthy"` or `"unavailable"`.
    pub status: String,
    /// Fatal failure description, when unavailable.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    /// Server time (RFC 3339).
    pub timestamp: String,
    /// Crate version.
    pub version: String,
}

/// `GET /health`: Store readiness.
#[utoipa::path(
    get,
    path = "/health",
    tag = "System",
    summary = "Health check",
    description = "Reports whether the store can still reach its database. Flips to 503 once the pool retry budget is exhausted.",
    responses(
        (status = 200, description = "Store is healthy", body = HealthResponse),
        (status = 503, description = "Store hit a fatal condition", body = HealthResponse),
    )
)]
pub async fn health_handler(State(state): State<AppState>) -> impl IntoResponse {
    let (status, label, reason) = match state.health.current() {
        StoreHealth::Healthy => (StatusCode::OK, "healthy", None),
        StoreHealth::Fatal { reason } => (StatusCode::SERVICE_UNAVAILABLE, "unavailable", Some(reason)),
    };
    (
        status,
        Json(HealthResponse {
            status: label.to_string(),
            reason,
            timestamp: Utc::now().to_rfc3339(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }),
    )
}

/// `POST /admin/sweep`: Run an expiration sweep now.
///
/// # Errors
///
/// Returns [`StoreError`] on store failure.
#[utoipa::path(
    post,
    path = "/admin/sweep",
    tag = "System",
    summary = "Sweep expired sessions",
    description = "Deletes sessions whose expiry has passed. Waits for a scheduled sweep already in progress.",
    responses(
        (status = 200, description = "Sweep finished", body = SweepResponse),
        (status = 503, description = "Store unavailable", body = ErrorResponse),
    )
)]
pub async fn sweep_handler(
    State(state): State<AppState>,
) -> Result<impl IntoResponse, StoreError> {
    state.ensure_serving()?;
    let removed = state.store.clear_expired().await?;
    tracing::info!(removed, "manual expiration sweep");
    Ok(Json(SweepResponse { removed }))
}

/// System routes mounted at the root level (not under /api/v1).
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(health_handler))
        .route("/admin/sweep", post(sweep_handler))
}
