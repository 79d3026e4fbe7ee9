//! REST API layer: route handlers, DTOs, and router composition.
//!
//! Session endpoints are mounted under `/api/v1`; system endpoints
//! (`/health`, `/admin/sweep`) live at the root.

pub mod dto;
pub mod handlers;

use axum::Router;
use utoipa::OpenApi;

use crate::app_state::AppState;

/// OpenAPI document for every REST endpoint.
#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::session::get_session,
        handlers::session::put_session,
        handlers::session::touch_session,
        handlers::session::delete_session,
        handlers::session::count_sessions,
        handlers::session::clear_sessions,
        handlers::system::health_handler,
        handlers::system::sweep_handler,
    ),
    components(schemas(
        dto::SessionCountResponse,
        dto::SweepResponse,
        handlers::system::HealthResponse,
        crate::error::ErrorResponse,
        crate::error::ErrorBody,
    )),
    tags(
        (name = "Sessions", description = "Session CRUD against the session table"),
        (name = "System", description = "Health and maintenance"),
    )
)]
#[derive(Debug)]
pub struct ApiDoc;

/// Builds the complete API router with all REST endpoints.
pub fn build_router() -> Router<AppState> {
    Router::new()
        .nest("/api/v1", handlers::routes())
        .merge(handlers::system::routes())
}
