//! Session CRUD handlers: get, set, touch, destroy, count, clear.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};

use crate::api::dto::SessionCountResponse;
use crate::app_state::AppState;
use crate::domain::{MAX_SESSION_ID_LEN, SessionData};
use crate::error::{ErrorResponse, StoreError};

/// `GET /sessions/{id}`: Load a session.
///
/// # Errors
///
/// Returns [`StoreError::SessionNotFound`] if no session is stored under
/// the identifier.
#[utoipa::path(
    get,
    path = "/api/v1/sessions/{id}",
    tag = "Sessions",
    summary = "Get a session",
    description = "Returns the stored session payload, expired or not.",
    params(
        ("id" = String, Path, description = "Session identifier"),
    ),
    responses(
        (status = 200, description = "Session payload", body = serde_json::Value),
        (status = 404, description = "Session not found", body = ErrorResponse),
        (status = 500, description = "Stored payload is corrupt", body = ErrorResponse),
    )
)]
pub async fn get_session(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, StoreError> {
    state.ensure_serving()?;
    validate_session_id(&id)?;

    match state.store.get(&id).await? {
        Some(session) => Ok(Json(session)),
        None => Err(StoreError::SessionNotFound(id)),
    }
}

/// `PUT /sessions/{id}`: Create or overwrite a session.
///
/// # Errors
///
/// Returns [`StoreError`] on an invalid identifier or store failure.
#[utoipa::path(
    put,
    path = "/api/v1/sessions/{id}",
    tag = "Sessions",
    summary = "Store a session",
    description = "Upserts the payload. The expiry comes from `cookie.expires` or the configured lifetime.",
    params(
        ("id" = String, Path, description = "Session identifier"),
    ),
    request_body = serde_json::Value,
    responses(
        (status = 204, description = "Session stored"),
        (status = 400, description = "Invalid session identifier", body = ErrorResponse),
    )
)]
pub async fn put_session(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(session): Json<SessionData>,
) -> Result<impl IntoResponse, StoreError> {
    state.ensure_serving()?;
    validate_session_id(&id)?;

    state.store.set(&id, &session).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// `POST /sessions/{id}/touch`: Refresh a session's expiry.
///
/// # Errors
///
/// Returns [`StoreError`] on an invalid identifier or store failure.
#[utoipa::path(
    post,
    path = "/api/v1/sessions/{id}/touch",
    tag = "Sessions",
    summary = "Touch a session",
    description = "Updates only the expiry. Touching an unknown session succeeds without effect.",
    params(
        ("id" = String, Path, description = "Session identifier"),
    ),
    request_body = serde_json::Value,
    responses(
        (status = 204, description = "Expiry refreshed"),
        (status = 400, description = "Invalid session identifier", body = ErrorResponse),
    )
)]
pub async fn touch_session(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(session): Json<SessionData>,
) -> Result<impl IntoResponse, StoreError> {
    state.ensure_serving()?;
    validate_session_id(&id)?;

    state.store.touch(&id, &session).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// `DELETE /sessions/{id}`: Destroy a session.
///
/// # Errors
///
/// Returns [`StoreError`] on an invalid identifier or store failure.
#[utoipa::path(
    delete,
    path = "/api/v1/sessions/{id}",
    tag = "Sessions",
    summary = "Destroy a session",
    description = "Deletes the session. Deleting an unknown session succeeds.",
    params(
        ("id" = String, Path, description = "Session identifier"),
    ),
    responses(
        (status = 204, description = "Session destroyed"),
        (status = 400, description = "Invalid session identifier", body = ErrorResponse),
    )
)]
pub async fn delete_session(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, StoreError> {
    state.ensure_serving()?;
    validate_session_id(&id)?;

    state.store.destroy(&id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// `GET /sessions`: Count stored sessions.
///
/// # Errors
///
/// Returns [`StoreError`] on store failure.
#[utoipa::path(
    get,
    path = "/api/v1/sessions",
    tag = "Sessions",
    summary = "Count sessions",
    responses(
        (status = 200, description = "Session count", body = SessionCountResponse),
    )
)]
pub async fn count_sessions(
    State(state): State<AppState>,
) -> Result<impl IntoResponse, StoreError> {
    state.ensure_serving()?;
    let count = state.store.length().await?;
    Ok(Json(SessionCountResponse { count }))
}

/// `DELETE /sessions`: Delete every session.
///
/// # Errors
///
/// Returns [`StoreError`] on store failure.
#[utoipa::path(
    delete,
    path = "/api/v1/sessions",
    tag = "Sessions",
    summary = "Clear all sessions",
    responses(
        (status = 204, description = "All sessions deleted"),
    )
)]
pub async fn clear_sessions(
    State(state): State<AppState>,
) -> Result<impl IntoResponse, StoreError> {
    state.ensure_serving()?;
    state.store.clear().await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Session routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/sessions", get(count_sessions).delete(clear_sessions))
        .route(
            "/sessions/{id}",
            get(get_session).put(put_session).delete(delete_session),
        )
        .route("/sessions/{id}/touch", post(touch_session))
}

/// Rejects identifiers the session table cannot hold.
fn validate_session_id(id: &str) -> Result<(), StoreError> {
    if id.is_empty() {
        return Err(StoreError::InvalidRequest(
            "session id must not be empty".to_string(),
        ));
    }
    if id.chars().count() > MAX_SESSION_ID_LEN {
        return Err(StoreError::InvalidRequest(format!(
            "session id exceeds {MAX_SESSION_ID_LEN} characters"
        )));
    }
    Ok(())
}
