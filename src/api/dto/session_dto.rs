//! Session collection DTOs.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Response body for `GET /sessions`.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct SessionCountResponse {
    /// Number of stored sessions, expired ones included.
    pub count: u64,
}

/// Response body for `POST /admin/sweep`.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct SweepResponse {
    /// Number of expired sessions removed by this sweep.
    pub removed: u64,
}
