//! Data Transfer Objects for REST request/response serialization.
//!
//! Session payloads themselves travel as
//! [`SessionData`](crate::domain::SessionData); the DTOs here only wrap
//! collection-level results.

pub mod session_dto;

pub use session_dto::*;
