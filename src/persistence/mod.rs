//! Persistence layer: the session store contract and its PostgreSQL
//! implementation.
//!
//! Provides the [`SessionStore`] trait consumed by HTTP session
//! middleware, the [`PoolManager`] that keeps a working connection pool
//! alive across database outages, and the SQL text for the session table.

pub mod pool_manager;
pub mod postgres;
pub mod schema;

use async_trait::async_trait;

use crate::domain::SessionData;
use crate::error::StoreError;

pub use pool_manager::{Connector, PoolManager};
pub use postgres::{PgConnector, PgSessionStore};
pub use schema::{BootstrapOutcome, Statements};

/// CRUD contract between the session middleware and a backing store.
///
/// Every operation resolves its future with a `Result`; none panics or
/// aborts the process on database failure.
#[async_trait]
pub trait SessionStore: std::fmt::Debug + Send + Sync + 'static {
    /// Loads a session. Returns `Ok(None)` when no row exists.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::CorruptSession`] when the stored payload is
    /// not valid JSON, or a database error.
    async fn get(&self, session_id: &str) -> Result<Option<SessionData>, StoreError>;

    /// Inserts or overwrites a session and its expiry.
    ///
    /// # Errors
    ///
    /// Returns a [`StoreError`] on serialization or database failure.
    async fn set(&self, session_id: &str, session: &SessionData) -> Result<(), StoreError>;

    /// Refreshes the expiry of an existing session without rewriting its
    /// data. A missing session is not an error.
    ///
    /// # Errors
    ///
    /// Returns a [`StoreError`] on database failure.
    async fn touch(&self, session_id: &str, session: &SessionData) -> Result<(), StoreError>;

    /// Deletes a session. A missing session is not an error.
    ///
    /// # Errors
    ///
    /// Returns a [`StoreError`] on database failure.
    async fn destroy(&self, session_id: &str) -> Result<(), StoreError>;

    /// Counts stored sessions, expired ones included.
    ///
    /// # Errors
    ///
    /// Returns a [`StoreError`] on database failure.
    async fn length(&self) -> Result<u64, StoreError>;

    /// Deletes every session.
    ///
    /// # Errors
    ///
    /// Returns a [`StoreError`] on database failure.
    async fn clear(&self) -> Result<(), StoreError>;

    /// Deletes sessions whose expiry is before the current second and
    /// returns how many were removed.
    ///
    /// # Errors
    ///
    /// Returns a [`StoreError`] on database failure.
    async fn clear_expired(&self) -> Result<u64, StoreError>;
}
