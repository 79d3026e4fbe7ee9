//! PostgreSQL implementation of the session store.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use sqlx::PgPool;
use sqlx::pool::PoolConnection;
use sqlx::postgres::{PgPoolOptions, Postgres};
use tokio::sync::Mutex;

use super::SessionStore;
use super::pool_manager::{Connector, PoolManager};
use super::schema::{BootstrapOutcome, Statements, is_duplicate_table};
use crate::config::{PoolOptions, StoreOptions};
use crate::domain::{HealthMonitor, SessionData};
use crate::error::StoreError;
use crate::service::Sweeper;

/// [`Connector`] backed by `sqlx::PgPool`.
#[derive(Debug, Clone)]
pub struct PgConnector {
    options: PoolOptions,
}

impl PgConnector {
    /// Creates a connector for the given pool attributes.
    #[must_use]
    pub fn new(options: PoolOptions) -> Self {
        Self { options }
    }

    fn pool_options(&self) -> PgPoolOptions {
        PgPoolOptions::new()
            .max_connections(self.options.max_connections)
            .min_connections(self.options.min_connections)
            .acquire_timeout(self.options.acquire_timeout())
    }
}

#[async_trait]
impl Connector for PgConnector {
    type Pool = PgPool;
    type Connection = PoolConnection<Postgres>;

    async fn create_pool(&self) -> Result<PgPool, StoreError> {
        self.pool_options()
            .connect(&self.options.database_url)
            .await
            .map_err(|e| StoreError::PoolCreation(e.to_string()))
    }

    async fn create_replacement(&self) -> Result<PgPool, StoreError> {
        self.pool_options()
            .connect_lazy(&self.options.database_url)
            .map_err(|e| StoreError::PoolCreation(e.to_string()))
    }

    async fn acquire(&self, pool: &PgPool) -> Result<PoolConnection<Postgres>, StoreError> {
        pool.acquire()
            .await
            .map_err(|e| StoreError::Acquire(e.to_string()))
    }

    async fn close(&self, pool: PgPool) {
        pool.close().await;
    }
}

/// PostgreSQL-backed session store.
///
/// Every operation borrows one connection from the [`PoolManager`], runs
/// one autocommitted statement, and returns the connection on drop.
#[derive(Debug)]
pub struct PgSessionStore {
    pool: PoolManager<PgConnector>,
    statements: Statements,
    expiration: Duration,
    sweep_lock: Mutex<()>,
}

impl PgSessionStore {
    /// Creates a store over an already connected pool manager.
    #[must_use]
    pub fn new(pool: PoolManager<PgConnector>, options: &StoreOptions) -> Self {
        Self {
            pool,
            statements: Statements::new(&options.schema),
            expiration: options.expiration,
            sweep_lock: Mutex::new(()),
        }
    }

    /// Connects, bootstraps the table if configured, and starts the
    /// expiration sweeper.
    ///
    /// The sweeper starts after bootstrap whatever its outcome. It is
    /// `None` when the configured interval is zero.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::PoolCreation`] if the initial pool cannot be
    /// created.
    pub async fn open(
        options: &StoreOptions,
        health: HealthMonitor,
    ) -> Result<(Arc<Self>, Option<Sweeper>), StoreError> {
        let manager = PoolManager::connect(
            PgConnector::new(options.pool.clone()),
            options.pool.max_retries,
            options.pool.close_grace(),
            health,
        )
        .await?;
        let store = Arc::new(Self::new(manager, options));

        let outcome = if options.create_database_table {
            store.ensure_table().await
        } else {
            BootstrapOutcome::Skipped
        };
        tracing::debug!(?outcome, "schema bootstrap finished");

        let sweeper = Arc::clone(&store).start_sweeper(options.check_expiration_interval);
        Ok((store, sweeper))
    }

    /// Returns the statement text in use.
    #[must_use]
    pub fn statements(&self) -> &Statements {
        &self.statements
    }

    /// Returns the pool manager.
    #[must_use]
    pub fn pool(&self) -> &PoolManager<PgConnector> {
        &self.pool
    }

    /// Creates the session table.
    ///
    /// An existing table counts as success. Any other failure is logged
    /// and reported as [`BootstrapOutcome::Failed`]; it never aborts
    /// startup.
    pub async fn ensure_table(&self) -> BootstrapOutcome {
        let mut conn = match self.pool.acquire().await {
            Ok(conn) => conn,
            Err(err) => {
                tracing::error!(error = %err, "failed to create sessions table");
                return BootstrapOutcome::Failed;
            }
        };

        match sqlx::query(&self.statements.create_table)
            .execute(&mut *conn)
            .await
        {
            Ok(_) => {
                tracing::info!("sessions table created");
                BootstrapOutcome::Created
            }
            Err(sqlx::Error::Database(db)) if is_duplicate_table(db.code().as_deref()) => {
                tracing::info!("sessions table already exists");
                BootstrapOutcome::AlreadyExists
            }
            Err(err) => {
                tracing::error!(error = %err, "failed to create sessions table");
                BootstrapOutcome::Failed
            }
        }
    }

    /// Spawns the periodic expiration sweep for this store.
    #[must_use]
    pub fn start_sweeper(self: Arc<Self>, period: Duration) -> Option<Sweeper> {
        Sweeper::spawn(period, move || {
            let store = Arc::clone(&self);
            async move { store.clear_expired().await }
        })
    }

    /// Deletes sessions with an expiry strictly before `reference`
    /// (epoch seconds).
    ///
    /// Sweeps are serialized: a call made while another sweep runs waits
    /// for it to finish.
    ///
    /// # Errors
    ///
    /// Returns a [`StoreError`] on database failure.
    pub async fn clear_expired_before(&self, reference: i64) -> Result<u64, StoreError> {
        let _sweeping = self.sweep_lock.lock().await;
        let mut conn = self.pool.acquire().await?;

        let result = sqlx::query(&self.statements.delete_expired)
            .bind(reference)
            .execute(&mut *conn)
            .await
            .map_err(|e| StoreError::Database(e.to_string()))?;

        Ok(result.rows_affected())
    }
}

#[async_trait]
impl SessionStore for PgSessionStore {
    async fn get(&self, session_id: &str) -> Result<Option<SessionData>, StoreError> {
        let mut conn = self.pool.acquire().await?;

        let row = sqlx::query_scalar::<_, Option<String>>(&self.statements.select_data)
            .bind(session_id)
            .fetch_optional(&mut *conn)
            .await
            .map_err(|e| StoreError::Database(e.to_string()))?;

        let Some(Some(raw)) = row else {
            return Ok(None);
        };
        SessionData::from_stored(&raw).map_err(|e| {
            tracing::warn!(session_id, error = %e, "stored session is not valid JSON");
            StoreError::CorruptSession {
                session_id: session_id.to_string(),
            }
        })
    }

    async fn set(&self, session_id: &str, session: &SessionData) -> Result<(), StoreError> {
        let expires = session.expires_at(Utc::now(), self.expiration);
        let data =
            serde_json::to_string(session).map_err(|e| StoreError::Serialization(e.to_string()))?;

        let mut conn = self.pool.acquire().await?;
        sqlx::query(&self.statements.upsert)
            .bind(session_id)
            .bind(expires)
            .bind(data)
            .execute(&mut *conn)
            .await
            .map_err(|e| StoreError::Database(e.to_string()))?;

        tracing::trace!(session_id, expires, "session stored");
        Ok(())
    }

    async fn touch(&self, session_id: &str, session: &SessionData) -> Result<(), StoreError> {
        let expires = session.expires_at(Utc::now(), self.expiration);

        let mut conn = self.pool.acquire().await?;
        let result = sqlx::query(&self.statements.touch)
            .bind(expires)
            .bind(session_id)
            .execute(&mut *conn)
            .await
            .map_err(|e| StoreError::Database(e.to_string()))?;

        tracing::trace!(session_id, expires, rows = result.rows_affected(), "session touched");
        Ok(())
    }

    async fn destroy(&self, session_id: &str) -> Result<(), StoreError> {
        let mut conn = self.pool.acquire().await?;
        sqlx::query(&self.statements.destroy)
            .bind(session_id)
            .execute(&mut *conn)
            .await
            .map_err(|e| StoreError::Database(e.to_string()))?;
        Ok(())
    }

    async fn length(&self) -> Result<u64, StoreError> {
        let mut conn = self.pool.acquire().await?;
        let count = sqlx::query_scalar::<_, i64>(&self.statements.count)
            .fetch_one(&mut *conn)
            .await
            .map_err(|e| StoreError::Database(e.to_string()))?;
        Ok(u64::try_from(count).unwrap_or(0))
    }

    async fn clear(&self) -> Result<(), StoreError> {
        let mut conn = self.pool.acquire().await?;
        let result = sqlx::query(&self.statements.clear)
            .execute(&mut *conn)
            .await
            .map_err(|e| StoreError::Database(e.to_string()))?;
        tracing::info!(removed = result.rows_affected(), "all sessions cleared");
        Ok(())
    }

    async fn clear_expired(&self) -> Result<u64, StoreError> {
        self.clear_expired_before(Utc::now().timestamp()).await
    }
}
