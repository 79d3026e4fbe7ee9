//! Connection pool lifecycle: creation, bounded retry, and replacement.
//!
//! [`PoolManager`] owns the single active pool handle. Callers only ever
//! borrow connections through [`PoolManager::acquire`]; the handle itself
//! never leaves this module.
//!
//! When an acquisition fails the manager closes the failing pool in the
//! background (bounded by a grace period), builds a replacement, and
//! retries against it. Once the retry budget is spent the failure is
//! escalated as fatal through the [`HealthMonitor`].

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::domain::HealthMonitor;
use crate::error::StoreError;

/// Database driver seam used by [`PoolManager`].
///
/// The production implementation is [`super::PgConnector`]; tests plug in
/// connectors with scripted failures.
#[async_trait]
pub trait Connector: Send + Sync + 'static {
    /// Pool handle type. Cloning must share the same underlying pool.
    type Pool: Clone + Send + Sync + 'static;

    /// Borrowed connection. Returned to its pool when dropped.
    type Connection: Send;

    /// Establishes the startup pool. Fails when the database cannot be
    /// reached.
    async fn create_pool(&self) -> Result<Self::Pool, StoreError>;

    /// Builds a pool that takes over from one that stopped handing out
    /// connections.
    ///
    /// Must not require the database to be reachable: during an outage
    /// the retry budget is spent on [`Connector::acquire`]. Defaults to
    /// [`Connector::create_pool`].
    async fn create_replacement(&self) -> Result<Self::Pool, StoreError> {
        self.create_pool().await
    }

    /// Borrows one connection from `pool`.
    async fn acquire(&self, pool: &Self::Pool) -> Result<Self::Connection, StoreError>;

    /// Closes `pool`, waiting for checked-out connections to come back.
    async fn close(&self, pool: Self::Pool);
}

/// The active pool handle tagged with the number of replacements so far.
struct ActivePool<P> {
    generation: u64,
    pool: P,
}

/// Owner of the one active connection pool.
///
/// # Concurrency
///
/// - Acquisitions run concurrently against a snapshot of the handle.
/// - Replacement holds the write lock, so concurrent acquirers see either
///   the old or the new handle, never a half-installed one.
/// - Callers that fail against a handle someone else already replaced
///   retry against the newer handle instead of replacing it again.
pub struct PoolManager<C: Connector> {
    connector: Arc<C>,
    active: RwLock<ActivePool<C::Pool>>,
    max_retries: u32,
    close_grace: Duration,
    health: HealthMonitor,
}

impl<C: Connector> fmt::Debug for PoolManager<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PoolManager")
            .field("max_retries", &self.max_retries)
            .field("close_grace", &self.close_grace)
            .field("health", &self.health.current())
            .finish_non_exhaustive()
    }
}

impl<C: Connector> PoolManager<C> {
    /// Creates the first pool.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::PoolCreation`] if the pool cannot be
    /// established. This usually means misconfiguration, so it is not
    /// retried and the health monitor is flipped to fatal.
    pub async fn connect(
        connector: C,
        max_retries: u32,
        close_grace: Duration,
        health: HealthMonitor,
    ) -> Result<Self, StoreError> {
        let pool = match connector.create_pool().await {
            Ok(pool) => pool,
            Err(err) => {
                tracing::error!(error = %err, "database pool failed to initialize");
                health.mark_fatal(err.to_string());
                return Err(err);
            }
        };
        tracing::info!(max_retries, "database pool ready");

        Ok(Self::with_pool(connector, pool, max_retries, close_grace, health))
    }

    /// Adopts an already built pool as generation 0.
    #[must_use]
    pub fn with_pool(
        connector: C,
        pool: C::Pool,
        max_retries: u32,
        close_grace: Duration,
        health: HealthMonitor,
    ) -> Self {
        Self {
            connector: Arc::new(connector),
            active: RwLock::new(ActivePool { generation: 0, pool }),
            max_retries,
            close_grace,
            health,
        }
    }

    /// Returns the health monitor this manager reports to.
    #[must_use]
    pub fn health(&self) -> &HealthMonitor {
        &self.health
    }

    /// Returns how many times the pool has been replaced.
    pub async fn generation(&self) -> u64 {
        self.active.read().await.generation
    }

    /// Borrows a connection, replacing the pool on failure.
    ///
    /// Makes at most `max_retries + 1` attempts. The returned connection
    /// goes back to its pool when dropped.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::AcquireExhausted`] once every attempt failed,
    /// or [`StoreError::PoolCreation`] if a replacement pool cannot be
    /// built. Both flip the health monitor to fatal.
    pub async fn acquire(&self) -> Result<C::Connection, StoreError> {
        let mut retries_left = self.max_retries;
        let (mut generation, mut pool) = self.snapshot().await;

        loop {
            let err = match self.connector.acquire(&pool).await {
                Ok(conn) => return Ok(conn),
                Err(err) => err,
            };
            tracing::warn!(error = %err, generation, retries_left, "cannot acquire database connection");

            if retries_left == 0 {
                self.close_in_background(pool);
                return Err(self.escalate(StoreError::AcquireExhausted {
                    attempts: self.max_retries.saturating_add(1),
                    reason: err.to_string(),
                }));
            }
            retries_left -= 1;

            (generation, pool) = self.replace(generation).await?;
        }
    }

    async fn snapshot(&self) -> (u64, C::Pool) {
        let active = self.active.read().await;
        (active.generation, active.pool.clone())
    }

    /// Swaps out the pool at `stale` generation for a fresh one.
    ///
    /// If the active handle has already moved past `stale`, the newer
    /// handle is returned untouched.
    async fn replace(&self, stale: u64) -> Result<(u64, C::Pool), StoreError> {
        let mut active = self.active.write().await;
        if active.generation != stale {
            return Ok((active.generation, active.pool.clone()));
        }

        self.close_in_background(active.pool.clone());

        let pool = match self.connector.create_replacement().await {
            Ok(pool) => pool,
            Err(err) => return Err(self.escalate(err)),
        };
        active.generation = active.generation.saturating_add(1);
        active.pool = pool.clone();
        tracing::info!(generation = active.generation, "database pool replaced");

        Ok((active.generation, pool))
    }

    fn close_in_background(&self, pool: C::Pool) {
        let connector = Arc::clone(&self.connector);
        let grace = self.close_grace;
        tokio::spawn(async move {
            if tokio::time::timeout(grace, connector.close(pool)).await.is_err() {
                tracing::warn!(grace_secs = grace.as_secs(), "pool close exceeded grace period");
            }
        });
    }

    fn escalate(&self, err: StoreError) -> StoreError {
        tracing::error!(error = %err, "database unreachable, store is no longer serviceable");
        self.health.mark_fatal(err.to_string());
        err
    }
}
