//! Periodic expiration sweep.
//!
//! [`Sweeper`] drives a sweep function on a fixed period from a single
//! tokio task. Each tick calls the function and awaits it before waiting
//! for the next tick, so two sweeps never run at the same time. Ticks
//! missed while a slow sweep was running are skipped, not queued.

use std::future::Future;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

use crate::error::StoreError;

/// Handle to a running sweep task. Dropping it stops the task.
#[derive(Debug)]
pub struct Sweeper {
    period: Duration,
    handle: JoinHandle<()>,
}

impl Sweeper {
    /// Starts calling `sweep` every `period`, first one period from now.
    ///
    /// Returns `None` for a zero period.
    pub fn spawn<F, Fut>(period: Duration, sweep: F) -> Option<Self>
    where
        F: Fn() -> Fut + Send + 'static,
        Fut: Future<Output = Result<u64, StoreError>> + Send + 'static,
    {
        if period.is_zero() {
            tracing::warn!("expiration check interval is zero, sweeper disabled");
            return None;
        }

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

            loop {
                ticker.tick().await;
                match sweep().await {
                    Ok(removed) => tracing::debug!(removed, "expired sessions swept"),
                    Err(err) => tracing::warn!(error = %err, "expiration sweep failed"),
                }
            }
        });
        tracing::info!(period_ms = period.as_millis(), "expiration sweeper started");

        Some(Self { period, handle })
    }

    /// Returns the sweep period.
    #[must_use]
    pub const fn period(&self) -> Duration {
        self.period
    }

    /// Returns `true` while the sweep task is alive.
    #[must_use]
    pub fn is_running(&self) -> bool {
        !self.handle.is_finished()
    }

    /// Stops the sweep task. A sweep in progress is cancelled at its next
    /// await point.
    pub fn stop(self) {
        drop(self);
    }
}

impl Drop for Sweeper {
    fn drop(&mut self) {
        self.handle.abort();
    }
}
