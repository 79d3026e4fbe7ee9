//! # sessiond
//!
//! Resilient PostgreSQL-backed session store for HTTP session middleware.
//!
//! Sessions are small JSON payloads keyed by an opaque identifier and
//! stored in a single table together with an epoch-seconds expiry. The
//! store survives transient database outages by replacing its connection
//! pool a bounded number of times, escalates unrecoverable outages
//! through a health signal instead of exiting, and deletes expired rows
//! from a background sweeper that never overlaps itself.
//!
//! ## Architecture
//!
//! ```text
//! Session middleware / REST clients
//!     │
//!     ├── REST Handlers (api/)
//!     │
//!     ├── SessionStore trait (persistence/)
//!     ├── Sweeper (service/)
//!     │
//!     ├── PgSessionStore ── Statements (persistence/schema)
//!     ├── PoolManager ── HealthMonitor (domain/)
//!     │
//!     └── PostgreSQL
//! ```

pub mod api;
pub mod app_state;
pub mod config;
pub mod domain;
pub mod error;
pub mod persistence;
pub mod service;
