//! Domain layer: session payload and the store health signal.
//!
//! This module contains the session data model handed over by the HTTP
//! session middleware, including expiry computation, and the health
//! monitor used to escalate fatal store conditions to the outer layer.

pub mod health;
pub mod session;

pub use health::{HealthMonitor, StoreHealth};
pub use session::{MAX_SESSION_ID_LEN, SessionCookie, SessionData};
