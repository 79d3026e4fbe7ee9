//! Service layer: background work that runs alongside the store.

pub mod sweeper;

pub use sweeper::Sweeper;
