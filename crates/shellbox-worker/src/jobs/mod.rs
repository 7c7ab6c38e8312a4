//! Cluster maintenance task handlers.

pub mod cleanup;
pub mod expiry;
pub mod reconcile;

pub use cleanup::CleanupTaskHandler;
pub use expiry::ExpiryTaskHandler;
pub use reconcile::ReconcileTaskHandler;
