//! # shellbox-worker
//!
//! The background half of the box lifecycle: a database-backed task queue
//! with at-least-once delivery, an executor dispatching tasks to registered
//! handlers, a poll-loop runner with bounded concurrency, a cron scheduler
//! firing the periodic reconciliation sweep, and the cluster maintenance
//! handlers (cleanup, expiry, reconcile).

pub mod executor;
pub mod jobs;
pub mod queue;
pub mod runner;
pub mod scheduler;

#[cfg(test)]
pub(crate) mod testing;

pub use executor::{TaskError, TaskExecutor, TaskHandler};
pub use queue::DbTaskQueue;
pub use runner::WorkerRunner;
pub use scheduler::CronScheduler;
