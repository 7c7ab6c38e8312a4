//! # shellbox-core
//!
//! Core crate for Shellbox. Contains the unified error system, configuration
//! schemas, the pure quota policy, cluster scheduler data shapes, and the
//! trait seams (`SchedulerClient`, `TaskQueue`) the rest of the workspace
//! implements.
//!
//! This crate has **no** internal dependencies on other Shellbox crates.

pub mod config;
pub mod error;
pub mod result;
pub mod traits;
pub mod types;

pub use error::{AppError, ErrorKind};
pub use result::AppResult;
