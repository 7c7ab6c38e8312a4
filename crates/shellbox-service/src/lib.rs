//! # shellbox-service
//!
//! The provisioning services: [`slot::SlotAllocator`] manages reservable
//! name slots, [`boxes::BoxService`] is the box lifecycle controller
//! orchestrating quota checks, cluster dispatch, persistence, and deferred
//! teardown.

pub mod boxes;
pub mod namegen;
pub mod slot;

#[cfg(test)]
pub(crate) mod testing;

pub use boxes::{BoxService, CreateBoxRequest};
pub use slot::SlotAllocator;
