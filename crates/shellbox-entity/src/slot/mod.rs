//! Name slot entity.

pub mod model;

pub use model::NameSlot;
