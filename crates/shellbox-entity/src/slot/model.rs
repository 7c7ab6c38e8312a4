//! Name slot entity model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// A reservable, globally unique name a box is addressed by.
///
/// A slot holds at most one active box: `in_use` is true exactly while a
/// box row references it. Reserved slots survive box teardown with
/// `in_use = false`; auto-generated slots are deleted together with their
/// box.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct NameSlot {
    /// Unique slot identifier.
    pub id: Uuid,
    /// The user owning this slot.
    pub user_id: Uuid,
    /// Globally unique slot name (case-sensitive).
    pub name: String,
    /// Whether the user explicitly claimed this name.
    pub reserved: bool,
    /// Whether a box is currently bound to this slot.
    pub in_use: bool,
    /// When the slot was created.
    pub created_at: DateTime<Utc>,
}
