//! User entity model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// An account that owns name slots and boxes.
///
/// Every user references exactly one plan; quota limits are always read
/// live through that reference, never snapshotted onto the user.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct User {
    /// Unique user identifier.
    pub id: Uuid,
    /// E-mail address (unique).
    pub email: String,
    /// Whether the e-mail address has been confirmed.
    pub confirmed: bool,
    /// The plan this user is on.
    pub plan_id: Uuid,
    /// When the account was created.
    pub created_at: DateTime<Utc>,
}
