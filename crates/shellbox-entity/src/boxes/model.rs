//! Box entity model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// A running, time-bounded remote-shell container leased to a user.
///
/// A box owns its slot exclusively and exists only while its scheduler job
/// is live or launching; the row is created after the job reaches
/// "running" and deleted together with a deregister request.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ShellBox {
    /// Unique box identifier.
    pub id: Uuid,
    /// The slot this box is addressed by.
    pub slot_id: Uuid,
    /// Scheduler dispatch identifier (unique while the row exists).
    pub job_id: String,
    /// Address of the node the box landed on.
    pub ip_address: String,
    /// Dynamically assigned SSH port.
    pub ssh_port: i32,
    /// Requested port forward types ("http", "https", ...).
    pub port_types: Vec<String>,
    /// When the session ends and the box is torn down.
    pub session_end_time: DateTime<Utc>,
    /// When the box was created.
    pub created_at: DateTime<Utc>,
}

impl ShellBox {
    /// Whether the session has passed its end time.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.session_end_time <= now
    }
}

/// Data required to persist a freshly launched box.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewShellBox {
    /// Scheduler dispatch identifier.
    pub job_id: String,
    /// Address of the node the box landed on.
    pub ip_address: String,
    /// Dynamically assigned SSH port.
    pub ssh_port: i32,
    /// Requested port forward types.
    pub port_types: Vec<String>,
    /// When the session ends.
    pub session_end_time: DateTime<Utc>,
}
