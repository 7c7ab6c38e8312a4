//! Plan entity model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use shellbox_core::types::quota::PlanLimits;

/// A pricing tier defining a user's resource quotas.
///
/// Plans are immutable reference data seeded at deployment time. Limits are
/// resolved through [`Plan::limits`] at every quota evaluation.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Plan {
    /// Unique plan identifier.
    pub id: Uuid,
    /// Tier name ("free", "beta", "paid", "waiting").
    pub name: String,
    /// Maximum number of concurrently open boxes.
    pub box_count: i32,
    /// Maximum number of reserved name slots.
    pub reserved_config: i32,
    /// Bandwidth ceiling in kbit/s.
    pub bandwidth: i32,
    /// Maximum number of port forwards per box.
    pub forwards: i32,
    /// Base session duration in seconds.
    pub duration: i32,
    /// Container memory allowance in MiB.
    pub memory: i32,
    /// Container CPU allowance in MHz.
    pub cpu: i32,
    /// Monthly cost in cents; 0 for free tiers.
    pub cost: i32,
    /// When the plan row was seeded.
    pub created_at: DateTime<Utc>,
}

impl Plan {
    /// Resolve the quota limits of this plan.
    pub fn limits(&self) -> PlanLimits {
        PlanLimits {
            box_count: self.box_count.max(0) as u32,
            reserved_slots: self.reserved_config.max(0) as u32,
            bandwidth: self.bandwidth.max(0) as u32,
            forwards: self.forwards.max(0) as u32,
            session_minutes: i64::from(self.duration.max(0)) / 60,
        }
    }
}
