//! Per-plan resource limits and the pure quota policy.

use serde::{Deserialize, Serialize};

/// Resolved resource limits of a user's plan.
///
/// Limits are derived from the plan row at evaluation time — they are never
/// cached or snapshotted, so a plan change takes effect on the next check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanLimits {
    /// Maximum number of concurrently open boxes.
    pub box_count: u32,
    /// Maximum number of reserved name slots.
    pub reserved_slots: u32,
    /// Bandwidth ceiling handed to the dispatched job, in kbit/s.
    pub bandwidth: u32,
    /// Maximum number of port forwards per box.
    pub forwards: u32,
    /// Base session duration in minutes.
    pub session_minutes: i64,
}

/// Pure allow/deny decisions over plan limits and current counts.
///
/// The policy has no side effects. Store implementations evaluate it inside
/// the same transaction (or lock scope) as the subsequent insert so two
/// concurrent requests cannot both pass a check and over-allocate.
pub struct QuotaPolicy;

impl QuotaPolicy {
    /// Whether the user may open another box.
    pub fn can_open_box(limits: &PlanLimits, active_boxes: i64) -> bool {
        active_boxes < i64::from(limits.box_count)
    }

    /// Whether the user may reserve another name slot.
    ///
    /// Only slots with `reserved = true` count toward this limit;
    /// auto-generated session slots are free.
    pub fn can_reserve_slot(limits: &PlanLimits, reserved_slots: i64) -> bool {
        reserved_slots < i64::from(limits.reserved_slots)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn limits(box_count: u32, reserved_slots: u32) -> PlanLimits {
        PlanLimits {
            box_count,
            reserved_slots,
            bandwidth: 1000,
            forwards: 2,
            session_minutes: 30,
        }
    }

    #[test]
    fn test_box_quota_is_strict() {
        let free = limits(1, 1);
        assert!(QuotaPolicy::can_open_box(&free, 0));
        assert!(!QuotaPolicy::can_open_box(&free, 1));
        assert!(!QuotaPolicy::can_open_box(&free, 2));
    }

    #[test]
    fn test_zero_limit_denies_everything() {
        let waiting = limits(0, 0);
        assert!(!QuotaPolicy::can_open_box(&waiting, 0));
        assert!(!QuotaPolicy::can_reserve_slot(&waiting, 0));
    }

    #[test]
    fn test_reserved_slot_quota() {
        let paid = limits(2, 5);
        assert!(QuotaPolicy::can_reserve_slot(&paid, 4));
        assert!(!QuotaPolicy::can_reserve_slot(&paid, 5));
    }
}
