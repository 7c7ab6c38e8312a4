//! Provisioning store seam.
//!
//! The lifecycle controller talks to persistence through
//! [`ProvisionStore`]. Two implementations are provided:
//! - PostgreSQL-backed ([`pg::PgProvisionStore`]), serializing the
//!   quota-check-then-insert sequence with `SELECT … FOR UPDATE` row locks
//! - in-memory ([`memory::MemoryStore`]), serializing with a single
//!   `tokio::sync::Mutex`

pub mod memory;
pub mod pg;

use async_trait::async_trait;
use uuid::Uuid;

use shellbox_core::result::AppResult;
use shellbox_core::types::quota::PlanLimits;
use shellbox_entity::boxes::{NewShellBox, ShellBox};
use shellbox_entity::slot::NameSlot;
use shellbox_entity::user::{Plan, User};

pub use memory::MemoryStore;
pub use pg::PgProvisionStore;

/// Transactional store for users, plans, name slots, and boxes.
///
/// The compound operations (`reserve_slot`, `bind_box`, `unbind_box`,
/// `release_slot`) are atomic: quota and state checks are evaluated under
/// the same serialization scope as the mutation, so concurrent requests
/// for one user cannot over-allocate.
#[async_trait]
pub trait ProvisionStore: Send + Sync + 'static {
    /// Find a user by id.
    async fn find_user(&self, user_id: Uuid) -> AppResult<Option<User>>;

    /// Resolve the plan of a user (live read, never cached).
    async fn plan_for(&self, user: &User) -> AppResult<Plan>;

    /// Find a slot by id.
    async fn find_slot(&self, slot_id: Uuid) -> AppResult<Option<NameSlot>>;

    /// Create a slot for the user.
    ///
    /// Fails with `SlotTaken` when the name exists anywhere in the system,
    /// and with `SlotLimitReached` when `reserved` is set and the user's
    /// reserved-slot count has reached `limits.reserved_slots`. Both checks
    /// run atomically with the insert.
    async fn reserve_slot(
        &self,
        user_id: Uuid,
        name: &str,
        reserved: bool,
        limits: &PlanLimits,
    ) -> AppResult<NameSlot>;

    /// Delete a slot. Fails with `SlotInUse` while a box is bound to it.
    async fn release_slot(&self, slot_id: Uuid) -> AppResult<()>;

    /// Find a box by id.
    async fn find_box(&self, box_id: Uuid) -> AppResult<Option<ShellBox>>;

    /// Find a box by its scheduler job id.
    async fn find_box_by_job(&self, job_id: &str) -> AppResult<Option<ShellBox>>;

    /// Count the boxes currently owned by a user (through their slots).
    async fn count_boxes(&self, user_id: Uuid) -> AppResult<i64>;

    /// Atomically bind a freshly launched box to its slot.
    ///
    /// Locks the slot and its owner, re-checks `in_use` and the box quota
    /// under the lock, marks the slot in use, and inserts the box row.
    /// Fails with `SlotInUse` or `BoxLimitReached` without side effects.
    async fn bind_box(
        &self,
        slot_id: Uuid,
        new_box: &NewShellBox,
        limits: &PlanLimits,
    ) -> AppResult<ShellBox>;

    /// Atomically tear down a box row.
    ///
    /// Reserved slots survive with `in_use = false`; auto-generated slots
    /// are deleted together with the box. Returns the scheduler job id of
    /// the removed box, or `None` when the box was already gone (making
    /// deletion idempotent).
    async fn unbind_box(&self, box_id: Uuid) -> AppResult<Option<String>>;
}
