//! In-memory implementation of the provisioning store.
//!
//! Serializes every compound operation behind a single `tokio::sync::Mutex`,
//! which gives the same quota-check-then-insert atomicity the PostgreSQL
//! store gets from row locks. Used by tests and single-node development
//! setups without a database.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::Mutex;
use uuid::Uuid;

use shellbox_core::error::AppError;
use shellbox_core::result::AppResult;
use shellbox_core::types::quota::{PlanLimits, QuotaPolicy};
use shellbox_entity::boxes::{NewShellBox, ShellBox};
use shellbox_entity::slot::NameSlot;
use shellbox_entity::user::{Plan, User};

use super::ProvisionStore;

#[derive(Debug, Default)]
struct Inner {
    users: HashMap<Uuid, User>,
    plans: HashMap<Uuid, Plan>,
    slots: HashMap<Uuid, NameSlot>,
    boxes: HashMap<Uuid, ShellBox>,
}

/// Mutex-guarded in-memory store.
#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a plan row (seed helper).
    pub async fn add_plan(&self, plan: Plan) {
        self.inner.lock().await.plans.insert(plan.id, plan);
    }

    /// Insert a user row (seed helper).
    pub async fn add_user(&self, user: User) {
        self.inner.lock().await.users.insert(user.id, user);
    }

    /// Insert a slot row directly, bypassing quota checks (seed helper).
    pub async fn add_slot(&self, slot: NameSlot) {
        self.inner.lock().await.slots.insert(slot.id, slot);
    }

    /// Number of slots currently held by a user.
    pub async fn slot_count(&self, user_id: Uuid) -> usize {
        self.inner
            .lock()
            .await
            .slots
            .values()
            .filter(|s| s.user_id == user_id)
            .count()
    }
}

#[async_trait]
impl ProvisionStore for MemoryStore {
    async fn find_user(&self, user_id: Uuid) -> AppResult<Option<User>> {
        Ok(self.inner.lock().await.users.get(&user_id).cloned())
    }

    async fn plan_for(&self, user: &User) -> AppResult<Plan> {
        self.inner
            .lock()
            .await
            .plans
            .get(&user.plan_id)
            .cloned()
            .ok_or_else(|| AppError::internal(format!("User {} references no plan", user.id)))
    }

    async fn find_slot(&self, slot_id: Uuid) -> AppResult<Option<NameSlot>> {
        Ok(self.inner.lock().await.slots.get(&slot_id).cloned())
    }

    async fn reserve_slot(
        &self,
        user_id: Uuid,
        name: &str,
        reserved: bool,
        limits: &PlanLimits,
    ) -> AppResult<NameSlot> {
        let mut inner = self.inner.lock().await;

        if !inner.users.contains_key(&user_id) {
            return Err(AppError::not_found("User not found"));
        }

        if reserved {
            let reserved_count = inner
                .slots
                .values()
                .filter(|s| s.user_id == user_id && s.reserved)
                .count() as i64;
            if !QuotaPolicy::can_reserve_slot(limits, reserved_count) {
                return Err(AppError::slot_limit_reached(
                    "Number of reserved slots is greater than the plan allows",
                ));
            }
        }

        if inner.slots.values().any(|s| s.name == name) {
            return Err(AppError::slot_taken("Requested slot is already reserved"));
        }

        let slot = NameSlot {
            id: Uuid::new_v4(),
            user_id,
            name: name.to_string(),
            reserved,
            in_use: false,
            created_at: Utc::now(),
        };
        inner.slots.insert(slot.id, slot.clone());
        Ok(slot)
    }

    async fn release_slot(&self, slot_id: Uuid) -> AppResult<()> {
        let mut inner = self.inner.lock().await;

        let slot = inner
            .slots
            .get(&slot_id)
            .ok_or_else(|| AppError::not_found("Slot not found"))?;

        if slot.in_use {
            return Err(AppError::slot_in_use("Slot is associated with a running box"));
        }

        inner.slots.remove(&slot_id);
        Ok(())
    }

    async fn find_box(&self, box_id: Uuid) -> AppResult<Option<ShellBox>> {
        Ok(self.inner.lock().await.boxes.get(&box_id).cloned())
    }

    async fn find_box_by_job(&self, job_id: &str) -> AppResult<Option<ShellBox>> {
        Ok(self
            .inner
            .lock()
            .await
            .boxes
            .values()
            .find(|b| b.job_id == job_id)
            .cloned())
    }

    async fn count_boxes(&self, user_id: Uuid) -> AppResult<i64> {
        let inner = self.inner.lock().await;
        let count = inner
            .boxes
            .values()
            .filter(|b| {
                inner
                    .slots
                    .get(&b.slot_id)
                    .is_some_and(|s| s.user_id == user_id)
            })
            .count();
        Ok(count as i64)
    }

    async fn bind_box(
        &self,
        slot_id: Uuid,
        new_box: &NewShellBox,
        limits: &PlanLimits,
    ) -> AppResult<ShellBox> {
        let mut inner = self.inner.lock().await;

        let slot = inner
            .slots
            .get(&slot_id)
            .cloned()
            .ok_or_else(|| AppError::not_found("Slot not found"))?;

        if slot.in_use {
            return Err(AppError::slot_in_use("Slot is associated with a running box"));
        }

        let active_boxes = inner
            .boxes
            .values()
            .filter(|b| {
                inner
                    .slots
                    .get(&b.slot_id)
                    .is_some_and(|s| s.user_id == slot.user_id)
            })
            .count() as i64;

        if !QuotaPolicy::can_open_box(limits, active_boxes) {
            return Err(AppError::box_limit_reached(
                "Maximum number of opened boxes reached",
            ));
        }

        if let Some(slot) = inner.slots.get_mut(&slot_id) {
            slot.in_use = true;
        }

        let shell_box = ShellBox {
            id: Uuid::new_v4(),
            slot_id,
            job_id: new_box.job_id.clone(),
            ip_address: new_box.ip_address.clone(),
            ssh_port: new_box.ssh_port,
            port_types: new_box.port_types.clone(),
            session_end_time: new_box.session_end_time,
            created_at: Utc::now(),
        };
        inner.boxes.insert(shell_box.id, shell_box.clone());
        Ok(shell_box)
    }

    async fn unbind_box(&self, box_id: Uuid) -> AppResult<Option<String>> {
        let mut inner = self.inner.lock().await;

        let Some(shell_box) = inner.boxes.remove(&box_id) else {
            return Ok(None);
        };

        let reserved = inner
            .slots
            .get(&shell_box.slot_id)
            .map(|s| s.reserved)
            .unwrap_or(false);

        if reserved {
            if let Some(slot) = inner.slots.get_mut(&shell_box.slot_id) {
                slot.in_use = false;
            }
        } else {
            inner.slots.remove(&shell_box.slot_id);
        }

        Ok(Some(shell_box.job_id))
    }
}
