//! Name slot allocation, reservation, and release.

use std::sync::Arc;

use tracing::debug;
use uuid::Uuid;

use shellbox_core::error::{AppError, ErrorKind};
use shellbox_core::result::AppResult;
use shellbox_database::store::ProvisionStore;
use shellbox_entity::slot::NameSlot;
use shellbox_entity::user::User;

use crate::namegen;

/// Attempts budget for random name generation before giving up with
/// `AllocationExhausted`.
pub const MAX_NAME_ATTEMPTS: u32 = 32;

/// Manages reservable name slots for users.
pub struct SlotAllocator {
    store: Arc<dyn ProvisionStore>,
}

impl std::fmt::Debug for SlotAllocator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SlotAllocator").finish()
    }
}

impl SlotAllocator {
    /// Create a new allocator over the given store.
    pub fn new(store: Arc<dyn ProvisionStore>) -> Self {
        Self { store }
    }

    /// Reserve a named slot for the user.
    ///
    /// Fails with `SlotLimitReached` when the plan's reserved-slot quota is
    /// hit, and with `SlotTaken` when the name exists anywhere in the
    /// system.
    pub async fn reserve(&self, user: &User, name: &str) -> AppResult<NameSlot> {
        validate_name(name)?;

        let plan = self.store.plan_for(user).await?;
        let slot = self
            .store
            .reserve_slot(user.id, name, true, &plan.limits())
            .await?;

        debug!(user_id = %user.id, name, "Reserved slot");
        Ok(slot)
    }

    /// Allocate an unreserved slot with a generated name.
    ///
    /// Retries on name collisions up to [`MAX_NAME_ATTEMPTS`] before
    /// failing with `AllocationExhausted`.
    pub async fn unused_slot(&self, user: &User) -> AppResult<NameSlot> {
        let plan = self.store.plan_for(user).await?;
        let limits = plan.limits();

        for _ in 0..MAX_NAME_ATTEMPTS {
            let name = namegen::word_like_name(namegen::DEFAULT_SYLLABLES);
            match self
                .store
                .reserve_slot(user.id, &name, false, &limits)
                .await
            {
                Ok(slot) => {
                    debug!(user_id = %user.id, name = %slot.name, "Allocated session slot");
                    return Ok(slot);
                }
                Err(err) if err.kind == ErrorKind::SlotTaken => continue,
                Err(err) => return Err(err),
            }
        }

        Err(AppError::allocation_exhausted(
            "Could not find a free slot name",
        ))
    }

    /// Release a slot owned by the user.
    ///
    /// Fails with `AccessDenied` for foreign slots and `SlotInUse` while a
    /// box is bound to it.
    pub async fn release(&self, user: &User, slot_id: Uuid) -> AppResult<()> {
        let slot = self
            .store
            .find_slot(slot_id)
            .await?
            .ok_or_else(|| AppError::not_found("Slot not found"))?;

        if slot.user_id != user.id {
            return Err(AppError::access_denied("You do not own this slot"));
        }

        self.store.release_slot(slot_id).await?;
        debug!(user_id = %user.id, name = %slot.name, "Released slot");
        Ok(())
    }
}

/// Validate a user-supplied slot name.
fn validate_name(name: &str) -> AppResult<()> {
    let length_ok = (3..=63).contains(&name.len());
    let chars_ok = name
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-');
    let edges_ok = !name.starts_with('-') && !name.ends_with('-');

    if length_ok && chars_ok && edges_ok {
        Ok(())
    } else {
        Err(AppError::validation(
            "Slot names are 3-63 lowercase letters, digits, or interior hyphens",
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use shellbox_database::store::MemoryStore;

    use crate::testing::{seed_user, slot_taken_store};

    #[tokio::test]
    async fn test_reserved_quota_enforced() {
        let store = Arc::new(MemoryStore::new());
        let user = seed_user(&store, 1, 5).await;
        let allocator = SlotAllocator::new(store);

        for i in 0..5 {
            allocator.reserve(&user, &format!("slot{i}")).await.unwrap();
        }
        let err = allocator.reserve(&user, "slot5").await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::SlotLimitReached);
    }

    #[tokio::test]
    async fn test_duplicate_name_fails_regardless_of_owner() {
        let store = Arc::new(MemoryStore::new());
        let user_a = seed_user(&store, 1, 5).await;
        let user_b = seed_user(&store, 1, 5).await;
        let allocator = SlotAllocator::new(store);

        allocator.reserve(&user_a, "lobster").await.unwrap();
        let err = allocator.reserve(&user_b, "lobster").await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::SlotTaken);
    }

    #[tokio::test]
    async fn test_unreserved_slots_are_free_of_quota() {
        let store = Arc::new(MemoryStore::new());
        let user = seed_user(&store, 1, 1).await;
        let allocator = SlotAllocator::new(Arc::clone(&store) as Arc<dyn ProvisionStore>);

        for _ in 0..10 {
            allocator.unused_slot(&user).await.unwrap();
        }
        assert_eq!(store.slot_count(user.id).await, 10);

        // The reserved quota of 1 is still fully available.
        allocator.reserve(&user, "keeper").await.unwrap();
    }

    #[tokio::test]
    async fn test_generation_gives_up_after_attempts_budget() {
        let (store, reserve_calls) = slot_taken_store();
        let user = seed_user_raw();
        let allocator = SlotAllocator::new(store);

        let err = allocator.unused_slot(&user).await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::AllocationExhausted);
        assert_eq!(
            reserve_calls.load(std::sync::atomic::Ordering::SeqCst),
            MAX_NAME_ATTEMPTS
        );
    }

    #[tokio::test]
    async fn test_release_foreign_slot_denied() {
        let store = Arc::new(MemoryStore::new());
        let owner = seed_user(&store, 1, 5).await;
        let intruder = seed_user(&store, 1, 5).await;
        let allocator = SlotAllocator::new(store);

        let slot = allocator.reserve(&owner, "mine").await.unwrap();
        let err = allocator.release(&intruder, slot.id).await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::AccessDenied);

        allocator.release(&owner, slot.id).await.unwrap();
    }

    #[test]
    fn test_name_validation() {
        assert!(validate_name("tacomibu").is_ok());
        assert!(validate_name("box-42").is_ok());
        assert!(validate_name("ab").is_err());
        assert!(validate_name("Sh0uty").is_err());
        assert!(validate_name("-edge").is_err());
        assert!(validate_name("edge-").is_err());
    }

    fn seed_user_raw() -> User {
        User {
            id: Uuid::new_v4(),
            email: "box@example.com".into(),
            confirmed: true,
            plan_id: Uuid::new_v4(),
            created_at: chrono::Utc::now(),
        }
    }
}
