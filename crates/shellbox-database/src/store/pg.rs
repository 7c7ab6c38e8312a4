//! PostgreSQL implementation of the provisioning store.

use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use shellbox_core::error::{AppError, ErrorKind};
use shellbox_core::result::AppResult;
use shellbox_core::types::quota::{PlanLimits, QuotaPolicy};
use shellbox_entity::boxes::{NewShellBox, ShellBox};
use shellbox_entity::slot::NameSlot;
use shellbox_entity::user::{Plan, User};

use super::ProvisionStore;

/// Row-locking PostgreSQL store.
///
/// Quota checks and their mutations share one transaction holding a
/// `FOR UPDATE` lock on the owning user's row, so two concurrent `create`
/// calls for the same user serialize instead of both passing the check.
#[derive(Debug, Clone)]
pub struct PgProvisionStore {
    pool: PgPool,
}

impl PgProvisionStore {
    /// Create a new store over the given pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ProvisionStore for PgProvisionStore {
    async fn find_user(&self, user_id: Uuid) -> AppResult<Option<User>> {
        sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = $1")
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to find user", e))
    }

    async fn plan_for(&self, user: &User) -> AppResult<Plan> {
        sqlx::query_as::<_, Plan>("SELECT * FROM plans WHERE id = $1")
            .bind(user.plan_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to find plan", e))?
            .ok_or_else(|| AppError::internal(format!("User {} references no plan", user.id)))
    }

    async fn find_slot(&self, slot_id: Uuid) -> AppResult<Option<NameSlot>> {
        sqlx::query_as::<_, NameSlot>("SELECT * FROM name_slots WHERE id = $1")
            .bind(slot_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to find slot", e))
    }

    async fn reserve_slot(
        &self,
        user_id: Uuid,
        name: &str,
        reserved: bool,
        limits: &PlanLimits,
    ) -> AppResult<NameSlot> {
        let mut tx = begin(&self.pool).await?;

        let owner: Option<Uuid> = sqlx::query_scalar("SELECT id FROM users WHERE id = $1 FOR UPDATE")
            .bind(user_id)
            .fetch_optional(&mut *tx)
            .await
            .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to lock user", e))?;
        if owner.is_none() {
            return Err(AppError::not_found("User not found"));
        }

        if reserved {
            let reserved_count: i64 = sqlx::query_scalar(
                "SELECT COUNT(*) FROM name_slots WHERE user_id = $1 AND reserved = TRUE",
            )
            .bind(user_id)
            .fetch_one(&mut *tx)
            .await
            .map_err(|e| {
                AppError::with_source(ErrorKind::Database, "Failed to count reserved slots", e)
            })?;

            if !QuotaPolicy::can_reserve_slot(limits, reserved_count) {
                return Err(AppError::slot_limit_reached(
                    "Number of reserved slots is greater than the plan allows",
                ));
            }
        }

        let slot = sqlx::query_as::<_, NameSlot>(
            "INSERT INTO name_slots (id, user_id, name, reserved, in_use) \
             VALUES ($1, $2, $3, $4, FALSE) RETURNING *",
        )
        .bind(Uuid::new_v4())
        .bind(user_id)
        .bind(name)
        .bind(reserved)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                AppError::slot_taken("Requested slot is already reserved")
            } else {
                AppError::with_source(ErrorKind::Database, "Failed to create slot", e)
            }
        })?;

        commit(tx).await?;
        Ok(slot)
    }

    async fn release_slot(&self, slot_id: Uuid) -> AppResult<()> {
        let mut tx = begin(&self.pool).await?;

        let slot = sqlx::query_as::<_, NameSlot>(
            "SELECT * FROM name_slots WHERE id = $1 FOR UPDATE",
        )
        .bind(slot_id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to lock slot", e))?
        .ok_or_else(|| AppError::not_found("Slot not found"))?;

        if slot.in_use {
            return Err(AppError::slot_in_use("Slot is associated with a running box"));
        }

        sqlx::query("DELETE FROM name_slots WHERE id = $1")
            .bind(slot_id)
            .execute(&mut *tx)
            .await
            .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to delete slot", e))?;

        commit(tx).await
    }

    async fn find_box(&self, box_id: Uuid) -> AppResult<Option<ShellBox>> {
        sqlx::query_as::<_, ShellBox>("SELECT * FROM boxes WHERE id = $1")
            .bind(box_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to find box", e))
    }

    async fn find_box_by_job(&self, job_id: &str) -> AppResult<Option<ShellBox>> {
        sqlx::query_as::<_, ShellBox>("SELECT * FROM boxes WHERE job_id = $1")
            .bind(job_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| {
                AppError::with_source(ErrorKind::Database, "Failed to find box by job id", e)
            })
    }

    async fn count_boxes(&self, user_id: Uuid) -> AppResult<i64> {
        sqlx::query_scalar(
            "SELECT COUNT(*) FROM boxes b \
             JOIN name_slots s ON s.id = b.slot_id \
             WHERE s.user_id = $1",
        )
        .bind(user_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to count boxes", e))
    }

    async fn bind_box(
        &self,
        slot_id: Uuid,
        new_box: &NewShellBox,
        limits: &PlanLimits,
    ) -> AppResult<ShellBox> {
        let mut tx = begin(&self.pool).await?;

        let slot = sqlx::query_as::<_, NameSlot>(
            "SELECT * FROM name_slots WHERE id = $1 FOR UPDATE",
        )
        .bind(slot_id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to lock slot", e))?
        .ok_or_else(|| AppError::not_found("Slot not found"))?;

        // Lock the owner so concurrent creates for this user serialize here.
        sqlx::query_scalar::<_, Uuid>("SELECT id FROM users WHERE id = $1 FOR UPDATE")
            .bind(slot.user_id)
            .fetch_one(&mut *tx)
            .await
            .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to lock user", e))?;

        if slot.in_use {
            return Err(AppError::slot_in_use("Slot is associated with a running box"));
        }

        let active_boxes: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM boxes b \
             JOIN name_slots s ON s.id = b.slot_id \
             WHERE s.user_id = $1",
        )
        .bind(slot.user_id)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to count boxes", e))?;

        if !QuotaPolicy::can_open_box(limits, active_boxes) {
            return Err(AppError::box_limit_reached(
                "Maximum number of opened boxes reached",
            ));
        }

        sqlx::query("UPDATE name_slots SET in_use = TRUE WHERE id = $1")
            .bind(slot_id)
            .execute(&mut *tx)
            .await
            .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to mark slot in use", e))?;

        let shell_box = sqlx::query_as::<_, ShellBox>(
            "INSERT INTO boxes (id, slot_id, job_id, ip_address, ssh_port, port_types, session_end_time) \
             VALUES ($1, $2, $3, $4, $5, $6, $7) RETURNING *",
        )
        .bind(Uuid::new_v4())
        .bind(slot_id)
        .bind(&new_box.job_id)
        .bind(&new_box.ip_address)
        .bind(new_box.ssh_port)
        .bind(&new_box.port_types)
        .bind(new_box.session_end_time)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to create box", e))?;

        commit(tx).await?;
        Ok(shell_box)
    }

    async fn unbind_box(&self, box_id: Uuid) -> AppResult<Option<String>> {
        let mut tx = begin(&self.pool).await?;

        let shell_box = sqlx::query_as::<_, ShellBox>(
            "SELECT * FROM boxes WHERE id = $1 FOR UPDATE",
        )
        .bind(box_id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to lock box", e))?;

        let Some(shell_box) = shell_box else {
            // Already torn down; deletion is idempotent.
            return Ok(None);
        };

        let slot = sqlx::query_as::<_, NameSlot>(
            "SELECT * FROM name_slots WHERE id = $1 FOR UPDATE",
        )
        .bind(shell_box.slot_id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to lock slot", e))?;

        sqlx::query("DELETE FROM boxes WHERE id = $1")
            .bind(box_id)
            .execute(&mut *tx)
            .await
            .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to delete box", e))?;

        if let Some(slot) = slot {
            if slot.reserved {
                sqlx::query("UPDATE name_slots SET in_use = FALSE WHERE id = $1")
                    .bind(slot.id)
                    .execute(&mut *tx)
                    .await
                    .map_err(|e| {
                        AppError::with_source(ErrorKind::Database, "Failed to free slot", e)
                    })?;
            } else {
                sqlx::query("DELETE FROM name_slots WHERE id = $1")
                    .bind(slot.id)
                    .execute(&mut *tx)
                    .await
                    .map_err(|e| {
                        AppError::with_source(ErrorKind::Database, "Failed to delete slot", e)
                    })?;
            }
        }

        commit(tx).await?;
        Ok(Some(shell_box.job_id))
    }
}

/// Begin a transaction with a uniform error mapping.
async fn begin(pool: &PgPool) -> AppResult<sqlx::Transaction<'static, sqlx::Postgres>> {
    pool.begin()
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to begin transaction", e))
}

/// Commit a transaction with a uniform error mapping.
async fn commit(tx: sqlx::Transaction<'static, sqlx::Postgres>) -> AppResult<()> {
    tx.commit()
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to commit transaction", e))
}

/// Whether the error is a unique-constraint violation.
fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(
        err,
        sqlx::Error::Database(db) if db.kind() == sqlx::error::ErrorKind::UniqueViolation
    )
}
