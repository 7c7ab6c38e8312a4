//! Task repository implementation.

use sqlx::PgPool;
use uuid::Uuid;

use shellbox_core::error::{AppError, ErrorKind};
use shellbox_core::result::AppResult;
use shellbox_entity::task::{NewTask, Task, TaskStatus};

/// Repository for background task rows and queue operations.
#[derive(Debug, Clone)]
pub struct TaskRepository {
    pool: PgPool,
}

impl TaskRepository {
    /// Create a new task repository.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Find a task by ID.
    pub async fn find_by_id(&self, id: Uuid) -> AppResult<Option<Task>> {
        sqlx::query_as::<_, Task>("SELECT * FROM tasks WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to find task", e))
    }

    /// Create a new task.
    pub async fn create(&self, data: &NewTask) -> AppResult<Task> {
        sqlx::query_as::<_, Task>(
            "INSERT INTO tasks (id, task_type, queue, priority, payload, max_attempts, scheduled_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7) RETURNING *",
        )
        .bind(Uuid::new_v4())
        .bind(&data.task_type)
        .bind(&data.queue)
        .bind(data.priority)
        .bind(&data.payload)
        .bind(data.max_attempts)
        .bind(data.scheduled_at)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to create task", e))
    }

    /// Claim the next runnable task from a queue (SKIP LOCKED for
    /// concurrent workers; deferred tasks stay invisible until due).
    pub async fn claim_next(&self, queue: &str, worker_id: &str) -> AppResult<Option<Task>> {
        sqlx::query_as::<_, Task>(
            "UPDATE tasks SET status = 'running', started_at = NOW(), worker_id = $2, \
             attempts = attempts + 1, updated_at = NOW() \
             WHERE id = ( \
                SELECT id FROM tasks \
                WHERE queue = $1 AND status = 'pending' \
                AND (scheduled_at IS NULL OR scheduled_at <= NOW()) \
                ORDER BY \
                    CASE priority WHEN 'high' THEN 0 WHEN 'normal' THEN 1 WHEN 'low' THEN 2 END, \
                    created_at ASC \
                FOR UPDATE SKIP LOCKED \
                LIMIT 1 \
             ) RETURNING *",
        )
        .bind(queue)
        .bind(worker_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to claim task", e))
    }

    /// Mark a task as completed.
    pub async fn complete(&self, task_id: Uuid) -> AppResult<()> {
        sqlx::query(
            "UPDATE tasks SET status = 'completed', completed_at = NOW(), updated_at = NOW() \
             WHERE id = $1",
        )
        .bind(task_id)
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to complete task", e))?;
        Ok(())
    }

    /// Mark a task as failed with an operator-visible error message.
    pub async fn fail(&self, task_id: Uuid, error_message: &str) -> AppResult<()> {
        sqlx::query(
            "UPDATE tasks SET status = 'failed', error_message = $2, completed_at = NOW(), \
             updated_at = NOW() WHERE id = $1",
        )
        .bind(task_id)
        .bind(error_message)
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to mark task as failed", e))?;
        Ok(())
    }

    /// Reset a claimed task to pending for another delivery attempt.
    pub async fn retry(&self, task_id: Uuid, error_message: &str) -> AppResult<()> {
        sqlx::query(
            "UPDATE tasks SET status = 'pending', error_message = $2, started_at = NULL, \
             worker_id = NULL, updated_at = NOW() WHERE id = $1",
        )
        .bind(task_id)
        .bind(error_message)
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to retry task", e))?;
        Ok(())
    }

    /// Count tasks by status.
    pub async fn count_by_status(&self, status: TaskStatus) -> AppResult<i64> {
        sqlx::query_scalar("SELECT COUNT(*) FROM tasks WHERE status = $1")
            .bind(status)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to count tasks", e))
    }
}
