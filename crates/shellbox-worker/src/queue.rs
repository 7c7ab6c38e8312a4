//! Database-backed implementation of the task queue.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;
use uuid::Uuid;

use shellbox_core::error::AppError;
use shellbox_core::result::AppResult;
use shellbox_core::traits::{TaskQueue, TaskRequest};
use shellbox_database::repositories::TaskRepository;
use shellbox_entity::task::{NewTask, Task, TaskPriority, TaskStatus};

/// Task queue persisting every task as a row in the `tasks` table.
///
/// Claims use `FOR UPDATE SKIP LOCKED`, so any number of workers can share
/// the table; a crashed worker's claim simply re-runs after its row is
/// reset, giving at-least-once delivery.
#[derive(Debug, Clone)]
pub struct DbTaskQueue {
    repo: Arc<TaskRepository>,
    worker_id: String,
}

impl DbTaskQueue {
    /// Create a new queue for the given worker identity.
    pub fn new(repo: Arc<TaskRepository>, worker_id: String) -> Self {
        Self { repo, worker_id }
    }

    /// Claim the next runnable task from any of the given queues.
    pub async fn claim(&self, queues: &[&str]) -> AppResult<Option<Task>> {
        for queue in queues {
            if let Some(task) = self.repo.claim_next(queue, &self.worker_id).await? {
                debug!(
                    task_id = %task.id,
                    task_type = %task.task_type,
                    queue = %task.queue,
                    "Claimed task"
                );
                return Ok(Some(task));
            }
        }
        Ok(None)
    }

    /// Mark a task as completed.
    pub async fn complete(&self, task_id: Uuid) -> AppResult<()> {
        self.repo.complete(task_id).await?;
        debug!(%task_id, "Task completed");
        Ok(())
    }

    /// Mark a task as failed with an operator-visible message.
    pub async fn fail(&self, task_id: Uuid, error_message: &str) -> AppResult<()> {
        self.repo.fail(task_id, error_message).await?;
        debug!(%task_id, error_message, "Task failed");
        Ok(())
    }

    /// Return a task to the pending state for another attempt.
    pub async fn retry(&self, task_id: Uuid, error_message: &str) -> AppResult<()> {
        self.repo.retry(task_id, error_message).await?;
        debug!(%task_id, "Task queued for retry");
        Ok(())
    }

    /// Count tasks in a given status (operator visibility).
    pub async fn count_by_status(&self, status: TaskStatus) -> AppResult<i64> {
        self.repo.count_by_status(status).await
    }
}

#[async_trait]
impl TaskQueue for DbTaskQueue {
    async fn enqueue(&self, request: TaskRequest) -> AppResult<Uuid> {
        let task = self
            .repo
            .create(&NewTask {
                task_type: request.task_type,
                queue: request.queue,
                priority: TaskPriority::Normal,
                payload: request.payload,
                max_attempts: request.max_attempts.max(1),
                scheduled_at: request.scheduled_at,
            })
            .await
            .map_err(|e| AppError::internal(format!("Failed to enqueue task: {e}")))?;

        debug!(
            task_id = %task.id,
            task_type = %task.task_type,
            scheduled_at = ?task.scheduled_at,
            "Enqueued task"
        );
        Ok(task.id)
    }
}
