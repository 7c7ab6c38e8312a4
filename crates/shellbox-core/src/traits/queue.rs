//! Background task queue trait.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::result::AppResult;

/// Parameters for enqueuing a background task.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskRequest {
    /// Type of task (e.g. "box_cleanup", "box_expiry").
    pub task_type: String,
    /// Queue name the task is routed to.
    pub queue: String,
    /// Task payload as JSON.
    pub payload: serde_json::Value,
    /// Maximum delivery attempts before the task is marked failed.
    pub max_attempts: i32,
    /// Earliest time the task may run; `None` means immediately.
    pub scheduled_at: Option<DateTime<Utc>>,
}

impl TaskRequest {
    /// A task request that runs as soon as a worker picks it up.
    pub fn immediate(task_type: &str, queue: &str, payload: serde_json::Value) -> Self {
        Self {
            task_type: task_type.to_string(),
            queue: queue.to_string(),
            payload,
            max_attempts: 1,
            scheduled_at: None,
        }
    }

    /// A task request deferred until `at`.
    pub fn scheduled(
        task_type: &str,
        queue: &str,
        payload: serde_json::Value,
        at: DateTime<Utc>,
    ) -> Self {
        Self {
            task_type: task_type.to_string(),
            queue: queue.to_string(),
            payload,
            max_attempts: 1,
            scheduled_at: Some(at),
        }
    }
}

/// Queue for deferred and fire-and-forget background work.
///
/// Delivery is at-least-once: a task may be re-run after a crash, so every
/// handler must be idempotent. Failures are recorded on the task row and
/// visible to operators.
#[async_trait]
pub trait TaskQueue: Send + Sync + 'static {
    /// Enqueue a task and return its identifier.
    async fn enqueue(&self, request: TaskRequest) -> AppResult<Uuid>;
}
