//! Background task entity model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use super::status::{TaskPriority, TaskStatus};

/// A persisted background task.
///
/// Tasks are delivered at least once: a worker claims a pending row, runs
/// the registered handler, and records the outcome on the row so failures
/// stay visible to operators.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Task {
    /// Unique task identifier.
    pub id: Uuid,
    /// Handler type this task is dispatched to.
    pub task_type: String,
    /// Queue the task is routed through.
    pub queue: String,
    /// Priority within the queue.
    pub priority: TaskPriority,
    /// Handler payload as JSON.
    pub payload: serde_json::Value,
    /// Current delivery status.
    pub status: TaskStatus,
    /// Number of delivery attempts so far.
    pub attempts: i32,
    /// Maximum delivery attempts before the task is marked failed.
    pub max_attempts: i32,
    /// Error message of the last failed attempt.
    pub error_message: Option<String>,
    /// Earliest time the task may run; `NULL` means immediately.
    pub scheduled_at: Option<DateTime<Utc>>,
    /// When the current attempt started.
    pub started_at: Option<DateTime<Utc>>,
    /// When the task reached a terminal state.
    pub completed_at: Option<DateTime<Utc>>,
    /// Identifier of the worker holding the claim.
    pub worker_id: Option<String>,
    /// When the task was enqueued.
    pub created_at: DateTime<Utc>,
    /// When the row was last updated.
    pub updated_at: DateTime<Utc>,
}

/// Data required to enqueue a new task.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewTask {
    /// Handler type.
    pub task_type: String,
    /// Queue name.
    pub queue: String,
    /// Priority within the queue.
    pub priority: TaskPriority,
    /// Handler payload.
    pub payload: serde_json::Value,
    /// Maximum delivery attempts.
    pub max_attempts: i32,
    /// Earliest run time.
    pub scheduled_at: Option<DateTime<Utc>>,
}
