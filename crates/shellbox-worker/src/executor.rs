//! Task executor — dispatches tasks to registered handlers.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::info;

use shellbox_core::error::AppError;
use shellbox_entity::task::Task;

/// Trait for task handler implementations.
#[async_trait]
pub trait TaskHandler: Send + Sync {
    /// The task type this handler processes.
    fn task_type(&self) -> &str;

    /// Execute the task.
    async fn execute(&self, task: &Task) -> Result<(), TaskError>;
}

/// Error from task execution.
#[derive(Debug, thiserror::Error)]
pub enum TaskError {
    /// Permanent failure, never retried.
    #[error("Permanent task failure: {0}")]
    Permanent(String),

    /// Transient failure, retried while attempts remain.
    #[error("Transient task failure: {0}")]
    Transient(String),

    /// Internal error.
    #[error("Internal error: {0}")]
    Internal(#[from] AppError),
}

/// Dispatches tasks to the appropriate handler based on `task_type`.
#[derive(Default)]
pub struct TaskExecutor {
    handlers: HashMap<String, Arc<dyn TaskHandler>>,
}

impl std::fmt::Debug for TaskExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskExecutor")
            .field("handlers", &self.registered_types())
            .finish()
    }
}

impl TaskExecutor {
    /// Create an executor with no handlers.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a task handler.
    pub fn register(&mut self, handler: Arc<dyn TaskHandler>) {
        let task_type = handler.task_type().to_string();
        info!("Registered task handler for type '{}'", task_type);
        self.handlers.insert(task_type, handler);
    }

    /// Execute a task by dispatching to the matching handler.
    pub async fn execute(&self, task: &Task) -> Result<(), TaskError> {
        let handler = self.handlers.get(&task.task_type).ok_or_else(|| {
            TaskError::Permanent(format!(
                "No handler registered for task type '{}'",
                task.task_type
            ))
        })?;

        handler.execute(task).await
    }

    /// The list of registered task types.
    pub fn registered_types(&self) -> Vec<String> {
        self.handlers.keys().cloned().collect()
    }
}
