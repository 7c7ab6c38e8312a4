//! Session-end teardown of boxes.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info};

use shellbox_database::store::ProvisionStore;
use shellbox_entity::task::Task;
use shellbox_service::BoxService;
use shellbox_service::boxes::{ExpiryPayload, TASK_BOX_EXPIRY};

use crate::executor::{TaskError, TaskHandler};

/// Tears down a box when its session ends.
///
/// A box that was already deleted manually makes the task a no-op, so
/// double delivery and manual/expiry races are harmless.
pub struct ExpiryTaskHandler {
    store: Arc<dyn ProvisionStore>,
    boxes: Arc<BoxService>,
}

impl std::fmt::Debug for ExpiryTaskHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExpiryTaskHandler").finish()
    }
}

impl ExpiryTaskHandler {
    /// Create a new expiry handler.
    pub fn new(store: Arc<dyn ProvisionStore>, boxes: Arc<BoxService>) -> Self {
        Self { store, boxes }
    }
}

#[async_trait]
impl TaskHandler for ExpiryTaskHandler {
    fn task_type(&self) -> &str {
        TASK_BOX_EXPIRY
    }

    async fn execute(&self, task: &Task) -> Result<(), TaskError> {
        let payload: ExpiryPayload = serde_json::from_value(task.payload.clone())
            .map_err(|e| TaskError::Permanent(format!("Malformed expiry payload: {e}")))?;

        let Some(shell_box) = self.store.find_box(payload.box_id).await? else {
            debug!(box_id = %payload.box_id, "Expired box already gone");
            return Ok(());
        };

        let user = self
            .store
            .find_user(payload.user_id)
            .await?
            .ok_or_else(|| {
                TaskError::Permanent(format!(
                    "Box {} exists but its owner {} does not",
                    payload.box_id, payload.user_id
                ))
            })?;

        self.boxes.delete(&user, shell_box.id).await?;

        info!(box_id = %shell_box.id, job_id = %shell_box.job_id, "Expired box torn down");
        Ok(())
    }
}
