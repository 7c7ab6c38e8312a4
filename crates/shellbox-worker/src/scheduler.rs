//! Cron scheduler for periodic maintenance tasks.

use std::sync::Arc;

use tokio_cron_scheduler::{Job as CronJob, JobScheduler};
use tracing::{error, info, trace};

use shellbox_core::error::AppError;
use shellbox_core::traits::{TaskQueue, TaskRequest};
use shellbox_service::boxes::{QUEUE_CLUSTER, TASK_RECONCILE};

/// Cron-based scheduler for periodic background work.
pub struct CronScheduler {
    scheduler: JobScheduler,
    queue: Arc<dyn TaskQueue>,
}

impl std::fmt::Debug for CronScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CronScheduler").finish()
    }
}

impl CronScheduler {
    /// Create a new cron scheduler.
    pub async fn new(queue: Arc<dyn TaskQueue>) -> Result<Self, AppError> {
        let scheduler = JobScheduler::new()
            .await
            .map_err(|e| AppError::internal(format!("Failed to create scheduler: {e}")))?;

        Ok(Self { scheduler, queue })
    }

    /// Register all default scheduled tasks.
    pub async fn register_default_tasks(&self) -> Result<(), AppError> {
        self.register_reconcile().await?;

        info!("All scheduled tasks registered");
        Ok(())
    }

    /// Start the scheduler.
    pub async fn start(&self) -> Result<(), AppError> {
        self.scheduler
            .start()
            .await
            .map_err(|e| AppError::internal(format!("Failed to start scheduler: {e}")))?;

        info!("Cron scheduler started");
        Ok(())
    }

    /// Shutdown the scheduler.
    pub async fn shutdown(&mut self) -> Result<(), AppError> {
        self.scheduler
            .shutdown()
            .await
            .map_err(|e| AppError::internal(format!("Failed to shutdown scheduler: {e}")))?;

        info!("Cron scheduler shut down");
        Ok(())
    }

    /// Scheduler reconciliation sweep — every 5 minutes.
    async fn register_reconcile(&self) -> Result<(), AppError> {
        let queue = Arc::clone(&self.queue);
        let job = CronJob::new_async("0 */5 * * * *", move |_uuid, _lock| {
            let queue = Arc::clone(&queue);
            Box::pin(async move {
                trace!("Scheduling reconciliation sweep");
                let request = TaskRequest::immediate(
                    TASK_RECONCILE,
                    QUEUE_CLUSTER,
                    serde_json::json!({"task": TASK_RECONCILE}),
                );
                if let Err(e) = queue.enqueue(request).await {
                    error!("Failed to enqueue {}: {}", TASK_RECONCILE, e);
                }
            })
        })
        .map_err(|e| AppError::internal(format!("Failed to create reconcile schedule: {e}")))?;

        self.scheduler
            .add(job)
            .await
            .map_err(|e| AppError::internal(format!("Failed to add reconcile schedule: {e}")))?;

        info!("Registered: {} (every 5min)", TASK_RECONCILE);
        Ok(())
    }
}
