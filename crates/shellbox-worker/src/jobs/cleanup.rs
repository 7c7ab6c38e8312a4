//! Deferred deregistration of cluster jobs.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{Duration, Utc};
use tracing::{error, info, warn};

use shellbox_core::traits::{TaskQueue, TaskRequest};
use shellbox_entity::task::Task;
use shellbox_nomad::BoxLauncher;
use shellbox_service::boxes::{CleanupPayload, QUEUE_CLUSTER, TASK_BOX_CLEANUP};

use crate::executor::{TaskError, TaskHandler};

/// Deregisters a cluster job, retrying once after a multi-hour backoff.
///
/// The first transient failure re-enqueues the task marked `rescheduled`
/// and still reports the failure to the runner's log; a rescheduled task
/// that fails again only escalates, never re-enqueues.
pub struct CleanupTaskHandler {
    launcher: Arc<BoxLauncher>,
    queue: Arc<dyn TaskQueue>,
    retry_backoff: Duration,
}

impl std::fmt::Debug for CleanupTaskHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CleanupTaskHandler").finish()
    }
}

impl CleanupTaskHandler {
    /// Create a new cleanup handler with the given retry backoff.
    pub fn new(launcher: Arc<BoxLauncher>, queue: Arc<dyn TaskQueue>, backoff_hours: i64) -> Self {
        Self {
            launcher,
            queue,
            retry_backoff: Duration::hours(backoff_hours.max(1)),
        }
    }
}

#[async_trait]
impl TaskHandler for CleanupTaskHandler {
    fn task_type(&self) -> &str {
        TASK_BOX_CLEANUP
    }

    async fn execute(&self, task: &Task) -> Result<(), TaskError> {
        let payload: CleanupPayload = serde_json::from_value(task.payload.clone())
            .map_err(|e| TaskError::Permanent(format!("Malformed cleanup payload: {e}")))?;

        match self.launcher.deregister(&payload.job_id).await {
            Ok(()) => {
                info!(job_id = %payload.job_id, "Deregistered box job");
                Ok(())
            }
            Err(err) => {
                if payload.rescheduled {
                    error!(
                        job_id = %payload.job_id,
                        %err,
                        "Cleanup retry failed; giving up"
                    );
                } else {
                    warn!(
                        job_id = %payload.job_id,
                        %err,
                        backoff_hours = self.retry_backoff.num_hours(),
                        "Cleanup failed; scheduling one retry"
                    );
                    self.schedule_retry(&payload.job_id).await;
                }
                Err(TaskError::Transient(format!(
                    "Failed to deregister job '{}': {err}",
                    payload.job_id
                )))
            }
        }
    }
}

impl CleanupTaskHandler {
    /// Enqueue the single backoff retry for a failed deregistration.
    async fn schedule_retry(&self, job_id: &str) {
        let payload = CleanupPayload {
            job_id: job_id.to_string(),
            rescheduled: true,
        };
        let request = match serde_json::to_value(&payload) {
            Ok(payload) => TaskRequest::scheduled(
                TASK_BOX_CLEANUP,
                QUEUE_CLUSTER,
                payload,
                Utc::now() + self.retry_backoff,
            ),
            Err(err) => {
                error!(job_id, %err, "Failed to encode cleanup retry payload");
                return;
            }
        };

        if let Err(err) = self.queue.enqueue(request).await {
            error!(job_id, %err, "Failed to schedule cleanup retry");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use shellbox_core::config::cluster::ClusterConfig;
    use shellbox_core::traits::SchedulerClient;

    use crate::testing::{RecordingQueue, ToggleScheduler, make_task};

    fn handler(
        scheduler: Arc<ToggleScheduler>,
        queue: Arc<RecordingQueue>,
    ) -> CleanupTaskHandler {
        let launcher = Arc::new(BoxLauncher::new(
            scheduler as Arc<dyn SchedulerClient>,
            ClusterConfig::default(),
            true,
        ));
        CleanupTaskHandler::new(launcher, queue, 2)
    }

    fn cleanup_task(job_id: &str, rescheduled: bool) -> Task {
        make_task(
            TASK_BOX_CLEANUP,
            serde_json::json!({"job_id": job_id, "rescheduled": rescheduled}),
        )
    }

    #[tokio::test]
    async fn test_successful_deregistration() {
        let scheduler = Arc::new(ToggleScheduler::new());
        let queue = Arc::new(RecordingQueue::new());
        let handler = handler(Arc::clone(&scheduler), Arc::clone(&queue));

        handler
            .execute(&cleanup_task("ssh-client/dispatch-1", false))
            .await
            .unwrap();

        assert_eq!(
            *scheduler.deregisters.lock().unwrap(),
            vec!["ssh-client/dispatch-1".to_string()]
        );
        assert!(queue.requests().is_empty());
    }

    #[tokio::test]
    async fn test_first_failure_schedules_one_backoff_retry() {
        let scheduler = Arc::new(ToggleScheduler::failing());
        let queue = Arc::new(RecordingQueue::new());
        let handler = handler(scheduler, Arc::clone(&queue));

        let before = Utc::now();
        let err = handler
            .execute(&cleanup_task("ssh-client/dispatch-1", false))
            .await
            .unwrap_err();
        assert!(matches!(err, TaskError::Transient(_)));

        let retries = queue.of_type(TASK_BOX_CLEANUP);
        assert_eq!(retries.len(), 1);

        let payload: CleanupPayload = serde_json::from_value(retries[0].payload.clone()).unwrap();
        assert!(payload.rescheduled);
        assert_eq!(payload.job_id, "ssh-client/dispatch-1");

        let at = retries[0].scheduled_at.unwrap();
        assert!(at >= before + Duration::hours(2));
        assert!(at <= Utc::now() + Duration::hours(2));
    }

    #[tokio::test]
    async fn test_rescheduled_failure_never_requeues() {
        let scheduler = Arc::new(ToggleScheduler::failing());
        let queue = Arc::new(RecordingQueue::new());
        let handler = handler(scheduler, Arc::clone(&queue));

        let err = handler
            .execute(&cleanup_task("ssh-client/dispatch-1", true))
            .await
            .unwrap_err();
        assert!(matches!(err, TaskError::Transient(_)));
        assert!(queue.requests().is_empty());
    }
}
