//! Periodic reconciliation between scheduler state and the resource store.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tracing::{info, warn};

use shellbox_core::traits::{SchedulerClient, TaskQueue, TaskRequest};
use shellbox_database::store::ProvisionStore;
use shellbox_entity::task::Task;
use shellbox_service::boxes::{CleanupPayload, QUEUE_CLUSTER, TASK_BOX_CLEANUP, TASK_RECONCILE};

use crate::executor::{TaskError, TaskHandler};

/// Sweeps the scheduler for box jobs that should not be running.
///
/// A job with no matching box record (a crash between dispatch and
/// persist), or whose record's session end has passed (a lost expiry
/// task), gets exactly one cleanup task per sweep.
pub struct ReconcileTaskHandler {
    client: Arc<dyn SchedulerClient>,
    store: Arc<dyn ProvisionStore>,
    queue: Arc<dyn TaskQueue>,
    job_name: String,
}

impl std::fmt::Debug for ReconcileTaskHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReconcileTaskHandler")
            .field("job_name", &self.job_name)
            .finish()
    }
}

impl ReconcileTaskHandler {
    /// Create a new reconciliation handler for the given job template.
    pub fn new(
        client: Arc<dyn SchedulerClient>,
        store: Arc<dyn ProvisionStore>,
        queue: Arc<dyn TaskQueue>,
        job_name: String,
    ) -> Self {
        Self {
            client,
            store,
            queue,
            job_name,
        }
    }

    /// Enqueue an immediate cleanup for one drifted job.
    async fn schedule_cleanup(&self, job_id: &str) -> Result<(), TaskError> {
        let payload = CleanupPayload {
            job_id: job_id.to_string(),
            rescheduled: false,
        };
        let payload = serde_json::to_value(&payload)
            .map_err(|e| TaskError::Internal(e.into()))?;

        self.queue
            .enqueue(TaskRequest::immediate(TASK_BOX_CLEANUP, QUEUE_CLUSTER, payload))
            .await?;
        Ok(())
    }
}

#[async_trait]
impl TaskHandler for ReconcileTaskHandler {
    fn task_type(&self) -> &str {
        TASK_RECONCILE
    }

    async fn execute(&self, _task: &Task) -> Result<(), TaskError> {
        let job_ids = self
            .client
            .dispatched_jobs(&self.job_name)
            .await
            .map_err(|e| TaskError::Transient(format!("Failed to list box jobs: {e}")))?;

        let now = Utc::now();
        let mut swept = 0usize;

        for job_id in &job_ids {
            match self.store.find_box_by_job(job_id).await? {
                None => {
                    warn!(%job_id, "Scheduler job has no box record; scheduling cleanup");
                    self.schedule_cleanup(job_id).await?;
                    swept += 1;
                }
                Some(shell_box) if shell_box.is_expired(now) => {
                    warn!(
                        %job_id,
                        box_id = %shell_box.id,
                        "Box session ended but job still registered; scheduling cleanup"
                    );
                    self.schedule_cleanup(job_id).await?;
                    swept += 1;
                }
                Some(_) => {}
            }
        }

        info!(
            checked = job_ids.len(),
            swept, "Scheduler reconciliation sweep finished"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use shellbox_core::types::quota::PlanLimits;
    use shellbox_database::store::MemoryStore;
    use shellbox_entity::boxes::NewShellBox;
    use shellbox_entity::slot::NameSlot;
    use shellbox_entity::user::{Plan, User};

    use chrono::Duration;
    use uuid::Uuid;

    use crate::testing::{RecordingQueue, ToggleScheduler, make_task};

    fn limits() -> PlanLimits {
        PlanLimits {
            box_count: 10,
            reserved_slots: 10,
            bandwidth: 1000,
            forwards: 2,
            session_minutes: 30,
        }
    }

    async fn seed_box(store: &Arc<MemoryStore>, job_id: &str, expires_in_minutes: i64) {
        let plan = Plan {
            id: Uuid::new_v4(),
            name: "free".into(),
            box_count: 10,
            reserved_config: 10,
            bandwidth: 1000,
            forwards: 2,
            duration: 1800,
            memory: 256,
            cpu: 512,
            cost: 0,
            created_at: Utc::now(),
        };
        let user = User {
            id: Uuid::new_v4(),
            email: format!("{}@example.com", Uuid::new_v4()),
            confirmed: true,
            plan_id: plan.id,
            created_at: Utc::now(),
        };
        store.add_plan(plan).await;
        store.add_user(user.clone()).await;

        let slot = NameSlot {
            id: Uuid::new_v4(),
            user_id: user.id,
            name: format!("slot-{}", Uuid::new_v4()),
            reserved: false,
            in_use: false,
            created_at: Utc::now(),
        };
        store.add_slot(slot.clone()).await;

        store
            .bind_box(
                slot.id,
                &NewShellBox {
                    job_id: job_id.to_string(),
                    ip_address: "10.0.0.7".into(),
                    ssh_port: 22022,
                    port_types: vec!["http".into()],
                    session_end_time: Utc::now() + Duration::minutes(expires_in_minutes),
                },
                &limits(),
            )
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_sweep_cleans_unknown_and_expired_jobs() {
        let store = Arc::new(MemoryStore::new());
        seed_box(&store, "ssh-client/dispatch-live", 30).await;
        seed_box(&store, "ssh-client/dispatch-expired", -5).await;

        let client = Arc::new(ToggleScheduler::with_dispatched(&[
            "ssh-client/dispatch-live",
            "ssh-client/dispatch-expired",
            "ssh-client/dispatch-orphan",
        ]));
        let queue = Arc::new(RecordingQueue::new());

        let handler = ReconcileTaskHandler::new(
            client,
            Arc::clone(&store) as Arc<dyn ProvisionStore>,
            Arc::clone(&queue) as Arc<dyn TaskQueue>,
            "ssh-client".to_string(),
        );

        handler
            .execute(&make_task(TASK_RECONCILE, serde_json::json!({})))
            .await
            .unwrap();

        let cleanups = queue.of_type(TASK_BOX_CLEANUP);
        let mut cleaned: Vec<String> = cleanups
            .iter()
            .map(|r| {
                serde_json::from_value::<CleanupPayload>(r.payload.clone())
                    .unwrap()
                    .job_id
            })
            .collect();
        cleaned.sort();

        assert_eq!(
            cleaned,
            vec![
                "ssh-client/dispatch-expired".to_string(),
                "ssh-client/dispatch-orphan".to_string(),
            ]
        );
    }

    #[tokio::test]
    async fn test_sweep_with_no_drift_schedules_nothing() {
        let store = Arc::new(MemoryStore::new());
        seed_box(&store, "ssh-client/dispatch-live", 30).await;

        let client = Arc::new(ToggleScheduler::with_dispatched(&["ssh-client/dispatch-live"]));
        let queue = Arc::new(RecordingQueue::new());

        let handler = ReconcileTaskHandler::new(
            client,
            Arc::clone(&store) as Arc<dyn ProvisionStore>,
            Arc::clone(&queue) as Arc<dyn TaskQueue>,
            "ssh-client".to_string(),
        );

        handler
            .execute(&make_task(TASK_RECONCILE, serde_json::json!({})))
            .await
            .unwrap();
        assert!(queue.requests().is_empty());
    }
}
