//! Box lifecycle controller.
//!
//! Drives a creation attempt through slot binding, quota checks, cluster
//! dispatch, readiness polling, persistence, and expiry scheduling, and a
//! deletion through deferred deregistration and atomic row teardown. Every
//! failure after a job id was obtained leaves a cleanup task behind, so a
//! surfaced error never strands a running cluster job.

use std::sync::Arc;

use chrono::{Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};
use uuid::Uuid;

use shellbox_core::error::AppError;
use shellbox_core::result::AppResult;
use shellbox_core::traits::{TaskQueue, TaskRequest};
use shellbox_core::types::port::PortType;
use shellbox_core::types::quota::QuotaPolicy;
use shellbox_database::store::ProvisionStore;
use shellbox_entity::boxes::{NewShellBox, ShellBox};
use shellbox_entity::user::User;
use shellbox_nomad::BoxLauncher;

use crate::slot::SlotAllocator;

/// Task type deregistering a cluster job.
pub const TASK_BOX_CLEANUP: &str = "box_cleanup";
/// Task type tearing down a box at session end.
pub const TASK_BOX_EXPIRY: &str = "box_expiry";
/// Task type for the periodic scheduler reconciliation sweep.
pub const TASK_RECONCILE: &str = "scheduler_reconcile";
/// Queue all cluster maintenance tasks are routed through.
pub const QUEUE_CLUSTER: &str = "cluster";

/// Payload of a `box_cleanup` task.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CleanupPayload {
    /// Scheduler job to deregister.
    pub job_id: String,
    /// Whether this task already is the one backoff retry.
    #[serde(default)]
    pub rescheduled: bool,
}

/// Payload of a `box_expiry` task.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExpiryPayload {
    /// Owner of the expiring box.
    pub user_id: Uuid,
    /// The box to tear down.
    pub box_id: Uuid,
}

/// Parameters of a box creation request.
#[derive(Debug, Clone)]
pub struct CreateBoxRequest {
    /// SSH public key injected into the container.
    pub ssh_key: String,
    /// Requested port forward types.
    pub port_types: Vec<PortType>,
    /// Session length override in minutes; defaults to the plan's base
    /// duration.
    pub session_minutes: Option<i64>,
}

/// The box lifecycle controller.
pub struct BoxService {
    store: Arc<dyn ProvisionStore>,
    queue: Arc<dyn TaskQueue>,
    launcher: Arc<BoxLauncher>,
    allocator: Arc<SlotAllocator>,
}

impl std::fmt::Debug for BoxService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BoxService").finish()
    }
}

impl BoxService {
    /// Create a new controller.
    pub fn new(
        store: Arc<dyn ProvisionStore>,
        queue: Arc<dyn TaskQueue>,
        launcher: Arc<BoxLauncher>,
        allocator: Arc<SlotAllocator>,
    ) -> Self {
        Self {
            store,
            queue,
            launcher,
            allocator,
        }
    }

    /// Create a box for the user.
    ///
    /// When `slot_id` is `None` a session slot with a generated name is
    /// allocated. The box is returned only after the cluster job is
    /// running, its endpoint resolved, the rows persisted, and the expiry
    /// task scheduled.
    pub async fn create(
        &self,
        user: &User,
        slot_id: Option<Uuid>,
        request: CreateBoxRequest,
    ) -> AppResult<ShellBox> {
        let slot = match slot_id {
            Some(id) => self
                .store
                .find_slot(id)
                .await?
                .ok_or_else(|| AppError::not_found("Slot not found"))?,
            None => self.allocator.unused_slot(user).await?,
        };

        if slot.user_id != user.id {
            return Err(AppError::access_denied("You do not own this slot"));
        }
        if slot.in_use {
            return Err(AppError::slot_in_use("Slot is associated with a running box"));
        }

        let plan = self.store.plan_for(user).await?;
        let limits = plan.limits();

        // Cheap pre-check before paying for a dispatch; the authoritative
        // check re-runs under the store's user lock in bind_box.
        let active_boxes = self.store.count_boxes(user.id).await?;
        if !QuotaPolicy::can_open_box(&limits, active_boxes) {
            return Err(AppError::box_limit_reached(
                "Maximum number of opened boxes reached",
            ));
        }

        let session_minutes = request
            .session_minutes
            .unwrap_or(limits.session_minutes)
            .max(1);

        let job_id = self
            .launcher
            .dispatch(&slot.name, &request.ssh_key, &limits, session_minutes)
            .await?;

        let (ip_address, ssh_port) = match self.await_endpoint(&job_id).await {
            Ok(endpoint) => endpoint,
            Err(err) => {
                // The job exists on the cluster; it must not outlive this
                // failed attempt.
                self.schedule_cleanup(&job_id).await;
                return Err(err);
            }
        };

        let new_box = NewShellBox {
            job_id: job_id.clone(),
            ip_address,
            ssh_port: i32::from(ssh_port),
            port_types: request
                .port_types
                .iter()
                .map(|p| p.as_str().to_string())
                .collect(),
            session_end_time: Utc::now() + Duration::minutes(session_minutes),
        };

        let shell_box = match self.store.bind_box(slot.id, &new_box, &limits).await {
            Ok(shell_box) => shell_box,
            Err(err) => {
                self.schedule_cleanup(&job_id).await;
                return Err(err);
            }
        };

        self.schedule_expiry(user, &shell_box).await;

        info!(
            user_id = %user.id,
            box_id = %shell_box.id,
            job_id = %shell_box.job_id,
            slot = %slot.name,
            "Box created"
        );
        Ok(shell_box)
    }

    /// Tear down a box.
    ///
    /// Deregistration runs decoupled through the task queue; the row
    /// teardown is atomic and keeps reserved slots (with `in_use = false`)
    /// while deleting auto-generated ones. Deleting an already-deleted box
    /// is a no-op.
    pub async fn delete(&self, user: &User, box_id: Uuid) -> AppResult<()> {
        let Some(shell_box) = self.store.find_box(box_id).await? else {
            return Ok(());
        };

        self.schedule_cleanup(&shell_box.job_id).await;
        self.store.unbind_box(shell_box.id).await?;

        info!(
            user_id = %user.id,
            box_id = %shell_box.id,
            job_id = %shell_box.job_id,
            "Box deleted"
        );
        Ok(())
    }

    /// Wait for the job to run and resolve its SSH endpoint.
    async fn await_endpoint(&self, job_id: &str) -> AppResult<(String, u16)> {
        self.launcher.await_running(job_id).await?;
        self.launcher.resolve_endpoint(job_id).await
    }

    /// Enqueue an immediate deregistration task for a cluster job.
    ///
    /// Enqueue failures are logged, never surfaced: the reconciliation
    /// sweep eventually catches any job this misses.
    async fn schedule_cleanup(&self, job_id: &str) {
        let payload = CleanupPayload {
            job_id: job_id.to_string(),
            rescheduled: false,
        };
        let request = match serde_json::to_value(&payload) {
            Ok(payload) => TaskRequest::immediate(TASK_BOX_CLEANUP, QUEUE_CLUSTER, payload),
            Err(err) => {
                error!(job_id, %err, "Failed to encode cleanup payload");
                return;
            }
        };

        if let Err(err) = self.queue.enqueue(request).await {
            error!(job_id, %err, "Failed to schedule cleanup");
        }
    }

    /// Enqueue the expiry task firing at the box's session end.
    async fn schedule_expiry(&self, user: &User, shell_box: &ShellBox) {
        let payload = ExpiryPayload {
            user_id: user.id,
            box_id: shell_box.id,
        };
        let request = match serde_json::to_value(&payload) {
            Ok(payload) => TaskRequest::scheduled(
                TASK_BOX_EXPIRY,
                QUEUE_CLUSTER,
                payload,
                shell_box.session_end_time,
            ),
            Err(err) => {
                error!(box_id = %shell_box.id, %err, "Failed to encode expiry payload");
                return;
            }
        };

        if let Err(err) = self.queue.enqueue(request).await {
            warn!(
                box_id = %shell_box.id,
                %err,
                "Failed to schedule expiry; reconciliation will cover teardown"
            );
        }
    }
}
