//! Shared test doubles for the service crate.

use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU32, Ordering};

use async_trait::async_trait;
use chrono::Utc;
use uuid::Uuid;

use shellbox_core::error::AppError;
use shellbox_core::result::AppResult;
use shellbox_core::traits::{SchedulerClient, TaskQueue, TaskRequest};
use shellbox_core::types::cluster::{Allocation, AllocationStub, DispatchMeta, NodeInfo, PortMapping};
use shellbox_core::types::quota::PlanLimits;
use shellbox_database::store::{MemoryStore, ProvisionStore};
use shellbox_entity::boxes::{NewShellBox, ShellBox};
use shellbox_entity::slot::NameSlot;
use shellbox_entity::user::{Plan, User};

/// Build a plan row with the given quota knobs.
pub fn make_plan(box_count: i32, reserved_config: i32) -> Plan {
    Plan {
        id: Uuid::new_v4(),
        name: "free".into(),
        box_count,
        reserved_config,
        bandwidth: 1000,
        forwards: 2,
        duration: 1800,
        memory: 256,
        cpu: 512,
        cost: 0,
        created_at: Utc::now(),
    }
}

/// Seed a plan and a user referencing it into the store.
pub async fn seed_user(store: &Arc<MemoryStore>, box_count: i32, reserved_config: i32) -> User {
    let plan = make_plan(box_count, reserved_config);
    let user = User {
        id: Uuid::new_v4(),
        email: format!("{}@example.com", Uuid::new_v4()),
        confirmed: true,
        plan_id: plan.id,
        created_at: Utc::now(),
    };
    store.add_plan(plan).await;
    store.add_user(user.clone()).await;
    user
}

/// Task queue that records every enqueued request.
#[derive(Default)]
pub struct RecordingQueue {
    requests: Mutex<Vec<TaskRequest>>,
}

impl RecordingQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the recorded requests.
    pub fn requests(&self) -> Vec<TaskRequest> {
        self.requests.lock().unwrap().clone()
    }

    /// Recorded requests of one task type.
    pub fn of_type(&self, task_type: &str) -> Vec<TaskRequest> {
        self.requests()
            .into_iter()
            .filter(|r| r.task_type == task_type)
            .collect()
    }
}

#[async_trait]
impl TaskQueue for RecordingQueue {
    async fn enqueue(&self, request: TaskRequest) -> AppResult<Uuid> {
        self.requests.lock().unwrap().push(request);
        Ok(Uuid::new_v4())
    }
}

/// How the scripted scheduler should (mis)behave.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerScript {
    /// Dispatch succeeds and the job is immediately running.
    Healthy,
    /// Dispatch itself errors; no job id is ever produced.
    DispatchFails,
    /// Dispatch succeeds but the job never leaves "pending".
    NeverRuns,
}

/// Scheduler fake driven by a [`SchedulerScript`].
pub struct ScriptedScheduler {
    script: SchedulerScript,
    pub dispatches: AtomicU32,
    pub deregisters: Mutex<Vec<String>>,
}

impl ScriptedScheduler {
    pub fn new(script: SchedulerScript) -> Self {
        Self {
            script,
            dispatches: AtomicU32::new(0),
            deregisters: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl SchedulerClient for ScriptedScheduler {
    async fn dispatch(&self, job_name: &str, meta: &DispatchMeta) -> AppResult<String> {
        if self.script == SchedulerScript::DispatchFails {
            return Err(AppError::scheduler("Connection refused"));
        }
        let n = self.dispatches.fetch_add(1, Ordering::SeqCst);
        Ok(format!("{job_name}/dispatch-{}-{n}", meta.box_name))
    }

    async fn job_status(&self, _job_id: &str) -> AppResult<String> {
        Ok(match self.script {
            SchedulerScript::Healthy => "running".to_string(),
            _ => "pending".to_string(),
        })
    }

    async fn job_allocations(&self, _job_id: &str) -> AppResult<Vec<AllocationStub>> {
        Ok(vec![AllocationStub { id: "alloc-1".into() }])
    }

    async fn allocation(&self, alloc_id: &str) -> AppResult<Allocation> {
        Ok(Allocation {
            id: alloc_id.into(),
            node_id: "node-1".into(),
            dynamic_ports: vec![PortMapping {
                label: "ssh".into(),
                value: 22022,
            }],
        })
    }

    async fn nodes(&self) -> AppResult<Vec<NodeInfo>> {
        Ok(vec![NodeInfo {
            id: "node-1".into(),
            address: "10.0.0.7".into(),
        }])
    }

    async fn deregister(&self, job_id: &str, _purge: bool) -> AppResult<()> {
        self.deregisters.lock().unwrap().push(job_id.to_string());
        Ok(())
    }

    async fn dispatched_jobs(&self, _job_name: &str) -> AppResult<Vec<String>> {
        Ok(vec![])
    }
}

/// Store whose `reserve_slot` always reports a name collision.
struct SlotTakenStore {
    reserve_calls: Arc<AtomicU32>,
}

#[async_trait]
impl ProvisionStore for SlotTakenStore {
    async fn find_user(&self, _user_id: Uuid) -> AppResult<Option<User>> {
        Ok(None)
    }

    async fn plan_for(&self, _user: &User) -> AppResult<Plan> {
        Ok(make_plan(1, 1))
    }

    async fn find_slot(&self, _slot_id: Uuid) -> AppResult<Option<NameSlot>> {
        Ok(None)
    }

    async fn reserve_slot(
        &self,
        _user_id: Uuid,
        _name: &str,
        _reserved: bool,
        _limits: &PlanLimits,
    ) -> AppResult<NameSlot> {
        self.reserve_calls.fetch_add(1, Ordering::SeqCst);
        Err(AppError::slot_taken("Requested slot is already reserved"))
    }

    async fn release_slot(&self, _slot_id: Uuid) -> AppResult<()> {
        unimplemented!("not exercised")
    }

    async fn find_box(&self, _box_id: Uuid) -> AppResult<Option<ShellBox>> {
        Ok(None)
    }

    async fn find_box_by_job(&self, _job_id: &str) -> AppResult<Option<ShellBox>> {
        Ok(None)
    }

    async fn count_boxes(&self, _user_id: Uuid) -> AppResult<i64> {
        Ok(0)
    }

    async fn bind_box(
        &self,
        _slot_id: Uuid,
        _new_box: &NewShellBox,
        _limits: &PlanLimits,
    ) -> AppResult<ShellBox> {
        unimplemented!("not exercised")
    }

    async fn unbind_box(&self, _box_id: Uuid) -> AppResult<Option<String>> {
        Ok(None)
    }
}

/// A store that rejects every generated name, plus its call counter.
pub fn slot_taken_store() -> (Arc<dyn ProvisionStore>, Arc<AtomicU32>) {
    let reserve_calls = Arc::new(AtomicU32::new(0));
    let store = SlotTakenStore {
        reserve_calls: Arc::clone(&reserve_calls),
    };
    (Arc::new(store), reserve_calls)
}
