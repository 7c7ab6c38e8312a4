//! Shared test doubles for the worker crate.

use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use chrono::Utc;
use uuid::Uuid;

use shellbox_core::error::AppError;
use shellbox_core::result::AppResult;
use shellbox_core::traits::{SchedulerClient, TaskQueue, TaskRequest};
use shellbox_core::types::cluster::{Allocation, AllocationStub, DispatchMeta, NodeInfo, PortMapping};
use shellbox_entity::task::{Task, TaskPriority, TaskStatus};

/// Build a claimed task row for handler tests.
pub fn make_task(task_type: &str, payload: serde_json::Value) -> Task {
    let now = Utc::now();
    Task {
        id: Uuid::new_v4(),
        task_type: task_type.to_string(),
        queue: "cluster".to_string(),
        priority: TaskPriority::Normal,
        payload,
        status: TaskStatus::Running,
        attempts: 1,
        max_attempts: 1,
        error_message: None,
        scheduled_at: None,
        started_at: Some(now),
        completed_at: None,
        worker_id: Some("worker-test".to_string()),
        created_at: now,
        updated_at: now,
    }
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

    pub fn requests(&self) -> Vec<TaskRequest> {
        self.requests.lock().unwrap().clone()
    }

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

/// Scheduler fake with a switchable deregister failure and recorded calls.
pub struct ToggleScheduler {
    pub deregister_fails: AtomicBool,
    pub deregisters: Mutex<Vec<String>>,
    pub dispatched: Mutex<Vec<String>>,
}

impl ToggleScheduler {
    pub fn new() -> Self {
        Self {
            deregister_fails: AtomicBool::new(false),
            deregisters: Mutex::new(Vec::new()),
            dispatched: Mutex::new(Vec::new()),
        }
    }

    pub fn failing() -> Self {
        let s = Self::new();
        s.deregister_fails.store(true, Ordering::SeqCst);
        s
    }

    pub fn with_dispatched(job_ids: &[&str]) -> Self {
        let s = Self::new();
        *s.dispatched.lock().unwrap() = job_ids.iter().map(|j| j.to_string()).collect();
        s
    }
}

#[async_trait]
impl SchedulerClient for ToggleScheduler {
    async fn dispatch(&self, job_name: &str, _meta: &DispatchMeta) -> AppResult<String> {
        Ok(format!("{job_name}/dispatch-1614102167-f7aa47dc"))
    }

    async fn job_status(&self, _job_id: &str) -> AppResult<String> {
        Ok("running".to_string())
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
        if self.deregister_fails.load(Ordering::SeqCst) {
            return Err(AppError::scheduler("Connection refused"));
        }
        self.deregisters.lock().unwrap().push(job_id.to_string());
        Ok(())
    }

    async fn dispatched_jobs(&self, _job_name: &str) -> AppResult<Vec<String>> {
        Ok(self.dispatched.lock().unwrap().clone())
    }
}
