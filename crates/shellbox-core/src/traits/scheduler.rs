//! Cluster scheduler client trait.

use async_trait::async_trait;

use crate::result::AppResult;
use crate::types::cluster::{Allocation, AllocationStub, DispatchMeta, NodeInfo};

/// Client for the external cluster scheduler.
///
/// Implementations talk to the real scheduler over HTTP; tests script the
/// responses. Every method may fail with `ErrorKind::Scheduler`; callers on
/// the synchronous launch path normalize those failures to
/// `ErrorKind::Launch`.
#[async_trait]
pub trait SchedulerClient: Send + Sync + 'static {
    /// Dispatch an instance of the parameterized job and return the
    /// dispatched job identifier.
    async fn dispatch(&self, job_name: &str, meta: &DispatchMeta) -> AppResult<String>;

    /// Fetch the current status string of a job ("pending", "running", ...).
    async fn job_status(&self, job_id: &str) -> AppResult<String>;

    /// List the allocations of a job.
    async fn job_allocations(&self, job_id: &str) -> AppResult<Vec<AllocationStub>>;

    /// Fetch the placement details of one allocation.
    async fn allocation(&self, alloc_id: &str) -> AppResult<Allocation>;

    /// List the worker nodes known to the scheduler.
    async fn nodes(&self) -> AppResult<Vec<NodeInfo>>;

    /// Remove a job from the scheduler. Must be idempotent: a job that is
    /// already gone is treated as success.
    async fn deregister(&self, job_id: &str, purge: bool) -> AppResult<()>;

    /// List the dispatched job identifiers of the given parameterized job.
    async fn dispatched_jobs(&self, job_name: &str) -> AppResult<Vec<String>>;
}
