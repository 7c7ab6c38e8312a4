//! Box launch orchestration against the cluster scheduler.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};

use shellbox_core::config::cluster::ClusterConfig;
use shellbox_core::error::{AppError, ErrorKind};
use shellbox_core::result::AppResult;
use shellbox_core::traits::SchedulerClient;
use shellbox_core::types::cluster::{DispatchMeta, JOB_STATUS_RUNNING};
use shellbox_core::types::quota::PlanLimits;

/// Drives a single box launch: dispatch, bounded readiness poll, and
/// endpoint resolution, plus the matching deregister.
///
/// Scheduler failures on the launch path are normalized to
/// `ErrorKind::Launch`; `deregister` keeps the client's `Scheduler` kind so
/// background cleanup can treat it as transient and retry.
pub struct BoxLauncher {
    client: Arc<dyn SchedulerClient>,
    config: ClusterConfig,
    production: bool,
}

impl std::fmt::Debug for BoxLauncher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BoxLauncher")
            .field("job_name", &self.config.job_name)
            .field("production", &self.production)
            .finish()
    }
}

impl BoxLauncher {
    /// Create a new launcher.
    pub fn new(client: Arc<dyn SchedulerClient>, config: ClusterConfig, production: bool) -> Self {
        Self {
            client,
            config,
            production,
        }
    }

    /// The scheduler client this launcher drives.
    pub fn client(&self) -> &Arc<dyn SchedulerClient> {
        &self.client
    }

    /// Dispatch a box job for the given slot and return the job id.
    pub async fn dispatch(
        &self,
        slot_name: &str,
        ssh_key: &str,
        limits: &PlanLimits,
        session_minutes: i64,
    ) -> AppResult<String> {
        let meta = DispatchMeta {
            ssh_key: sanitize_ssh_key(ssh_key),
            box_name: slot_name.to_string(),
            base_url: self.config.base_service_url.clone(),
            bandwidth: limits.bandwidth.to_string(),
            session_minutes: session_minutes.to_string(),
        };

        let job_id = self
            .client
            .dispatch(&self.config.job_name, &meta)
            .await
            .map_err(launch_error)?;

        debug!(slot = slot_name, job_id = %job_id, "Dispatched box job");
        Ok(job_id)
    }

    /// Poll the job until it reports "running".
    ///
    /// The poll is bounded by `max_poll_attempts` with a fixed async sleep
    /// between attempts; exhausting the budget fails the launch.
    pub async fn await_running(&self, job_id: &str) -> AppResult<()> {
        let interval = Duration::from_millis(self.config.poll_interval_ms);

        for attempt in 1..=self.config.max_poll_attempts {
            let status = self
                .client
                .job_status(job_id)
                .await
                .map_err(launch_error)?;

            if status == JOB_STATUS_RUNNING {
                debug!(job_id, attempt, "Box job is running");
                return Ok(());
            }

            tokio::time::sleep(interval).await;
        }

        warn!(
            job_id,
            attempts = self.config.max_poll_attempts,
            "Box job never reached running"
        );
        Err(AppError::launch("The box failed to start"))
    }

    /// Resolve the externally reachable SSH endpoint of a running job.
    ///
    /// Outside production the node address is overridden with the
    /// configured development host.
    pub async fn resolve_endpoint(&self, job_id: &str) -> AppResult<(String, u16)> {
        let allocations = self
            .client
            .job_allocations(job_id)
            .await
            .map_err(launch_error)?;

        let first = allocations
            .first()
            .ok_or_else(|| AppError::launch("Failed to create box"))?;

        let allocation = self
            .client
            .allocation(&first.id)
            .await
            .map_err(launch_error)?;

        let ssh_port = allocation
            .port_labeled("ssh")
            .ok_or_else(|| AppError::launch("Failed to create box"))?;

        let nodes = self.client.nodes().await.map_err(launch_error)?;
        let address = nodes
            .into_iter()
            .find(|n| n.id == allocation.node_id)
            .map(|n| n.address)
            .ok_or_else(|| AppError::launch("Failed to create box"))?;

        let address = if self.production {
            address
        } else {
            self.config.dev_host.clone()
        };

        Ok((address, ssh_port))
    }

    /// Remove the job from the scheduler (purge); idempotent.
    pub async fn deregister(&self, job_id: &str) -> AppResult<()> {
        self.client.deregister(job_id, true).await
    }
}

/// Normalize a scheduler failure on the launch path.
fn launch_error(err: AppError) -> AppError {
    AppError::with_source(ErrorKind::Launch, "Failed to create box", err)
}

/// Strip an SSH public key down to printable ASCII before it is embedded
/// into the job specification.
pub fn sanitize_ssh_key(key: &str) -> String {
    key.chars()
        .filter(|c| (' '..='~').contains(c))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::Mutex;
    use std::sync::atomic::{AtomicU32, Ordering};

    use async_trait::async_trait;
    use shellbox_core::types::cluster::{Allocation, AllocationStub, NodeInfo, PortMapping};

    /// Scheduler fake scripted with a status sequence.
    #[derive(Default)]
    struct FakeScheduler {
        statuses: Mutex<Vec<String>>,
        polls: AtomicU32,
    }

    impl FakeScheduler {
        fn with_statuses(statuses: &[&str]) -> Self {
            Self {
                statuses: Mutex::new(statuses.iter().rev().map(|s| s.to_string()).collect()),
                polls: AtomicU32::new(0),
            }
        }
    }

    #[async_trait]
    impl SchedulerClient for FakeScheduler {
        async fn dispatch(&self, job_name: &str, _meta: &DispatchMeta) -> AppResult<String> {
            Ok(format!("{job_name}/dispatch-1614102167-f7aa47dc"))
        }

        async fn job_status(&self, _job_id: &str) -> AppResult<String> {
            self.polls.fetch_add(1, Ordering::SeqCst);
            let mut statuses = self.statuses.lock().unwrap();
            Ok(statuses.pop().unwrap_or_else(|| "pending".to_string()))
        }

        async fn job_allocations(&self, _job_id: &str) -> AppResult<Vec<AllocationStub>> {
            Ok(vec![AllocationStub { id: "alloc-1".into() }])
        }

        async fn allocation(&self, alloc_id: &str) -> AppResult<Allocation> {
            Ok(Allocation {
                id: alloc_id.into(),
                node_id: "node-1".into(),
                dynamic_ports: vec![
                    PortMapping {
                        label: "http".into(),
                        value: 25001,
                    },
                    PortMapping {
                        label: "ssh".into(),
                        value: 22022,
                    },
                ],
            })
        }

        async fn nodes(&self) -> AppResult<Vec<NodeInfo>> {
            Ok(vec![
                NodeInfo {
                    id: "node-2".into(),
                    address: "10.0.0.8".into(),
                },
                NodeInfo {
                    id: "node-1".into(),
                    address: "10.0.0.7".into(),
                },
            ])
        }

        async fn deregister(&self, _job_id: &str, _purge: bool) -> AppResult<()> {
            Ok(())
        }

        async fn dispatched_jobs(&self, _job_name: &str) -> AppResult<Vec<String>> {
            Ok(vec![])
        }
    }

    fn fast_config() -> ClusterConfig {
        ClusterConfig {
            poll_interval_ms: 0,
            max_poll_attempts: 3,
            ..ClusterConfig::default()
        }
    }

    #[test]
    fn test_sanitize_ssh_key() {
        assert_eq!(
            sanitize_ssh_key("ssh-rsa AAAAB3Nza\n\tuser@host\u{1f4a5}"),
            "ssh-rsa AAAAB3Nzauser@host"
        );
    }

    #[tokio::test]
    async fn test_await_running_stops_once_running() {
        let client = Arc::new(FakeScheduler::with_statuses(&["pending", "pending", "running"]));
        let launcher = BoxLauncher::new(client.clone(), fast_config(), true);

        launcher.await_running("job-1").await.unwrap();
        assert_eq!(client.polls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_await_running_exhausts_attempt_budget() {
        let client = Arc::new(FakeScheduler::with_statuses(&[]));
        let launcher = BoxLauncher::new(client.clone(), fast_config(), true);

        let err = launcher.await_running("job-1").await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::Launch);
        assert_eq!(client.polls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_resolve_endpoint_picks_ssh_port_and_node_address() {
        let client = Arc::new(FakeScheduler::default());
        let launcher = BoxLauncher::new(client, fast_config(), true);

        let (address, port) = launcher.resolve_endpoint("job-1").await.unwrap();
        assert_eq!(address, "10.0.0.7");
        assert_eq!(port, 22022);
    }

    #[tokio::test]
    async fn test_resolve_endpoint_dev_override() {
        let client = Arc::new(FakeScheduler::default());
        let launcher = BoxLauncher::new(client, fast_config(), false);

        let (address, _) = launcher.resolve_endpoint("job-1").await.unwrap();
        assert_eq!(address, ClusterConfig::default().dev_host);
    }
}
