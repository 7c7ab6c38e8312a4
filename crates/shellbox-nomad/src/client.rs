//! HTTP client for the Nomad v1 API.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

use shellbox_core::config::cluster::ClusterConfig;
use shellbox_core::error::AppError;
use shellbox_core::result::AppResult;
use shellbox_core::traits::SchedulerClient;
use shellbox_core::types::cluster::{Allocation, AllocationStub, DispatchMeta, NodeInfo, PortMapping};

use crate::discovery::ServiceDiscovery;

/// Response of a job dispatch call.
#[derive(Debug, Deserialize)]
struct DispatchResponse {
    #[serde(rename = "DispatchedJobID")]
    dispatched_job_id: String,
}

/// Job detail, reduced to what the controller needs.
#[derive(Debug, Deserialize)]
struct JobDetail {
    #[serde(rename = "Status")]
    status: String,
}

/// Allocation list entry.
#[derive(Debug, Deserialize)]
struct AllocationListEntry {
    #[serde(rename = "ID")]
    id: String,
}

/// Allocation detail with its network resources.
#[derive(Debug, Deserialize)]
struct AllocationDetail {
    #[serde(rename = "ID")]
    id: String,
    #[serde(rename = "NodeID")]
    node_id: String,
    #[serde(rename = "Resources")]
    resources: AllocationResources,
}

#[derive(Debug, Deserialize)]
struct AllocationResources {
    #[serde(rename = "Networks", default)]
    networks: Vec<NetworkResource>,
}

#[derive(Debug, Deserialize)]
struct NetworkResource {
    #[serde(rename = "DynamicPorts", default)]
    dynamic_ports: Vec<DynamicPort>,
}

#[derive(Debug, Deserialize)]
struct DynamicPort {
    #[serde(rename = "Label")]
    label: String,
    #[serde(rename = "Value")]
    value: u16,
}

/// Node list entry.
#[derive(Debug, Deserialize)]
struct NodeListEntry {
    #[serde(rename = "ID")]
    id: String,
    #[serde(rename = "Address")]
    address: String,
}

/// Job list entry, as returned by the jobs index.
#[derive(Debug, Deserialize)]
struct JobListEntry {
    #[serde(rename = "ID")]
    id: String,
}

/// `reqwest`-based client for the Nomad HTTP API.
///
/// The scheduler address is re-resolved through [`ServiceDiscovery`] on
/// every operation, so a scheduler restart or failover never wedges the
/// client on a stale address.
pub struct NomadClient {
    http: reqwest::Client,
    discovery: Arc<dyn ServiceDiscovery>,
    config: ClusterConfig,
}

impl std::fmt::Debug for NomadClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NomadClient")
            .field("service", &self.config.scheduler_service)
            .finish()
    }
}

impl NomadClient {
    /// Create a new client.
    pub fn new(discovery: Arc<dyn ServiceDiscovery>, config: ClusterConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            discovery,
            config,
        }
    }

    /// Resolve the base URL of the scheduler API.
    async fn base_url(&self) -> AppResult<String> {
        let host = match &self.config.scheduler_address {
            Some(address) => address.clone(),
            None => {
                self.discovery
                    .discover(&self.config.scheduler_service)
                    .await?
            }
        };
        Ok(format!("http://{}:{}", host, self.config.scheduler_port))
    }

    /// GET a JSON document from the scheduler.
    async fn get_json<T: serde::de::DeserializeOwned>(&self, path: &str) -> AppResult<T> {
        let url = format!("{}{}", self.base_url().await?, path);
        let response = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|e| AppError::with_source(shellbox_core::ErrorKind::Scheduler,
                format!("Scheduler request failed: {e}"), e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(AppError::scheduler(format!(
                "Scheduler returned {status} for {path}"
            )));
        }

        response.json::<T>().await.map_err(|e| {
            AppError::with_source(
                shellbox_core::ErrorKind::Scheduler,
                format!("Failed to decode scheduler response: {e}"),
                e,
            )
        })
    }
}

/// Encode a job identifier for use as a URL path segment.
///
/// Dispatched job ids contain a slash ("ssh-client/dispatch-..."); the
/// scheduler expects it percent-encoded in the path.
fn encode_job_id(job_id: &str) -> String {
    job_id.replace('%', "%25").replace('/', "%2F")
}

#[async_trait]
impl SchedulerClient for NomadClient {
    async fn dispatch(&self, job_name: &str, meta: &DispatchMeta) -> AppResult<String> {
        let url = format!(
            "{}/v1/job/{}/dispatch",
            self.base_url().await?,
            encode_job_id(job_name)
        );

        let body = serde_json::json!({
            "Meta": {
                "ssh_key": meta.ssh_key,
                "box_name": meta.box_name,
                "base_url": meta.base_url,
                "bandwidth": meta.bandwidth,
                "session_minutes": meta.session_minutes,
            }
        });

        let response = self
            .http
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| AppError::with_source(shellbox_core::ErrorKind::Scheduler,
                format!("Scheduler dispatch failed: {e}"), e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(AppError::scheduler(format!(
                "Scheduler returned {status} for dispatch of '{job_name}'"
            )));
        }

        let dispatched: DispatchResponse = response.json().await.map_err(|e| {
            AppError::with_source(
                shellbox_core::ErrorKind::Scheduler,
                format!("Failed to decode dispatch response: {e}"),
                e,
            )
        })?;

        debug!(job_id = %dispatched.dispatched_job_id, "Dispatched box job");
        Ok(dispatched.dispatched_job_id)
    }

    async fn job_status(&self, job_id: &str) -> AppResult<String> {
        let detail: JobDetail = self
            .get_json(&format!("/v1/job/{}", encode_job_id(job_id)))
            .await?;
        Ok(detail.status)
    }

    async fn job_allocations(&self, job_id: &str) -> AppResult<Vec<AllocationStub>> {
        let entries: Vec<AllocationListEntry> = self
            .get_json(&format!("/v1/job/{}/allocations", encode_job_id(job_id)))
            .await?;
        Ok(entries
            .into_iter()
            .map(|e| AllocationStub { id: e.id })
            .collect())
    }

    async fn allocation(&self, alloc_id: &str) -> AppResult<Allocation> {
        let detail: AllocationDetail = self
            .get_json(&format!("/v1/allocation/{alloc_id}"))
            .await?;

        let dynamic_ports = detail
            .resources
            .networks
            .into_iter()
            .flat_map(|n| n.dynamic_ports)
            .map(|p| PortMapping {
                label: p.label,
                value: p.value,
            })
            .collect();

        Ok(Allocation {
            id: detail.id,
            node_id: detail.node_id,
            dynamic_ports,
        })
    }

    async fn nodes(&self) -> AppResult<Vec<NodeInfo>> {
        let entries: Vec<NodeListEntry> = self.get_json("/v1/nodes").await?;
        Ok(entries
            .into_iter()
            .map(|n| NodeInfo {
                id: n.id,
                address: n.address,
            })
            .collect())
    }

    async fn deregister(&self, job_id: &str, purge: bool) -> AppResult<()> {
        let url = format!(
            "{}/v1/job/{}?purge={}",
            self.base_url().await?,
            encode_job_id(job_id),
            purge
        );

        let response = self
            .http
            .delete(&url)
            .send()
            .await
            .map_err(|e| AppError::with_source(shellbox_core::ErrorKind::Scheduler,
                format!("Scheduler deregister failed: {e}"), e))?;

        let status = response.status();
        // A job that is already gone counts as deregistered.
        if status.is_success() || status == reqwest::StatusCode::NOT_FOUND {
            return Ok(());
        }

        Err(AppError::scheduler(format!(
            "Scheduler returned {status} deregistering '{job_id}'"
        )))
    }

    async fn dispatched_jobs(&self, job_name: &str) -> AppResult<Vec<String>> {
        let prefix = format!("{job_name}/dispatch-");
        let entries: Vec<JobListEntry> = self
            .get_json(&format!("/v1/jobs?prefix={}", encode_job_id(&prefix)))
            .await?;
        Ok(entries
            .into_iter()
            .map(|e| e.id)
            .filter(|id| id.starts_with(&prefix))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_job_id() {
        assert_eq!(
            encode_job_id("ssh-client/dispatch-1614102167-f7aa47dc"),
            "ssh-client%2Fdispatch-1614102167-f7aa47dc"
        );
        assert_eq!(encode_job_id("plain"), "plain");
    }

    #[test]
    fn test_dispatch_response_decoding() {
        let raw = r#"{"Index":42,"DispatchedJobID":"ssh-client/dispatch-1614102167-f7aa47dc","EvalID":"deadbeef"}"#;
        let parsed: DispatchResponse = serde_json::from_str(raw).unwrap();
        assert_eq!(
            parsed.dispatched_job_id,
            "ssh-client/dispatch-1614102167-f7aa47dc"
        );
    }

    #[test]
    fn test_allocation_decoding_flattens_networks() {
        let raw = r#"{
            "ID": "alloc-1",
            "NodeID": "node-1",
            "Resources": {
                "Networks": [
                    {"DynamicPorts": [{"Label": "ssh", "Value": 22022}, {"Label": "http", "Value": 25001}]}
                ]
            }
        }"#;
        let parsed: AllocationDetail = serde_json::from_str(raw).unwrap();
        assert_eq!(parsed.node_id, "node-1");
        assert_eq!(parsed.resources.networks[0].dynamic_ports.len(), 2);
    }

    #[test]
    fn test_job_detail_decoding() {
        let raw = r#"{"ID":"x","Status":"running","Type":"batch"}"#;
        let parsed: JobDetail = serde_json::from_str(raw).unwrap();
        assert_eq!(parsed.status, "running");
    }
}
