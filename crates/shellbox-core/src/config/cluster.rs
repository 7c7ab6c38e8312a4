//! Cluster scheduler configuration.

use serde::{Deserialize, Serialize};

/// Settings for the cluster scheduler the boxes run on.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClusterConfig {
    /// Name of the parameterized job template to dispatch for each box.
    #[serde(default = "default_job_name")]
    pub job_name: String,
    /// Service-discovery name of the scheduler (resolved via DNS).
    #[serde(default = "default_scheduler_service")]
    pub scheduler_service: String,
    /// Static scheduler address. When set, discovery is skipped entirely.
    #[serde(default)]
    pub scheduler_address: Option<String>,
    /// Scheduler HTTP API port.
    #[serde(default = "default_scheduler_port")]
    pub scheduler_port: u16,
    /// Base URL handed to dispatched jobs so the container can reach us.
    #[serde(default = "default_base_service_url")]
    pub base_service_url: String,
    /// Host reported for box endpoints outside production deployments.
    #[serde(default = "default_dev_host")]
    pub dev_host: String,
    /// Delay between readiness polls, in milliseconds.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    /// Maximum number of readiness polls before the launch is abandoned.
    #[serde(default = "default_max_poll_attempts")]
    pub max_poll_attempts: u32,
    /// Backoff before the single cleanup retry, in hours.
    #[serde(default = "default_cleanup_retry_hours")]
    pub cleanup_retry_hours: i64,
}

impl Default for ClusterConfig {
    fn default() -> Self {
        Self {
            job_name: default_job_name(),
            scheduler_service: default_scheduler_service(),
            scheduler_address: None,
            scheduler_port: default_scheduler_port(),
            base_service_url: default_base_service_url(),
            dev_host: default_dev_host(),
            poll_interval_ms: default_poll_interval_ms(),
            max_poll_attempts: default_max_poll_attempts(),
            cleanup_retry_hours: default_cleanup_retry_hours(),
        }
    }
}

fn default_job_name() -> String {
    "ssh-client".to_string()
}

fn default_scheduler_service() -> String {
    "nomad".to_string()
}

fn default_scheduler_port() -> u16 {
    4646
}

fn default_base_service_url() -> String {
    ".local".to_string()
}

fn default_dev_host() -> String {
    "127.0.0.1".to_string()
}

fn default_poll_interval_ms() -> u64 {
    250
}

fn default_max_poll_attempts() -> u32 {
    1000
}

fn default_cleanup_retry_hours() -> i64 {
    2
}
