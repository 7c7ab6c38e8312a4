//! Data shapes exchanged with the cluster scheduler.
//!
//! These are the scheduler-agnostic views the lifecycle controller needs;
//! the wire representation lives in the client implementation.

use serde::{Deserialize, Serialize};

/// Job status string reported for a running job.
pub const JOB_STATUS_RUNNING: &str = "running";

/// Metadata handed to a dispatched box job.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DispatchMeta {
    /// Sanitized SSH public key injected into the container.
    pub ssh_key: String,
    /// Slot name the box is addressed by.
    pub box_name: String,
    /// Base service URL the container reports back to.
    pub base_url: String,
    /// Bandwidth ceiling in kbit/s, from the owner's plan.
    pub bandwidth: String,
    /// Session length in minutes.
    pub session_minutes: String,
}

/// A reference to an allocation of a dispatched job.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AllocationStub {
    /// Allocation identifier.
    pub id: String,
}

/// A dynamically assigned port inside an allocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortMapping {
    /// Port label from the job specification (e.g. "ssh").
    pub label: String,
    /// Assigned host port.
    pub value: u16,
}

/// The placement details of a job allocation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Allocation {
    /// Allocation identifier.
    pub id: String,
    /// Identifier of the node the allocation landed on.
    pub node_id: String,
    /// Dynamically assigned ports of the allocation.
    pub dynamic_ports: Vec<PortMapping>,
}

impl Allocation {
    /// Find the assigned port carrying the given label.
    pub fn port_labeled(&self, label: &str) -> Option<u16> {
        self.dynamic_ports
            .iter()
            .find(|p| p.label == label)
            .map(|p| p.value)
    }
}

/// A worker node known to the scheduler.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeInfo {
    /// Node identifier.
    pub id: String,
    /// Network address of the node.
    pub address: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_port_labeled() {
        let alloc = Allocation {
            id: "a1".into(),
            node_id: "n1".into(),
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
        };
        assert_eq!(alloc.port_labeled("ssh"), Some(22022));
        assert_eq!(alloc.port_labeled("dns"), None);
    }
}
