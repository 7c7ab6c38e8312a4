//! Service discovery for the cluster scheduler.
//!
//! The scheduler address is resolved on every client operation so a
//! scheduler failover does not pin requests to a dead node.

use async_trait::async_trait;
use tokio::net::lookup_host;

use shellbox_core::error::AppError;
use shellbox_core::result::AppResult;

/// Resolves a service name to a network address.
#[async_trait]
pub trait ServiceDiscovery: Send + Sync + 'static {
    /// Resolve the address of the named service.
    async fn discover(&self, service: &str) -> AppResult<String>;
}

/// DNS-based discovery: resolves `service` through the system resolver.
#[derive(Debug, Clone)]
pub struct DnsDiscovery {
    /// Port appended to the service name for the lookup.
    port: u16,
}

impl DnsDiscovery {
    /// Create a DNS discovery resolving against the given port.
    pub fn new(port: u16) -> Self {
        Self { port }
    }
}

#[async_trait]
impl ServiceDiscovery for DnsDiscovery {
    async fn discover(&self, service: &str) -> AppResult<String> {
        let mut addrs = lookup_host((service, self.port)).await.map_err(|e| {
            AppError::with_source(
                shellbox_core::ErrorKind::Scheduler,
                format!("Failed to resolve service '{service}': {e}"),
                e,
            )
        })?;

        addrs
            .next()
            .map(|addr| addr.ip().to_string())
            .ok_or_else(|| {
                AppError::scheduler(format!("Service '{service}' resolved to no addresses"))
            })
    }
}

/// Fixed-address discovery for development and tests.
#[derive(Debug, Clone)]
pub struct StaticDiscovery {
    address: String,
}

impl StaticDiscovery {
    /// Create a discovery that always returns `address`.
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
        }
    }
}

#[async_trait]
impl ServiceDiscovery for StaticDiscovery {
    async fn discover(&self, _service: &str) -> AppResult<String> {
        Ok(self.address.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_static_discovery() {
        let discovery = StaticDiscovery::new("10.0.0.5");
        assert_eq!(discovery.discover("nomad").await.unwrap(), "10.0.0.5");
    }
}
