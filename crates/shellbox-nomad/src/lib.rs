//! # shellbox-nomad
//!
//! Everything that talks to the cluster scheduler: the HTTP client
//! implementing [`shellbox_core::traits::SchedulerClient`] against the
//! Nomad v1 API, service discovery for the scheduler address, and the
//! [`launcher::BoxLauncher`] that drives dispatch, readiness polling, and
//! endpoint resolution for a single box.

pub mod client;
pub mod discovery;
pub mod launcher;

pub use client::NomadClient;
pub use discovery::{DnsDiscovery, ServiceDiscovery, StaticDiscovery};
pub use launcher::BoxLauncher;
