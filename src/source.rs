//! Where resolution tables come from.
//!
//! The query handler only sees [`ResolutionSource`]. [`DockerSource`]
//! fetches and maps the full container listing on every call; nothing is
//! cached between calls.

use async_trait::async_trait;
use std::sync::Arc;

use crate::config::Config;
use crate::docker::DockerClient;
use crate::error::DnsError;
use crate::names::{build_resolution_table, ResolutionTable};

/// Produces the current domain -> addresses table.
#[async_trait]
pub trait ResolutionSource: Send + Sync + 'static {
    /// Build a table reflecting the current inventory.
    async fn resolution_table(&self) -> Result<ResolutionTable, DnsError>;
}

#[async_trait]
impl<T: ResolutionSource + ?Sized> ResolutionSource for Arc<T> {
    async fn resolution_table(&self) -> Result<ResolutionTable, DnsError> {
        (**self).resolution_table().await
    }
}

/// Resolution source backed by the Docker engine API.
#[derive(Debug, Clone)]
pub struct DockerSource {
    client: DockerClient,
    zone: String,
}

impl DockerSource {
    /// Create a source from the full configuration.
    pub fn new(config: &Config) -> Result<Self, DnsError> {
        Ok(Self::with_client(
            DockerClient::new(&config.docker),
            config.dns.zone_fqdn()?,
        ))
    }

    /// Create a source using an existing client. `zone` must be
    /// fully-qualified (e.g. "docker.").
    pub fn with_client(client: DockerClient, zone: impl Into<String>) -> Self {
        Self {
            client,
            zone: zone.into(),
        }
    }
}

#[async_trait]
impl ResolutionSource for DockerSource {
    async fn resolution_table(&self) -> Result<ResolutionTable, DnsError> {
        let containers = self.client.list_containers().await?;
        Ok(build_resolution_table(&containers, &self.zone))
    }
}
