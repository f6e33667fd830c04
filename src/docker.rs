//! Docker engine API client.
//!
//! Lists running containers over the engine's local Unix socket. Only the
//! fields needed for name resolution are decoded; everything else in the
//! listing is ignored.

use bytes::Bytes;
use http::{header, Method, Request};
use http_body_util::{BodyExt, Empty};
use hyper_util::rt::TokioIo;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;
use tokio::net::UnixStream;
use tracing::{debug, trace};

use crate::config::DockerConfig;
use crate::error::DnsError;
use crate::metrics::{self, FetchResult, Timer};

/// Path of the container listing endpoint.
const CONTAINERS_PATH: &str = "/containers/json";

/// A running container as reported by `GET /containers/json`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Container {
    /// Container id.
    #[serde(rename = "Id", default)]
    pub id: String,

    /// Container names, each with a leading `/`. Only the first is used.
    #[serde(rename = "Names", default)]
    pub names: Vec<String>,

    /// Network attachments.
    #[serde(rename = "NetworkSettings", default)]
    pub network_settings: NetworkSettings,
}

/// Network settings of a container.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NetworkSettings {
    /// Network name -> endpoint on that network.
    #[serde(rename = "Networks", default)]
    pub networks: BTreeMap<String, Endpoint>,
}

/// A container's endpoint on one network.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Endpoint {
    /// IPv4 address on the network; empty when none is assigned.
    #[serde(rename = "IPAddress", default)]
    pub ip_address: String,
}

impl Container {
    /// The first declared name, if any.
    pub fn primary_name(&self) -> Option<&str> {
        self.names.first().map(String::as_str)
    }

    /// `(network name, ip address)` pairs for every attached network.
    pub fn memberships(&self) -> impl Iterator<Item = (&str, &str)> {
        self.network_settings
            .networks
            .iter()
            .map(|(network, endpoint)| (network.as_str(), endpoint.ip_address.as_str()))
    }
}

/// Client for the Docker engine API on a Unix socket.
#[derive(Debug, Clone)]
pub struct DockerClient {
    socket_path: PathBuf,
    timeout: Duration,
}

impl DockerClient {
    /// Create a client for the given configuration.
    pub fn new(config: &DockerConfig) -> Self {
        Self {
            socket_path: config.socket_path.clone(),
            timeout: config.request_timeout(),
        }
    }

    /// Fetch and decode the current container listing.
    ///
    /// Opens a fresh connection for every call. The whole exchange is bounded
    /// by the configured request timeout.
    pub async fn list_containers(&self) -> Result<Vec<Container>, DnsError> {
        let timer = Timer::start();

        let result = match tokio::time::timeout(self.timeout, self.fetch_listing()).await {
            Ok(result) => result,
            Err(_) => Err(DnsError::Timeout(self.timeout)),
        };

        let fetch_result = match &result {
            Ok(_) => FetchResult::Success,
            Err(DnsError::Decode(_)) => FetchResult::DecodeError,
            Err(DnsError::Timeout(_)) => FetchResult::Timeout,
            Err(_) => FetchResult::TransportError,
        };
        metrics::record_inventory_fetch(fetch_result, timer.elapsed());

        let containers = result?;
        debug!(
            socket = %self.socket_path.display(),
            containers = containers.len(),
            "fetched container listing"
        );
        metrics::record_containers(containers.len());
        Ok(containers)
    }

    async fn fetch_listing(&self) -> Result<Vec<Container>, DnsError> {
        let stream = UnixStream::connect(&self.socket_path)
            .await
            .map_err(|source| DnsError::Connect {
                path: self.socket_path.clone(),
                source,
            })?;

        let (mut sender, connection) =
            hyper::client::conn::http1::handshake(TokioIo::new(stream)).await?;
        tokio::spawn(async move {
            if let Err(e) = connection.await {
                trace!(error = %e, "Docker API connection closed with error");
            }
        });

        let request = Request::builder()
            .method(Method::GET)
            .uri(CONTAINERS_PATH)
            .header(header::HOST, "localhost")
            .body(Empty::<Bytes>::new())?;

        let response = sender.send_request(request).await?;
        let status = response.status();
        let body = response.into_body().collect().await?.to_bytes();

        if !status.is_success() {
            return Err(DnsError::UpstreamStatus(status));
        }

        decode_containers(&body)
    }
}

/// Decode a `/containers/json` response body.
pub fn decode_containers(body: &[u8]) -> Result<Vec<Container>, DnsError> {
    Ok(serde_json::from_slice(body)?)
}
