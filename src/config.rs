//! Configuration types for docker-dns.

use hickory_proto::rr::Name;
use serde::{Deserialize, Serialize};
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;

use crate::error::DnsError;

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// DNS server configuration.
    #[serde(default)]
    pub dns: DnsConfig,

    /// Docker API configuration.
    #[serde(default)]
    pub docker: DockerConfig,

    /// Telemetry configuration.
    #[serde(default)]
    pub telemetry: TelemetryConfig,
}

/// DNS server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DnsConfig {
    /// Address for the UDP listener.
    #[serde(default = "default_listen_addr")]
    pub listen_addr: IpAddr,

    /// UDP port to listen on.
    #[serde(default = "default_port")]
    pub port: u16,

    /// Zone this server is authoritative for (e.g. "docker.").
    /// A missing trailing dot is added.
    #[serde(default = "default_zone")]
    pub zone: String,

    /// TTL for A records in seconds.
    #[serde(default = "default_ttl")]
    pub ttl: u32,

    /// Reply sent when the container inventory cannot be read.
    #[serde(default)]
    pub failure_response: FailureResponse,
}

/// How a reply signals that resolving a question failed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FailureResponse {
    /// NOERROR with no answers for the failed question.
    #[default]
    Empty,
    /// SERVFAIL response code; answers for other questions are kept.
    Servfail,
}

impl DnsConfig {
    /// Socket address of the UDP listener.
    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.listen_addr, self.port)
    }

    /// The zone as a fully-qualified string with a single trailing dot.
    pub fn zone_fqdn(&self) -> Result<String, DnsError> {
        let zone = self.zone.trim().trim_start_matches('.');
        let zone = zone.trim_end_matches('.');
        if zone.is_empty() {
            return Err(DnsError::Config("dns.zone must not be empty".to_string()));
        }
        Ok(format!("{zone}."))
    }

    /// The zone parsed as a DNS name.
    pub fn zone_name(&self) -> Result<Name, DnsError> {
        let fqdn = self.zone_fqdn()?;
        Name::from_ascii(&fqdn)
            .map_err(|e| DnsError::Config(format!("invalid dns.zone {:?}: {}", self.zone, e)))
    }
}

impl Default for DnsConfig {
    fn default() -> Self {
        Self {
            listen_addr: default_listen_addr(),
            port: default_port(),
            zone: default_zone(),
            ttl: default_ttl(),
            failure_response: FailureResponse::default(),
        }
    }
}

/// Docker API configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DockerConfig {
    /// Unix socket of the Docker engine API.
    #[serde(default = "default_socket_path")]
    pub socket_path: PathBuf,

    /// Upper bound for one container listing request, in milliseconds.
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
}

impl DockerConfig {
    /// Request timeout as a `Duration`.
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

impl Default for DockerConfig {
    fn default() -> Self {
        Self {
            socket_path: default_socket_path(),
            request_timeout_ms: default_request_timeout_ms(),
        }
    }
}

/// Telemetry configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelemetryConfig {
    /// Log level filter (e.g., "info", "debug", "docker_dns=debug,warn").
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Prometheus metrics exporter address.
    #[serde(default)]
    pub prometheus_addr: Option<SocketAddr>,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            prometheus_addr: None,
        }
    }
}

fn default_listen_addr() -> IpAddr {
    IpAddr::V4(Ipv4Addr::UNSPECIFIED)
}

fn default_port() -> u16 {
    5354
}

fn default_zone() -> String {
    "docker.".to_string()
}

fn default_ttl() -> u32 {
    60
}

fn default_socket_path() -> PathBuf {
    PathBuf::from("/var/run/docker.sock")
}

fn default_request_timeout_ms() -> u64 {
    2000
}

fn default_log_level() -> String {
    "info".to_string()
}
