//! Error types for docker-dns.

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Errors that can occur in the DNS server.
#[derive(Debug, Error)]
pub enum DnsError {
    /// IO error (socket bind, send, etc.)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Could not connect to the Docker socket
    #[error("failed to connect to Docker socket {}: {source}", path.display())]
    Connect {
        /// Socket path that was dialled.
        path: PathBuf,
        /// Underlying connect error.
        #[source]
        source: std::io::Error,
    },

    /// HTTP exchange with the Docker API failed
    #[error("Docker API HTTP error: {0}")]
    Http(#[from] hyper::Error),

    /// Request to the Docker API could not be built
    #[error("invalid Docker API request: {0}")]
    Request(#[from] http::Error),

    /// Docker API answered with a non-success status
    #[error("Docker API returned status {0}")]
    UpstreamStatus(http::StatusCode),

    /// Container listing was not the expected JSON shape
    #[error("failed to decode container listing: {0}")]
    Decode(#[from] serde_json::Error),

    /// Docker API did not answer in time
    #[error("Docker API request timed out after {0:?}")]
    Timeout(Duration),

    /// Container reported without any name
    #[error("container {id:?} has no names")]
    EmptyName {
        /// Container id as reported by Docker (may be empty).
        id: String,
    },

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// DNS protocol error
    #[error("DNS protocol error: {0}")]
    Proto(#[from] hickory_proto::ProtoError),
}

impl DnsError {
    /// Whether this error came from talking to the Docker API (transport,
    /// status, decode or timeout), as opposed to local failures.
    pub fn is_upstream(&self) -> bool {
        matches!(
            self,
            DnsError::Connect { .. }
                | DnsError::Http(_)
                | DnsError::Request(_)
                | DnsError::UpstreamStatus(_)
                | DnsError::Decode(_)
                | DnsError::Timeout(_)
        )
    }
}
