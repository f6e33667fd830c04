//! Docker DNS - An authoritative DNS server backed by the local Docker engine.
//!
//! This crate answers A queries for a single zone (`docker.` by default) by
//! reading the container listing from the Docker engine API on every query.
//! There is no cache: a name resolves as soon as the container is running and
//! stops resolving as soon as it is gone.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                         docker-dns                           │
//! │                                                              │
//! │  UDP :5354 ──▶ ┌──────────────┐   per A question            │
//! │                │ QueryHandler │──────────────┐               │
//! │  ◀── reply ─── └──────────────┘              ▼               │
//! │                                     ┌──────────────────┐     │
//! │                                     │  DockerSource    │     │
//! │                                     │  fetch + map     │     │
//! │                                     └────────┬─────────┘     │
//! │                                              │ GET /containers/json
//! │                                              ▼               │
//! │                                  /var/run/docker.sock        │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Name Mapping
//!
//! ```text
//! /myproject-web-1 on myproject_default
//!   → web-1.myproject.docker.  web.myproject.docker.
//!   → web-1.docker.            web.docker.
//! /db on bridge
//!   → db.docker.
//! ```
//!
//! ## Example Usage
//!
//! ```rust,ignore
//! use docker_dns::{Config, DnsServer};
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main]
//! async fn main() {
//!     let config = Config::default();
//!     let shutdown = CancellationToken::new();
//!
//!     let server = DnsServer::new(config).unwrap();
//!     server.run(shutdown).await.unwrap();
//! }
//! ```

#![warn(missing_docs)]

pub mod config;
pub mod docker;
pub mod error;
pub mod handler;
pub mod metrics;
pub mod names;
pub mod server;
pub mod source;
pub mod telemetry;

// Re-export main types
pub use config::{Config, DnsConfig, DockerConfig, FailureResponse, TelemetryConfig};
pub use error::DnsError;
pub use handler::{QueryHandler, QuestionOutcome, SkipReason};
pub use names::ResolutionTable;
pub use server::DnsServer;
pub use source::{DockerSource, ResolutionSource};
