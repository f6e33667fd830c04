//! Shared test infrastructure for docker-dns integration tests.

#![allow(dead_code)]

use std::net::Ipv4Addr;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use hickory_proto::op::{Message, MessageType, OpCode, Query, ResponseCode};
use hickory_proto::rr::{DNSClass, Name, RData, RecordType};
use tempfile::TempDir;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::UnixListener;

use docker_dns::docker::{Container, Endpoint, NetworkSettings};
use docker_dns::names::{build_resolution_table, ResolutionTable};
use docker_dns::{DnsConfig, DnsError, DockerConfig, QueryHandler, ResolutionSource};

// --- Constants ---

pub const ZONE: &str = "docker.";

// --- Config builders ---

pub fn test_dns_config() -> DnsConfig {
    DnsConfig {
        listen_addr: "127.0.0.1".parse().unwrap(),
        port: 0,
        ..DnsConfig::default()
    }
}

pub fn test_docker_config(socket_path: PathBuf) -> DockerConfig {
    DockerConfig {
        socket_path,
        request_timeout_ms: 1000,
    }
}

// --- Inventory builders ---

/// Build a container with the given names and `(network, ip)` memberships.
pub fn container(names: &[&str], networks: &[(&str, &str)]) -> Container {
    Container {
        id: format!("id-{}", names.first().copied().unwrap_or("unnamed")),
        names: names.iter().map(|n| n.to_string()).collect(),
        network_settings: NetworkSettings {
            networks: networks
                .iter()
                .map(|(network, ip)| {
                    (
                        network.to_string(),
                        Endpoint {
                            ip_address: ip.to_string(),
                        },
                    )
                })
                .collect(),
        },
    }
}

/// The Compose project used throughout the tests: one `web` replica on the
/// project's default network.
pub fn compose_inventory() -> Vec<Container> {
    vec![container(&["/proj-web-1"], &[("proj_default", "10.0.0.5")])]
}

// --- Resolution sources ---

/// Serves a fixed inventory and counts how often it was asked.
pub struct StaticSource {
    containers: Vec<Container>,
    calls: AtomicUsize,
}

impl StaticSource {
    pub fn new(containers: Vec<Container>) -> Arc<Self> {
        Arc::new(Self {
            containers,
            calls: AtomicUsize::new(0),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ResolutionSource for StaticSource {
    async fn resolution_table(&self) -> Result<ResolutionTable, DnsError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(build_resolution_table(&self.containers, ZONE))
    }
}

/// Always fails as if the Docker socket did not answer.
pub struct FailingSource;

#[async_trait]
impl ResolutionSource for FailingSource {
    async fn resolution_table(&self) -> Result<ResolutionTable, DnsError> {
        Err(DnsError::Timeout(Duration::from_millis(1)))
    }
}

pub fn handler_for(containers: Vec<Container>) -> QueryHandler<Arc<StaticSource>> {
    QueryHandler::new(&test_dns_config(), StaticSource::new(containers))
        .expect("failed to create QueryHandler")
}

// --- Query construction ---

pub fn build_query(name: &str, record_type: RecordType, id: u16) -> Message {
    build_multi_query(&[(name, record_type)], id)
}

pub fn build_multi_query(questions: &[(&str, RecordType)], id: u16) -> Message {
    let mut msg = Message::new();
    msg.set_id(id);
    msg.set_message_type(MessageType::Query);
    msg.set_op_code(OpCode::Query);
    msg.set_recursion_desired(true);
    for (name, record_type) in questions {
        let mut query = Query::new();
        query.set_name(Name::from_ascii(name).unwrap());
        query.set_query_type(*record_type);
        query.set_query_class(DNSClass::IN);
        msg.add_query(query);
    }
    msg
}

pub fn build_query_bytes(name: &str, record_type: RecordType, id: u16) -> Vec<u8> {
    build_query(name, record_type, id).to_vec().unwrap()
}

// --- Response helpers ---

/// Extract A addresses from a response.
pub fn extract_a_ips(msg: &Message) -> Vec<Ipv4Addr> {
    msg.answers()
        .iter()
        .filter_map(|r| match r.data() {
            RData::A(a) => Some(Ipv4Addr::from(*a)),
            _ => None,
        })
        .collect()
}

/// Assert response code.
pub fn assert_response_code(msg: &Message, expected: ResponseCode) {
    assert_eq!(
        msg.response_code(),
        expected,
        "expected {:?}, got {:?}",
        expected,
        msg.response_code()
    );
}

/// Assert response is successful with exactly the expected IPs.
pub fn assert_a_response(msg: &Message, expected_ips: &[Ipv4Addr]) {
    assert_response_code(msg, ResponseCode::NoError);
    let mut actual = extract_a_ips(msg);
    actual.sort();
    let mut expected: Vec<Ipv4Addr> = expected_ips.to_vec();
    expected.sort();
    assert_eq!(
        actual, expected,
        "A records mismatch.\nactual:   {:?}\nexpected: {:?}",
        actual, expected
    );
}

// --- Fake Docker engine ---

/// Minimal HTTP server on a Unix socket standing in for the Docker engine.
pub struct FakeDocker {
    _dir: TempDir,
    socket_path: PathBuf,
    requests: Arc<Mutex<Vec<String>>>,
}

impl FakeDocker {
    /// Answer every request with `status` (e.g. "200 OK") and `body`.
    pub async fn respond(status: &str, body: &str) -> Self {
        let response = format!(
            "HTTP/1.1 {status}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
            body.len()
        );
        Self::start(Some(response)).await
    }

    /// Accept connections and read requests, but never answer.
    pub async fn hanging() -> Self {
        Self::start(None).await
    }

    async fn start(response: Option<String>) -> Self {
        let dir = tempfile::tempdir().expect("failed to create temp dir");
        let socket_path = dir.path().join("docker.sock");
        let listener = UnixListener::bind(&socket_path).expect("failed to bind fake socket");
        let requests = Arc::new(Mutex::new(Vec::new()));

        let response = response.map(Arc::new);
        let seen = requests.clone();
        tokio::spawn(async move {
            while let Ok((mut stream, _)) = listener.accept().await {
                let response = response.clone();
                let seen = seen.clone();
                tokio::spawn(async move {
                    let mut buf = Vec::new();
                    let mut chunk = [0u8; 1024];
                    loop {
                        let n = match stream.read(&mut chunk).await {
                            Ok(0) | Err(_) => return,
                            Ok(n) => n,
                        };
                        buf.extend_from_slice(&chunk[..n]);
                        if buf.windows(4).any(|w| w == b"\r\n\r\n") {
                            break;
                        }
                    }
                    seen.lock()
                        .unwrap()
                        .push(String::from_utf8_lossy(&buf).into_owned());

                    match response {
                        Some(response) => {
                            let _ = stream.write_all(response.as_bytes()).await;
                            let _ = stream.shutdown().await;
                        }
                        None => std::future::pending::<()>().await,
                    }
                });
            }
        });

        Self {
            _dir: dir,
            socket_path,
            requests,
        }
    }

    pub fn socket_path(&self) -> PathBuf {
        self.socket_path.clone()
    }

    /// Raw request heads received so far.
    pub fn requests(&self) -> Vec<String> {
        self.requests.lock().unwrap().clone()
    }
}

/// JSON listing in the shape returned by `GET /containers/json`.
pub const COMPOSE_LISTING: &str = r#"[
  {
    "Id": "8dfafdbc3a40",
    "Names": ["/proj-web-1"],
    "Image": "nginx:latest",
    "Command": "nginx -g 'daemon off;'",
    "State": "running",
    "Status": "Up 2 minutes",
    "Ports": [{"PrivatePort": 80, "Type": "tcp"}],
    "Labels": {"com.docker.compose.project": "proj"},
    "HostConfig": {"NetworkMode": "proj_default"},
    "NetworkSettings": {
      "Networks": {
        "proj_default": {
          "NetworkID": "7ea29fc1412292a2d7bba362f9253545fecdfa8ce9a6e37dd10ba8bee7129812",
          "Gateway": "10.0.0.1",
          "IPAddress": "10.0.0.5",
          "IPPrefixLen": 24,
          "MacAddress": "02:42:0a:00:00:05"
        }
      }
    }
  },
  {
    "Id": "9cd87474be90",
    "Names": ["/db"],
    "State": "running",
    "NetworkSettings": {
      "Networks": {
        "bridge": {"IPAddress": "172.17.0.2"}
      }
    }
  }
]"#;
