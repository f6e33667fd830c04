//! DNS server setup and lifecycle management.

use hickory_proto::op::{Message, MessageType};
use hickory_proto::rr::RData;
use hickory_proto::serialize::binary::{BinEncodable, BinEncoder};
use hickory_proto::ProtoError;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::UdpSocket;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use crate::config::{Config, DnsConfig};
use crate::error::DnsError;
use crate::handler::QueryHandler;
use crate::metrics;
use crate::source::{DockerSource, ResolutionSource};

/// Largest datagram accepted from a client.
const MAX_DATAGRAM_SIZE: usize = 4096;

/// UDP DNS server answering from a [`ResolutionSource`].
pub struct DnsServer<S> {
    config: DnsConfig,
    handler: Arc<QueryHandler<S>>,
}

impl DnsServer<DockerSource> {
    /// Create a server resolving against the Docker engine API.
    pub fn new(config: Config) -> Result<Self, DnsError> {
        let source = DockerSource::new(&config)?;
        Self::with_source(config.dns, source)
    }
}

impl<S: ResolutionSource> DnsServer<S> {
    /// Create a server with a custom resolution source.
    pub fn with_source(config: DnsConfig, source: S) -> Result<Self, DnsError> {
        let handler = QueryHandler::new(&config, source)?;
        Ok(Self {
            config,
            handler: Arc::new(handler),
        })
    }

    /// Bind the configured address and serve until `shutdown` is cancelled.
    pub async fn run(self, shutdown: CancellationToken) -> Result<(), DnsError> {
        let addr = self.config.socket_addr();
        let socket = UdpSocket::bind(addr).await?;
        info!(addr = %socket.local_addr()?, zone = %self.handler.zone(), "DNS UDP listening");

        self.serve(socket, shutdown).await
    }

    /// Serve queries on an already bound socket until `shutdown` is cancelled.
    ///
    /// Every datagram is handled in its own task. In-flight tasks are not
    /// awaited on shutdown.
    pub async fn serve(self, socket: UdpSocket, shutdown: CancellationToken) -> Result<(), DnsError> {
        let socket = Arc::new(socket);
        let mut buf = vec![0u8; MAX_DATAGRAM_SIZE];

        info!(zone = %self.handler.zone(), "DNS server ready to serve queries");

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    info!("DNS server shutdown requested");
                    break;
                }
                received = socket.recv_from(&mut buf) => {
                    let (len, src) = match received {
                        Ok(received) => received,
                        Err(e) => {
                            // ICMP errors from earlier sends surface here.
                            warn!(error = %e, "UDP receive failed");
                            continue;
                        }
                    };

                    let packet = buf[..len].to_vec();
                    let handler = self.handler.clone();
                    let socket = socket.clone();
                    tokio::spawn(async move {
                        handle_datagram(&handler, &socket, &packet, src).await;
                    });
                }
            }
        }

        info!("DNS server stopped");
        Ok(())
    }
}

async fn handle_datagram<S: ResolutionSource>(
    handler: &QueryHandler<S>,
    socket: &UdpSocket,
    packet: &[u8],
    src: SocketAddr,
) {
    let request = match Message::from_vec(packet) {
        Ok(request) => request,
        Err(e) => {
            debug!(src = %src, error = %e, "dropping malformed request");
            metrics::record_malformed_request();
            return;
        }
    };

    if request.message_type() != MessageType::Query {
        trace!(src = %src, id = request.id(), "ignoring response message");
        return;
    }

    let response = handler.handle(&request).await;

    let bytes = match encode_uncompressed(&response) {
        Ok(bytes) => bytes,
        Err(e) => {
            warn!(src = %src, id = response.id(), error = %e, "failed to encode response");
            return;
        }
    };

    if let Err(e) = socket.send_to(&bytes, src).await {
        warn!(src = %src, error = %e, "failed to send response");
    }
}

/// Encode a reply without name compression, preserving the case of every
/// name. Only the header, question and A answer sections are written.
pub fn encode_uncompressed(message: &Message) -> Result<Vec<u8>, DnsError> {
    let mut buf = Vec::with_capacity(512);
    let mut encoder = BinEncoder::new(&mut buf);

    let mut header = *message.header();
    header
        .set_query_count(message.queries().len() as u16)
        .set_answer_count(message.answers().len() as u16)
        .set_name_server_count(0)
        .set_additional_count(0);
    header.emit(&mut encoder)?;

    for query in message.queries() {
        query.name().emit_as_canonical(&mut encoder, true)?;
        encoder.emit_u16(query.query_type().into())?;
        encoder.emit_u16(query.query_class().into())?;
    }

    for record in message.answers() {
        let RData::A(a) = record.data() else {
            return Err(ProtoError::from("only A records can be encoded").into());
        };
        record.name().emit_as_canonical(&mut encoder, true)?;
        encoder.emit_u16(record.record_type().into())?;
        encoder.emit_u16(record.dns_class().into())?;
        encoder.emit_u32(record.ttl())?;
        encoder.emit_u16(4)?;
        encoder.emit_vec(&a.0.octets())?;
    }

    Ok(buf)
}

#[cfg(test)]
mod tests {
    use super::*;
    use hickory_proto::op::{OpCode, Query};
    use hickory_proto::rr::rdata::{A, TXT};
    use hickory_proto::rr::{Name, Record, RecordType};
    use std::net::Ipv4Addr;

    fn count_occurrences(haystack: &[u8], needle: &[u8]) -> usize {
        haystack
            .windows(needle.len())
            .filter(|window| *window == needle)
            .count()
    }

    #[test]
    fn test_encode_uncompressed_repeats_names() {
        let name = Name::from_ascii("web.docker.").unwrap();
        let mut msg = Message::new();
        msg.set_id(7)
            .set_message_type(MessageType::Response)
            .set_op_code(OpCode::Query)
            .add_query(Query::query(name.clone(), RecordType::A));
        for last in [5, 6] {
            msg.add_answer(Record::from_rdata(
                name.clone(),
                60,
                RData::A(A::from(Ipv4Addr::new(10, 0, 0, last))),
            ));
        }

        let bytes = encode_uncompressed(&msg).unwrap();

        // Question plus two answers, each spelling the full name.
        assert_eq!(count_occurrences(&bytes, b"\x03web\x06docker\x00"), 3);

        let decoded = Message::from_vec(&bytes).unwrap();
        assert_eq!(decoded.id(), 7);
        assert_eq!(decoded.message_type(), MessageType::Response);
        assert_eq!(decoded.queries(), msg.queries());
        assert_eq!(decoded.answers().len(), 2);
        assert_eq!(decoded.answers()[1].data(), &RData::A(A::from(Ipv4Addr::new(10, 0, 0, 6))));
    }

    #[test]
    fn test_encode_uncompressed_preserves_case() {
        let name = Name::from_ascii("Web.Docker.").unwrap();
        let mut msg = Message::new();
        msg.set_message_type(MessageType::Response)
            .add_query(Query::query(name, RecordType::A));

        let bytes = encode_uncompressed(&msg).unwrap();
        assert_eq!(count_occurrences(&bytes, b"\x03Web\x06Docker\x00"), 1);
    }

    #[test]
    fn test_encode_uncompressed_rejects_other_records() {
        let name = Name::from_ascii("web.docker.").unwrap();
        let mut msg = Message::new();
        msg.add_answer(Record::from_rdata(
            name,
            60,
            RData::TXT(TXT::new(vec!["hello".to_string()])),
        ));

        assert!(matches!(encode_uncompressed(&msg), Err(DnsError::Proto(_))));
    }
}
