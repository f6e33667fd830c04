//! DNS query handling.
//!
//! Every A question inside the zone is resolved against a freshly built
//! [`ResolutionTable`](crate::names::ResolutionTable). Each question ends in
//! an explicit [`QuestionOutcome`], so the reason behind an empty answer
//! shows up in logs and tests. A reply is always produced.

use hickory_proto::op::{Message, MessageType, OpCode, Query, ResponseCode};
use hickory_proto::rr::rdata::A;
use hickory_proto::rr::{Name, RData, Record, RecordType};
use std::net::Ipv4Addr;
use tracing::{debug, error, trace};

use crate::config::{DnsConfig, FailureResponse};
use crate::error::DnsError;
use crate::metrics::{self, QuestionResult, Timer};
use crate::source::ResolutionSource;

/// Why a question was not looked up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// The request is not a standard query.
    UnsupportedOpCode(OpCode),
    /// Only A questions are answered.
    UnsupportedType(RecordType),
    /// The name is not inside the served zone.
    OutOfZone,
}

/// Result of handling a single question.
#[derive(Debug)]
pub enum QuestionOutcome {
    /// Looked up; empty when no container maps to the name.
    Resolved(Vec<Ipv4Addr>),
    /// Not looked up.
    Skipped(SkipReason),
    /// The inventory could not be read.
    Failed(DnsError),
}

impl QuestionOutcome {
    fn metric(&self) -> QuestionResult {
        match self {
            QuestionOutcome::Resolved(ips) if ips.is_empty() => QuestionResult::NotFound,
            QuestionOutcome::Resolved(_) => QuestionResult::Answered,
            QuestionOutcome::Skipped(_) => QuestionResult::Skipped,
            QuestionOutcome::Failed(_) => QuestionResult::Failed,
        }
    }
}

/// Answers A queries for one zone from a [`ResolutionSource`].
pub struct QueryHandler<S> {
    source: S,
    zone: Name,
    ttl: u32,
    failure_response: FailureResponse,
}

impl<S: ResolutionSource> QueryHandler<S> {
    /// Create a handler for the configured zone.
    pub fn new(config: &DnsConfig, source: S) -> Result<Self, DnsError> {
        Ok(Self {
            source,
            zone: config.zone_name()?,
            ttl: config.ttl,
            failure_response: config.failure_response,
        })
    }

    /// Zone this handler is authoritative for.
    pub fn zone(&self) -> &Name {
        &self.zone
    }

    /// Build the reply for a request.
    ///
    /// Requests whose first question lies outside the zone (or that carry no
    /// question) are refused. Otherwise the reply carries one A record per
    /// resolved address, and NOERROR unless a lookup failed and the handler
    /// is configured to answer failures with SERVFAIL.
    pub async fn handle(&self, request: &Message) -> Message {
        let mut response = reply_to(request);

        if !self.is_routed(request) {
            debug!(id = request.id(), "request not for this zone, refusing");
            response.set_response_code(ResponseCode::Refused);
            metrics::record_reply("refused");
            return response;
        }

        let outcomes = self.resolve(request).await;

        let mut failed = false;
        for (query, outcome) in request.queries().iter().zip(&outcomes) {
            match outcome {
                QuestionOutcome::Resolved(ips) => {
                    for ip in ips {
                        response.add_answer(self.a_record(query, *ip));
                    }
                }
                QuestionOutcome::Skipped(_) => {}
                QuestionOutcome::Failed(_) => failed = true,
            }
        }

        if failed && self.failure_response == FailureResponse::Servfail {
            response.set_response_code(ResponseCode::ServFail);
            metrics::record_reply("servfail");
        } else {
            metrics::record_reply("noerror");
        }

        response
    }

    /// Resolve every question of a request, in order.
    ///
    /// The table is rebuilt for each A question; nothing is shared between
    /// questions.
    pub async fn resolve(&self, request: &Message) -> Vec<QuestionOutcome> {
        let mut outcomes = Vec::with_capacity(request.queries().len());

        for query in request.queries() {
            let timer = Timer::start();
            let outcome = self.resolve_question(request.op_code(), query).await;

            match &outcome {
                QuestionOutcome::Resolved(ips) if ips.is_empty() => {
                    debug!(name = %query.name(), "A lookup: no records found");
                }
                QuestionOutcome::Resolved(ips) => {
                    debug!(name = %query.name(), count = ips.len(), "A lookup: returning records");
                    metrics::record_answers_returned(ips.len());
                }
                QuestionOutcome::Skipped(reason) => {
                    trace!(name = %query.name(), rtype = ?query.query_type(), reason = ?reason, "question skipped");
                }
                QuestionOutcome::Failed(e) => {
                    error!(name = %query.name(), error = %e, "failed to resolve question");
                }
            }
            metrics::record_question(outcome.metric(), timer.elapsed());

            outcomes.push(outcome);
        }

        outcomes
    }

    async fn resolve_question(&self, op_code: OpCode, query: &Query) -> QuestionOutcome {
        if op_code != OpCode::Query {
            return QuestionOutcome::Skipped(SkipReason::UnsupportedOpCode(op_code));
        }
        if query.query_type() != RecordType::A {
            return QuestionOutcome::Skipped(SkipReason::UnsupportedType(query.query_type()));
        }
        if !self.zone.zone_of(query.name()) {
            return QuestionOutcome::Skipped(SkipReason::OutOfZone);
        }

        let table = match self.source.resolution_table().await {
            Ok(table) => table,
            Err(e) => return QuestionOutcome::Failed(e),
        };

        let name = lookup_key(query.name());
        QuestionOutcome::Resolved(parse_addresses(&name, table.lookup(&name)))
    }

    fn is_routed(&self, request: &Message) -> bool {
        request
            .queries()
            .first()
            .is_some_and(|query| self.zone.zone_of(query.name()))
    }

    fn a_record(&self, query: &Query, ip: Ipv4Addr) -> Record {
        let mut record = Record::from_rdata(query.name().clone(), self.ttl, RData::A(A::from(ip)));
        record.set_dns_class(query.query_class());
        record
    }
}

/// Start a reply mirroring the request's id, op code, flags and questions.
fn reply_to(request: &Message) -> Message {
    let mut response = Message::new();
    response
        .set_id(request.id())
        .set_message_type(MessageType::Response)
        .set_op_code(request.op_code())
        .set_authoritative(true)
        .set_recursion_desired(request.recursion_desired())
        .set_checking_disabled(request.checking_disabled())
        .add_queries(request.queries().iter().cloned());
    response
}

/// Table key for a question name: the raw labels joined with `.`, trailing
/// dot included. Unlike `Name::to_ascii` nothing is escaped, so a label
/// such as `-web` matches the key built from the container name.
fn lookup_key(name: &Name) -> String {
    let mut key = String::new();
    for label in name.iter() {
        key.push_str(&String::from_utf8_lossy(label));
        key.push('.');
    }
    if key.is_empty() {
        key.push('.');
    }
    key
}

/// Parse the IPv4 addresses stored for `name`, dropping anything else
/// (Docker reports an empty address for endpoints without IPv4).
fn parse_addresses(name: &str, addresses: &[String]) -> Vec<Ipv4Addr> {
    addresses
        .iter()
        .filter_map(|raw| match raw.parse::<Ipv4Addr>() {
            Ok(ip) => Some(ip),
            Err(_) => {
                debug!(name = %name, address = %raw, "ignoring non-IPv4 address");
                None
            }
        })
        .collect()
}
