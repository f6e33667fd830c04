//! Metrics instrumentation for docker-dns.
//!
//! All metrics are prefixed with `docker_dns.`

use metrics::{counter, gauge, histogram};
use std::time::Instant;

/// Record the outcome of one question.
pub fn record_question(result: QuestionResult, duration: std::time::Duration) {
    let result_str = match result {
        QuestionResult::Answered => "answered",
        QuestionResult::NotFound => "not_found",
        QuestionResult::Skipped => "skipped",
        QuestionResult::Failed => "failed",
    };

    counter!("docker_dns.question.count", "result" => result_str).increment(1);
    histogram!("docker_dns.question.duration.seconds", "result" => result_str)
        .record(duration.as_secs_f64());
}

/// Question result type for metrics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuestionResult {
    /// At least one A record returned.
    Answered,
    /// Looked up, but no container maps to the name.
    NotFound,
    /// Not looked up (op code, record type or zone).
    Skipped,
    /// Inventory could not be read.
    Failed,
}

/// Record a reply sent with the given response code.
pub fn record_reply(response_code: &'static str) {
    counter!("docker_dns.reply.count", "rcode" => response_code).increment(1);
}

/// Record a datagram that could not be decoded as a DNS message.
pub fn record_malformed_request() {
    counter!("docker_dns.request.malformed.count").increment(1);
}

/// Record one container listing fetch.
pub fn record_inventory_fetch(result: FetchResult, duration: std::time::Duration) {
    let result_str = match result {
        FetchResult::Success => "success",
        FetchResult::TransportError => "transport_error",
        FetchResult::DecodeError => "decode_error",
        FetchResult::Timeout => "timeout",
    };

    counter!("docker_dns.inventory.fetch.count", "result" => result_str).increment(1);
    histogram!("docker_dns.inventory.fetch.duration.seconds").record(duration.as_secs_f64());
}

/// Container listing fetch result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchResult {
    /// Listing fetched and decoded.
    Success,
    /// Socket, HTTP or status failure.
    TransportError,
    /// Body was not the expected JSON.
    DecodeError,
    /// No answer within the request timeout.
    Timeout,
}

/// Record the number of containers in the last listing.
pub fn record_containers(count: usize) {
    gauge!("docker_dns.inventory.containers").set(count as f64);
}

/// Record the number of domains in the last resolution table.
pub fn record_domains(count: usize) {
    gauge!("docker_dns.inventory.domains").set(count as f64);
}

/// Record a container that could not be mapped to any name.
pub fn record_container_skipped() {
    counter!("docker_dns.inventory.container_skipped.count").increment(1);
}

/// Record A records returned for an answered question.
pub fn record_answers_returned(count: usize) {
    histogram!("docker_dns.question.answers_returned").record(count as f64);
}

/// Helper for timing operations.
pub struct Timer {
    start: Instant,
}

impl Timer {
    /// Start a new timer.
    pub fn start() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    /// Get elapsed duration since timer start.
    pub fn elapsed(&self) -> std::time::Duration {
        self.start.elapsed()
    }
}
