//! Mapping from the container inventory to domain names.
//!
//! Container and network names are normalized so the common cases stay
//! short. Given the zone `docker.`:
//!
//! ```text
//! /proj-web-1 on proj_default  -> web-1.proj.docker.   web.proj.docker.
//!                                 web-1.docker.        web.docker.
//! /proj-web-1 on bridge        -> proj-web-1.docker.   proj-web.docker.
//! /cache      on backend       -> cache.backend.docker.
//! ```
//!
//! A Compose project's `<project>_default` network is registered both with
//! its qualifier and without it, since it is the implicit network of every
//! service in the project.
//!
//! The scheme is lossy: several replicas of one service share the
//! suffix-stripped name, and that name collects all of their addresses.

use fancy_regex::Regex;
use std::collections::HashMap;
use std::sync::LazyLock;
use tracing::{debug, warn};

use crate::docker::Container;
use crate::error::DnsError;
use crate::metrics;

/// Suffix Compose appends to a project's implicit network.
const DEFAULT_NETWORK_SUFFIX: &str = "_default";

/// Docker's built-in default network.
const BRIDGE_NETWORK: &str = "bridge";

/// Trailing replica number, e.g. `-3` in `web-3`.
static SEQUENCE_SUFFIX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"-[0-9]+$").expect("sequence suffix pattern is valid"));

/// One `(domain, address)` pair produced from a container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DomainRecord {
    /// Fully-qualified domain name, trailing dot included.
    pub domain: String,
    /// Address as reported by Docker.
    pub ip_address: String,
}

/// Domain name -> addresses, built from one container listing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolutionTable {
    entries: HashMap<String, Vec<String>>,
}

impl ResolutionTable {
    /// Create an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `ip_address` to the addresses of `domain`.
    pub fn insert(&mut self, domain: impl Into<String>, ip_address: impl Into<String>) {
        self.entries
            .entry(domain.into())
            .or_default()
            .push(ip_address.into());
    }

    /// Addresses for an exact domain name. Lookup is case-sensitive and the
    /// trailing dot must match.
    pub fn lookup(&self, domain: &str) -> &[String] {
        self.entries.get(domain).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Iterate over all domain names.
    pub fn domains(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    /// Number of distinct domain names.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the table has no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Extend<DomainRecord> for ResolutionTable {
    fn extend<T: IntoIterator<Item = DomainRecord>>(&mut self, iter: T) {
        for record in iter {
            self.insert(record.domain, record.ip_address);
        }
    }
}

/// Normalize a Docker network name into a domain qualifier.
///
/// `<project>_default` becomes `<project>`, and the default `bridge`
/// network becomes the empty string (no qualifier).
pub fn normalize_network_name(raw: &str) -> String {
    let name = raw.strip_suffix(DEFAULT_NETWORK_SUFFIX).unwrap_or(raw);
    if name == BRIDGE_NETWORK {
        return String::new();
    }
    name.to_string()
}

/// Normalize a container name into one or two host names.
///
/// Compose names containers `/<project>-<service>-<replica>`. The leading
/// `/`, the network qualifier and its separator are stripped; when a replica
/// number remains, the name without it is returned second.
pub fn normalize_host_name(raw: &str, normalized_network: &str) -> Vec<String> {
    let name = raw.strip_prefix('/').unwrap_or(raw);
    let name = name.strip_prefix(normalized_network).unwrap_or(name);
    let name = name.strip_prefix('-').unwrap_or(name);

    let suffix_start = SEQUENCE_SUFFIX
        .find(name)
        .map(|suffix| suffix.map(|m| m.start()));
    host_variants(name, suffix_start)
}

/// `[name]`, plus `name` cut at `suffix_start` when a replica suffix was
/// found. A failed match keeps only the full name.
fn host_variants<E: std::fmt::Display>(name: &str, suffix_start: Result<Option<usize>, E>) -> Vec<String> {
    match suffix_start {
        Ok(Some(start)) => vec![name.to_string(), name[..start].to_string()],
        Ok(None) => vec![name.to_string()],
        Err(e) => {
            debug!(host = %name, error = %e, "replica suffix match failed, keeping full name");
            vec![name.to_string()]
        }
    }
}

/// Whether `raw` names a Compose project's implicit network, whose
/// qualifier is also elided from generated names.
fn is_project_default(raw: &str, normalized: &str) -> bool {
    raw.ends_with(DEFAULT_NETWORK_SUFFIX) && !normalized.is_empty()
}

/// Assemble `<host>[.<network>].<zone>`. `zone` carries its trailing dot.
fn assemble_domain(host: &str, network: &str, zone: &str) -> String {
    if network.is_empty() {
        format!("{host}.{zone}")
    } else {
        format!("{host}.{network}.{zone}")
    }
}

/// Expand one container into domain records, one per network membership and
/// host name variant.
pub fn domain_records(container: &Container, zone: &str) -> Result<Vec<DomainRecord>, DnsError> {
    let name = container.primary_name().ok_or_else(|| DnsError::EmptyName {
        id: container.id.clone(),
    })?;

    let mut records = Vec::new();
    for (network, ip_address) in container.memberships() {
        let qualifier = normalize_network_name(network);
        let elided = is_project_default(network, &qualifier);

        for host in normalize_host_name(name, &qualifier) {
            if host.is_empty() {
                debug!(container = %name, network = %network, "host name normalizes to nothing, skipping");
                continue;
            }
            records.push(DomainRecord {
                domain: assemble_domain(&host, &qualifier, zone),
                ip_address: ip_address.to_string(),
            });
            if elided {
                records.push(DomainRecord {
                    domain: assemble_domain(&host, "", zone),
                    ip_address: ip_address.to_string(),
                });
            }
        }
    }

    Ok(records)
}

/// Build the resolution table for a container listing.
///
/// Containers that cannot be mapped are logged and skipped; the rest of the
/// listing is still processed.
pub fn build_resolution_table(containers: &[Container], zone: &str) -> ResolutionTable {
    let mut table = ResolutionTable::new();

    for container in containers {
        match domain_records(container, zone) {
            Ok(records) => table.extend(records),
            Err(e) => {
                warn!(error = %e, "skipping container");
                metrics::record_container_skipped();
            }
        }
    }

    metrics::record_domains(table.len());
    table
}
