//! DNS resolution for mail delivery.
//!
//! MX lookup with A-record fallback per RFC 5321 section 5.1. The queries
//! themselves sit behind [`DnsLookup`] so the candidate-list rules can be
//! exercised without a network.

use std::{net::Ipv4Addr, sync::Arc, time::Duration};

use async_trait::async_trait;
use hickory_resolver::{
    TokioResolver, config::ResolverOpts, name_server::TokioConnectionProvider,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

/// Errors that can occur during DNS resolution.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DnsError {
    /// Neither MX nor A records gave a usable host.
    #[error("No mail servers found for domain: {0}")]
    NoMailServers(String),

    /// The domain publishes a null MX (RFC 7505) and accepts no mail.
    #[error("Domain does not accept mail (null MX): {0}")]
    NullMx(String),

    /// A single query failed due to network or resolver issues.
    #[error("DNS lookup failed for {domain}: {reason}")]
    LookupFailed { domain: String, reason: String },

    /// The system resolver could not be set up.
    #[error("Failed to initialise DNS resolver: {0}")]
    Init(String),
}

/// Configuration for DNS resolver.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct DnsConfig {
    /// DNS query timeout in seconds (default: 5)
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Attempts per query before giving up (default: 2)
    #[serde(default = "default_attempts")]
    pub attempts: usize,
}

const fn default_timeout_secs() -> u64 {
    5
}

const fn default_attempts() -> usize {
    2
}

impl Default for DnsConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
            attempts: default_attempts(),
        }
    }
}

/// Represents a mail server target with its priority.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MailServer {
    /// The hostname or IP address of the mail server.
    pub host: String,
    /// MX priority (lower value = higher priority). 0 for A fallback.
    pub priority: u16,
    pub port: u16,
}

impl MailServer {
    #[must_use]
    pub fn new(host: impl Into<String>, priority: u16, port: u16) -> Self {
        Self {
            host: host.into(),
            priority,
            port,
        }
    }

    /// Returns the full address as `host:port`, with IPv6 hosts bracketed.
    #[must_use]
    pub fn address(&self) -> String {
        host_port(&self.host, self.port)
    }
}

pub(crate) fn host_port(host: &str, port: u16) -> String {
    if host.contains(':') {
        format!("[{host}]:{port}")
    } else {
        format!("{host}:{port}")
    }
}

/// One MX answer as returned by the resolver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MxRecord {
    pub exchange: String,
    pub preference: u16,
}

impl MxRecord {
    #[must_use]
    pub fn new(exchange: impl Into<String>, preference: u16) -> Self {
        Self {
            exchange: exchange.into(),
            preference,
        }
    }

    /// A null MX names the root as exchange.
    #[must_use]
    pub fn is_null(&self) -> bool {
        self.exchange.trim_end_matches('.').is_empty()
    }
}

/// The two queries delivery needs.
///
/// An answer without records is `Ok(vec![])`; `Err` is reserved for queries
/// that could not be answered at all.
#[async_trait]
pub trait DnsLookup: Send + Sync {
    async fn mx(&self, domain: &str) -> Result<Vec<MxRecord>, DnsError>;

    async fn a(&self, domain: &str) -> Result<Vec<Ipv4Addr>, DnsError>;
}

/// [`DnsLookup`] backed by the system resolver configuration.
#[derive(Debug)]
pub struct HickoryLookup {
    resolver: TokioResolver,
}

impl HickoryLookup {
    /// Creates a lookup using the system resolver configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the system DNS configuration cannot be loaded.
    pub fn new(config: &DnsConfig) -> Result<Self, DnsError> {
        let mut opts = ResolverOpts::default();
        opts.timeout = Duration::from_secs(config.timeout_secs);
        opts.attempts = config.attempts;

        let resolver = TokioResolver::builder(TokioConnectionProvider::default())
            .map_err(|e| DnsError::Init(e.to_string()))?
            .with_options(opts)
            .build();

        Ok(Self { resolver })
    }
}

#[async_trait]
impl DnsLookup for HickoryLookup {
    async fn mx(&self, domain: &str) -> Result<Vec<MxRecord>, DnsError> {
        match self.resolver.mx_lookup(domain).await {
            Ok(lookup) => Ok(lookup
                .iter()
                .map(|mx| MxRecord::new(mx.exchange().to_utf8(), mx.preference()))
                .collect()),
            Err(err) if err.is_no_records_found() => Ok(Vec::new()),
            Err(err) => Err(DnsError::LookupFailed {
                domain: domain.to_string(),
                reason: err.to_string(),
            }),
        }
    }

    async fn a(&self, domain: &str) -> Result<Vec<Ipv4Addr>, DnsError> {
        match self.resolver.ipv4_lookup(domain).await {
            Ok(lookup) => Ok(lookup.iter().map(|a| a.0).collect()),
            Err(err) if err.is_no_records_found() => Ok(Vec::new()),
            Err(err) => Err(DnsError::LookupFailed {
                domain: domain.to_string(),
                reason: err.to_string(),
            }),
        }
    }
}

/// Turns a recipient domain into the ordered list of hosts to try.
#[derive(Clone)]
pub struct HostResolver {
    lookup: Arc<dyn DnsLookup>,
    port: u16,
}

impl HostResolver {
    /// Every resolved host is paired with `port`.
    #[must_use]
    pub fn new(lookup: Arc<dyn DnsLookup>, port: u16) -> Self {
        Self { lookup, port }
    }

    /// Resolves mail servers for a domain following RFC 5321 section 5.1.
    ///
    /// 1. MX records, sorted by preference (ties keep the resolver's order)
    /// 2. If the MX query fails or yields nothing, A records at priority 0
    ///
    /// # Errors
    ///
    /// Returns [`DnsError::NoMailServers`] when neither query yields a host,
    /// and [`DnsError::NullMx`] when the domain publishes only a null MX.
    pub async fn resolve(&self, domain: &str) -> Result<Vec<MailServer>, DnsError> {
        debug!("Resolving mail servers for domain: {domain}");

        match self.lookup.mx(domain).await {
            Ok(records) if !records.is_empty() => {
                if records.iter().all(MxRecord::is_null) {
                    warn!("{domain} publishes a null MX");
                    return Err(DnsError::NullMx(domain.to_string()));
                }

                let mut servers: Vec<MailServer> = records
                    .into_iter()
                    .filter(|mx| !mx.is_null())
                    .map(|mx| {
                        let host = mx.exchange.trim_end_matches('.');
                        debug!("Found MX record: {host} (priority: {})", mx.preference);
                        MailServer::new(host, mx.preference, self.port)
                    })
                    .collect();

                // `sort_by_key` is stable, equal preferences keep DNS order
                servers.sort_by_key(|s| s.priority);
                debug!("Resolved {} MX record(s) for {domain}", servers.len());
                return Ok(servers);
            }
            Ok(_) => debug!("No MX records found for {domain}, falling back to A"),
            Err(err) => warn!("MX lookup failed for {domain}: {err}, falling back to A"),
        }

        self.fallback_to_a(domain).await
    }

    async fn fallback_to_a(&self, domain: &str) -> Result<Vec<MailServer>, DnsError> {
        let addresses = match self.lookup.a(domain).await {
            Ok(addresses) => addresses,
            Err(err) => {
                warn!("A lookup failed for {domain}: {err}");
                Vec::new()
            }
        };

        if addresses.is_empty() {
            return Err(DnsError::NoMailServers(domain.to_string()));
        }

        debug!("Resolved {} A record(s) for {domain}", addresses.len());
        Ok(addresses
            .into_iter()
            .map(|ip| MailServer::new(ip.to_string(), 0, self.port))
            .collect())
    }
}

impl std::fmt::Debug for HostResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HostResolver")
            .field("port", &self.port)
            .finish_non_exhaustive()
    }
}
