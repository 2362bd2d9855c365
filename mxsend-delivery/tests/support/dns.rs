//! In-memory DNS answers
#![allow(dead_code)]

use std::{collections::HashMap, net::Ipv4Addr, sync::Arc};

use async_trait::async_trait;
use mxsend_delivery::{DnsError, DnsLookup, MxRecord};

/// Fixed MX and A answers; unknown names have no records.
#[derive(Debug, Default, Clone)]
pub struct StaticDns {
    mx: HashMap<String, Vec<MxRecord>>,
    a: HashMap<String, Vec<Ipv4Addr>>,
    failing: Vec<String>,
}

impl StaticDns {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Publish `(exchange, preference)` pairs for `domain`, in this order.
    #[must_use]
    pub fn with_mx(mut self, domain: &str, records: &[(&str, u16)]) -> Self {
        self.mx.insert(
            domain.to_string(),
            records
                .iter()
                .map(|(exchange, preference)| MxRecord::new(*exchange, *preference))
                .collect(),
        );
        self
    }

    #[must_use]
    pub fn with_a(mut self, domain: &str, addresses: &[Ipv4Addr]) -> Self {
        self.a.insert(domain.to_string(), addresses.to_vec());
        self
    }

    /// Every query for `domain` fails as if the resolver timed out.
    #[must_use]
    pub fn failing(mut self, domain: &str) -> Self {
        self.failing.push(domain.to_string());
        self
    }

    #[must_use]
    pub fn shared(self) -> Arc<dyn DnsLookup> {
        Arc::new(self)
    }

    fn check(&self, domain: &str) -> Result<(), DnsError> {
        if self.failing.iter().any(|d| d == domain) {
            return Err(DnsError::LookupFailed {
                domain: domain.to_string(),
                reason: "request timed out".to_string(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl DnsLookup for StaticDns {
    async fn mx(&self, domain: &str) -> Result<Vec<MxRecord>, DnsError> {
        self.check(domain)?;
        Ok(self.mx.get(domain).cloned().unwrap_or_default())
    }

    async fn a(&self, domain: &str) -> Result<Vec<Ipv4Addr>, DnsError> {
        self.check(domain)?;
        Ok(self.a.get(domain).cloned().unwrap_or_default())
    }
}
