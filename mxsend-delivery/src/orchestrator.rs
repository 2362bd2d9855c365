//! Delivery of one request across its candidate hosts
//!
//! Candidates are tried one at a time in priority order. The first host that
//! accepts the message ends the delivery; a per-host failure moves on to the
//! next candidate. Nothing is retried later and no state outlives the call.

use std::{sync::Arc, time::Instant};

use mxsend_common::{
    address::{Destination, destination},
    context::DeliveryContext,
};
use tracing::{Instrument, info, info_span, warn};

use crate::{
    dns::{DnsError, DnsLookup, HickoryLookup, HostResolver, MailServer},
    error::DeliveryError,
    session::SmtpSession,
    types::{DeliveryAttempt, DeliveryConfig, DeliveryOutcome, DeliveryRequest},
};

/// Sends requests straight to the recipient's mail exchangers.
#[derive(Debug, Clone)]
pub struct Deliverer {
    config: DeliveryConfig,
    resolver: HostResolver,
}

impl Deliverer {
    /// Creates a deliverer resolving through the system DNS configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the system DNS configuration cannot be loaded.
    pub fn new(config: DeliveryConfig) -> Result<Self, DnsError> {
        let lookup = HickoryLookup::new(&config.dns)?;
        Ok(Self::with_lookup(config, Arc::new(lookup)))
    }

    /// Creates a deliverer that resolves through `lookup`.
    #[must_use]
    pub fn with_lookup(config: DeliveryConfig, lookup: Arc<dyn DnsLookup>) -> Self {
        let resolver = HostResolver::new(lookup, config.port);
        Self { config, resolver }
    }

    #[must_use]
    pub const fn config(&self) -> &DeliveryConfig {
        &self.config
    }

    /// The hosts a request would be tried against, in order.
    ///
    /// A per-request override wins over the configured one; either skips DNS
    /// entirely. An address literal recipient targets the literal.
    ///
    /// # Errors
    ///
    /// Returns `InvalidRequest` for a recipient without a domain and
    /// `NoRoute` when resolution finds no host.
    pub async fn candidates(&self, request: &DeliveryRequest) -> Result<Vec<MailServer>, DeliveryError> {
        if let Some(mx_override) = request.mx_override.as_ref().or(self.config.mx_override.as_ref()) {
            info!(server = %mx_override, "Using MX override");
            return Ok(vec![mx_override.as_server()]);
        }

        match destination(&request.recipient)? {
            Destination::Literal(ip) => Ok(vec![MailServer::new(ip.to_string(), 0, self.config.port)]),
            Destination::Domain(domain) => Ok(self.resolver.resolve(&domain).await?),
        }
    }

    /// Deliver `request`, trying each candidate host until one accepts it.
    ///
    /// Never fails outright: every failure, including an invalid request or
    /// an unresolvable domain, is reported through the returned outcome.
    #[tracing::instrument(
        name = "delivery",
        skip_all,
        fields(id = %context.id, label = context.label.as_deref(), recipient = %request.recipient)
    )]
    pub async fn deliver(&self, request: &DeliveryRequest, context: &DeliveryContext) -> DeliveryOutcome {
        if let Err(error) = request.validate() {
            let error = DeliveryError::from(error);
            warn!(%error, "Rejecting delivery request");
            return DeliveryOutcome::failed(&error, Vec::new());
        }

        let servers = match self.candidates(request).await {
            Ok(servers) => servers,
            Err(error) => {
                warn!(%error, "No route to recipient");
                return DeliveryOutcome::failed(&error, Vec::new());
            }
        };

        info!(
            candidates = servers.len(),
            bytes = request.message.len(),
            "Starting delivery"
        );

        let mut attempts = Vec::with_capacity(servers.len());
        let mut last_error = None;

        for (index, server) in servers.iter().enumerate() {
            let started = Instant::now();
            let span = info_span!("attempt", server = %server.address(), priority = server.priority);
            let report = SmtpSession::new(request, server, &self.config.timeouts)
                .execute()
                .instrument(span)
                .await;

            let duration_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
            let mut attempt = DeliveryAttempt {
                host: server.host.clone(),
                port: server.port,
                state: report.state,
                failed_stage: None,
                error: None,
                reply: report.last_reply.as_ref().map(ToString::to_string),
                duration_ms,
            };

            match report.result {
                Ok(accepted) => {
                    info!(
                        server = %server.address(),
                        reply = %accepted,
                        duration_ms,
                        "Message delivered"
                    );
                    attempts.push(attempt);
                    return DeliveryOutcome::delivered(server.address(), &accepted, attempts);
                }
                Err(error) => {
                    warn!(
                        server = %server.address(),
                        %error,
                        remaining = servers.len() - index - 1,
                        "Delivery attempt failed"
                    );
                    attempt.failed_stage = error.stage();
                    attempt.error = Some(error.to_string());
                    attempts.push(attempt);
                    last_error = Some(error);
                }
            }
        }

        match last_error {
            Some(error) => DeliveryOutcome::failed(&error, attempts),
            // Resolution never yields an empty list
            None => DeliveryOutcome::failed(
                &DeliveryError::NoRoute(DnsError::NoMailServers(request.recipient.clone())),
                attempts,
            ),
        }
    }
}
