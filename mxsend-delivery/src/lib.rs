//! Direct delivery of a single message to the mail exchangers of its recipient.
//!
//! This crate provides:
//! - DNS MX resolution with A-record fallback ([`HostResolver`])
//! - The per-host SMTP conversation ([`SmtpSession`])
//! - Host fallback in priority order ([`Deliverer`])

mod dns;
mod error;
mod orchestrator;
mod session;
mod types;

pub use dns::{DnsConfig, DnsError, DnsLookup, HickoryLookup, HostResolver, MailServer, MxRecord};
pub use error::{DeliveryError, FailureKind, ProtocolError, TransportError};
pub use mxsend_common::context::DeliveryContext;
pub use orchestrator::Deliverer;
pub use session::{SessionReport, SmtpSession};
pub use types::{
    DEFAULT_HELO, DEFAULT_PORT, DEFAULT_SENDER, DeliveryAttempt, DeliveryConfig, DeliveryOutcome,
    DeliveryRequest, InvalidOverride, MxOverride, SmtpTimeouts,
};
