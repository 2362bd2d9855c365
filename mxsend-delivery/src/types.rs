//! Requests, outcomes and configuration for a delivery

use std::{
    fmt::{self, Display, Formatter},
    str::FromStr,
    sync::Arc,
    time::Duration,
};

use mxsend_common::address::{AddressError, ensure_present, ensure_single_line};
use mxsend_smtp::{Reply, SessionState, Stage};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{
    dns::{DnsConfig, MailServer, host_port},
    error::{DeliveryError, FailureKind},
};

/// HELO identity used when none is configured.
pub const DEFAULT_HELO: &str = "my-smtp-client.example.com";

/// Envelope sender used when none is configured.
pub const DEFAULT_SENDER: &str = "sender@example.com";

pub const DEFAULT_PORT: u16 = 25;

/// SMTP operation timeout configuration
///
/// Configures timeout durations for various SMTP operations to prevent
/// hung connections and ensure timely failure detection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SmtpTimeouts {
    /// Timeout for TCP connection establishment
    ///
    /// Default: 30 seconds
    #[serde(default = "default_connect_timeout")]
    pub connect_secs: u64,

    /// Timeout for each server reply, including the greeting
    ///
    /// Default: 10 seconds
    #[serde(default = "default_reply_timeout")]
    pub reply_secs: u64,

    /// Timeout for transmitting the message body
    ///
    /// This is longer than other timeouts to accommodate large messages.
    /// Default: 120 seconds (2 minutes)
    #[serde(default = "default_data_timeout")]
    pub data_secs: u64,
}

impl Default for SmtpTimeouts {
    fn default() -> Self {
        Self {
            connect_secs: default_connect_timeout(),
            reply_secs: default_reply_timeout(),
            data_secs: default_data_timeout(),
        }
    }
}

const fn default_connect_timeout() -> u64 {
    30
}

const fn default_reply_timeout() -> u64 {
    10
}

const fn default_data_timeout() -> u64 {
    120
}

impl SmtpTimeouts {
    #[must_use]
    pub const fn connect(&self) -> Duration {
        Duration::from_secs(self.connect_secs)
    }

    #[must_use]
    pub const fn reply(&self) -> Duration {
        Duration::from_secs(self.reply_secs)
    }

    #[must_use]
    pub const fn data(&self) -> Duration {
        Duration::from_secs(self.data_secs)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid MX override '{0}': expected host or host:port")]
pub struct InvalidOverride(String);

/// A fixed `host:port` that replaces DNS resolution.
///
/// Written as a string in configuration, e.g. `"localhost:1025"` or
/// `"[::1]:2525"`. Without a port, 25 is used.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct MxOverride {
    pub host: String,
    pub port: u16,
}

impl MxOverride {
    #[must_use]
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    #[must_use]
    pub fn as_server(&self) -> MailServer {
        MailServer::new(self.host.clone(), 0, self.port)
    }
}

impl FromStr for MxOverride {
    type Err = InvalidOverride;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let invalid = || InvalidOverride(value.to_string());
        let value = value.trim();

        let (host, port) = if let Some(rest) = value.strip_prefix('[') {
            let (host, after) = rest.split_once(']').ok_or_else(invalid)?;
            match after {
                "" => (host, None),
                _ => (host, Some(after.strip_prefix(':').ok_or_else(invalid)?)),
            }
        } else {
            match value.rsplit_once(':') {
                Some((host, port)) if !host.contains(':') => (host, Some(port)),
                _ => (value, None),
            }
        };

        if host.is_empty() || host.contains(char::is_whitespace) {
            return Err(invalid());
        }

        let port = match port {
            Some(port) => port.parse::<u16>().map_err(|_| invalid())?,
            None => DEFAULT_PORT,
        };

        Ok(Self::new(host, port))
    }
}

impl TryFrom<String> for MxOverride {
    type Error = InvalidOverride;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<MxOverride> for String {
    fn from(value: MxOverride) -> Self {
        value.to_string()
    }
}

impl Display for MxOverride {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> fmt::Result {
        fmt.write_str(&host_port(&self.host, self.port))
    }
}

/// Client-wide delivery settings.
///
/// ```ron
/// (
///     port: 25,
///     mx_override: Some("localhost:1025"),
///     timeouts: (connect_secs: 30, reply_secs: 10, data_secs: 120),
///     dns: (timeout_secs: 5),
/// )
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliveryConfig {
    /// Port used for every resolved mail exchanger
    #[serde(default = "default_port")]
    pub port: u16,

    /// Send everything to this host instead of resolving recipients
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mx_override: Option<MxOverride>,

    #[serde(default)]
    pub timeouts: SmtpTimeouts,

    #[serde(default)]
    pub dns: DnsConfig,
}

const fn default_port() -> u16 {
    DEFAULT_PORT
}

impl Default for DeliveryConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            mx_override: None,
            timeouts: SmtpTimeouts::default(),
            dns: DnsConfig::default(),
        }
    }
}

/// One message for one recipient.
#[derive(Debug, Clone)]
pub struct DeliveryRequest {
    /// Envelope sender; may be empty for the null reverse-path
    pub sender: String,
    pub recipient: String,
    /// Identity announced with HELO
    pub helo: String,
    /// The complete message, headers and body, with CRLF line endings
    pub message: Arc<[u8]>,
    /// Takes precedence over the client-wide override
    pub mx_override: Option<MxOverride>,
}

impl DeliveryRequest {
    pub fn new(
        sender: impl Into<String>,
        recipient: impl Into<String>,
        message: impl Into<Arc<[u8]>>,
    ) -> Self {
        Self {
            sender: sender.into(),
            recipient: recipient.into(),
            helo: DEFAULT_HELO.to_string(),
            message: message.into(),
            mx_override: None,
        }
    }

    #[must_use]
    pub fn with_helo(mut self, helo: impl Into<String>) -> Self {
        self.helo = helo.into();
        self
    }

    #[must_use]
    pub fn with_mx_override(mut self, mx_override: MxOverride) -> Self {
        self.mx_override = Some(mx_override);
        self
    }

    /// Check that every value can go on an SMTP command line.
    ///
    /// # Errors
    ///
    /// Fails on a blank recipient or HELO identity, or a CR/LF anywhere.
    pub fn validate(&self) -> Result<(), AddressError> {
        ensure_single_line("sender", &self.sender)?;
        ensure_present("recipient", &self.recipient)?;
        ensure_present("HELO identity", &self.helo)
    }
}

/// What happened with one candidate host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliveryAttempt {
    pub host: String,
    pub port: u16,
    /// `Completed` on success, `Aborted` otherwise
    pub state: SessionState,
    pub failed_stage: Option<Stage>,
    pub error: Option<String>,
    /// Last reply received from the host, if any
    pub reply: Option<String>,
    pub duration_ms: u64,
}

impl DeliveryAttempt {
    /// `host:port` of the attempted server
    #[must_use]
    pub fn address(&self) -> String {
        host_port(&self.host, self.port)
    }

    #[must_use]
    pub const fn succeeded(&self) -> bool {
        matches!(self.state, SessionState::Completed)
    }
}

/// Final result of [`crate::Deliverer::deliver`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliveryOutcome {
    pub success: bool,
    /// `host:port` that accepted the message
    pub host: Option<String>,
    /// Accepting reply on success, otherwise the last error
    pub diagnostic: String,
    pub failure: Option<FailureKind>,
    pub attempts: Vec<DeliveryAttempt>,
}

impl DeliveryOutcome {
    pub(crate) fn delivered(host: String, reply: &Reply, attempts: Vec<DeliveryAttempt>) -> Self {
        Self {
            success: true,
            host: Some(host),
            diagnostic: reply.to_string(),
            failure: None,
            attempts,
        }
    }

    pub(crate) fn failed(error: &DeliveryError, attempts: Vec<DeliveryAttempt>) -> Self {
        Self {
            success: false,
            host: None,
            diagnostic: error.to_string(),
            failure: Some(error.kind()),
            attempts,
        }
    }
}
