//! Typed error handling for delivery operations.
//!
//! Every failure falls into one of four classes, and the class name leads
//! the rendered message so diagnostics can be told apart by prefix:
//! - `NoRoute`: nowhere to send the message
//! - `ProtocolError`: a server said something unexpected
//! - `TransportError`: the connection itself failed
//! - `InvalidRequest`: the request could never be sent

use std::{io, time::Duration};

use mxsend_common::address::AddressError;
use mxsend_smtp::{ClientError, Reply, Stage};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::DnsError;

/// Top-level delivery error type.
#[derive(Debug, Error)]
pub enum DeliveryError {
    #[error("NoRoute: {0}")]
    NoRoute(#[from] DnsError),

    #[error("ProtocolError: {0}")]
    Protocol(#[from] ProtocolError),

    #[error("TransportError: {0}")]
    Transport(#[from] TransportError),

    #[error("InvalidRequest: {0}")]
    InvalidRequest(#[from] AddressError),
}

/// The server answered, but not in a way that lets the session continue.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// The reply code is not one the stage accepts.
    #[error("{stage} rejected by {host}: {reply}")]
    Rejected {
        host: String,
        stage: Stage,
        reply: Reply,
    },

    /// The server hung up where a reply was expected.
    #[error("{host} closed the connection during {stage}")]
    ConnectionClosed { host: String, stage: Stage },

    /// A reply line could not be parsed.
    #[error("malformed reply from {host} during {stage}: {detail}")]
    Malformed {
        host: String,
        stage: Stage,
        detail: String,
    },
}

/// The connection to a host failed.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("could not connect to {host}: {source}")]
    Connect { host: String, source: io::Error },

    #[error("{host} timed out during {stage} after {after:?}")]
    Timeout {
        host: String,
        stage: Stage,
        after: Duration,
    },

    #[error("I/O error with {host} during {stage}: {source}")]
    Io {
        host: String,
        stage: Stage,
        source: io::Error,
    },
}

/// Failure class without the details, for callers that branch on it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FailureKind {
    NoRoute,
    Protocol,
    Transport,
    InvalidRequest,
}

impl DeliveryError {
    /// Attach the host and stage a client error occurred at.
    #[must_use]
    pub fn at_stage(error: ClientError, host: &str, stage: Stage) -> Self {
        let host = host.to_string();

        match error {
            ClientError::Io(source) if stage == Stage::Connect => {
                TransportError::Connect { host, source }.into()
            }
            ClientError::Io(source) => TransportError::Io {
                host,
                stage,
                source,
            }
            .into(),
            ClientError::Timeout { after, .. } => TransportError::Timeout { host, stage, after }.into(),
            ClientError::ConnectionClosed => ProtocolError::ConnectionClosed { host, stage }.into(),
            ClientError::ParseError(detail) => ProtocolError::Malformed {
                host,
                stage,
                detail,
            }
            .into(),
        }
    }

    /// A reply that the stage does not accept.
    #[must_use]
    pub fn rejected(host: &str, stage: Stage, reply: Reply) -> Self {
        ProtocolError::Rejected {
            host: host.to_string(),
            stage,
            reply,
        }
        .into()
    }

    #[must_use]
    pub const fn kind(&self) -> FailureKind {
        match self {
            Self::NoRoute(_) => FailureKind::NoRoute,
            Self::Protocol(_) => FailureKind::Protocol,
            Self::Transport(_) => FailureKind::Transport,
            Self::InvalidRequest(_) => FailureKind::InvalidRequest,
        }
    }

    /// The stage the failure happened at, for per-host failures.
    #[must_use]
    pub const fn stage(&self) -> Option<Stage> {
        match self {
            Self::Protocol(
                ProtocolError::Rejected { stage, .. }
                | ProtocolError::ConnectionClosed { stage, .. }
                | ProtocolError::Malformed { stage, .. },
            )
            | Self::Transport(
                TransportError::Timeout { stage, .. } | TransportError::Io { stage, .. },
            ) => Some(*stage),
            Self::Transport(TransportError::Connect { .. }) => Some(Stage::Connect),
            Self::NoRoute(_) | Self::InvalidRequest(_) => None,
        }
    }

    /// The server reply behind a rejection.
    #[must_use]
    pub const fn reply(&self) -> Option<&Reply> {
        match self {
            Self::Protocol(ProtocolError::Rejected { reply, .. }) => Some(reply),
            _ => None,
        }
    }
}
