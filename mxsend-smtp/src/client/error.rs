//! Error types for the SMTP client.

use std::{io, time::Duration};

use thiserror::Error;

/// Errors that can occur while talking to an SMTP server.
#[derive(Error, Debug)]
pub enum ClientError {
    /// IO error occurred during network operations.
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// A reply line could not be parsed.
    #[error("Failed to parse SMTP reply: {0}")]
    ParseError(String),

    /// The server closed the connection where a reply was expected.
    #[error("Connection closed unexpectedly")]
    ConnectionClosed,

    /// No complete reply (or connection) within the allotted time.
    #[error("{operation} timed out after {after:?}")]
    Timeout {
        operation: &'static str,
        after: Duration,
    },
}

/// Specialized `Result` type for SMTP client operations.
pub type Result<T> = std::result::Result<T, ClientError>;
