//! Client side of the SMTP conversation used by mxsend.
//!
//! - [`client::Reply`] parses one (possibly multi-line) server reply
//! - [`client::SmtpClient`] owns a connection and issues single commands
//! - [`state::SessionState`] is the linear state machine a delivery walks

pub mod client;
pub mod state;

pub use client::{ClientError, Reply, SmtpClient};
pub use state::{Event, SessionState, Stage};
