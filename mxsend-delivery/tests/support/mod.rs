//! Test support utilities for delivery tests
//!
//! A scriptable SMTP server and an in-memory DNS, so whole deliveries can run
//! against loopback addresses without touching the network.

pub mod dns;
pub mod mock_server;

pub use dns::StaticDns;
pub use mock_server::{MockSmtpServer, SmtpCommand};
