//! Plaintext SMTP client used for direct delivery.
//!
//! The client deliberately does one thing per call: send a single command
//! line and parse the single reply to it. Deciding whether a reply is good
//! enough, and what to do next, belongs to the caller.
//!
//! ```no_run
//! use std::time::Duration;
//!
//! use mxsend_smtp::client::SmtpClient;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let mut client = SmtpClient::connect("mx.example.com", 25, Duration::from_secs(30))
//!     .await?
//!     .with_reply_timeout(Duration::from_secs(10));
//!
//! let greeting = client.read_greeting().await?;
//! assert!(greeting.is_one_of(&[220]));
//!
//! let reply = client.helo("client.example.com").await?;
//! println!("{reply}");
//!
//! client.close().await;
//! # Ok(())
//! # }
//! ```

mod data;
mod error;
mod response;
mod smtp_client;

pub use data::{END_OF_DATA, dot_stuff};
pub use error::{ClientError, Result};
pub use response::{MAX_LINE_LENGTH, Reply, ReplyLine};
pub use smtp_client::{DEFAULT_REPLY_TIMEOUT, SmtpClient};
