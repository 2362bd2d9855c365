//! Library side of the `mxsend` command: configuration discovery and
//! loading messages from disk.

pub mod config;
pub mod message;

pub use config::{Config, ConfigError};
pub use message::MessageError;
