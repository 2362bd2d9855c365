//! A single plaintext SMTP connection.

use std::time::Duration;

use mxsend_common::outgoing;
use tokio::{
    io::{AsyncRead, AsyncWrite, AsyncWriteExt, BufReader, ReadHalf, WriteHalf},
    net::TcpStream,
    time::timeout,
};
use tracing::debug;

use super::{
    data::{END_OF_DATA, dot_stuff},
    error::{ClientError, Result},
    response::Reply,
};

/// Default time allowed for a complete reply to arrive.
pub const DEFAULT_REPLY_TIMEOUT: Duration = Duration::from_secs(10);

/// An SMTP client connection: one command out, one reply back.
///
/// The stream is owned for the lifetime of the client; dropping the client
/// closes it. [`SmtpClient::close`] additionally shuts the write side down
/// cleanly.
pub struct SmtpClient<S = TcpStream> {
    reader: BufReader<ReadHalf<S>>,
    writer: WriteHalf<S>,
    peer: String,
    reply_timeout: Duration,
    replies: Vec<Reply>,
}

impl SmtpClient<TcpStream> {
    /// Opens a TCP connection to `host:port`.
    ///
    /// # Errors
    ///
    /// Returns `ClientError::Timeout` if the connection is not established
    /// within `connect_timeout`, or `ClientError::Io` if it is refused or the
    /// host cannot be resolved.
    pub async fn connect(host: &str, port: u16, connect_timeout: Duration) -> Result<Self> {
        debug!(host, port, "Connecting");

        let stream = timeout(connect_timeout, TcpStream::connect((host, port)))
            .await
            .map_err(|_| ClientError::Timeout {
                operation: "connect",
                after: connect_timeout,
            })??;

        Ok(Self::from_stream(stream, format!("{host}:{port}")))
    }
}

impl<S> SmtpClient<S>
where
    S: AsyncRead + AsyncWrite,
{
    /// Wraps an already established stream.
    pub fn from_stream(stream: S, peer: impl Into<String>) -> Self {
        let (reader, writer) = tokio::io::split(stream);

        Self {
            reader: BufReader::new(reader),
            writer,
            peer: peer.into(),
            reply_timeout: DEFAULT_REPLY_TIMEOUT,
            replies: Vec::new(),
        }
    }

    /// Sets the time allowed for each reply.
    #[must_use]
    pub const fn with_reply_timeout(mut self, reply_timeout: Duration) -> Self {
        self.reply_timeout = reply_timeout;
        self
    }

    /// The `host:port` (or label) this client is talking to.
    #[must_use]
    pub fn peer(&self) -> &str {
        &self.peer
    }

    /// Reads the initial server greeting.
    ///
    /// # Errors
    ///
    /// Returns an error if reading fails or the greeting is malformed.
    pub async fn read_greeting(&mut self) -> Result<Reply> {
        self.read_reply().await
    }

    /// Sends a command line; the CRLF terminator is appended here.
    ///
    /// # Errors
    ///
    /// Returns an error if writing fails.
    pub async fn send_command(&mut self, command: &str) -> Result<()> {
        outgoing!("{command}");

        let mut line = Vec::with_capacity(command.len() + 2);
        line.extend_from_slice(command.as_bytes());
        line.extend_from_slice(b"\r\n");

        self.writer.write_all(&line).await?;
        self.writer.flush().await?;
        Ok(())
    }

    /// Sends a command and reads the reply to it.
    ///
    /// # Errors
    ///
    /// Returns an error if sending or reading fails.
    pub async fn command(&mut self, command: &str) -> Result<Reply> {
        self.send_command(command).await?;
        self.read_reply().await
    }

    /// Sends HELO with the specified domain.
    ///
    /// # Errors
    ///
    /// Returns an error if the command fails.
    pub async fn helo(&mut self, domain: &str) -> Result<Reply> {
        self.command(&format!("HELO {domain}")).await
    }

    /// Sends MAIL FROM command.
    ///
    /// # Errors
    ///
    /// Returns an error if the command fails.
    pub async fn mail_from(&mut self, from: &str) -> Result<Reply> {
        self.command(&format!("MAIL FROM:<{from}>")).await
    }

    /// Sends RCPT TO command.
    ///
    /// # Errors
    ///
    /// Returns an error if the command fails.
    pub async fn rcpt_to(&mut self, to: &str) -> Result<Reply> {
        self.command(&format!("RCPT TO:<{to}>")).await
    }

    /// Sends DATA command.
    ///
    /// # Errors
    ///
    /// Returns an error if the command fails.
    pub async fn data(&mut self) -> Result<Reply> {
        self.command("DATA").await
    }

    /// Sends the message body (dot-stuffed) and the end-of-data marker, then
    /// reads the server's verdict on the message.
    ///
    /// `send_timeout` bounds the transmission; the reply that follows gets the
    /// usual reply timeout.
    ///
    /// # Errors
    ///
    /// Returns an error if sending or reading fails.
    pub async fn send_data(&mut self, message: &[u8], send_timeout: Duration) -> Result<Reply> {
        let body = dot_stuff(message);
        outgoing!(
            "<{} bytes of message data, {} after dot-stuffing>",
            message.len(),
            body.len()
        );

        timeout(send_timeout, async {
            self.writer.write_all(&body).await?;
            self.writer.write_all(END_OF_DATA).await?;
            self.writer.flush().await
        })
        .await
        .map_err(|_| ClientError::Timeout {
            operation: "message transmission",
            after: send_timeout,
        })??;

        self.read_reply().await
    }

    /// Sends QUIT command.
    ///
    /// # Errors
    ///
    /// Returns an error if the command fails.
    pub async fn quit(&mut self) -> Result<Reply> {
        self.command("QUIT").await
    }

    /// Shuts down the write side of the connection.
    ///
    /// Failures are only logged: by the time a session closes, its outcome has
    /// already been decided.
    pub async fn close(mut self) {
        if let Err(e) = self.writer.shutdown().await {
            debug!(peer = %self.peer, error = %e, "Error shutting down connection");
        }
    }

    /// Returns all replies received so far.
    #[must_use]
    pub fn replies(&self) -> &[Reply] {
        &self.replies
    }

    /// Returns the last reply received, if any.
    #[must_use]
    pub fn last_reply(&self) -> Option<&Reply> {
        self.replies.last()
    }

    /// Reads one complete reply, bounded by the reply timeout.
    async fn read_reply(&mut self) -> Result<Reply> {
        let reply = timeout(self.reply_timeout, Reply::read_from(&mut self.reader))
            .await
            .map_err(|_| ClientError::Timeout {
                operation: "reply",
                after: self.reply_timeout,
            })??;

        self.replies.push(reply.clone());
        Ok(reply)
    }
}
