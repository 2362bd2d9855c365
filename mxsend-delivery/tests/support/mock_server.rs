//! Mock SMTP server for testing delivery scenarios
//!
//! This module provides a configurable mock SMTP server that can:
#![allow(dead_code)] // Test utility module - not all methods used in every test
//! - Answer every stage with a scripted reply (including multi-line replies)
//! - Hang on a chosen command or hang up instead of answering QUIT
//! - Record commands, connections and the exact message bytes received
//!
//! Servers can be bound to distinct loopback addresses sharing one port, so
//! several "mail exchangers" can sit behind the same configured port.
//!
//! # Example
//!
//! ```rust,no_run
//! use support::mock_server::MockSmtpServer;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let server = MockSmtpServer::builder()
//!     .with_greeting(220, "Test server ready")
//!     .with_rcpt_to_response(550, "User unknown")
//!     .build()
//!     .await?;
//!
//! // Server is now running on server.addr()
//!
//! server.shutdown();
//! # Ok(())
//! # }
//! ```

use std::{
    fmt::Write,
    net::{IpAddr, Ipv4Addr, SocketAddr},
    sync::{
        Arc,
        atomic::{AtomicBool, AtomicUsize, Ordering},
    },
    time::Duration,
};

use tokio::{
    io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader},
    net::{TcpListener, TcpStream},
    sync::RwLock,
    time::timeout,
};

const END_OF_DATA: &[u8] = b"\r\n.\r\n";

/// SMTP command received by the mock server
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SmtpCommand {
    Helo(String),
    /// Argument of MAIL FROM, brackets included
    MailFrom(String),
    /// Argument of RCPT TO, brackets included
    RcptTo(String),
    Data,
    /// Message content after DATA, un-stuffed, without the end-of-data marker
    MessageContent(Vec<u8>),
    Quit,
    Other(String),
}

/// Response configuration for SMTP commands
#[derive(Debug, Clone)]
pub struct SmtpResponse {
    pub code: u16,
    pub lines: Vec<String>,
}

impl SmtpResponse {
    fn new(code: u16, message: impl Into<String>) -> Self {
        Self {
            code,
            lines: vec![message.into()],
        }
    }

    fn multiline(code: u16, lines: &[&str]) -> Self {
        Self {
            code,
            lines: lines.iter().map(ToString::to_string).collect(),
        }
    }

    fn to_bytes(&self) -> Vec<u8> {
        let mut response = String::new();
        let last = self.lines.len().saturating_sub(1);

        for (i, line) in self.lines.iter().enumerate() {
            let separator = if i < last { '-' } else { ' ' };
            let _ = write!(&mut response, "{}{separator}{line}\r\n", self.code);
        }

        response.into_bytes()
    }
}

/// Mock SMTP server configuration
#[derive(Clone)]
struct MockServerConfig {
    greeting: SmtpResponse,
    helo_response: SmtpResponse,
    mail_from_response: SmtpResponse,
    rcpt_to_response: SmtpResponse,
    data_response: SmtpResponse,
    data_end_response: SmtpResponse,
    quit_response: Option<SmtpResponse>,

    // Failure injection
    response_delay: Option<Duration>,
    timeout_on_command: Option<usize>,
}

impl Default for MockServerConfig {
    fn default() -> Self {
        Self {
            greeting: SmtpResponse::new(220, "Mock SMTP Server"),
            helo_response: SmtpResponse::new(250, "Hello"),
            mail_from_response: SmtpResponse::new(250, "OK"),
            rcpt_to_response: SmtpResponse::new(250, "OK"),
            data_response: SmtpResponse::new(354, "Start mail input; end with <CRLF>.<CRLF>"),
            data_end_response: SmtpResponse::new(250, "OK: Message accepted"),
            quit_response: Some(SmtpResponse::new(221, "Bye")),
            response_delay: None,
            timeout_on_command: None,
        }
    }
}

/// Mock SMTP server for testing
pub struct MockSmtpServer {
    addr: SocketAddr,
    commands_received: Arc<RwLock<Vec<SmtpCommand>>>,
    shutdown: Arc<AtomicBool>,
    connection_count: Arc<AtomicUsize>,
}

impl MockSmtpServer {
    /// Create a new builder for configuring the mock server
    #[must_use]
    pub fn builder() -> MockSmtpServerBuilder {
        MockSmtpServerBuilder::new()
    }

    /// Get the address the server is listening on
    #[must_use]
    pub const fn addr(&self) -> SocketAddr {
        self.addr
    }

    #[must_use]
    pub const fn port(&self) -> u16 {
        self.addr.port()
    }

    /// Get all commands received by the server, across connections
    pub async fn commands(&self) -> Vec<SmtpCommand> {
        self.commands_received.read().await.clone()
    }

    /// Message bodies received, in order
    pub async fn messages(&self) -> Vec<Vec<u8>> {
        self.commands_received
            .read()
            .await
            .iter()
            .filter_map(|command| match command {
                SmtpCommand::MessageContent(body) => Some(body.clone()),
                _ => None,
            })
            .collect()
    }

    /// Number of TCP connections accepted so far
    #[must_use]
    pub fn connection_count(&self) -> usize {
        self.connection_count.load(Ordering::SeqCst)
    }

    /// Shutdown the server
    pub fn shutdown(&self) {
        self.shutdown.store(true, Ordering::Relaxed);
    }

    async fn respond(
        writer: &mut (impl AsyncWriteExt + Unpin),
        config: &MockServerConfig,
        response: &SmtpResponse,
    ) -> std::io::Result<()> {
        if let Some(delay) = config.response_delay {
            tokio::time::sleep(delay).await;
        }
        writer.write_all(&response.to_bytes()).await?;
        writer.flush().await
    }

    /// Handle a single client connection
    async fn handle_client(
        mut stream: TcpStream,
        config: Arc<MockServerConfig>,
        commands: Arc<RwLock<Vec<SmtpCommand>>>,
    ) -> Result<(), Box<dyn std::error::Error>> {
        let (reader, mut writer) = stream.split();
        let mut reader = BufReader::new(reader);
        let mut line = String::new();
        let mut local_command_count = 0;

        Self::respond(&mut writer, &config, &config.greeting).await?;

        loop {
            line.clear();

            // Read command with timeout (10 seconds)
            let Ok(read_result) = timeout(Duration::from_secs(10), reader.read_line(&mut line)).await
            else {
                return Ok(());
            };

            if read_result? == 0 {
                // Connection closed
                return Ok(());
            }

            if config.timeout_on_command == Some(local_command_count) {
                // Never answer; the client has to give up on its own
                tokio::time::sleep(Duration::from_secs(3600)).await;
                return Ok(());
            }
            local_command_count += 1;

            let cmd_line = line.trim_end_matches(['\r', '\n']);
            tracing::debug!("Mock server received: {}", cmd_line);

            let (verb, argument) = cmd_line.split_once(' ').unwrap_or((cmd_line, ""));
            let argument = argument.to_string();

            let (response, smtp_cmd) = match verb.to_uppercase().as_str() {
                "HELO" => (&config.helo_response, SmtpCommand::Helo(argument)),
                "MAIL" => (
                    &config.mail_from_response,
                    SmtpCommand::MailFrom(argument.trim_start_matches("FROM:").to_string()),
                ),
                "RCPT" => (
                    &config.rcpt_to_response,
                    SmtpCommand::RcptTo(argument.trim_start_matches("TO:").to_string()),
                ),
                "DATA" => (&config.data_response, SmtpCommand::Data),
                "QUIT" => {
                    commands.write().await.push(SmtpCommand::Quit);
                    if let Some(quit_response) = &config.quit_response {
                        Self::respond(&mut writer, &config, quit_response).await?;
                    }
                    return Ok(());
                }
                _ => {
                    commands
                        .write()
                        .await
                        .push(SmtpCommand::Other(cmd_line.to_string()));
                    let unknown = SmtpResponse::new(500, "Unknown command");
                    Self::respond(&mut writer, &config, &unknown).await?;
                    continue;
                }
            };

            commands.write().await.push(smtp_cmd.clone());
            Self::respond(&mut writer, &config, response).await?;

            // Read message content until we see <CRLF>.<CRLF>
            if matches!(smtp_cmd, SmtpCommand::Data) && config.data_response.code == 354 {
                let mut raw = Vec::new();
                while !raw.ends_with(END_OF_DATA) {
                    let mut byte = [0u8; 1];
                    if reader.read(&mut byte).await? == 0 {
                        return Ok(());
                    }
                    raw.push(byte[0]);
                }
                raw.truncate(raw.len() - END_OF_DATA.len());

                commands
                    .write()
                    .await
                    .push(SmtpCommand::MessageContent(unstuff(&raw)));
                Self::respond(&mut writer, &config, &config.data_end_response).await?;
            }
        }
    }
}

impl Drop for MockSmtpServer {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Remove the extra leading dot the client adds to lines starting with `.`
fn unstuff(data: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(data.len());
    let mut at_line_start = true;

    for &byte in data {
        if at_line_start && byte == b'.' {
            at_line_start = false;
            continue;
        }
        out.push(byte);
        at_line_start = byte == b'\n';
    }

    out
}

/// Builder for configuring a `MockSmtpServer`
pub struct MockSmtpServerBuilder {
    config: MockServerConfig,
    bind: SocketAddr,
}

impl MockSmtpServerBuilder {
    fn new() -> Self {
        Self {
            config: MockServerConfig::default(),
            bind: SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), 0),
        }
    }

    /// Listen on a specific address instead of `127.0.0.1:<random>`
    #[must_use]
    pub const fn bind(mut self, addr: SocketAddr) -> Self {
        self.bind = addr;
        self
    }

    /// Set the greeting message
    #[must_use]
    pub fn with_greeting(mut self, code: u16, message: impl Into<String>) -> Self {
        self.config.greeting = SmtpResponse::new(code, message);
        self
    }

    /// Set a multi-line greeting
    #[must_use]
    pub fn with_greeting_lines(mut self, code: u16, lines: &[&str]) -> Self {
        self.config.greeting = SmtpResponse::multiline(code, lines);
        self
    }

    /// Set the HELO response
    #[must_use]
    pub fn with_helo_response(mut self, code: u16, message: impl Into<String>) -> Self {
        self.config.helo_response = SmtpResponse::new(code, message);
        self
    }

    /// Set a multi-line HELO response
    #[must_use]
    pub fn with_helo_lines(mut self, code: u16, lines: &[&str]) -> Self {
        self.config.helo_response = SmtpResponse::multiline(code, lines);
        self
    }

    /// Set the MAIL FROM response
    #[must_use]
    pub fn with_mail_from_response(mut self, code: u16, message: impl Into<String>) -> Self {
        self.config.mail_from_response = SmtpResponse::new(code, message);
        self
    }

    /// Set the RCPT TO response
    #[must_use]
    pub fn with_rcpt_to_response(mut self, code: u16, message: impl Into<String>) -> Self {
        self.config.rcpt_to_response = SmtpResponse::new(code, message);
        self
    }

    /// Set the DATA command response
    #[must_use]
    pub fn with_data_response(mut self, code: u16, message: impl Into<String>) -> Self {
        self.config.data_response = SmtpResponse::new(code, message);
        self
    }

    /// Set the response after message content (after `<CRLF>.<CRLF>`)
    #[must_use]
    pub fn with_data_end_response(mut self, code: u16, message: impl Into<String>) -> Self {
        self.config.data_end_response = SmtpResponse::new(code, message);
        self
    }

    /// Set the QUIT response
    #[must_use]
    pub fn with_quit_response(mut self, code: u16, message: impl Into<String>) -> Self {
        self.config.quit_response = Some(SmtpResponse::new(code, message));
        self
    }

    /// Hang up on QUIT without replying
    #[must_use]
    pub fn without_quit_response(mut self) -> Self {
        self.config.quit_response = None;
        self
    }

    /// Add a delay before sending each response
    #[must_use]
    pub const fn with_response_delay(mut self, delay: Duration) -> Self {
        self.config.response_delay = Some(delay);
        self
    }

    /// Never answer the Nth command (0-indexed, the greeting is not a command)
    #[must_use]
    pub const fn with_timeout_on_command(mut self, command_index: usize) -> Self {
        self.config.timeout_on_command = Some(command_index);
        self
    }

    /// Build and start the mock SMTP server
    ///
    /// # Errors
    ///
    /// Returns an error if the server fails to bind
    pub async fn build(self) -> Result<MockSmtpServer, std::io::Error> {
        let listener = TcpListener::bind(self.bind).await?;
        let addr = listener.local_addr()?;

        let config = Arc::new(self.config);
        let commands = Arc::new(RwLock::new(Vec::new()));
        let shutdown = Arc::new(AtomicBool::new(false));
        let connection_count = Arc::new(AtomicUsize::new(0));

        let commands_clone = Arc::clone(&commands);
        let shutdown_clone = Arc::clone(&shutdown);
        let connection_count_clone = Arc::clone(&connection_count);

        tokio::spawn(async move {
            loop {
                if shutdown_clone.load(Ordering::Relaxed) {
                    break;
                }

                // Accept connection with timeout to allow checking shutdown flag
                let accept_result = timeout(Duration::from_millis(100), listener.accept()).await;

                if let Ok(Ok((stream, _peer))) = accept_result {
                    connection_count_clone.fetch_add(1, Ordering::SeqCst);
                    let config = Arc::clone(&config);
                    let commands = Arc::clone(&commands_clone);

                    tokio::spawn(async move {
                        if let Err(e) = MockSmtpServer::handle_client(stream, config, commands).await {
                            tracing::debug!("Mock server client error: {}", e);
                        }
                    });
                }
            }
        });

        Ok(MockSmtpServer {
            addr,
            commands_received: commands,
            shutdown,
            connection_count,
        })
    }
}
