//! One SMTP conversation with one candidate host
//!
//! The session walks the linear [`SessionState`] machine: greeting, HELO,
//! MAIL FROM, RCPT TO, DATA, message, QUIT. Each stage must be answered with
//! one of its accepted codes or the session aborts at that stage. QUIT is
//! sent after the message has been accepted, and its outcome is only logged.

use mxsend_common::{internal, traits::fsm::FiniteStateMachine};
use mxsend_smtp::{
    ClientError, Event, Reply, SessionState, SmtpClient, Stage, client::Result as ClientResult,
};
use tokio::io::{AsyncRead, AsyncWrite};
use tracing::{debug, warn};

use crate::{
    dns::MailServer,
    error::DeliveryError,
    types::{DeliveryRequest, SmtpTimeouts},
};

/// How a session ended.
#[derive(Debug)]
pub struct SessionReport {
    /// `Completed` or `Aborted`
    pub state: SessionState,
    /// The last reply received, whatever its code
    pub last_reply: Option<Reply>,
    /// The reply that accepted the message, or why the session stopped
    pub result: Result<Reply, DeliveryError>,
}

/// Delivers one request to one host.
pub struct SmtpSession<'a> {
    request: &'a DeliveryRequest,
    server: &'a MailServer,
    timeouts: &'a SmtpTimeouts,
}

impl<'a> SmtpSession<'a> {
    #[must_use]
    pub const fn new(
        request: &'a DeliveryRequest,
        server: &'a MailServer,
        timeouts: &'a SmtpTimeouts,
    ) -> Self {
        Self {
            request,
            server,
            timeouts,
        }
    }

    /// Connect to the host and run the whole conversation.
    ///
    /// The connection is closed before this returns, on every path.
    pub async fn execute(self) -> SessionReport {
        let peer = self.server.address();

        match SmtpClient::connect(&self.server.host, self.server.port, self.timeouts.connect()).await {
            Ok(client) => {
                self.run_on(client.with_reply_timeout(self.timeouts.reply()))
                    .await
            }
            Err(error) => {
                debug!(%peer, %error, "Connection failed");
                SessionReport {
                    state: SessionState::Aborted,
                    last_reply: None,
                    result: Err(DeliveryError::at_stage(error, &peer, Stage::Connect)),
                }
            }
        }
    }

    /// Run the conversation over an already connected client, then close it.
    pub async fn run_on<S>(&self, client: SmtpClient<S>) -> SessionReport
    where
        S: AsyncRead + AsyncWrite,
    {
        let mut conversation = Conversation {
            peer: client.peer().to_string(),
            client,
            state: SessionState::default(),
        };

        let result = conversation.run(self.request, self.timeouts).await;
        let last_reply = conversation.client.last_reply().cloned();
        let state = conversation.state;
        conversation.client.close().await;

        SessionReport {
            state,
            last_reply,
            result,
        }
    }
}

struct Conversation<S> {
    client: SmtpClient<S>,
    peer: String,
    state: SessionState,
}

impl<S> Conversation<S>
where
    S: AsyncRead + AsyncWrite,
{
    async fn run(
        &mut self,
        request: &DeliveryRequest,
        timeouts: &SmtpTimeouts,
    ) -> Result<Reply, DeliveryError> {
        let reply = self.client.read_greeting().await;
        self.expect(Stage::Greeting, reply)?;

        let reply = self.client.helo(&request.helo).await;
        self.expect(Stage::Helo, reply)?;

        let reply = self.client.mail_from(&request.sender).await;
        self.expect(Stage::MailFrom, reply)?;

        let reply = self.client.rcpt_to(&request.recipient).await;
        self.expect(Stage::RcptTo, reply)?;

        let reply = self.client.data().await;
        self.expect(Stage::Data, reply)?;

        let reply = self.client.send_data(&request.message, timeouts.data()).await;
        let accepted = self.expect(Stage::Message, reply)?;

        self.quit().await;
        Ok(accepted)
    }

    /// Feed a stage's outcome through the state machine.
    fn expect(&mut self, stage: Stage, reply: ClientResult<Reply>) -> Result<Reply, DeliveryError> {
        let (event, result) = match reply {
            Ok(reply) if reply.is_one_of(stage.accepted_codes()) => (Event::Accepted(stage), Ok(reply)),
            Ok(reply) => (
                Event::Rejected(stage),
                Err(DeliveryError::rejected(&self.peer, stage, reply)),
            ),
            Err(error) => (
                Event::Failed(stage),
                Err(DeliveryError::at_stage(error, &self.peer, stage)),
            ),
        };

        let previous = self.state;
        self.state = self.state.transition(event);
        internal!("{}: {previous} -> {}", self.peer, self.state);

        result
    }

    /// Best effort: the message is already accepted.
    async fn quit(&mut self) {
        let event = match self.client.quit().await {
            Ok(reply) if reply.is_one_of(Stage::Quit.accepted_codes()) => Event::Accepted(Stage::Quit),
            Ok(reply) => {
                warn!(peer = %self.peer, %reply, "Unexpected reply to QUIT");
                Event::Rejected(Stage::Quit)
            }
            Err(ClientError::ConnectionClosed) => {
                debug!(peer = %self.peer, "Server closed the connection before answering QUIT");
                Event::Failed(Stage::Quit)
            }
            Err(error) => {
                warn!(peer = %self.peer, %error, "QUIT failed");
                Event::Failed(Stage::Quit)
            }
        };

        self.state = self.state.transition(event);
        internal!("{}: session {}", self.peer, self.state);
    }
}
