use core::fmt::{self, Display, Formatter};

use mxsend_common::traits::fsm::FiniteStateMachine;
use serde::{Deserialize, Serialize};

/// One command/reply exchange of a delivery session, in protocol order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Stage {
    /// TCP connect; no command is sent
    Connect,
    /// Server greeting after connect
    Greeting,
    Helo,
    MailFrom,
    RcptTo,
    Data,
    /// Message body and end-of-data marker
    Message,
    Quit,
}

impl Stage {
    /// Reply codes that let the session move past this stage.
    #[must_use]
    pub const fn accepted_codes(self) -> &'static [u16] {
        match self {
            Self::Connect => &[],
            Self::Greeting => &[220],
            Self::Helo | Self::MailFrom | Self::Message => &[250],
            Self::RcptTo => &[250, 251],
            Self::Data => &[354],
            Self::Quit => &[221],
        }
    }
}

impl Display for Stage {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> Result<(), fmt::Error> {
        fmt.write_str(match self {
            Self::Connect => "connect",
            Self::Greeting => "greeting",
            Self::Helo => "HELO",
            Self::MailFrom => "MAIL FROM",
            Self::RcptTo => "RCPT TO",
            Self::Data => "DATA",
            Self::Message => "message data",
            Self::Quit => "QUIT",
        })
    }
}

/// Where a delivery session stands.
///
/// The order is strictly linear; each state can only be left forwards (on an
/// accepted reply) or to [`SessionState::Aborted`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SessionState {
    /// TCP connection established, greeting not yet read
    #[default]
    Connected,
    Greeted,
    HeloSent,
    MailFromAccepted,
    RcptToAccepted,
    DataAccepted,
    /// Message accepted by the server; only QUIT remains
    MessageSent,
    Completed,
    Aborted,
}

/// What happened at a stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    /// The stage's reply carried one of its accepted codes
    Accepted(Stage),
    /// The stage's reply carried any other code
    Rejected(Stage),
    /// The stage failed without a usable reply (I/O, timeout, malformed reply)
    Failed(Stage),
}

impl SessionState {
    /// The exchange that has to succeed to leave this state, if any.
    #[must_use]
    pub const fn pending_stage(self) -> Option<Stage> {
        match self {
            Self::Connected => Some(Stage::Greeting),
            Self::Greeted => Some(Stage::Helo),
            Self::HeloSent => Some(Stage::MailFrom),
            Self::MailFromAccepted => Some(Stage::RcptTo),
            Self::RcptToAccepted => Some(Stage::Data),
            Self::DataAccepted => Some(Stage::Message),
            Self::MessageSent => Some(Stage::Quit),
            Self::Completed | Self::Aborted => None,
        }
    }

    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Aborted)
    }

    const fn advance(self) -> Self {
        match self {
            Self::Connected => Self::Greeted,
            Self::Greeted => Self::HeloSent,
            Self::HeloSent => Self::MailFromAccepted,
            Self::MailFromAccepted => Self::RcptToAccepted,
            Self::RcptToAccepted => Self::DataAccepted,
            Self::DataAccepted => Self::MessageSent,
            Self::MessageSent | Self::Completed => Self::Completed,
            Self::Aborted => Self::Aborted,
        }
    }
}

impl FiniteStateMachine for SessionState {
    type Input = Event;

    /// Apply the outcome of a stage.
    ///
    /// Once the message has been accepted, QUIT cannot change the result, so
    /// any QUIT outcome completes the session. Everywhere else only an
    /// accepted reply for the pending stage moves forward; anything else
    /// (including an event for the wrong stage) aborts.
    fn transition(self, input: Self::Input) -> Self {
        match (self, input) {
            (
                Self::MessageSent,
                Event::Accepted(Stage::Quit) | Event::Rejected(Stage::Quit) | Event::Failed(Stage::Quit),
            ) => Self::Completed,
            (state, Event::Accepted(stage)) if state.pending_stage() == Some(stage) => {
                state.advance()
            }
            (Self::Completed, _) => Self::Completed,
            _ => Self::Aborted,
        }
    }
}

impl Display for SessionState {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> Result<(), fmt::Error> {
        fmt.write_str(match self {
            Self::Connected => "Connected",
            Self::Greeted => "Greeted",
            Self::HeloSent => "HeloSent",
            Self::MailFromAccepted => "MailFromAccepted",
            Self::RcptToAccepted => "RcptToAccepted",
            Self::DataAccepted => "DataAccepted",
            Self::MessageSent => "MessageSent",
            Self::Completed => "Completed",
            Self::Aborted => "Aborted",
        })
    }
}
