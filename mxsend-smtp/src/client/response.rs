//! SMTP reply parsing and representation.

use std::fmt::{self, Display, Formatter};

use mxsend_common::incoming;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt};

use super::error::{ClientError, Result};

/// Longest reply line we are willing to buffer, terminator included.
pub const MAX_LINE_LENGTH: usize = 64 * 1024;

/// Represents a single line in an SMTP reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplyLine {
    /// The SMTP status code (e.g., 220, 250, 550).
    pub code: u16,
    /// Whether this is the last line in a multi-line reply.
    pub is_last: bool,
    /// The text following the code and separator.
    pub text: String,
}

impl ReplyLine {
    /// Parses a single reply line, without its line terminator.
    ///
    /// The 4th column decides continuation: `-` means more lines follow,
    /// anything else (a space, or the end of the line) ends the reply.
    ///
    /// # Errors
    ///
    /// Returns `ClientError::ParseError` if the line does not start with a
    /// three digit code.
    pub fn parse(line: &str) -> Result<Self> {
        let Some(code_str) = line.get(..3).filter(|c| c.bytes().all(|b| b.is_ascii_digit()))
        else {
            return Err(ClientError::ParseError(format!(
                "Reply line does not start with a 3-digit code: '{line}'"
            )));
        };

        let code = code_str
            .parse::<u16>()
            .map_err(|_| ClientError::ParseError(format!("Invalid status code: '{code_str}'")))?;

        let rest = &line[3..];
        let is_last = !rest.starts_with('-');
        let text = rest.strip_prefix(['-', ' ']).unwrap_or(rest).to_string();

        Ok(Self {
            code,
            is_last,
            text,
        })
    }
}

/// A complete SMTP reply, which may have spanned several lines.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    /// Code of the final line; this is the code that counts.
    pub code: u16,
    /// Text of every line, in the order received.
    pub lines: Vec<String>,
}

impl Reply {
    /// Creates a new `Reply`.
    #[must_use]
    pub const fn new(code: u16, lines: Vec<String>) -> Self {
        Self { code, lines }
    }

    /// Returns `true` if the final code is one of `accepted`.
    #[must_use]
    pub fn is_one_of(&self, accepted: &[u16]) -> bool {
        accepted.contains(&self.code)
    }

    /// Reads exactly one reply from `reader`.
    ///
    /// Continuation lines are consumed until the final line; nothing past the
    /// final line is read.
    ///
    /// # Errors
    ///
    /// - `ClientError::ConnectionClosed` on end-of-stream before the final line
    /// - `ClientError::ParseError` on a malformed or oversized line
    /// - `ClientError::Io` if the underlying read fails
    pub async fn read_from<R>(reader: &mut R) -> Result<Self>
    where
        R: AsyncBufRead + Unpin,
    {
        let mut lines = Vec::new();
        let mut raw = Vec::with_capacity(128);

        loop {
            raw.clear();
            let limit = u64::try_from(MAX_LINE_LENGTH).unwrap_or(u64::MAX);
            let read = (&mut *reader).take(limit).read_until(b'\n', &mut raw).await?;

            if read == 0 {
                return Err(ClientError::ConnectionClosed);
            }

            if raw.len() >= MAX_LINE_LENGTH && !raw.ends_with(b"\n") {
                return Err(ClientError::ParseError(format!(
                    "Reply line exceeds {MAX_LINE_LENGTH} bytes"
                )));
            }

            let decoded = String::from_utf8_lossy(&raw);
            let line = decoded.trim_end_matches(['\r', '\n']);
            incoming!("{line}");

            let parsed = ReplyLine::parse(line)?;
            lines.push(parsed.text);

            if parsed.is_last {
                return Ok(Self::new(parsed.code, lines));
            }
        }
    }
}

impl Display for Reply {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> fmt::Result {
        write!(fmt, "{}", self.code)?;
        for line in self.lines.iter().filter(|line| !line.is_empty()) {
            write!(fmt, " {line}")?;
        }
        Ok(())
    }
}
