//! Message body preparation for the DATA phase.

use std::borrow::Cow;

/// Sent after the message body. The leading CRLF terminates the last body
/// line, so a body is recovered exactly by stripping these five bytes.
pub const END_OF_DATA: &[u8] = b"\r\n.\r\n";

/// Escape every line that starts with `.` by doubling the dot (RFC 5321 §4.5.2).
///
/// Without this a body line consisting of a single `.` would end the message
/// early. The input is borrowed untouched when no line needs escaping.
#[must_use]
pub fn dot_stuff(data: &[u8]) -> Cow<'_, [u8]> {
    let needs_stuffing = data.first() == Some(&b'.') || data.windows(2).any(|w| w == b"\n.");
    if !needs_stuffing {
        return Cow::Borrowed(data);
    }

    let mut stuffed = Vec::with_capacity(data.len() + 16);
    let mut at_line_start = true;

    for &byte in data {
        if at_line_start && byte == b'.' {
            stuffed.push(b'.');
        }
        stuffed.push(byte);
        at_line_start = byte == b'\n';
    }

    Cow::Owned(stuffed)
}
