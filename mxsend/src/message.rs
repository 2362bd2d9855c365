//! Loading a message from disk for delivery.

use std::{
    borrow::Cow,
    io,
    path::{Path, PathBuf},
};

use mailparse::{MailAddr, MailHeaderMap, MailParseError, addrparse_header, parse_headers};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum MessageError {
    #[error("Failed to read message from {}: {source}", .path.display())]
    Read { path: PathBuf, source: io::Error },

    #[error("Failed to parse message headers: {0}")]
    Parse(#[from] MailParseError),

    #[error("Message has no To: address; pass a recipient explicitly")]
    NoRecipient,
}

/// Read a message file, normalising line endings to CRLF.
///
/// # Errors
///
/// Returns `MessageError::Read` if the file cannot be read.
pub fn load(path: &Path) -> Result<Vec<u8>, MessageError> {
    let raw = std::fs::read(path).map_err(|source| MessageError::Read {
        path: path.to_path_buf(),
        source,
    })?;

    Ok(normalise_line_endings(&raw).into_owned())
}

/// Turn every bare LF into CRLF. Existing CRLF pairs are left alone.
#[must_use]
pub fn normalise_line_endings(data: &[u8]) -> Cow<'_, [u8]> {
    let bare_lf = data
        .iter()
        .enumerate()
        .any(|(i, &byte)| byte == b'\n' && (i == 0 || data[i - 1] != b'\r'));
    if !bare_lf {
        return Cow::Borrowed(data);
    }

    let mut normalised = Vec::with_capacity(data.len() + data.len() / 32);
    let mut previous = None;

    for &byte in data {
        if byte == b'\n' && previous != Some(b'\r') {
            normalised.push(b'\r');
        }
        normalised.push(byte);
        previous = Some(byte);
    }

    Cow::Owned(normalised)
}

/// The first address in the message's `To:` header(s).
///
/// # Errors
///
/// Returns `MessageError::NoRecipient` when there is no usable address, or
/// `MessageError::Parse` when the headers cannot be parsed.
pub fn first_recipient(message: &[u8]) -> Result<String, MessageError> {
    let (headers, _) = parse_headers(message)?;

    for header in headers.get_all_headers("To") {
        for address in addrparse_header(header)?.iter() {
            let found = match address {
                MailAddr::Single(single) => Some(&single.addr),
                MailAddr::Group(group) => group.addrs.first().map(|single| &single.addr),
            };

            if let Some(addr) = found.filter(|addr| !addr.is_empty()) {
                return Ok(addr.clone());
            }
        }
    }

    Err(MessageError::NoRecipient)
}
