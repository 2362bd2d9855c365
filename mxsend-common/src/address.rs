//! Helpers for the envelope addresses handed to the delivery client.
//!
//! Addresses are treated as opaque strings apart from two things the client
//! needs: where the domain part starts, and that nothing in them can break out
//! of a single SMTP command line.

use std::{
    fmt::{self, Display, Formatter},
    net::IpAddr,
};

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AddressError {
    #[error("address '{0}' has no domain part")]
    MissingDomain(String),

    #[error("address literal '{0}' is not a valid IP address")]
    InvalidLiteral(String),

    #[error("{field} must not be empty")]
    Empty { field: &'static str },

    #[error("{field} must not contain CR or LF characters")]
    LineBreak { field: &'static str },
}

/// Where mail for an address should be routed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Destination {
    /// A domain name that needs an MX (or A) lookup
    Domain(String),
    /// An address literal such as `user@[192.0.2.1]`, used as-is
    Literal(IpAddr),
}

impl Display for Destination {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::Domain(domain) => fmt.write_str(domain),
            Self::Literal(ip) => write!(fmt, "[{ip}]"),
        }
    }
}

/// Extract the routing destination of an address: everything after the last `@`.
///
/// # Errors
///
/// Returns [`AddressError::MissingDomain`] when there is no `@` or nothing
/// follows it, and [`AddressError::InvalidLiteral`] for a bracketed literal
/// that is not an IP address.
pub fn destination(address: &str) -> Result<Destination, AddressError> {
    let domain = address
        .rsplit_once('@')
        .map(|(_, domain)| domain.trim())
        .filter(|domain| !domain.is_empty())
        .ok_or_else(|| AddressError::MissingDomain(address.to_string()))?;

    if let Some(literal) = domain
        .strip_prefix('[')
        .and_then(|rest| rest.strip_suffix(']'))
    {
        let literal_ip = literal.strip_prefix("IPv6:").unwrap_or(literal);
        return literal_ip
            .parse::<IpAddr>()
            .map(Destination::Literal)
            .map_err(|_| AddressError::InvalidLiteral(domain.to_string()));
    }

    Ok(Destination::Domain(domain.trim_end_matches('.').to_string()))
}

/// Check that a value can be placed on an SMTP command line.
///
/// An empty value is allowed here; the null reverse-path `MAIL FROM:<>` is
/// legitimate. Use [`ensure_present`] where a value is mandatory.
///
/// # Errors
///
/// Fails when the value contains a CR or LF.
pub fn ensure_single_line(field: &'static str, value: &str) -> Result<(), AddressError> {
    if value.contains(['\r', '\n']) {
        return Err(AddressError::LineBreak { field });
    }

    Ok(())
}

/// Check that a mandatory value is non-blank and fits on one command line.
///
/// # Errors
///
/// Fails when the value is blank or contains a CR or LF.
pub fn ensure_present(field: &'static str, value: &str) -> Result<(), AddressError> {
    if value.trim().is_empty() {
        return Err(AddressError::Empty { field });
    }

    ensure_single_line(field, value)
}
