use std::fmt::{self, Display, Formatter};

use serde::{Deserialize, Serialize};
use ulid::Ulid;

/// Correlation data for a single delivery call.
///
/// Passed explicitly into the delivery entry point and recorded on every span
/// the delivery opens, so log lines from one call can be tied together without
/// any process-wide state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliveryContext {
    /// Correlation identifier, a ULID unless supplied by the caller
    pub id: String,
    /// Optional free-form label supplied by the caller (batch name, job id, ...)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}

impl DeliveryContext {
    /// Create a context with a freshly generated correlation id
    #[must_use]
    pub fn new() -> Self {
        Self::with_id(Ulid::new().to_string())
    }

    /// Create a context with a caller-chosen correlation id
    #[must_use]
    pub fn with_id(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            label: None,
        }
    }

    #[must_use]
    pub fn labelled(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }
}

impl Default for DeliveryContext {
    fn default() -> Self {
        Self::new()
    }
}

impl Display for DeliveryContext {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> fmt::Result {
        match &self.label {
            Some(label) => write!(fmt, "{} ({label})", self.id),
            None => fmt.write_str(&self.id),
        }
    }
}
