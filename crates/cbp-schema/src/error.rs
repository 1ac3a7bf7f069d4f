//! Stable error discriminators shared by every crate in the workspace.
//!
//! Each crate defines its own `thiserror` enum for rich `Display` messages,
//! but every variant maps onto one of these `ErrorKind`s so an integrator
//! can match on a stable identifier instead of a crate-specific type.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    FrameTooShort,
    BadMagic,
    UnsupportedVersion,
    LengthMismatch,
    CrcMismatch,
    HashNotFound,
    DecompressionFailed,
    UnpackFailed,
    InvalidSchema,
    Timeout,
    CircuitOpen,
    AgentNotFound,
    HandlerFailure,
    InvalidInput,
    BusShuttingDown,
}

impl ErrorKind {
    /// Whether this kind is considered retriable.
    #[must_use]
    pub const fn is_retriable(self) -> bool {
        matches!(self, Self::Timeout)
    }

    /// Whether this kind is one of the transient kinds the resilient retry
    /// path considers (`timeout`, `network`, `resource`). This workspace
    /// does not model network/resource errors
    /// separately from timeouts at the bus layer, so only `Timeout`
    /// qualifies; callers wrapping a network transport should classify
    /// their own transport errors the same way before retrying.
    #[must_use]
    pub const fn is_transient(self) -> bool {
        matches!(self, Self::Timeout)
    }
}

/// The `{ kind, message, context }` shape every terminal error carries.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorEnvelope {
    pub kind: ErrorKind,
    pub message: String,
    pub context: BTreeMap<String, String>,
}

impl ErrorEnvelope {
    #[must_use]
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            context: BTreeMap::new(),
        }
    }

    #[must_use]
    pub fn with_context(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.context.insert(key.into(), value.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_timeout_is_transient() {
        assert!(ErrorKind::Timeout.is_transient());
        assert!(!ErrorKind::InvalidInput.is_transient());
        assert!(!ErrorKind::CircuitOpen.is_transient());
    }

    #[test]
    fn envelope_carries_context() {
        let env = ErrorEnvelope::new(ErrorKind::HashNotFound, "missing hash")
            .with_context("hash", "deadbeef");
        assert_eq!(env.context.get("hash").map(String::as_str), Some("deadbeef"));
    }
}
