//! Bus errors. Every variant maps to a stable
//! [`cbp_schema::ErrorKind`] via [`BusError::kind`].

use cbp_schema::ErrorKind;
use thiserror::Error;

#[derive(Debug, Error, Clone)]
pub enum BusError {
    #[error("timed out waiting for a reply")]
    Timeout,

    #[error("circuit open for this caller/callee pair")]
    CircuitOpen,

    #[error("no agent registered with id {0:?}")]
    AgentNotFound(cbp_schema::AgentId),

    #[error("handler failed: {0}")]
    HandlerFailure(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("bus is shutting down")]
    BusShuttingDown,
}

impl BusError {
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::Timeout => ErrorKind::Timeout,
            Self::CircuitOpen => ErrorKind::CircuitOpen,
            Self::AgentNotFound(_) => ErrorKind::AgentNotFound,
            Self::HandlerFailure(_) => ErrorKind::HandlerFailure,
            Self::InvalidInput(_) => ErrorKind::InvalidInput,
            Self::BusShuttingDown => ErrorKind::BusShuttingDown,
        }
    }

    /// Of the error kinds that are transient in principle (timeout,
    /// network, resource exhaustion), only `Timeout` applies here — this
    /// bus does not separately model network/resource failures.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(self, Self::Timeout)
    }

    #[must_use]
    pub fn to_envelope(&self) -> cbp_schema::ErrorEnvelope {
        cbp_schema::ErrorEnvelope::new(self.kind(), self.to_string())
    }
}
