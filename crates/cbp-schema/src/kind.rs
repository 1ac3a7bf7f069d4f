//! Message kind.

use serde::{Deserialize, Serialize};

/// 8-bit message kind identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum MessageKind {
    Request = 0x01,
    Response = 0x02,
    ContextPush = 0x03,
    Handoff = 0x04,
    Feedback = 0x05,
    Sync = 0x06,
    Delta = 0x07,
    FederationDiscover = 0x08,
    FederationRegister = 0x09,
    FederationHeartbeat = 0x0A,
    /// Produced by the bus when a handler fails.
    Error = 0x0B,
}

impl MessageKind {
    #[must_use]
    pub const fn to_u8(self) -> u8 {
        self as u8
    }

    #[must_use]
    pub const fn from_u8(value: u8) -> Option<Self> {
        match value {
            0x01 => Some(Self::Request),
            0x02 => Some(Self::Response),
            0x03 => Some(Self::ContextPush),
            0x04 => Some(Self::Handoff),
            0x05 => Some(Self::Feedback),
            0x06 => Some(Self::Sync),
            0x07 => Some(Self::Delta),
            0x08 => Some(Self::FederationDiscover),
            0x09 => Some(Self::FederationRegister),
            0x0A => Some(Self::FederationHeartbeat),
            0x0B => Some(Self::Error),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips() {
        let all = [
            MessageKind::Request,
            MessageKind::Response,
            MessageKind::ContextPush,
            MessageKind::Handoff,
            MessageKind::Feedback,
            MessageKind::Sync,
            MessageKind::Delta,
            MessageKind::FederationDiscover,
            MessageKind::FederationRegister,
            MessageKind::FederationHeartbeat,
            MessageKind::Error,
        ];
        for kind in all {
            assert_eq!(MessageKind::from_u8(kind.to_u8()), Some(kind));
        }
    }

    #[test]
    fn unknown_value_is_none() {
        assert_eq!(MessageKind::from_u8(0x99), None);
    }
}
