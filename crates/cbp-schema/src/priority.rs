//! Priority levels.
//!
//! Variants are declared in ascending urgency so the derived `Ord` sorts
//! `Critical > High > Normal > Low` — exactly the comparison
//! `cbp-bus`'s per-agent worker needs when picking the next lane to drain.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum Priority {
    Low = 0,
    Normal = 1,
    High = 2,
    Critical = 3,
}

impl Default for Priority {
    fn default() -> Self {
        Self::Normal
    }
}

impl Priority {
    #[must_use]
    pub const fn to_u8(self) -> u8 {
        self as u8
    }

    #[must_use]
    pub const fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::Low),
            1 => Some(Self::Normal),
            2 => Some(Self::High),
            3 => Some(Self::Critical),
            _ => None,
        }
    }

    /// The four lanes in drain order (highest first).
    #[must_use]
    pub const fn all_descending() -> [Self; 4] {
        [Self::Critical, Self::High, Self::Normal, Self::Low]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ordering_matches_urgency() {
        assert!(Priority::Critical > Priority::High);
        assert!(Priority::High > Priority::Normal);
        assert!(Priority::Normal > Priority::Low);
    }

    #[test]
    fn default_is_normal() {
        assert_eq!(Priority::default(), Priority::Normal);
    }

    #[test]
    fn round_trips() {
        for p in Priority::all_descending() {
            assert_eq!(Priority::from_u8(p.to_u8()), Some(p));
        }
    }
}
