//! Field ID table.
//!
//! Three reserved ranges:
//! - frame fields `0x01`-`0x0F` (the structured-message envelope itself,
//!   plus the correlation fields the wire format needs).
//! - semantic content fields `0x20`-`0x4F` (illustrative domain fields that
//!   may appear inside `content`/`metadata`, e.g. `task`, `result`,
//!   `confidence`, `reasoning`).
//!
//! Unknown string keys are not an error: the codec passes them through
//! verbatim as strings, so a map may be heterogeneous (`u8` keys alongside
//! `String` keys).

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// An 8-bit field ID, replacing a string key in the MessagePack map.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FieldId(pub u8);

/// A map key as it exists in a `StructuredMessage`'s `content`/`metadata`:
/// either a recognized numeric field, or a string that survived the codec
/// unchanged because it has no entry in the Schema Registry.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FieldKey {
    Id(FieldId),
    Name(String),
}

impl FieldKey {
    #[must_use]
    pub fn named(name: impl Into<String>) -> Self {
        let name = name.into();
        match field_id(&name) {
            Some(id) => Self::Id(id),
            None => Self::Name(name),
        }
    }
}

impl From<&str> for FieldKey {
    fn from(name: &str) -> Self {
        Self::named(name)
    }
}

// Frame fields: 0x01-0x0F.
pub const FIELD_TYPE: FieldId = FieldId(0x01);
pub const FIELD_SENDER: FieldId = FieldId(0x02);
pub const FIELD_RECEIVER: FieldId = FieldId(0x03);
pub const FIELD_CONTENT: FieldId = FieldId(0x04);
pub const FIELD_METADATA: FieldId = FieldId(0x05);
pub const FIELD_TIMESTAMP: FieldId = FieldId(0x06);
pub const FIELD_MESSAGE_ID: FieldId = FieldId(0x07);
pub const FIELD_PRIORITY: FieldId = FieldId(0x08);

// Dedup/delta fields: 0x10-0x1F.
pub const FIELD_DELTA_REF: FieldId = FieldId(0x10);
pub const FIELD_CORRELATION_ID: FieldId = FieldId(0x11);
pub const FIELD_IN_RESPONSE_TO: FieldId = FieldId(0x12);

// Semantic content fields: 0x20-0x4F (illustrative; business logic is out
// of this spec's scope).
pub const FIELD_TASK: FieldId = FieldId(0x20);
pub const FIELD_RESULT: FieldId = FieldId(0x21);
pub const FIELD_CONFIDENCE: FieldId = FieldId(0x22);
pub const FIELD_REASONING: FieldId = FieldId(0x23);
pub const FIELD_CAPABILITY: FieldId = FieldId(0x24);
pub const FIELD_TIER: FieldId = FieldId(0x25);
pub const FIELD_ERROR_KIND: FieldId = FieldId(0x26);
pub const FIELD_DESCRIPTION: FieldId = FieldId(0x27);
pub const FIELD_ORIGINAL_MESSAGE_ID: FieldId = FieldId(0x28);

const FIELD_TABLE: &[(&str, FieldId)] = &[
    ("type", FIELD_TYPE),
    ("sender", FIELD_SENDER),
    ("receiver", FIELD_RECEIVER),
    ("content", FIELD_CONTENT),
    ("metadata", FIELD_METADATA),
    ("timestamp", FIELD_TIMESTAMP),
    ("message_id", FIELD_MESSAGE_ID),
    ("priority", FIELD_PRIORITY),
    ("delta_ref", FIELD_DELTA_REF),
    ("correlation_id", FIELD_CORRELATION_ID),
    ("in_response_to", FIELD_IN_RESPONSE_TO),
    ("task", FIELD_TASK),
    ("result", FIELD_RESULT),
    ("confidence", FIELD_CONFIDENCE),
    ("reasoning", FIELD_REASONING),
    ("capability", FIELD_CAPABILITY),
    ("tier", FIELD_TIER),
    ("error_kind", FIELD_ERROR_KIND),
    ("description", FIELD_DESCRIPTION),
    ("original_message_id", FIELD_ORIGINAL_MESSAGE_ID),
];

static NAME_TO_ID: Lazy<HashMap<&'static str, FieldId>> =
    Lazy::new(|| FIELD_TABLE.iter().copied().collect());

static ID_TO_NAME: Lazy<HashMap<FieldId, &'static str>> =
    Lazy::new(|| FIELD_TABLE.iter().map(|(name, id)| (*id, *name)).collect());

/// `field_id(name) -> Option<FieldId>`.
#[must_use]
pub fn field_id(name: &str) -> Option<FieldId> {
    NAME_TO_ID.get(name).copied()
}

/// `field_name(id) -> Option<&str>`. Unknown numeric keys
/// fall back to `field_<n>` at the codec layer, not here: this function
/// only resolves registered IDs.
#[must_use]
pub fn field_name(id: FieldId) -> Option<&'static str> {
    ID_TO_NAME.get(&id).copied()
}
