//! Structured message and the canonicalize / un-canonicalize pass the
//! codec runs over its `content` and `metadata` trees.

use cbp_schema::{field_id, field_name, AgentId, FieldId, MessageKind, Priority};
use rmpv::Value;
use std::time::{SystemTime, UNIX_EPOCH};

/// A message as agents and handlers see it: already decoded from the wire,
/// or not yet encoded to it.
#[derive(Debug, Clone, PartialEq)]
pub struct StructuredMessage {
    pub kind: MessageKind,
    pub sender: AgentId,
    pub receiver: AgentId,
    /// Always a `Value::Map`; enforced by the constructors below.
    pub content: Value,
    /// Always a `Value::Map`; enforced by the constructors below.
    pub metadata: Value,
    pub priority: Priority,
    pub timestamp: i64,
    pub message_id: String,
    pub correlation_id: Option<String>,
    pub in_response_to: Option<String>,
    /// Populated from the frame's delta prefix on decode; on encode it is
    /// informational only — the actual transport delta base is a separate
    /// argument to [`crate::Encoder::encode`].
    pub delta_ref: Option<u64>,
}

fn empty_map() -> Value {
    Value::Map(Vec::new())
}

fn now_epoch_seconds() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| i64::try_from(d.as_secs()).unwrap_or(i64::MAX))
        .unwrap_or(0)
}

fn new_message_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

impl StructuredMessage {
    fn base(kind: MessageKind, sender: AgentId, receiver: AgentId, content: Value) -> Self {
        Self {
            kind,
            sender,
            receiver,
            content,
            metadata: empty_map(),
            priority: Priority::default(),
            timestamp: now_epoch_seconds(),
            message_id: new_message_id(),
            correlation_id: None,
            in_response_to: None,
            delta_ref: None,
        }
    }

    #[must_use]
    pub fn request(sender: AgentId, receiver: AgentId, content: Value) -> Self {
        Self::base(MessageKind::Request, sender, receiver, content)
    }

    #[must_use]
    pub fn response(request_id: &str, sender: AgentId, receiver: AgentId, content: Value) -> Self {
        let mut msg = Self::base(MessageKind::Response, sender, receiver, content);
        msg.in_response_to = Some(request_id.to_string());
        msg
    }

    #[must_use]
    pub fn notification(sender: AgentId, receiver: AgentId, content: Value) -> Self {
        Self::base(MessageKind::ContextPush, sender, receiver, content)
    }

    #[must_use]
    pub fn coordination(sender: AgentId, receiver: AgentId, content: Value) -> Self {
        Self::base(MessageKind::Handoff, sender, receiver, content)
    }

    /// An `error`-kind message, matching the shape `cbp-bus` builds when a
    /// handler fails.
    #[must_use]
    pub fn error(
        original_message_id: &str,
        sender: AgentId,
        receiver: AgentId,
        error_kind: cbp_schema::ErrorKind,
        description: &str,
    ) -> Self {
        let content = Value::Map(vec![
            (
                Value::from(cbp_schema::FIELD_ERROR_KIND.0),
                Value::from(format!("{error_kind:?}")),
            ),
            (
                Value::from(cbp_schema::FIELD_DESCRIPTION.0),
                Value::from(description),
            ),
            (
                Value::from(cbp_schema::FIELD_ORIGINAL_MESSAGE_ID.0),
                Value::from(original_message_id),
            ),
        ]);
        let mut msg = Self::base(MessageKind::Error, sender, receiver, content);
        msg.in_response_to = Some(original_message_id.to_string());
        msg.priority = Priority::High;
        msg
    }

    /// A `delta`-kind message. The caller is responsible for computing
    /// `content` as a diff (typically via `cbp_delta::diff`) before calling
    /// this constructor; the wire-level delta prefix is handled separately
    /// by the encoder, not by this struct.
    #[must_use]
    pub fn delta(sender: AgentId, receiver: AgentId, base_hash: u64, diff_content: Value) -> Self {
        let mut msg = Self::base(MessageKind::Delta, sender, receiver, diff_content);
        msg.delta_ref = Some(base_hash);
        msg
    }

    /// Data-model invariant: a `delta`-kind message must carry a
    /// `delta_ref`.
    #[must_use]
    pub fn validate(&self) -> Result<(), String> {
        if self.kind == MessageKind::Delta && self.delta_ref.is_none() {
            return Err("delta-kind message must carry a delta_ref".to_string());
        }
        Ok(())
    }

    #[must_use]
    pub fn get_content(&self, name: &str) -> Option<&Value> {
        get_field(&self.content, name)
    }

    #[must_use]
    pub fn get_metadata(&self, name: &str) -> Option<&Value> {
        get_field(&self.metadata, name)
    }
}

fn get_field<'a>(map: &'a Value, name: &str) -> Option<&'a Value> {
    let Value::Map(entries) = map else {
        return None;
    };
    let wanted_id = field_id(name);
    entries.iter().find_map(|(k, v)| match k {
        Value::String(s) if s.as_str() == Some(name) => Some(v),
        Value::Integer(i) => {
            let matches = wanted_id.is_some_and(|id| i.as_u64() == Some(u64::from(id.0)));
            matches.then_some(v)
        }
        _ => None,
    })
}

/// Recursively rewrite string keys that match a registered field name to
/// their numeric `FieldId`. Unrecognized string
/// keys, and all non-map/array values, pass through unchanged.
#[must_use]
pub fn canonicalize(value: &Value) -> Value {
    match value {
        Value::Map(entries) => Value::Map(
            entries
                .iter()
                .map(|(k, v)| (canonicalize_key(k), canonicalize(v)))
                .collect(),
        ),
        Value::Array(items) => Value::Array(items.iter().map(canonicalize).collect()),
        other => other.clone(),
    }
}

fn canonicalize_key(key: &Value) -> Value {
    if let Value::String(s) = key {
        if let Some(name) = s.as_str() {
            if let Some(id) = field_id(name) {
                return Value::from(id.0);
            }
        }
    }
    key.clone()
}

/// Reverse of [`canonicalize`]: numeric keys
/// become their registered name, or fall back to `field_<n>` if unknown.
/// String keys and non-map/array values pass through unchanged.
#[must_use]
pub fn decanonicalize(value: &Value) -> Value {
    match value {
        Value::Map(entries) => Value::Map(
            entries
                .iter()
                .map(|(k, v)| (decanonicalize_key(k), decanonicalize(v)))
                .collect(),
        ),
        Value::Array(items) => Value::Array(items.iter().map(decanonicalize).collect()),
        other => other.clone(),
    }
}

fn decanonicalize_key(key: &Value) -> Value {
    if let Value::Integer(i) = key {
        if let Some(n) = i.as_u64() {
            if n <= u64::from(u8::MAX) {
                #[allow(clippy::cast_possible_truncation)]
                let id = FieldId(n as u8);
                let name = field_name(id)
                    .map(str::to_string)
                    .unwrap_or_else(|| format!("field_{n}"));
                return Value::from(name);
            }
        }
    }
    key.clone()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn canonicalize_rewrites_known_keys_and_recurses() {
        let content = Value::Map(vec![
            (Value::from("task"), Value::from("summarize")),
            (
                Value::from("unknown_field"),
                Value::Map(vec![(Value::from("confidence"), Value::from(0.9))]),
            ),
        ]);
        let canon = canonicalize(&content);
        let Value::Map(entries) = &canon else {
            panic!("expected map");
        };
        assert_eq!(entries[0].0, Value::from(cbp_schema::FIELD_TASK.0));
        assert_eq!(entries[1].0, Value::from("unknown_field"));
        let Value::Map(nested) = &entries[1].1 else {
            panic!("expected nested map");
        };
        assert_eq!(nested[0].0, Value::from(cbp_schema::FIELD_CONFIDENCE.0));
    }

    #[test]
    fn decanonicalize_reverses_known_ids_and_falls_back_for_unknown() {
        let wire = Value::Map(vec![
            (Value::from(cbp_schema::FIELD_TASK.0), Value::from("x")),
            (Value::from(200u8), Value::from("mystery")),
        ]);
        let plain = decanonicalize(&wire);
        let Value::Map(entries) = &plain else {
            panic!("expected map");
        };
        assert_eq!(entries[0].0, Value::from("task"));
        assert_eq!(entries[1].0, Value::from("field_200"));
    }

    #[test]
    fn delta_message_requires_delta_ref() {
        let mut msg = StructuredMessage::request(AgentId::CODER, AgentId::REVIEWER, empty_map());
        msg.kind = MessageKind::Delta;
        assert!(msg.validate().is_err());
        msg.delta_ref = Some(42);
        assert!(msg.validate().is_ok());
    }

    #[test]
    fn get_content_finds_by_name_after_canonicalization() {
        let content = canonicalize(&Value::Map(vec![(Value::from("task"), Value::from("x"))]));
        let msg = StructuredMessage::request(AgentId::CODER, AgentId::REVIEWER, content);
        assert_eq!(msg.get_content("task"), Some(&Value::from("x")));
    }
}
