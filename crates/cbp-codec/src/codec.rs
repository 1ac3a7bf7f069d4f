//! Encoder / decoder pipelines.

use crate::error::CodecError;
use crate::frame::{Frame, FrameFlags};
use crate::message::{canonicalize, decanonicalize, StructuredMessage};
use cbp_registry::SemanticRegistry;
use cbp_schema::{AgentId, MessageKind, Priority};
use rmpv::Value;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Tunables for [`Encoder`]: whether dedup/compression passes run, and
/// the minimum size a payload must reach before compression is attempted.
#[derive(Debug, Clone, Copy)]
pub struct EncodeOptions {
    pub use_dedup: bool,
    pub use_compression: bool,
    pub compression_threshold_bytes: usize,
}

impl Default for EncodeOptions {
    fn default() -> Self {
        Self {
            use_dedup: true,
            use_compression: true,
            compression_threshold_bytes: 256,
        }
    }
}

#[derive(Debug, Default)]
struct Counters {
    total_original_bytes: AtomicU64,
    total_encoded_bytes: AtomicU64,
    message_count: AtomicU64,
}

/// Snapshot of the running encoder counters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EncoderStats {
    pub total_original_bytes: u64,
    pub total_encoded_bytes: u64,
    pub message_count: u64,
    pub registry_stats: cbp_registry::RegistryStats,
}

/// Converts structured messages to self-contained byte frames, integrating
/// schema canonicalization, MessagePack serialization, Semantic Registry
/// dedup, and LZ4 compression.
pub struct Encoder {
    registry: Arc<SemanticRegistry>,
    options: EncodeOptions,
    counters: Counters,
}

impl Encoder {
    #[must_use]
    pub fn new(registry: Arc<SemanticRegistry>, options: EncodeOptions) -> Self {
        Self {
            registry,
            options,
            counters: Counters::default(),
        }
    }

    /// `delta_base`, when provided, is prepended as an
    /// 8-byte big-endian hash and the `IS_DELTA` flag is set; the caller is
    /// responsible for having already turned `msg.content` into a diff
    /// (typically via `cbp_delta::diff`) before calling this — the codec
    /// itself performs no diffing, only the wire-level bookkeeping.
    pub fn encode(
        &self,
        msg: &StructuredMessage,
        delta_base: Option<u64>,
    ) -> Result<Vec<u8>, CodecError> {
        msg.validate().map_err(CodecError::InvalidSchema)?;

        let envelope = to_envelope(msg);
        let mut payload = serialize(&envelope)?;
        self.counters
            .total_original_bytes
            .fetch_add(payload.len() as u64, Ordering::Relaxed);

        let mut flags = FrameFlags::empty();

        let mut deduped = false;
        if self.options.use_dedup {
            let (hash, is_new, _saved) = self.registry.store_or_ref(&payload);
            if !is_new {
                payload = hash.to_be_bytes().to_vec();
                flags.insert(FrameFlags::HAS_HASH);
                deduped = true;
            }
        }

        if !deduped
            && self.options.use_compression
            && payload.len() > self.options.compression_threshold_bytes
        {
            let compressed = lz4_flex::block::compress_prepend_size(&payload);
            if compressed.len() < payload.len() {
                payload = compressed;
                flags.insert(FrameFlags::COMPRESSED);
            }
        }

        if let Some(base_hash) = delta_base {
            let mut prefixed = Vec::with_capacity(8 + payload.len());
            prefixed.extend_from_slice(&base_hash.to_be_bytes());
            prefixed.extend_from_slice(&payload);
            payload = prefixed;
            flags.insert(FrameFlags::IS_DELTA);
        }

        let frame = Frame::new(flags, payload);
        let mut buf = bytes::BytesMut::new();
        frame.encode(&mut buf)?;

        self.counters
            .total_encoded_bytes
            .fetch_add(buf.len() as u64, Ordering::Relaxed);
        self.counters.message_count.fetch_add(1, Ordering::Relaxed);

        Ok(buf.to_vec())
    }

    #[must_use]
    pub fn stats(&self) -> EncoderStats {
        EncoderStats {
            total_original_bytes: self.counters.total_original_bytes.load(Ordering::Relaxed),
            total_encoded_bytes: self.counters.total_encoded_bytes.load(Ordering::Relaxed),
            message_count: self.counters.message_count.load(Ordering::Relaxed),
            registry_stats: self.registry.stats(),
        }
    }
}

/// Converts byte frames back into structured messages.
pub struct Decoder {
    registry: Arc<SemanticRegistry>,
}

impl Decoder {
    #[must_use]
    pub fn new(registry: Arc<SemanticRegistry>) -> Self {
        Self { registry }
    }

    /// Decodes a single frame from an already length-delimited buffer.
    pub fn decode(&self, bytes: &[u8]) -> Result<StructuredMessage, CodecError> {
        let mut buf = bytes::BytesMut::from(bytes);
        let frame = Frame::decode(&mut buf)?.ok_or(CodecError::FrameTooShort {
            len: bytes.len(),
            min: crate::frame::HEADER_SIZE,
        })?;
        self.decode_frame(&frame)
    }

    pub fn decode_frame(&self, frame: &Frame) -> Result<StructuredMessage, CodecError> {
        let mut payload: &[u8] = &frame.payload;
        let mut delta_ref = None;

        if frame.flags.contains(FrameFlags::IS_DELTA) {
            if payload.len() < 8 {
                return Err(CodecError::LengthMismatch {
                    expected: 8,
                    actual: payload.len(),
                });
            }
            let (prefix, rest) = payload.split_at(8);
            delta_ref = Some(u64::from_be_bytes(prefix.try_into().unwrap()));
            payload = rest;
        }

        let payload: Vec<u8> = if frame.flags.contains(FrameFlags::HAS_HASH) {
            if payload.len() != 8 {
                return Err(CodecError::LengthMismatch {
                    expected: 8,
                    actual: payload.len(),
                });
            }
            let hash = u64::from_be_bytes(payload.try_into().unwrap());
            self.registry
                .get(hash)
                .ok_or(CodecError::HashNotFound(hash))?
        } else if frame.flags.contains(FrameFlags::COMPRESSED) {
            lz4_flex::block::decompress_size_prepended(payload)
                .map_err(|e| CodecError::DecompressionFailed(e.to_string()))?
        } else {
            payload.to_vec()
        };

        let envelope = deserialize(&payload)?;
        from_envelope(&envelope, delta_ref)
    }
}

fn serialize(value: &Value) -> Result<Vec<u8>, CodecError> {
    let mut buf = Vec::new();
    rmpv::encode::write_value(&mut buf, value)
        .map_err(|e| CodecError::UnpackFailed(e.to_string()))?;
    Ok(buf)
}

fn deserialize(bytes: &[u8]) -> Result<Value, CodecError> {
    let mut cursor = bytes;
    let value = rmpv::decode::read_value(&mut cursor)
        .map_err(|e| CodecError::UnpackFailed(e.to_string()))?;
    if !matches!(value, Value::Map(_)) {
        return Err(CodecError::InvalidSchema("decoded payload is not a map".to_string()));
    }
    Ok(value)
}

fn to_envelope(msg: &StructuredMessage) -> Value {
    use cbp_schema::{
        FIELD_CONTENT, FIELD_CORRELATION_ID, FIELD_IN_RESPONSE_TO, FIELD_MESSAGE_ID,
        FIELD_METADATA, FIELD_PRIORITY, FIELD_RECEIVER, FIELD_SENDER, FIELD_TIMESTAMP, FIELD_TYPE,
    };

    let mut entries = vec![
        (Value::from(FIELD_TYPE.0), Value::from(msg.kind.to_u8())),
        (Value::from(FIELD_SENDER.0), Value::from(msg.sender.0)),
        (Value::from(FIELD_RECEIVER.0), Value::from(msg.receiver.0)),
        (Value::from(FIELD_CONTENT.0), canonicalize(&msg.content)),
        (Value::from(FIELD_METADATA.0), canonicalize(&msg.metadata)),
        (Value::from(FIELD_TIMESTAMP.0), Value::from(msg.timestamp)),
        (
            Value::from(FIELD_MESSAGE_ID.0),
            Value::from(msg.message_id.clone()),
        ),
        (Value::from(FIELD_PRIORITY.0), Value::from(msg.priority.to_u8())),
    ];
    if let Some(cid) = &msg.correlation_id {
        entries.push((Value::from(FIELD_CORRELATION_ID.0), Value::from(cid.clone())));
    }
    if let Some(irt) = &msg.in_response_to {
        entries.push((Value::from(FIELD_IN_RESPONSE_TO.0), Value::from(irt.clone())));
    }
    Value::Map(entries)
}

fn from_envelope(value: &Value, delta_ref: Option<u64>) -> Result<StructuredMessage, CodecError> {
    let decanon = decanonicalize(value);
    let Value::Map(_) = &decanon else {
        return Err(CodecError::InvalidSchema("envelope is not a map".to_string()));
    };

    let kind_raw = field_u64(&decanon, "type")
        .ok_or_else(|| CodecError::InvalidSchema("missing type field".to_string()))?;
    let kind = MessageKind::from_u8(kind_raw as u8)
        .ok_or_else(|| CodecError::InvalidSchema(format!("unknown message kind {kind_raw}")))?;

    let sender = AgentId(
        field_u64(&decanon, "sender")
            .ok_or_else(|| CodecError::InvalidSchema("missing sender field".to_string()))?
            as u8,
    );
    let receiver = AgentId(
        field_u64(&decanon, "receiver")
            .ok_or_else(|| CodecError::InvalidSchema("missing receiver field".to_string()))?
            as u8,
    );
    let content = field_value(&decanon, "content")
        .cloned()
        .unwrap_or_else(|| Value::Map(Vec::new()));
    let metadata = field_value(&decanon, "metadata")
        .cloned()
        .unwrap_or_else(|| Value::Map(Vec::new()));
    let timestamp = field_i64(&decanon, "timestamp").unwrap_or(0);
    let message_id = field_string(&decanon, "message_id").unwrap_or_default();
    let priority = field_u64(&decanon, "priority")
        .and_then(|p| Priority::from_u8(p as u8))
        .unwrap_or_default();
    let correlation_id = field_string(&decanon, "correlation_id");
    let in_response_to = field_string(&decanon, "in_response_to");

    Ok(StructuredMessage {
        kind,
        sender,
        receiver,
        content,
        metadata,
        priority,
        timestamp,
        message_id,
        correlation_id,
        in_response_to,
        delta_ref,
    })
}

fn field_value<'a>(map: &'a Value, name: &str) -> Option<&'a Value> {
    let Value::Map(entries) = map else {
        return None;
    };
    entries
        .iter()
        .find(|(k, _)| matches!(k, Value::String(s) if s.as_str() == Some(name)))
        .map(|(_, v)| v)
}

fn field_u64(map: &Value, name: &str) -> Option<u64> {
    field_value(map, name).and_then(rmpv::Value::as_u64)
}

fn field_i64(map: &Value, name: &str) -> Option<i64> {
    field_value(map, name).and_then(rmpv::Value::as_i64)
}

fn field_string(map: &Value, name: &str) -> Option<String> {
    field_value(map, name)
        .and_then(rmpv::Value::as_str)
        .map(str::to_string)
}
