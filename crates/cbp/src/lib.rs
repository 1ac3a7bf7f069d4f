//! CBP: Compressed Binary Protocol and Agent Message Bus.
//!
//! A thin facade over five independently testable components: the
//! numeric schema registry, the semantic (payload) registry, the delta
//! encoder, the wire codec, and the agent message bus. Nothing here opens
//! a socket or spawns a server — that integration is left to callers.
//!
//! Most users only need [`default_bus`] and the [`StructuredMessage`]
//! constructors re-exported below; the component crates remain usable
//! standalone for callers who want to wire encoding or the bus without the
//! other.

pub use cbp_bus::{
    fingerprint, AgentHandler, AgentRegistryEntry, BreakerConfig, BreakerStats, BreakerState,
    Bus, BusConfig, BusError, BusStats, CapabilityEntry, CapabilityRegistry, CircuitBreaker,
    DedupCache, FnHandler, HistoryFilter, RetryPolicy, DEFAULT_HISTORY_CAPACITY, DEFAULT_TTL,
};
pub use cbp_codec::{
    canonicalize, decanonicalize, CodecError, Decoder, EncodeOptions, Encoder, EncoderStats,
    Frame, FrameCodec, FrameFlags, ResilientFrameParser, StructuredMessage, Value, HEADER_SIZE,
    MAGIC, VERSION,
};
pub use cbp_delta::{apply, diff, DeltaStore};
pub use cbp_registry::{RegistryStats, SemanticRegistry, DEFAULT_CAPACITY};
pub use cbp_schema::{
    agent_id, agent_name, field_id, field_name, task_id, task_name, AgentId, ErrorEnvelope,
    ErrorKind, FieldId, FieldKey, MessageKind, Priority,
};

use std::sync::Arc;

/// A [`Bus`] wired to a fresh [`SemanticRegistry`]-backed [`Encoder`] and
/// [`Decoder`] pair, with every bus-level default left as-is — a thin
/// convenience layer on top of the otherwise dependency-injected design.
/// Integrators who need a differently-sized registry, a shared registry
/// across multiple buses, or non-default bus tuning should construct the
/// pieces directly instead.
#[must_use]
pub fn default_bus() -> Bus {
    Bus::new(BusConfig::default())
}

/// A matched [`Encoder`]/[`Decoder`] pair sharing one [`SemanticRegistry`],
/// the wiring a process typically needs alongside a [`default_bus`] to move
/// [`StructuredMessage`]s across a transport.
#[must_use]
pub fn default_codec() -> (Encoder, Decoder) {
    let registry = Arc::new(SemanticRegistry::new(DEFAULT_CAPACITY));
    (
        Encoder::new(Arc::clone(&registry), EncodeOptions::default()),
        Decoder::new(registry),
    )
}
