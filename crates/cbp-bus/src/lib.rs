//! Agent Message Bus (C5)
//!
//! Registers per-agent handlers behind priority queues, routes sends and
//! broadcasts, correlates request/response pairs, and composes a resilient
//! call path out of a circuit breaker, exponential-backoff retry, and a
//! TTL request-deduplication cache.

mod breaker;
mod bus;
mod capability;
mod dedup;
mod error;
mod handler;
mod queue;
mod retry;

pub use breaker::{BreakerConfig, BreakerStats, BreakerState, CircuitBreaker};
pub use bus::{Bus, BusConfig, BusStats, HistoryFilter, DEFAULT_HISTORY_CAPACITY};
pub use capability::{AgentRegistryEntry, CapabilityEntry, CapabilityRegistry};
pub use dedup::{fingerprint, DedupCache, DEFAULT_TTL};
pub use error::BusError;
pub use handler::{AgentHandler, FnHandler};
pub use retry::RetryPolicy;
