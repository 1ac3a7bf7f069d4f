//! Numeric Schema Registry (C1)
//!
//! A static, process-wide lookup table with bidirectional maps between
//! human-readable names and the numeric IDs that travel on the wire.
//! Nothing here is mutable at runtime: every table is built once behind a
//! `once_cell::sync::Lazy` and looked up without locking.
//!
//! Renumbering any constant in this module is a breaking wire change.

mod agent;
mod error;
mod field;
mod kind;
mod priority;
mod task;

pub use agent::{agent_id, agent_name, AgentId};
pub use error::{ErrorEnvelope, ErrorKind};
pub use field::{field_id, field_name, FieldId, FieldKey};
pub use kind::MessageKind;
pub use priority::Priority;
pub use task::{task_id, task_name};
