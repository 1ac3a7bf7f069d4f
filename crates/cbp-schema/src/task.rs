//! Task name table.
//!
//! Illustrative only: the names an agent assigns to a `task` field are
//! business logic, not something this crate governs. The table exists so
//! the Schema Registry's bidirectional contract has a concrete, testable
//! instance.

use once_cell::sync::Lazy;
use std::collections::HashMap;

const TASK_TABLE: &[(&str, u8)] = &[
    ("analyze", 1),
    ("summarize", 2),
    ("translate", 3),
    ("retrieve", 4),
    ("review", 5),
    ("plan", 6),
    ("execute_tool", 7),
];

static NAME_TO_ID: Lazy<HashMap<&'static str, u8>> =
    Lazy::new(|| TASK_TABLE.iter().copied().collect());

static ID_TO_NAME: Lazy<HashMap<u8, &'static str>> =
    Lazy::new(|| TASK_TABLE.iter().map(|(name, id)| (*id, *name)).collect());

#[must_use]
pub fn task_id(name: &str) -> Option<u8> {
    NAME_TO_ID.get(name).copied()
}

#[must_use]
pub fn task_name(id: u8) -> Option<&'static str> {
    ID_TO_NAME.get(&id).copied()
}
