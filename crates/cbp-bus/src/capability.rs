//! Capability discovery.

use cbp_schema::AgentId;
use dashmap::DashMap;

/// A named, versioned declaration of what an agent can handle.
#[derive(Debug, Clone, PartialEq)]
pub struct CapabilityEntry {
    pub name: String,
    pub version: String,
    pub success_rate: f64,
    pub avg_latency_ms: f64,
}

/// An agent registry entry: identity, tier, declared capabilities,
/// current availability, and last heartbeat timestamp.
#[derive(Debug, Clone)]
pub struct AgentRegistryEntry {
    pub agent_id: AgentId,
    pub tier: u8,
    pub capabilities: Vec<CapabilityEntry>,
    pub availability: bool,
    pub last_heartbeat: i64,
}

/// Weights for `best_agent_for_task`'s composite score: a weighted sum of
/// `success_rate` and inverse latency, fixed at 0.7/0.3 with inverse
/// latency scaled by 100 so it sits in roughly the same 0-1 range as
/// `success_rate` for typical millisecond latencies (see `DESIGN.md`).
const SUCCESS_WEIGHT: f64 = 0.7;
const LATENCY_WEIGHT: f64 = 0.3;
const LATENCY_SCALE: f64 = 100.0;

fn composite_score(capability: &CapabilityEntry) -> f64 {
    let inverse_latency = if capability.avg_latency_ms > 0.0 {
        LATENCY_SCALE / capability.avg_latency_ms
    } else {
        LATENCY_SCALE
    };
    SUCCESS_WEIGHT * capability.success_rate + LATENCY_WEIGHT * inverse_latency
}

/// Backs `find_agents_for_capability` / `best_agent_for_task`. A secondary
/// index keyed on capability name would speed up lookups, but a linear
/// scan over a `DashMap` of agents is simple and fast enough for the
/// expected fleet sizes (dozens of agents).
#[derive(Default)]
pub struct CapabilityRegistry {
    entries: DashMap<AgentId, AgentRegistryEntry>,
}

impl CapabilityRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, entry: AgentRegistryEntry) {
        self.entries.insert(entry.agent_id, entry);
    }

    pub fn remove(&self, agent_id: AgentId) {
        self.entries.remove(&agent_id);
    }

    #[must_use]
    pub fn find_agents_for_capability(&self, name: &str) -> Vec<AgentId> {
        self.entries
            .iter()
            .filter(|e| e.availability && e.capabilities.iter().any(|c| c.name == name))
            .map(|e| e.agent_id)
            .collect()
    }

    /// The available agent declaring every capability in `required` with
    /// the highest composite score across those capabilities, or `None` if
    /// no agent qualifies.
    #[must_use]
    pub fn best_agent_for_task(&self, required: &[String]) -> Option<AgentId> {
        self.entries
            .iter()
            .filter(|e| e.availability)
            .filter(|e| {
                required
                    .iter()
                    .all(|r| e.capabilities.iter().any(|c| &c.name == r))
            })
            .max_by(|a, b| {
                score_for(a, required)
                    .partial_cmp(&score_for(b, required))
                    .unwrap_or(std::cmp::Ordering::Equal)
            })
            .map(|e| e.agent_id)
    }

    #[must_use]
    pub fn get(&self, agent_id: AgentId) -> Option<AgentRegistryEntry> {
        self.entries.get(&agent_id).map(|e| e.clone())
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn score_for(entry: &AgentRegistryEntry, required: &[String]) -> f64 {
    let matching: Vec<&CapabilityEntry> = entry
        .capabilities
        .iter()
        .filter(|c| required.iter().any(|r| r == &c.name))
        .collect();
    if matching.is_empty() {
        return 0.0;
    }
    matching.iter().map(|c| composite_score(c)).sum::<f64>() / matching.len() as f64
}
