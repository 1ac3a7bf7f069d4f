//! Agent identifier space.
//!
//! Closed set of 8-bit IDs split into three disjoint ranges: core roles
//! (`0x01`-`0x0F`), extended roles (`0x10`-`0x2F`), and system roles
//! (`user = 0xFE`, `system = 0xFF`). `0x00` is unknown. `0xFD` is the
//! broadcast sentinel used by `cbp-bus::Bus::send` to address every
//! registered agent except the sender.

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// An 8-bit agent identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AgentId(pub u8);

impl AgentId {
    pub const UNKNOWN: Self = Self(0x00);
    pub const ORCHESTRATOR: Self = Self(0x01);
    pub const PLANNER: Self = Self(0x02);
    pub const RESEARCHER: Self = Self(0x03);
    pub const CODER: Self = Self(0x04);
    pub const REVIEWER: Self = Self(0x05);
    pub const TESTER: Self = Self(0x06);
    pub const SUMMARIZER: Self = Self(0x07);
    pub const TRANSLATOR: Self = Self(0x08);

    pub const EMBEDDING_SERVICE: Self = Self(0x10);
    pub const VECTOR_SEARCH: Self = Self(0x11);
    pub const DOCUMENT_INGEST: Self = Self(0x12);
    pub const LLM_GATEWAY: Self = Self(0x13);
    pub const TOOL_RUNNER: Self = Self(0x14);

    /// Every registered agent except the sender.
    pub const BROADCAST: Self = Self(0xFD);
    pub const USER: Self = Self(0xFE);
    pub const SYSTEM: Self = Self(0xFF);

    #[must_use]
    pub const fn is_core_role(self) -> bool {
        self.0 >= 0x01 && self.0 <= 0x0F
    }

    #[must_use]
    pub const fn is_extended_role(self) -> bool {
        self.0 >= 0x10 && self.0 <= 0x2F
    }

    #[must_use]
    pub const fn is_system_role(self) -> bool {
        matches!(self.0, 0xFE | 0xFF)
    }

    #[must_use]
    pub const fn is_broadcast(self) -> bool {
        self.0 == Self::BROADCAST.0
    }
}

const AGENT_TABLE: &[(&str, AgentId)] = &[
    ("orchestrator", AgentId::ORCHESTRATOR),
    ("planner", AgentId::PLANNER),
    ("researcher", AgentId::RESEARCHER),
    ("coder", AgentId::CODER),
    ("reviewer", AgentId::REVIEWER),
    ("tester", AgentId::TESTER),
    ("summarizer", AgentId::SUMMARIZER),
    ("translator", AgentId::TRANSLATOR),
    ("embedding_service", AgentId::EMBEDDING_SERVICE),
    ("vector_search", AgentId::VECTOR_SEARCH),
    ("document_ingest", AgentId::DOCUMENT_INGEST),
    ("llm_gateway", AgentId::LLM_GATEWAY),
    ("tool_runner", AgentId::TOOL_RUNNER),
    ("broadcast", AgentId::BROADCAST),
    ("user", AgentId::USER),
    ("system", AgentId::SYSTEM),
];

static NAME_TO_ID: Lazy<HashMap<&'static str, AgentId>> =
    Lazy::new(|| AGENT_TABLE.iter().copied().collect());

static ID_TO_NAME: Lazy<HashMap<AgentId, &'static str>> =
    Lazy::new(|| AGENT_TABLE.iter().map(|(name, id)| (*id, *name)).collect());

/// Look up an agent's numeric ID by name. Unknown names return `None`;
/// callers must handle it, they must never treat it as fatal.
#[must_use]
pub fn agent_id(name: &str) -> Option<AgentId> {
    NAME_TO_ID.get(name).copied()
}

/// Look up an agent's name by numeric ID. Unknown IDs return `None`.
#[must_use]
pub fn agent_name(id: AgentId) -> Option<&'static str> {
    ID_TO_NAME.get(&id).copied()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ranges_are_disjoint() {
        assert!(AgentId::ORCHESTRATOR.is_core_role());
        assert!(!AgentId::ORCHESTRATOR.is_extended_role());
        assert!(AgentId::EMBEDDING_SERVICE.is_extended_role());
        assert!(!AgentId::EMBEDDING_SERVICE.is_core_role());
        assert!(AgentId::USER.is_system_role());
        assert!(AgentId::SYSTEM.is_system_role());
        assert!(!AgentId::BROADCAST.is_system_role());
        assert!(AgentId::BROADCAST.is_broadcast());
    }

    #[test]
    fn table_round_trips() {
        for (name, id) in AGENT_TABLE {
            assert_eq!(agent_id(name), Some(*id));
            assert_eq!(agent_name(*id), Some(*name));
        }
    }

    #[test]
    fn unknown_name_and_id_return_none() {
        assert_eq!(agent_id("not-a-real-agent"), None);
        assert_eq!(agent_name(AgentId(0x42)), None);
    }
}
