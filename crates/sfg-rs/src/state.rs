use std::fmt;

use serde::{Deserialize, Serialize};

use crate::snode::{SNodeForest, SNodeId};

/// Access kind distinguishing the pieces of state a snode region exposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum StateKind {
    Value,
    Mask,
    List,
    ListTail,
}

impl fmt::Display for StateKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            StateKind::Value => "value",
            StateKind::Mask => "mask",
            StateKind::List => "list",
            StateKind::ListTail => "list_tail",
        };
        f.write_str(name)
    }
}

/// Identifies a piece of mutable program state: a snode region paired with an
/// access kind. Two keys denote the same state iff both fields match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AsyncState {
    pub snode: SNodeId,
    pub kind: StateKind,
}

impl AsyncState {
    pub fn new(snode: SNodeId, kind: StateKind) -> Self {
        Self { snode, kind }
    }

    pub fn value(snode: SNodeId) -> Self {
        Self::new(snode, StateKind::Value)
    }

    pub fn mask(snode: SNodeId) -> Self {
        Self::new(snode, StateKind::Mask)
    }

    pub fn list(snode: SNodeId) -> Self {
        Self::new(snode, StateKind::List)
    }

    pub fn list_tail(snode: SNodeId) -> Self {
        Self::new(snode, StateKind::ListTail)
    }

    /// Human-readable label used by the printer and the DOT dumper.
    pub fn display_name(&self, forest: &SNodeForest) -> String {
        format!("{}_{}", forest.name(self.snode), self.kind)
    }
}
