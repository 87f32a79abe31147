use serde::{Deserialize, Serialize};

/// Identifies one node of the sparse hierarchy the kernels operate on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SNodeId(pub u32);

#[derive(Debug, Clone)]
struct SNodeEntry {
    name: String,
    parent: Option<SNodeId>,
}

/// Append-only registry of sparse-structure nodes with parent links.
///
/// The graph itself never walks the hierarchy; only the task-meta provider
/// does, to resolve the parent-list state of a list-generation launch.
#[derive(Debug, Default, Clone)]
pub struct SNodeForest {
    entries: Vec<SNodeEntry>,
}

impl SNodeForest {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_root(&mut self, name: impl Into<String>) -> SNodeId {
        self.push(name.into(), None)
    }

    pub fn add_child(&mut self, parent: SNodeId, name: impl Into<String>) -> SNodeId {
        assert!(
            (parent.0 as usize) < self.entries.len(),
            "parent snode must be registered first"
        );
        self.push(name.into(), Some(parent))
    }

    pub fn name(&self, id: SNodeId) -> &str {
        &self.entries[id.0 as usize].name
    }

    pub fn parent(&self, id: SNodeId) -> Option<SNodeId> {
        self.entries[id.0 as usize].parent
    }

    pub fn num_snodes(&self) -> usize {
        self.entries.len()
    }

    fn push(&mut self, name: String, parent: Option<SNodeId>) -> SNodeId {
        let id = SNodeId(self.entries.len() as u32);
        self.entries.push(SNodeEntry { name, parent });
        id
    }
}
