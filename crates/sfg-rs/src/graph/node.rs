use std::collections::BTreeMap;
use std::fmt;

use smallvec::SmallVec;

use crate::kernel::TaskLaunchRecord;
use crate::meta::TaskMeta;
use crate::state::AsyncState;

/// Position of a node in the graph's storage. Edges and the owner/reader
/// tables store these indices; every structural move remaps them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub usize);

pub(crate) type EdgeSet = SmallVec<[NodeId; 4]>;
pub(crate) type EdgeMap = BTreeMap<AsyncState, EdgeSet>;

/// Inserts `target` into an edge set, keeping set semantics.
pub(crate) fn edge_insert(map: &mut EdgeMap, state: AsyncState, target: NodeId) -> bool {
    let set = map.entry(state).or_default();
    if set.contains(&target) {
        false
    } else {
        set.push(target);
        true
    }
}

/// Removes `target` from an edge set, dropping the entry once it empties.
pub(crate) fn edge_remove(map: &mut EdgeMap, state: &AsyncState, target: NodeId) -> bool {
    let Some(set) = map.get_mut(state) else {
        return false;
    };
    let before = set.len();
    set.retain(|id| *id != target);
    let removed = set.len() != before;
    if set.is_empty() {
        map.remove(state);
    }
    removed
}

/// A single launch in the graph, with its metadata and per-state edges.
///
/// `rec` is `None` only for the initial node, the sentinel producer of every
/// state not written inside the graph yet. A present record with an empty IR
/// handle marks a task that fusion has absorbed into another node.
#[derive(Debug, Clone)]
pub struct Node {
    pub id: NodeId,
    pub launch_id: usize,
    pub is_initial: bool,
    pub rec: Option<TaskLaunchRecord>,
    pub meta: TaskMeta,
    pub input_edges: EdgeMap,
    pub output_edges: EdgeMap,
}

impl Node {
    pub(crate) fn initial() -> Self {
        Self {
            id: NodeId(0),
            launch_id: 0,
            is_initial: true,
            rec: None,
            meta: TaskMeta::initial(),
            input_edges: EdgeMap::new(),
            output_edges: EdgeMap::new(),
        }
    }

    /// True for the initial node and for tasks fusion has emptied out.
    pub fn is_empty(&self) -> bool {
        self.rec.as_ref().map_or(true, TaskLaunchRecord::is_empty)
    }

    /// An edge on `state` into `to` carries data iff this node writes the
    /// state and `to` reads it; otherwise it only serializes a write after
    /// reads.
    pub fn has_state_flow(&self, state: AsyncState, to: &Node) -> bool {
        self.meta.output_states.contains(&state) && to.meta.input_states.contains(&state)
    }

    /// Drops every edge entry mentioning `other`, on both sides of this node.
    pub(crate) fn remove_edges_to(&mut self, other: NodeId) {
        self.input_edges.retain(|_, set| {
            set.retain(|id| *id != other);
            !set.is_empty()
        });
        self.output_edges.retain(|_, set| {
            set.retain(|id| *id != other);
            !set.is_empty()
        });
    }
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[node: {}:{}]", self.meta.name, self.launch_id)
    }
}
