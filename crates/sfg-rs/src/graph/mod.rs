//! The state flow graph: reconstructs the data-dependency DAG of a linear
//! launch stream, optimizes it, and drains it back into a compacted stream.

pub mod bitset;
mod dead_store;
mod fuse;
mod listgen;
mod node;

use std::collections::{HashMap, HashSet, VecDeque};
use std::fmt::Write as _;

use crate::ir_bank::IrBank;
use crate::kernel::TaskLaunchRecord;
use crate::meta::{get_task_meta, TaskMetaError};
use crate::snode::SNodeForest;
use crate::state::AsyncState;

use bitset::Bitset;
use node::{edge_insert, edge_remove, EdgeSet};

pub use node::{Node, NodeId};

/// The sentinel producer of every state that has not been written inside the
/// graph yet. It is never deleted; `clear` only resets it.
pub const INITIAL_NODE: NodeId = NodeId(0);

/// Dependency DAG over enqueued kernel launches.
///
/// Nodes are owned by the graph and referenced everywhere else by index.
/// Structural mutations (deletion, compaction, topological sorting) rebuild
/// the indices through an old-to-new map, after `disconnect_all` has removed
/// every mention of a dying node from its neighbors.
#[derive(Debug)]
pub struct StateFlowGraph {
    nodes: Vec<Node>,
    latest_state_owner: HashMap<AsyncState, NodeId>,
    latest_state_readers: HashMap<AsyncState, EdgeSet>,
    task_name_to_launch_ids: HashMap<String, usize>,
}

impl StateFlowGraph {
    pub fn new() -> Self {
        Self {
            nodes: vec![Node::initial()],
            latest_state_owner: HashMap::new(),
            latest_state_readers: HashMap::new(),
            task_name_to_launch_ids: HashMap::new(),
        }
    }

    pub fn num_nodes(&self) -> usize {
        self.nodes.len()
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.0]
    }

    pub fn latest_state_owner(&self, state: &AsyncState) -> Option<NodeId> {
        self.latest_state_owner.get(state).copied()
    }

    /// Truncates the graph back to the initial node. Launch-id counters are
    /// kept so task labels stay stable across windows.
    pub fn clear(&mut self) {
        self.nodes.truncate(1);
        self.nodes[0].output_edges.clear();
        self.latest_state_owner.clear();
        self.latest_state_readers.clear();
    }

    /// Appends one launch, wiring it against the latest owner and reader
    /// tables.
    pub fn insert_task(
        &mut self,
        bank: &mut IrBank,
        forest: &SNodeForest,
        rec: TaskLaunchRecord,
    ) -> Result<(), TaskMetaError> {
        let meta = get_task_meta(bank, forest, &rec)?;
        let launch_id = {
            let counter = self
                .task_name_to_launch_ids
                .entry(meta.name.clone())
                .or_insert(0);
            let id = *counter;
            *counter += 1;
            id
        };
        let input_states: Vec<AsyncState> = meta.input_states.iter().copied().collect();
        let output_states: Vec<AsyncState> = meta.output_states.iter().copied().collect();
        let id = NodeId(self.nodes.len());
        self.nodes.push(Node {
            id,
            launch_id,
            is_initial: false,
            rec: Some(rec),
            meta,
            input_edges: Default::default(),
            output_edges: Default::default(),
        });

        for &state in &input_states {
            let owner = *self
                .latest_state_owner
                .entry(state)
                .or_insert(INITIAL_NODE);
            self.insert_state_flow(owner, id, state);
        }
        for &state in &output_states {
            self.latest_state_owner.insert(state, id);
            let readers = self.latest_state_readers.entry(state).or_default();
            if readers.is_empty() {
                readers.push(INITIAL_NODE);
            }
            let readers: EdgeSet = std::mem::take(readers);
            for reader in readers {
                // A write must wait for every read of the previous value.
                self.insert_state_flow(reader, id, state);
            }
        }
        // Must run after the output wiring, or the task would depend on its
        // own write.
        for &state in &input_states {
            let readers = self.latest_state_readers.entry(state).or_default();
            if !readers.contains(&id) {
                readers.push(id);
            }
        }
        Ok(())
    }

    /// Records the edge `from --state--> to` on both endpoints.
    pub fn insert_state_flow(&mut self, from: NodeId, to: NodeId, state: AsyncState) {
        assert!(
            from.0 < self.nodes.len() && to.0 < self.nodes.len(),
            "state flow endpoints must exist"
        );
        assert_ne!(from, to, "a task cannot depend on itself");
        edge_insert(&mut self.nodes[from.0].output_edges, state, to);
        edge_insert(&mut self.nodes[to.0].input_edges, state, from);
    }

    /// Drains the graph: returns the launch records of every non-initial node
    /// in order and resets the graph.
    pub fn extract(&mut self) -> Vec<TaskLaunchRecord> {
        let mut tasks = Vec::with_capacity(self.nodes.len().saturating_sub(1));
        for node in &self.nodes[1..] {
            if let Some(rec) = &node.rec {
                tasks.push(rec.clone());
            }
        }
        self.clear();
        tasks
    }

    /// Moves every consumer of `a` onto `b`: matching input edges are
    /// retargeted and `b` gains the corresponding output edges. `a` keeps no
    /// outputs afterwards, and owner/reader table entries follow the move.
    pub fn replace_reference(&mut self, a: NodeId, b: NodeId) {
        let moved: Vec<(AsyncState, EdgeSet)> = self.nodes[a.0]
            .output_edges
            .iter()
            .map(|(state, set)| (*state, set.clone()))
            .collect();
        for (state, consumers) in moved {
            for consumer in consumers {
                debug_assert_ne!(consumer, b, "replacement would create a self edge");
                if edge_remove(&mut self.nodes[consumer.0].input_edges, &state, a) {
                    edge_insert(&mut self.nodes[consumer.0].input_edges, state, b);
                    edge_insert(&mut self.nodes[b.0].output_edges, state, consumer);
                }
            }
        }
        self.nodes[a.0].output_edges.clear();
        self.redirect_tables(a, b);
    }

    /// Disconnects the given nodes, drops them, and renumbers the survivors.
    /// States owned by a dropped node fall back to the initial node.
    pub fn delete_nodes(&mut self, indices_to_delete: &HashSet<NodeId>) {
        if indices_to_delete.is_empty() {
            return;
        }
        assert!(
            !indices_to_delete.contains(&INITIAL_NODE),
            "the initial node is immortal"
        );
        for &id in indices_to_delete {
            self.disconnect_all(id);
        }

        let mut remap: Vec<Option<NodeId>> = Vec::with_capacity(self.nodes.len());
        let mut next = 0usize;
        for index in 0..self.nodes.len() {
            if indices_to_delete.contains(&NodeId(index)) {
                remap.push(None);
            } else {
                remap.push(Some(NodeId(next)));
                next += 1;
            }
        }

        for node in &mut self.nodes {
            for set in node
                .input_edges
                .values_mut()
                .chain(node.output_edges.values_mut())
            {
                for id in set.iter_mut() {
                    *id = remap[id.0].expect("edges into deleted nodes must be disconnected");
                }
            }
        }

        let old_nodes = std::mem::take(&mut self.nodes);
        self.nodes = old_nodes
            .into_iter()
            .enumerate()
            .filter_map(|(index, node)| remap[index].map(|_| node))
            .collect();

        for owner in self.latest_state_owner.values_mut() {
            *owner = remap[owner.0].unwrap_or(INITIAL_NODE);
        }
        for readers in self.latest_state_readers.values_mut() {
            let survivors: EdgeSet = readers.iter().filter_map(|id| remap[id.0]).collect();
            *readers = survivors;
        }

        self.reid_nodes();
    }

    /// Assigns dense ids matching storage order.
    pub fn reid_nodes(&mut self) {
        for (index, node) in self.nodes.iter_mut().enumerate() {
            node.id = NodeId(index);
        }
        assert!(
            self.nodes[0].is_initial,
            "the initial node must stay at index zero"
        );
    }

    /// Kahn's algorithm over per-state in-degree counts. The queue is seeded
    /// with every zero-in-degree node in index order, so parallel roots
    /// cannot starve and the initial node stays first.
    pub fn topo_sort_nodes(&mut self) {
        self.reid_nodes();
        let n = self.nodes.len();
        let mut degrees_in = vec![0usize; n];
        for node in &self.nodes {
            let degree: usize = node.input_edges.values().map(EdgeSet::len).sum();
            degrees_in[node.id.0] = degree;
        }

        let mut queue: VecDeque<usize> = (0..n).filter(|&index| degrees_in[index] == 0).collect();
        let mut order: Vec<usize> = Vec::with_capacity(n);
        while let Some(head) = queue.pop_front() {
            for set in self.nodes[head].output_edges.values() {
                for &to in set {
                    assert!(degrees_in[to.0] > 0, "in-degree bookkeeping out of sync");
                    degrees_in[to.0] -= 1;
                    if degrees_in[to.0] == 0 {
                        queue.push_back(to.0);
                    }
                }
            }
            order.push(head);
        }
        assert_eq!(
            order.len(),
            n,
            "the state flow graph must be acyclic to sort"
        );

        let mut remap = vec![NodeId(0); n];
        for (new_index, &old_index) in order.iter().enumerate() {
            remap[old_index] = NodeId(new_index);
        }
        for node in &mut self.nodes {
            for set in node
                .input_edges
                .values_mut()
                .chain(node.output_edges.values_mut())
            {
                for id in set.iter_mut() {
                    *id = remap[id.0];
                }
            }
        }
        for owner in self.latest_state_owner.values_mut() {
            *owner = remap[owner.0];
        }
        for readers in self.latest_state_readers.values_mut() {
            for id in readers.iter_mut() {
                *id = remap[id.0];
            }
        }

        let old_nodes = std::mem::take(&mut self.nodes);
        let mut slots: Vec<Option<Node>> = (0..n).map(|_| None).collect();
        for (old_index, node) in old_nodes.into_iter().enumerate() {
            slots[remap[old_index].0] = Some(node);
        }
        self.nodes = slots
            .into_iter()
            .map(|slot| slot.expect("topological order must be a permutation"))
            .collect();
        self.reid_nodes();
    }

    /// Removes every mention of `id` from its neighbors and empties its own
    /// edge maps. Must run before the owning slot is freed.
    pub(crate) fn disconnect_all(&mut self, id: NodeId) {
        let mut neighbors: Vec<NodeId> = Vec::new();
        for set in self.nodes[id.0]
            .input_edges
            .values()
            .chain(self.nodes[id.0].output_edges.values())
        {
            for &other in set {
                if other != id && !neighbors.contains(&other) {
                    neighbors.push(other);
                }
            }
        }
        for other in neighbors {
            self.nodes[other.0].remove_edges_to(id);
        }
        self.nodes[id.0].input_edges.clear();
        self.nodes[id.0].output_edges.clear();
    }

    /// Points owner and reader table entries at `to` wherever they mention
    /// `from`.
    pub(crate) fn redirect_tables(&mut self, from: NodeId, to: NodeId) {
        for owner in self.latest_state_owner.values_mut() {
            if *owner == from {
                *owner = to;
            }
        }
        for readers in self.latest_state_readers.values_mut() {
            if readers.contains(&from) {
                readers.retain(|id| *id != from);
                if !readers.contains(&to) {
                    readers.push(to);
                }
            }
        }
    }

    /// Reachability matrices over the current node order. `has_path[i]` bit
    /// `j` means a directed path `i -> j` exists (reflexively true); the
    /// reverse matrix mirrors it. Assumes indices are topologically ordered.
    pub(crate) fn compute_transitive_closure(&self) -> (Vec<Bitset>, Vec<Bitset>) {
        let n = self.nodes.len();
        let mut has_path: Vec<Bitset> = (0..n).map(|_| Bitset::new(n)).collect();
        let mut has_path_reverse: Vec<Bitset> = (0..n).map(|_| Bitset::new(n)).collect();
        for index in 0..n {
            has_path[index].set(index, true);
            has_path_reverse[index].set(index, true);
        }
        for index in (0..n).rev() {
            for set in self.nodes[index].input_edges.values() {
                for &from in set {
                    assert!(
                        from.0 < index,
                        "graph edges must respect the topological order"
                    );
                    let (left, right) = has_path.split_at_mut(index);
                    left[from.0].or_eq(&right[0]);
                }
            }
        }
        for index in 0..n {
            for set in self.nodes[index].output_edges.values() {
                for &to in set {
                    assert!(
                        to.0 > index,
                        "graph edges must respect the topological order"
                    );
                    let (left, right) = has_path_reverse.split_at_mut(index + 1);
                    right[to.0 - index - 1].or_eq(&left[index]);
                }
            }
        }
        (has_path, has_path_reverse)
    }

    /// Textual dump of every node with its per-state inputs and outputs.
    pub fn render_text(&self, forest: &SNodeForest) -> String {
        let mut out = String::new();
        out.push_str("=== State Flow Graph ===\n");
        for node in &self.nodes {
            let _ = writeln!(out, "{node}");
            if !node.input_edges.is_empty() {
                out.push_str("  Inputs:\n");
                for (state, set) in &node.input_edges {
                    for &from in set {
                        let _ = writeln!(
                            out,
                            "    {} <- {}",
                            state.display_name(forest),
                            self.nodes[from.0]
                        );
                    }
                }
            }
            if !node.output_edges.is_empty() {
                out.push_str("  Outputs:\n");
                for (state, set) in &node.output_edges {
                    for &to in set {
                        let _ = writeln!(
                            out,
                            "    {} -> {}",
                            state.display_name(forest),
                            self.nodes[to.0]
                        );
                    }
                }
            }
        }
        out.push_str("=======================\n");
        out
    }

    pub fn print(&self, forest: &SNodeForest) {
        print!("{}", self.render_text(forest));
    }

    /// Graphviz rendering of the graph. The initial node is a box, current
    /// latest-state owners get a double border, user-level tasks are filled
    /// gray, and dependency-only edges are dotted.
    pub fn dump_dot(&self, forest: &SNodeForest, rankdir: Option<&str>) -> String {
        let dot_id =
            |node: &Node| -> String { format!("n_{}_{}", node.meta.name, node.launch_id) };
        let mut out = String::new();
        out.push_str("digraph {\n");
        if let Some(rankdir) = rankdir {
            let _ = writeln!(out, "  rankdir={rankdir}");
        }
        out.push('\n');

        let latest_state_nodes: HashSet<NodeId> =
            self.latest_state_owner.values().copied().collect();
        let mut nodes_with_no_inputs: Vec<NodeId> = Vec::new();
        for node in &self.nodes {
            let _ = write!(out, "  {} [label=\"{}\"", dot_id(node), node);
            if node.is_initial {
                out.push_str(",shape=box");
            } else if latest_state_nodes.contains(&node.id) {
                out.push_str(",peripheries=2");
            }
            if !node.is_initial && node.meta.task_type.is_user_task() {
                out.push_str(",style=filled,fillcolor=lightgray");
            }
            out.push_str("]\n");
            if node.input_edges.is_empty() {
                nodes_with_no_inputs.push(node.id);
            }
        }
        out.push('\n');

        let mut visited: HashSet<NodeId> = HashSet::new();
        let mut stack = nodes_with_no_inputs;
        while let Some(from) = stack.pop() {
            if !visited.insert(from) {
                continue;
            }
            let from_node = &self.nodes[from.0];
            for (state, set) in &from_node.output_edges {
                for &to in set {
                    stack.push(to);
                    let style = if from_node.has_state_flow(*state, &self.nodes[to.0]) {
                        ""
                    } else {
                        "style=dotted"
                    };
                    let _ = writeln!(
                        out,
                        "  {} -> {} [label=\"{}\" {}]",
                        dot_id(from_node),
                        dot_id(&self.nodes[to.0]),
                        state.display_name(forest),
                        style
                    );
                }
            }
        }
        if visited.len() > self.nodes.len() {
            eprintln!(
                "visited more nodes than the graph holds; the graph may be malformed"
            );
        }
        out.push_str("}\n");
        out
    }
}

impl Default for StateFlowGraph {
    fn default() -> Self {
        Self::new()
    }
}
