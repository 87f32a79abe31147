//! List-generation deduplication: two listgen launches over the same snode
//! that consume the same mask and the same parent list rebuild an identical
//! element list, so the later one can be dropped.

use std::collections::HashSet;

use crate::ir::TaskType;
use crate::state::{AsyncState, StateKind};

use super::bitset::Bitset;
use super::{NodeId, StateFlowGraph};

impl StateFlowGraph {
    /// Removes redundant list-generation launches, rewiring their consumers
    /// onto the surviving launch. Returns `true` when anything changed.
    pub fn optimize_listgen(&mut self) -> bool {
        self.reid_nodes();
        let (has_path, has_path_reverse) = self.compute_transitive_closure();

        let mut common_pairs: Vec<(NodeId, NodeId)> = Vec::new();
        for i in 0..self.nodes.len() {
            if self.nodes[i].meta.task_type != TaskType::ListGen {
                continue;
            }
            for j in (i + 1)..self.nodes.len() {
                if self.nodes[j].meta.task_type != TaskType::ListGen {
                    continue;
                }
                if self.nodes[i].meta.snode != self.nodes[j].meta.snode {
                    continue;
                }
                let snode = self.nodes[i]
                    .meta
                    .snode
                    .expect("listgen meta carries a snode");
                let mask_state = AsyncState::mask(snode);
                let parent_list_state = self.parent_list_state(i);

                if self.single_producer(i, &mask_state) != self.single_producer(j, &mask_state) {
                    continue;
                }
                if self.single_producer(i, &parent_list_state)
                    != self.single_producer(j, &parent_list_state)
                {
                    continue;
                }
                // A writer of the parent list sitting on a path between the
                // two launches would make their inputs diverge.
                if self.has_intervening_writer(
                    &has_path,
                    &has_path_reverse,
                    i,
                    j,
                    &parent_list_state,
                ) {
                    continue;
                }
                common_pairs.push((NodeId(i), NodeId(j)));
            }
        }

        let mut modified = false;
        let mut nodes_to_delete: HashSet<NodeId> = HashSet::new();
        for (i, j) in common_pairs {
            if nodes_to_delete.contains(&i) || nodes_to_delete.contains(&j) {
                continue;
            }
            self.replace_reference(j, i);
            nodes_to_delete.insert(j);
            modified = true;
        }
        self.delete_nodes(&nodes_to_delete);

        modified
    }

    /// The parent-list input state of the listgen at `index`.
    fn parent_list_state(&self, index: usize) -> AsyncState {
        *self.nodes[index]
            .meta
            .input_states
            .iter()
            .find(|state| state.kind == StateKind::List)
            .expect("listgen must consume a parent list")
    }

    /// The single producer feeding `state` into the node at `index`.
    fn single_producer(&self, index: usize, state: &AsyncState) -> NodeId {
        let producers = self.nodes[index]
            .input_edges
            .get(state)
            .expect("listgen input state must be wired");
        assert_eq!(producers.len(), 1, "listgen states have a unique producer");
        producers[0]
    }

    fn has_intervening_writer(
        &self,
        has_path: &[Bitset],
        has_path_reverse: &[Bitset],
        i: usize,
        j: usize,
        state: &AsyncState,
    ) -> bool {
        let mut between = has_path[i].and(&has_path_reverse[j]);
        between.set(i, false);
        between.set(j, false);
        between
            .ones()
            .into_iter()
            .any(|k| self.nodes[k].meta.output_states.contains(state))
    }
}
