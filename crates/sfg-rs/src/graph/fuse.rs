//! Kernel fusion: merges fusable launches into one larger launch to cut
//! per-launch overhead, keeping the dependency structure intact.

use std::collections::HashSet;

use crate::ir::{passes, TaskType};
use crate::ir_bank::IrBank;
use crate::kernel::IrHandle;
use crate::meta::get_task_meta;
use crate::snode::SNodeForest;
use crate::state::AsyncState;

use super::bitset::Bitset;
use super::node::{edge_insert, edge_remove, EdgeSet};
use super::{NodeId, StateFlowGraph};

impl StateFlowGraph {
    /// Repeatedly merges fusable tasks until a full pass changes nothing,
    /// then compacts the emptied tasks away and restores topological order.
    pub fn fuse(&mut self, bank: &mut IrBank, forest: &SNodeForest) -> bool {
        let n = self.nodes.len();
        if n <= 2 {
            return false;
        }

        self.reid_nodes();
        let (mut has_path, mut has_path_reverse) = self.compute_transitive_closure();

        // Task-type fusability only depends on launch shape and kernel
        // signatures, none of which fusion changes, so one cache serves the
        // whole fixed point.
        let mut task_type_fusable: Vec<Bitset> = (0..n).map(|_| Bitset::new(n)).collect();
        for i in 1..n {
            for j in (i + 1)..n {
                if self.records_fusable(i, j) {
                    task_type_fusable[i].set(j, true);
                }
            }
        }

        let mut fused = vec![false; n];
        let mut modified = false;
        loop {
            let mut updated = false;
            for i in 1..n {
                fused[i] = self.nodes[i].is_empty();
            }

            // First, merge along direct edges.
            for i in 1..n {
                if fused[i] {
                    continue;
                }
                let candidates: Vec<usize> = self.nodes[i]
                    .output_edges
                    .values()
                    .flat_map(|set| set.iter().map(|id| id.0))
                    .collect();
                for j in candidates {
                    if j <= i || fused[j] || !task_type_fusable[i].get(j) {
                        continue;
                    }
                    // Only legal when i reaches j directly and through no
                    // intermediate task; fusing across one would close a
                    // cycle.
                    let mut between = has_path[i].and(&has_path_reverse[j]);
                    between.set(i, false);
                    between.set(j, false);
                    if between.none() {
                        self.do_fuse(bank, forest, i, j, &mut has_path, &mut has_path_reverse);
                        fused[i] = true;
                        fused[j] = true;
                        updated = true;
                        break;
                    }
                }
            }

            // Then pair up tasks with no path between them in either
            // direction.
            for i in 1..n {
                if fused[i] {
                    continue;
                }
                for j in (i + 1)..n {
                    if !fused[j]
                        && task_type_fusable[i].get(j)
                        && !has_path[i].get(j)
                        && !has_path[j].get(i)
                    {
                        self.do_fuse(bank, forest, i, j, &mut has_path, &mut has_path_reverse);
                        fused[i] = true;
                        fused[j] = true;
                        updated = true;
                        break;
                    }
                }
            }

            if updated {
                modified = true;
            } else {
                break;
            }
        }

        if modified {
            let to_delete: HashSet<NodeId> = self
                .nodes
                .iter()
                .skip(1)
                .filter(|node| node.is_empty())
                .map(|node| node.id)
                .collect();
            self.delete_nodes(&to_delete);
            self.topo_sort_nodes();
        }

        modified
    }

    /// Whether the launch shapes and kernel signatures of nodes `i < j` allow
    /// merging at all. Reachability is checked separately.
    fn records_fusable(&self, i: usize, j: usize) -> bool {
        let (Some(rec_i), Some(rec_j)) = (&self.nodes[i].rec, &self.nodes[j].rec) else {
            return false;
        };
        if rec_i.is_empty() || rec_j.is_empty() {
            return false;
        }
        let task_i = rec_i.task().expect("non-empty record carries IR");
        let task_j = rec_j.task().expect("non-empty record carries IR");

        let is_same_struct_for = task_i.task_type == TaskType::StructFor
            && task_j.task_type == TaskType::StructFor
            && task_i.snode == task_j.snode
            && task_i.block_dim == task_j.block_dim;
        // Matching constant ranges can still belong to loops of different
        // index shapes; the launch record carries no shape to compare.
        let is_same_range_for = task_i.task_type == TaskType::RangeFor
            && task_j.task_type == TaskType::RangeFor
            && task_i.const_begin
            && task_j.const_begin
            && task_i.const_end
            && task_j.const_end
            && task_i.begin_value == task_j.begin_value
            && task_i.end_value == task_j.end_value;
        let are_both_serial =
            task_i.task_type == TaskType::Serial && task_j.task_type == TaskType::Serial;

        // Merging kernels with different signatures would break the backend's
        // type-check invariants.
        let kernel_args_match = rec_i.same_kernel(rec_j)
            || (rec_i.kernel.has_empty_signature() && rec_j.kernel.has_empty_signature());
        let is_snode_accessor = rec_i.kernel.is_accessor || rec_j.kernel.is_accessor;

        (is_same_struct_for || is_same_range_for || are_both_serial)
            && kernel_args_match
            && !is_snode_accessor
    }

    /// Merges task `b` into task `a`: splices the IR bodies, rewires every
    /// edge of `b` onto `a`, and keeps the closure matrices consistent by
    /// treating the pair as mutually reachable from here on.
    fn do_fuse(
        &mut self,
        bank: &mut IrBank,
        forest: &SNodeForest,
        a: usize,
        b: usize,
        has_path: &mut [Bitset],
        has_path_reverse: &mut [Bitset],
    ) {
        let rec_a = self.nodes[a]
            .rec
            .clone()
            .expect("fusion candidates carry records");
        let rec_b = self.nodes[b]
            .rec
            .clone()
            .expect("fusion candidates carry records");
        let mut task_a = bank
            .clone_for_mutation(&rec_a.ir_handle)
            .expect("fusion candidates carry IR");
        let mut task_b = bank
            .clone_for_mutation(&rec_b.ir_handle)
            .expect("fusion candidates carry IR");

        let task_b_id = task_b.id;
        let task_a_id = task_a.id;
        task_a.body.append(&mut task_b.body);
        passes::replace_all_usages_with(&mut task_a, task_b_id, task_a_id);
        passes::full_simplify(&mut task_a, false);
        passes::re_id(&mut task_a);

        let hash = bank.get_hash(&task_a);
        let handle = bank.insert(task_a, hash);
        self.nodes[a]
            .rec
            .as_mut()
            .expect("record checked above")
            .ir_handle = handle;
        self.nodes[b]
            .rec
            .as_mut()
            .expect("record checked above")
            .ir_handle = IrHandle::Empty;

        // The merged body usually carries the union of both state sets; later
        // passes must see it.
        let merged_rec = self.nodes[a].rec.clone().expect("record checked above");
        self.nodes[a].meta =
            get_task_meta(bank, forest, &merged_rec).expect("merged task stays well formed");

        // Consumers of b become consumers of a.
        let b_outputs: Vec<(AsyncState, EdgeSet)> = self.nodes[b]
            .output_edges
            .iter()
            .map(|(state, set)| (*state, set.clone()))
            .collect();
        for (state, consumers) in b_outputs {
            for consumer in consumers {
                debug_assert_ne!(consumer.0, a, "a consumer edge back into a would be a cycle");
                edge_remove(&mut self.nodes[consumer.0].input_edges, &state, NodeId(b));
                edge_insert(&mut self.nodes[consumer.0].input_edges, state, NodeId(a));
                edge_insert(&mut self.nodes[a].output_edges, state, consumer);
            }
        }
        // Producers of b become producers of a, except a itself.
        let b_inputs: Vec<(AsyncState, EdgeSet)> = self.nodes[b]
            .input_edges
            .iter()
            .map(|(state, set)| (*state, set.clone()))
            .collect();
        let mut already_had_a_to_b_edge = false;
        for (state, producers) in b_inputs {
            for producer in producers {
                edge_remove(&mut self.nodes[producer.0].output_edges, &state, NodeId(b));
                if producer.0 == a {
                    already_had_a_to_b_edge = true;
                } else {
                    edge_insert(&mut self.nodes[producer.0].output_edges, state, NodeId(a));
                    edge_insert(&mut self.nodes[a].input_edges, state, producer);
                }
            }
        }
        self.nodes[b].input_edges.clear();
        self.nodes[b].output_edges.clear();

        self.redirect_tables(NodeId(b), NodeId(a));

        insert_edge_for_transitive_closure(has_path, has_path_reverse, b, a);
        if !already_had_a_to_b_edge {
            insert_edge_for_transitive_closure(has_path, has_path_reverse, a, b);
        }
    }
}

/// Folds the edge `a -> b` into the closure: every node reaching `a` now
/// reaches everything `b` reaches, and the reverse matrix mirrors exactly the
/// pairs that flipped.
fn insert_edge_for_transitive_closure(
    has_path: &mut [Bitset],
    has_path_reverse: &mut [Bitset],
    a: usize,
    b: usize,
) {
    let upstream = has_path_reverse[a].ones();
    let b_row = has_path[b].clone();
    for x in upstream {
        for y in has_path[x].or_eq_get_update_list(&b_row) {
            has_path_reverse[y].set(x, true);
        }
    }
}
