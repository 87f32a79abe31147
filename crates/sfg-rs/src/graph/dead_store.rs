//! Dead-store elimination: output states nothing consumes are erased from
//! the producing IR where possible, and tasks left with empty bodies are
//! dropped from the graph.

use std::collections::HashSet;

use crate::ir::passes::{gather_statements, re_id, DelayedIrModifier};
use crate::ir::{StmtKind, TaskType};
use crate::ir_bank::IrBank;
use crate::meta::get_task_meta;
use crate::snode::SNodeForest;
use crate::state::{AsyncState, StateKind};

use super::{NodeId, StateFlowGraph};

impl StateFlowGraph {
    /// Erases unused output states and garbage-collects emptied tasks.
    /// Returns `true` when anything changed.
    pub fn optimize_dead_store(&mut self, bank: &mut IrBank, forest: &SNodeForest) -> bool {
        let mut modified = false;

        for i in 1..self.nodes.len() {
            let output_states: Vec<AsyncState> =
                self.nodes[i].meta.output_states.iter().copied().collect();
            for state in output_states {
                let used = self.nodes[i].output_edges.get(&state).is_some_and(|set| {
                    set.iter()
                        .any(|&to| self.nodes[i].has_state_flow(state, &self.nodes[to.0]))
                });
                if used {
                    continue;
                }
                // A still-latest value stays observable at the end of the
                // graph. Lists are the exception: the next list generation
                // always starts from a cleared list.
                if state.kind != StateKind::List
                    && self.latest_state_owner.get(&state) == Some(&NodeId(i))
                {
                    continue;
                }
                if state.kind == StateKind::List
                    && self.nodes[i].meta.task_type == TaskType::Serial
                {
                    let rec = self.nodes[i].rec.clone().expect("non-initial node has a record");
                    if rec.is_empty() {
                        continue;
                    }
                    let mut new_ir = bank
                        .clone_for_mutation(&rec.ir_handle)
                        .expect("non-empty record carries IR");
                    let mut modifier = DelayedIrModifier::default();
                    for stmt_id in gather_statements(&new_ir, |stmt| {
                        matches!(stmt.kind, StmtKind::ClearList { snode } if snode == state.snode)
                    }) {
                        modifier.erase(stmt_id);
                    }
                    if modifier.modify(&mut new_ir) {
                        re_id(&mut new_ir);
                        let hash = bank.get_hash(&new_ir);
                        let handle = bank.insert(new_ir, hash);
                        self.nodes[i]
                            .rec
                            .as_mut()
                            .expect("record checked above")
                            .ir_handle = handle;
                        let updated_rec =
                            self.nodes[i].rec.clone().expect("record checked above");
                        self.nodes[i].meta = get_task_meta(bank, forest, &updated_rec)
                            .expect("rewritten task stays well formed");

                        let consumers: Vec<NodeId> = self.nodes[i]
                            .output_edges
                            .get(&state)
                            .map(|set| set.to_vec())
                            .unwrap_or_default();
                        for consumer in consumers {
                            super::node::edge_remove(
                                &mut self.nodes[consumer.0].input_edges,
                                &state,
                                NodeId(i),
                            );
                        }
                        self.nodes[i].output_edges.remove(&state);
                        modified = true;
                    }
                }
            }
        }

        let mut to_delete: HashSet<NodeId> = HashSet::new();
        for node in self.nodes.iter().skip(1) {
            let Some(rec) = &node.rec else { continue };
            let Some(task) = rec.task() else { continue };
            if task.has_empty_body() && node.meta.task_type.is_user_task() {
                to_delete.insert(node.id);
            }
        }
        if !to_delete.is_empty() {
            modified = true;
        }
        self.delete_nodes(&to_delete);

        modified
    }
}
