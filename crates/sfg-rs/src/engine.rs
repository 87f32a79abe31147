//! Host-side driver owning the graph and its collaborators. The surrounding
//! system enqueues launches here and drains the optimized stream back out.

use anyhow::Result;

use crate::env;
use crate::graph::StateFlowGraph;
use crate::ir_bank::IrBank;
use crate::kernel::TaskLaunchRecord;
use crate::snode::SNodeForest;

/// Aggregated outcome of an optimization run.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct PassStats {
    /// Whether any pass changed the graph.
    pub changed: bool,
    /// Rounds of the listgen/fuse/dead-store sequence that ran.
    pub rounds: usize,
    /// Nodes removed across all passes.
    pub erased_nodes: usize,
}

/// The asynchronous execution engine's front half: records launches into the
/// state flow graph and compacts them before they reach the backend launcher.
#[derive(Debug, Default)]
pub struct AsyncEngine {
    pub snodes: SNodeForest,
    pub ir_bank: IrBank,
    pub sfg: StateFlowGraph,
}

impl AsyncEngine {
    pub fn new(snodes: SNodeForest) -> Self {
        Self {
            snodes,
            ir_bank: IrBank::new(),
            sfg: StateFlowGraph::new(),
        }
    }

    /// Records one kernel launch into the graph.
    pub fn enqueue(&mut self, rec: TaskLaunchRecord) -> Result<()> {
        self.sfg.insert_task(&mut self.ir_bank, &self.snodes, rec)?;
        Ok(())
    }

    /// Runs the optimization sequence until a round changes nothing, bounded
    /// by `SFG_OPT_MAX_ROUNDS`.
    pub fn optimize(&mut self) -> PassStats {
        let mut stats = PassStats::default();
        let max_rounds = env::opt_max_rounds();
        while stats.rounds < max_rounds {
            stats.rounds += 1;
            let mut round_changed = false;

            let before = self.sfg.num_nodes();
            let changed = self.sfg.optimize_listgen();
            self.note_pass("listgen", changed, before, &mut stats);
            round_changed |= changed;

            let before = self.sfg.num_nodes();
            let changed = self.sfg.fuse(&mut self.ir_bank, &self.snodes);
            self.note_pass("fuse", changed, before, &mut stats);
            round_changed |= changed;

            let before = self.sfg.num_nodes();
            let changed = self.sfg.optimize_dead_store(&mut self.ir_bank, &self.snodes);
            self.note_pass("dead_store", changed, before, &mut stats);
            round_changed |= changed;

            if round_changed {
                stats.changed = true;
            } else {
                break;
            }
        }
        stats
    }

    /// Optimizes, then drains the graph into the launch list handed to the
    /// backend.
    pub fn flush(&mut self) -> Vec<TaskLaunchRecord> {
        self.optimize();
        self.sfg.extract()
    }

    fn note_pass(&self, name: &str, changed: bool, nodes_before: usize, stats: &mut PassStats) {
        let erased = nodes_before.saturating_sub(self.sfg.num_nodes());
        stats.erased_nodes += erased;
        if env::pass_stats_enabled() {
            println!(
                "[sfg] pass={} changed={} erased={} nodes={}",
                name,
                changed,
                erased,
                self.sfg.num_nodes()
            );
        }
    }
}

/// Prints the current state flow graph of `engine` to stdout.
pub fn async_print_sfg(engine: &AsyncEngine) {
    engine.sfg.print(&engine.snodes);
}

/// Renders the current state flow graph of `engine` as Graphviz DOT.
pub fn async_dump_dot(engine: &AsyncEngine, rankdir: Option<&str>) -> String {
    engine.sfg.dump_dot(&engine.snodes, rankdir)
}
