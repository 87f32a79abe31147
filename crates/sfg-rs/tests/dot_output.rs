use std::sync::Arc;

use sfg_rs::ir::{Stmt, StmtKind, TaskType};
use sfg_rs::{async_dump_dot, AsyncEngine, IrBank, Kernel, SNodeForest, SNodeId, TaskLaunchRecord};

#[test]
fn dot_output_follows_the_digraph_grammar() {
    let engine = war_chain_engine();
    let dot = async_dump_dot(&engine, None);

    assert!(dot.starts_with("digraph {"));
    assert!(dot.trim_end().ends_with('}'));
    assert!(
        dot.contains("n_initial_state_0"),
        "the initial node is rendered"
    );
    assert!(dot.contains("shape=box"), "the initial node is a box");
    assert!(
        dot.contains("peripheries=2"),
        "the latest state owner gets a double border"
    );
    assert!(
        dot.contains("style=filled,fillcolor=lightgray"),
        "user tasks are highlighted"
    );
}

#[test]
fn dependency_edges_are_dotted_and_flow_edges_are_not() {
    let engine = war_chain_engine();
    let dot = async_dump_dot(&engine, None);

    let dotted: Vec<&str> = dot
        .lines()
        .filter(|line| line.contains("->") && line.contains("style=dotted"))
        .collect();
    let solid: Vec<&str> = dot
        .lines()
        .filter(|line| line.contains("->") && !line.contains("style=dotted"))
        .collect();

    // The reader-to-writer edge and the seeded initial edge serialize writes
    // without carrying data.
    assert!(dotted
        .iter()
        .any(|line| line.contains("n_r_serial_0 -> n_w2_serial_0")));
    assert!(dotted
        .iter()
        .any(|line| line.contains("n_initial_state_0 -> n_w1_serial_0")));
    // The writer-to-reader edge carries the value.
    assert!(solid
        .iter()
        .any(|line| line.contains("n_w1_serial_0 -> n_r_serial_0")));
    assert!(dot.contains("label=\"x_value\""));
}

#[test]
fn rankdir_is_passed_through() {
    let engine = war_chain_engine();
    let dot = async_dump_dot(&engine, Some("LR"));
    assert!(dot.contains("rankdir=LR"));

    let dot = async_dump_dot(&engine, None);
    assert!(!dot.contains("rankdir"));
}

#[test]
fn text_dump_lists_every_node_with_its_edges() {
    let engine = war_chain_engine();
    let text = engine.sfg.render_text(&engine.snodes);

    assert!(text.starts_with("=== State Flow Graph ==="));
    assert!(text.contains("[node: initial_state:0]"));
    assert!(text.contains("[node: w1_serial:0]"));
    assert!(text.contains("x_value -> [node: r_serial:0]"));
    assert!(text.contains("x_value <- [node: w1_serial:0]"));
}

/// Three serial launches over one value state: write, read, write again.
fn war_chain_engine() -> AsyncEngine {
    let mut forest = SNodeForest::new();
    let x = forest.add_root("x");
    let mut engine = AsyncEngine::new(forest);

    let rec = store_record(&mut engine.ir_bank, &kernel("w1"), x, 1);
    engine.enqueue(rec).expect("insert writer");
    let rec = load_record(&mut engine.ir_bank, &kernel("r"), x);
    engine.enqueue(rec).expect("insert reader");
    let rec = store_record(&mut engine.ir_bank, &kernel("w2"), x, 2);
    engine.enqueue(rec).expect("insert second writer");
    engine
}

fn kernel(name: &str) -> Arc<Kernel> {
    Arc::new(Kernel::new(name))
}

fn store_record(
    bank: &mut IrBank,
    kernel: &Arc<Kernel>,
    snode: SNodeId,
    value: i64,
) -> TaskLaunchRecord {
    let mut task = bank.new_task(TaskType::Serial);
    let const_id = bank.fresh_stmt_id();
    task.body.push(Stmt {
        id: const_id,
        kind: StmtKind::Const { value },
    });
    let store_id = bank.fresh_stmt_id();
    task.body.push(Stmt {
        id: store_id,
        kind: StmtKind::GlobalStore {
            snode,
            value: const_id,
        },
    });
    TaskLaunchRecord::new(kernel.clone(), bank.intern(task))
}

fn load_record(bank: &mut IrBank, kernel: &Arc<Kernel>, snode: SNodeId) -> TaskLaunchRecord {
    let mut task = bank.new_task(TaskType::Serial);
    let id = bank.fresh_stmt_id();
    task.body.push(Stmt {
        id,
        kind: StmtKind::GlobalLoad { snode },
    });
    TaskLaunchRecord::new(kernel.clone(), bank.intern(task))
}
