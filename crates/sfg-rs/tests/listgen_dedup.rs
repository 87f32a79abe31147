use std::sync::Arc;

use sfg_rs::ir::{Stmt, StmtKind, TaskType};
use sfg_rs::{
    AsyncEngine, AsyncState, IrBank, Kernel, NodeId, SNodeForest, SNodeId, TaskLaunchRecord,
};

#[test]
fn redundant_listgens_collapse_onto_the_first() {
    let (mut engine, root, leaf) = engine_with_tree();
    let mask_writer = kernel("activate");
    let list_writer = kernel("clear");
    let lg = kernel("lg");
    let consumer = kernel("consume");

    let rec = activate_record(&mut engine.ir_bank, &mask_writer, leaf);
    engine.enqueue(rec).expect("insert mask writer");
    let rec = clear_list_record(&mut engine.ir_bank, &list_writer, root);
    engine.enqueue(rec).expect("insert parent list writer");
    let rec = listgen_record(&mut engine.ir_bank, &lg, leaf);
    engine.enqueue(rec).expect("insert first listgen");
    let rec = listgen_record(&mut engine.ir_bank, &lg, leaf);
    engine.enqueue(rec).expect("insert second listgen");
    let rec = struct_for_record(&mut engine.ir_bank, &consumer, leaf, root);
    engine.enqueue(rec).expect("insert consumer");

    assert_eq!(engine.sfg.num_nodes(), 6);
    let leaf_list = AsyncState::list(leaf);
    assert_eq!(producers(&engine.sfg, 5, leaf_list), vec![4]);

    assert!(engine.sfg.optimize_listgen());
    assert_eq!(engine.sfg.num_nodes(), 5, "the second listgen is deleted");
    assert_eq!(
        producers(&engine.sfg, 4, leaf_list),
        vec![3],
        "the consumer reads from the surviving listgen"
    );
    assert_eq!(
        engine.sfg.latest_state_owner(&leaf_list),
        Some(NodeId(3)),
        "ownership follows the surviving listgen"
    );

    let remaining_listgens = engine
        .sfg
        .nodes()
        .iter()
        .filter(|node| node.meta.task_type == TaskType::ListGen)
        .count();
    assert_eq!(remaining_listgens, 1);

    assert!(
        !engine.sfg.optimize_listgen(),
        "a second run finds nothing"
    );
}

#[test]
fn listgens_with_different_mask_writers_stay() {
    let (mut engine, root, leaf) = engine_with_tree();
    let mask_writer = kernel("activate");
    let list_writer = kernel("clear");
    let lg = kernel("lg");

    let rec = activate_record(&mut engine.ir_bank, &mask_writer, leaf);
    engine.enqueue(rec).expect("insert mask writer");
    let rec = clear_list_record(&mut engine.ir_bank, &list_writer, root);
    engine.enqueue(rec).expect("insert parent list writer");
    let rec = listgen_record(&mut engine.ir_bank, &lg, leaf);
    engine.enqueue(rec).expect("insert first listgen");
    // A second activation retires the first mask value.
    let rec = activate_record(&mut engine.ir_bank, &mask_writer, leaf);
    engine.enqueue(rec).expect("insert second mask writer");
    let rec = listgen_record(&mut engine.ir_bank, &lg, leaf);
    engine.enqueue(rec).expect("insert second listgen");

    assert!(!engine.sfg.optimize_listgen());
    assert_eq!(engine.sfg.num_nodes(), 6);
}

fn engine_with_tree() -> (AsyncEngine, SNodeId, SNodeId) {
    let mut forest = SNodeForest::new();
    let root = forest.add_root("root");
    let leaf = forest.add_child(root, "leaf");
    (AsyncEngine::new(forest), root, leaf)
}

fn kernel(name: &str) -> Arc<Kernel> {
    Arc::new(Kernel::new(name))
}

fn activate_record(bank: &mut IrBank, kernel: &Arc<Kernel>, snode: SNodeId) -> TaskLaunchRecord {
    let mut task = bank.new_task(TaskType::Serial);
    let id = bank.fresh_stmt_id();
    task.body.push(Stmt {
        id,
        kind: StmtKind::Activate { snode },
    });
    TaskLaunchRecord::new(kernel.clone(), bank.intern(task))
}

fn clear_list_record(bank: &mut IrBank, kernel: &Arc<Kernel>, snode: SNodeId) -> TaskLaunchRecord {
    let mut task = bank.new_task(TaskType::Serial);
    let id = bank.fresh_stmt_id();
    task.body.push(Stmt {
        id,
        kind: StmtKind::ClearList { snode },
    });
    TaskLaunchRecord::new(kernel.clone(), bank.intern(task))
}

fn listgen_record(bank: &mut IrBank, kernel: &Arc<Kernel>, snode: SNodeId) -> TaskLaunchRecord {
    let mut task = bank.new_task(TaskType::ListGen);
    task.snode = Some(snode);
    TaskLaunchRecord::new(kernel.clone(), bank.intern(task))
}

/// Iterates the leaf list and stores into the root's value region, so the
/// consumer is not itself a dead task.
fn struct_for_record(
    bank: &mut IrBank,
    kernel: &Arc<Kernel>,
    snode: SNodeId,
    store_target: SNodeId,
) -> TaskLaunchRecord {
    let mut task = bank.new_task(TaskType::StructFor);
    task.snode = Some(snode);
    let const_id = bank.fresh_stmt_id();
    task.body.push(Stmt {
        id: const_id,
        kind: StmtKind::Const { value: 1 },
    });
    let store_id = bank.fresh_stmt_id();
    task.body.push(Stmt {
        id: store_id,
        kind: StmtKind::GlobalStore {
            snode: store_target,
            value: const_id,
        },
    });
    TaskLaunchRecord::new(kernel.clone(), bank.intern(task))
}

fn producers(graph: &sfg_rs::StateFlowGraph, index: usize, state: AsyncState) -> Vec<usize> {
    graph.nodes()[index]
        .input_edges
        .get(&state)
        .map(|set| set.iter().map(|id| id.0).collect())
        .unwrap_or_default()
}
