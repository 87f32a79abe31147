use sfg_rs::ir::passes::{full_simplify, gather_statements, re_id, DelayedIrModifier};
use sfg_rs::ir::{BinaryOpKind, OffloadedTask, Stmt, StmtId, StmtKind, TaskType};
use sfg_rs::{IrBank, SNodeId};

#[test]
fn re_id_renumbers_and_remaps_operands() {
    let mut task = OffloadedTask::new(StmtId(40), TaskType::Serial);
    task.body.push(Stmt {
        id: StmtId(17),
        kind: StmtKind::Const { value: 5 },
    });
    task.body.push(Stmt {
        id: StmtId(23),
        kind: StmtKind::GlobalStore {
            snode: SNodeId(0),
            value: StmtId(17),
        },
    });

    re_id(&mut task);

    assert_eq!(task.id, StmtId(0));
    assert_eq!(task.body[0].id, StmtId(1));
    assert_eq!(task.body[1].id, StmtId(2));
    assert!(matches!(
        task.body[1].kind,
        StmtKind::GlobalStore {
            value: StmtId(1),
            ..
        }
    ));
}

#[test]
fn simplify_collapses_duplicate_constants() {
    let mut task = OffloadedTask::new(StmtId(0), TaskType::Serial);
    task.body.push(Stmt {
        id: StmtId(1),
        kind: StmtKind::Const { value: 7 },
    });
    task.body.push(Stmt {
        id: StmtId(2),
        kind: StmtKind::Const { value: 7 },
    });
    task.body.push(Stmt {
        id: StmtId(3),
        kind: StmtKind::GlobalStore {
            snode: SNodeId(0),
            value: StmtId(2),
        },
    });

    assert!(full_simplify(&mut task, false));
    assert_eq!(task.body.len(), 2);
    assert!(matches!(
        task.body[1].kind,
        StmtKind::GlobalStore {
            value: StmtId(1),
            ..
        }
    ));
}

#[test]
fn simplify_drops_unused_pure_statements() {
    let mut task = OffloadedTask::new(StmtId(0), TaskType::Serial);
    task.body.push(Stmt {
        id: StmtId(1),
        kind: StmtKind::Const { value: 1 },
    });
    task.body.push(Stmt {
        id: StmtId(2),
        kind: StmtKind::Const { value: 2 },
    });
    task.body.push(Stmt {
        id: StmtId(3),
        kind: StmtKind::Binary {
            op: BinaryOpKind::Add,
            lhs: StmtId(1),
            rhs: StmtId(2),
        },
    });
    task.body.push(Stmt {
        id: StmtId(4),
        kind: StmtKind::GlobalLoad { snode: SNodeId(0) },
    });

    // The add keeps its constants alive for one sweep; once it is gone they
    // follow.
    assert!(full_simplify(&mut task, false));
    assert!(task.body.is_empty());
}

#[test]
fn lowered_loads_survive_simplification() {
    let mut task = OffloadedTask::new(StmtId(0), TaskType::Serial);
    task.body.push(Stmt {
        id: StmtId(1),
        kind: StmtKind::GlobalLoad { snode: SNodeId(0) },
    });

    assert!(!full_simplify(&mut task, true));
    assert_eq!(task.body.len(), 1);
}

#[test]
fn delayed_modifier_applies_queued_erasures() {
    let mut task = OffloadedTask::new(StmtId(0), TaskType::Serial);
    task.body.push(Stmt {
        id: StmtId(1),
        kind: StmtKind::ClearList { snode: SNodeId(0) },
    });
    task.body.push(Stmt {
        id: StmtId(2),
        kind: StmtKind::Activate { snode: SNodeId(0) },
    });

    let mut modifier = DelayedIrModifier::default();
    for id in gather_statements(&task, |stmt| {
        matches!(stmt.kind, StmtKind::ClearList { .. })
    }) {
        modifier.erase(id);
    }
    assert!(modifier.modify(&mut task));
    assert_eq!(task.body.len(), 1);
    assert!(matches!(task.body[0].kind, StmtKind::Activate { .. }));

    let empty = DelayedIrModifier::default();
    assert!(!empty.modify(&mut task));
}

#[test]
fn structurally_equal_tasks_share_one_bank_entry() {
    let mut bank = IrBank::new();

    let mut first = bank.new_task(TaskType::Serial);
    let const_id = bank.fresh_stmt_id();
    first.body.push(Stmt {
        id: const_id,
        kind: StmtKind::Const { value: 3 },
    });
    let store_id = bank.fresh_stmt_id();
    first.body.push(Stmt {
        id: store_id,
        kind: StmtKind::GlobalStore {
            snode: SNodeId(0),
            value: const_id,
        },
    });

    let mut second = bank.new_task(TaskType::Serial);
    let const_id = bank.fresh_stmt_id();
    second.body.push(Stmt {
        id: const_id,
        kind: StmtKind::Const { value: 3 },
    });
    let store_id = bank.fresh_stmt_id();
    second.body.push(Stmt {
        id: store_id,
        kind: StmtKind::GlobalStore {
            snode: SNodeId(0),
            value: const_id,
        },
    });

    let first_handle = bank.intern(first);
    let second_handle = bank.intern(second);
    assert_eq!(first_handle.hash(), second_handle.hash());
    assert_eq!(bank.num_tasks(), 1);
}

#[test]
fn clones_for_mutation_get_fresh_ids() {
    let mut bank = IrBank::new();
    let mut task = bank.new_task(TaskType::Serial);
    let id = bank.fresh_stmt_id();
    task.body.push(Stmt {
        id,
        kind: StmtKind::Const { value: 1 },
    });
    let handle = bank.intern(task);

    let clone_a = bank.clone_for_mutation(&handle).expect("handle has IR");
    let clone_b = bank.clone_for_mutation(&handle).expect("handle has IR");
    assert_ne!(clone_a.id, clone_b.id);
    assert_ne!(clone_a.body[0].id, clone_b.body[0].id);
}
