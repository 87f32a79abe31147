//! In-place IR passes used by the graph optimizers: usage replacement,
//! normalization, simplification, and deferred statement erasure.

use std::collections::{HashMap, HashSet};

use super::{OffloadedTask, Stmt, StmtId, StmtKind};

/// Rewrites every operand reference to `old` into `new`.
pub fn replace_all_usages_with(task: &mut OffloadedTask, old: StmtId, new: StmtId) {
    for stmt in &mut task.body {
        stmt.kind.for_each_operand_mut(|operand| {
            if *operand == old {
                *operand = new;
            }
        });
    }
}

/// Renumbers the task densely: the task itself becomes statement 0 and the
/// body becomes 1..=n in order, with all operand references remapped. Two
/// structurally equal tasks fingerprint identically after this.
pub fn re_id(task: &mut OffloadedTask) {
    let mut remap: HashMap<StmtId, StmtId> = HashMap::with_capacity(task.body.len() + 1);
    remap.insert(task.id, StmtId(0));
    task.id = StmtId(0);
    for (index, stmt) in task.body.iter_mut().enumerate() {
        remap.insert(stmt.id, StmtId(index as u32 + 1));
        stmt.id = StmtId(index as u32 + 1);
    }
    for stmt in &mut task.body {
        stmt.kind.for_each_operand_mut(|operand| {
            if let Some(mapped) = remap.get(operand) {
                *operand = *mapped;
            }
        });
    }
}

/// Returns the ids of the body statements matching `pred`, in body order.
pub fn gather_statements(
    task: &OffloadedTask,
    mut pred: impl FnMut(&Stmt) -> bool,
) -> Vec<StmtId> {
    task.body
        .iter()
        .filter(|stmt| pred(stmt))
        .map(|stmt| stmt.id)
        .collect()
}

/// Queues statement erasures so a scan over the IR stays immutable while the
/// caller decides what goes.
#[derive(Debug, Default)]
pub struct DelayedIrModifier {
    to_erase: Vec<StmtId>,
}

impl DelayedIrModifier {
    pub fn erase(&mut self, stmt: StmtId) {
        self.to_erase.push(stmt);
    }

    /// Applies the queued edits. Returns `true` when the task changed.
    pub fn modify(self, task: &mut OffloadedTask) -> bool {
        if self.to_erase.is_empty() {
            return false;
        }
        let erase: HashSet<StmtId> = self.to_erase.into_iter().collect();
        let before = task.body.len();
        task.body.retain(|stmt| !erase.contains(&stmt.id));
        task.body.len() != before
    }
}

/// Runs local cleanups to a fixed point: duplicate constants collapse onto
/// their first occurrence and pure statements nothing references are dropped.
/// When `after_lower_access` is set, global loads are treated as lowered
/// memory operations and are no longer erasable.
pub fn full_simplify(task: &mut OffloadedTask, after_lower_access: bool) -> bool {
    let mut changed_any = false;
    loop {
        let mut changed = dedup_consts(task);
        changed |= eliminate_dead_statements(task, after_lower_access);
        if !changed {
            break;
        }
        changed_any = true;
    }
    changed_any
}

fn dedup_consts(task: &mut OffloadedTask) -> bool {
    let mut seen: HashMap<i64, StmtId> = HashMap::new();
    let mut replaced: Vec<(StmtId, StmtId)> = Vec::new();
    for stmt in &task.body {
        if let StmtKind::Const { value } = stmt.kind {
            match seen.get(&value) {
                Some(&keep) => replaced.push((stmt.id, keep)),
                None => {
                    seen.insert(value, stmt.id);
                }
            }
        }
    }
    if replaced.is_empty() {
        return false;
    }
    for &(old, new) in &replaced {
        replace_all_usages_with(task, old, new);
    }
    let dead: HashSet<StmtId> = replaced.iter().map(|&(old, _)| old).collect();
    task.body.retain(|stmt| !dead.contains(&stmt.id));
    true
}

fn eliminate_dead_statements(task: &mut OffloadedTask, after_lower_access: bool) -> bool {
    let mut used: HashSet<StmtId> = HashSet::new();
    for stmt in &task.body {
        for operand in stmt.kind.operands() {
            used.insert(operand);
        }
    }
    let before = task.body.len();
    task.body.retain(|stmt| {
        if !stmt.kind.is_pure() || used.contains(&stmt.id) {
            return true;
        }
        matches!(stmt.kind, StmtKind::GlobalLoad { .. }) && after_lower_access
    });
    task.body.len() != before
}
