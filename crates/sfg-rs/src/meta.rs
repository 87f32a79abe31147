use std::collections::BTreeSet;

use thiserror::Error;

use crate::ir::{StmtKind, TaskType};
use crate::ir_bank::IrBank;
use crate::kernel::TaskLaunchRecord;
use crate::snode::{SNodeForest, SNodeId};
use crate::state::AsyncState;

/// Scheduling-relevant summary of a launch: what it is, what it reads, and
/// what it writes. Derived once per distinct (IR, kernel) pair and cached in
/// the IR bank.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskMeta {
    pub name: String,
    pub task_type: TaskType,
    pub snode: Option<SNodeId>,
    pub block_dim: usize,
    pub const_begin: bool,
    pub const_end: bool,
    pub begin_value: i64,
    pub end_value: i64,
    pub input_states: BTreeSet<AsyncState>,
    pub output_states: BTreeSet<AsyncState>,
}

impl TaskMeta {
    pub(crate) fn initial() -> Self {
        Self {
            name: "initial_state".to_string(),
            task_type: TaskType::Serial,
            snode: None,
            block_dim: 0,
            const_begin: false,
            const_end: false,
            begin_value: 0,
            end_value: 0,
            input_states: BTreeSet::new(),
            output_states: BTreeSet::new(),
        }
    }
}

/// Errors surfaced while deriving a task meta from a launch record.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TaskMetaError {
    #[error("launch record has no IR attached")]
    EmptyRecord,
    #[error("snode {snode:?} has no parent level to generate lists from")]
    MissingParent { snode: SNodeId },
}

/// Derives the state sets and loop metadata for a launch record.
pub fn get_task_meta(
    bank: &mut IrBank,
    forest: &SNodeForest,
    rec: &TaskLaunchRecord,
) -> Result<TaskMeta, TaskMetaError> {
    let task = rec.task().ok_or(TaskMetaError::EmptyRecord)?;
    let hash = rec.ir_handle.hash();
    if let Some(meta) = bank.cached_meta(hash, &rec.kernel.name) {
        return Ok(meta);
    }

    let mut input_states = BTreeSet::new();
    let mut output_states = BTreeSet::new();
    match task.task_type {
        TaskType::ListGen => {
            let snode = task.snode.expect("listgen task must reference a snode");
            let parent = forest
                .parent(snode)
                .ok_or(TaskMetaError::MissingParent { snode })?;
            input_states.insert(AsyncState::mask(snode));
            input_states.insert(AsyncState::list(parent));
            output_states.insert(AsyncState::list(snode));
        }
        TaskType::Gc => {
            let snode = task.snode.expect("gc task must reference a snode");
            input_states.insert(AsyncState::list(snode));
            output_states.insert(AsyncState::list_tail(snode));
        }
        TaskType::StructFor => {
            let snode = task.snode.expect("struct_for task must reference a snode");
            input_states.insert(AsyncState::list(snode));
        }
        TaskType::Serial | TaskType::RangeFor => {}
    }
    for stmt in &task.body {
        match stmt.kind {
            StmtKind::GlobalLoad { snode } => {
                input_states.insert(AsyncState::value(snode));
            }
            StmtKind::GlobalStore { snode, .. } => {
                output_states.insert(AsyncState::value(snode));
            }
            StmtKind::Activate { snode } => {
                output_states.insert(AsyncState::mask(snode));
            }
            StmtKind::ClearList { snode } => {
                output_states.insert(AsyncState::list(snode));
            }
            StmtKind::Const { .. } | StmtKind::Binary { .. } | StmtKind::LoopIndex { .. } => {}
        }
    }

    let meta = TaskMeta {
        name: format!("{}_{}", rec.kernel.name, task.task_type),
        task_type: task.task_type,
        snode: task.snode,
        block_dim: task.block_dim,
        const_begin: task.const_begin,
        const_end: task.const_end,
        begin_value: task.begin_value,
        end_value: task.end_value,
        input_states,
        output_states,
    };
    bank.store_meta(hash, &rec.kernel.name, meta.clone());
    Ok(meta)
}
