//! A deliberately small offloaded-task IR: flat statement lists with id-based
//! operand references. Enough structure for the graph passes to clone, splice,
//! simplify, and fingerprint launches without pulling in a full compiler.

pub mod hashing;
pub mod passes;

use std::fmt;

use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use crate::snode::SNodeId;

/// Loop shape a launch encodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum TaskType {
    Serial,
    RangeFor,
    StructFor,
    ListGen,
    Gc,
}

impl TaskType {
    /// User-level tasks are the ones a kernel author wrote, as opposed to
    /// list generation and garbage collection the runtime schedules itself.
    pub fn is_user_task(self) -> bool {
        matches!(self, TaskType::Serial | TaskType::RangeFor | TaskType::StructFor)
    }
}

impl fmt::Display for TaskType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TaskType::Serial => "serial",
            TaskType::RangeFor => "range_for",
            TaskType::StructFor => "struct_for",
            TaskType::ListGen => "listgen",
            TaskType::Gc => "gc",
        };
        f.write_str(name)
    }
}

/// Identifier of a statement within the IR bank's numbering space.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct StmtId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BinaryOpKind {
    Add,
    Sub,
    Mul,
    Max,
    Min,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StmtKind {
    Const { value: i64 },
    Binary { op: BinaryOpKind, lhs: StmtId, rhs: StmtId },
    /// Current iteration index of the enclosing offloaded loop, referenced by
    /// the loop's statement id.
    LoopIndex { loop_task: StmtId },
    GlobalLoad { snode: SNodeId },
    GlobalStore { snode: SNodeId, value: StmtId },
    /// Activates an element, writing the snode's mask.
    Activate { snode: SNodeId },
    /// Resets the element list of a snode level.
    ClearList { snode: SNodeId },
}

impl StmtKind {
    /// Statements whose only effect is producing a value.
    pub fn is_pure(&self) -> bool {
        matches!(
            self,
            StmtKind::Const { .. }
                | StmtKind::Binary { .. }
                | StmtKind::LoopIndex { .. }
                | StmtKind::GlobalLoad { .. }
        )
    }

    pub fn operands(&self) -> SmallVec<[StmtId; 2]> {
        let mut out = SmallVec::new();
        match self {
            StmtKind::Binary { lhs, rhs, .. } => {
                out.push(*lhs);
                out.push(*rhs);
            }
            StmtKind::GlobalStore { value, .. } => out.push(*value),
            StmtKind::LoopIndex { loop_task } => out.push(*loop_task),
            StmtKind::Const { .. }
            | StmtKind::GlobalLoad { .. }
            | StmtKind::Activate { .. }
            | StmtKind::ClearList { .. } => {}
        }
        out
    }

    pub(crate) fn for_each_operand_mut(&mut self, mut f: impl FnMut(&mut StmtId)) {
        match self {
            StmtKind::Binary { lhs, rhs, .. } => {
                f(lhs);
                f(rhs);
            }
            StmtKind::GlobalStore { value, .. } => f(value),
            StmtKind::LoopIndex { loop_task } => f(loop_task),
            StmtKind::Const { .. }
            | StmtKind::GlobalLoad { .. }
            | StmtKind::Activate { .. }
            | StmtKind::ClearList { .. } => {}
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Stmt {
    pub id: StmtId,
    pub kind: StmtKind,
}

/// A single lowered launch body: the unit the kernel compiler hands to the
/// execution engine and the unit the fusion pass splices.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OffloadedTask {
    pub id: StmtId,
    pub task_type: TaskType,
    pub snode: Option<SNodeId>,
    pub block_dim: usize,
    pub const_begin: bool,
    pub const_end: bool,
    pub begin_value: i64,
    pub end_value: i64,
    pub body: Vec<Stmt>,
}

impl OffloadedTask {
    pub fn new(id: StmtId, task_type: TaskType) -> Self {
        Self {
            id,
            task_type,
            snode: None,
            block_dim: 0,
            const_begin: false,
            const_end: false,
            begin_value: 0,
            end_value: 0,
            body: Vec::new(),
        }
    }

    pub fn has_empty_body(&self) -> bool {
        self.body.is_empty()
    }
}
