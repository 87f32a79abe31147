use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::ir::OffloadedTask;

/// Scalar types a kernel signature can mention.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ScalarType {
    I32,
    I64,
    F32,
    F64,
}

/// Compiled kernel stub. The graph never looks inside a kernel; it only
/// inspects whether the signature is empty and whether the kernel is a snode
/// accessor. Kernel identity is pointer identity on the shared handle.
#[derive(Debug)]
pub struct Kernel {
    pub name: String,
    pub args: Vec<ScalarType>,
    pub rets: Vec<ScalarType>,
    pub is_accessor: bool,
}

impl Kernel {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            args: Vec::new(),
            rets: Vec::new(),
            is_accessor: false,
        }
    }

    pub fn has_empty_signature(&self) -> bool {
        self.args.is_empty() && self.rets.is_empty()
    }
}

/// Handle into the IR bank: either empty or a shared task plus its content
/// hash.
#[derive(Debug, Clone)]
pub enum IrHandle {
    Empty,
    Ir { ir: Arc<OffloadedTask>, hash: u64 },
}

impl IrHandle {
    pub fn is_empty(&self) -> bool {
        matches!(self, IrHandle::Empty)
    }

    pub fn hash(&self) -> u64 {
        match self {
            IrHandle::Empty => 0,
            IrHandle::Ir { hash, .. } => *hash,
        }
    }

    pub fn ir(&self) -> Option<&OffloadedTask> {
        match self {
            IrHandle::Empty => None,
            IrHandle::Ir { ir, .. } => Some(ir),
        }
    }
}

/// A single enqueued kernel launch: the bundle the host submits and the graph
/// eventually hands back to the backend launcher.
#[derive(Debug, Clone)]
pub struct TaskLaunchRecord {
    pub kernel: Arc<Kernel>,
    pub ir_handle: IrHandle,
}

impl TaskLaunchRecord {
    pub fn new(kernel: Arc<Kernel>, ir_handle: IrHandle) -> Self {
        Self { kernel, ir_handle }
    }

    pub fn is_empty(&self) -> bool {
        self.ir_handle.is_empty()
    }

    pub fn task(&self) -> Option<&OffloadedTask> {
        self.ir_handle.ir()
    }

    pub fn same_kernel(&self, other: &TaskLaunchRecord) -> bool {
        Arc::ptr_eq(&self.kernel, &other.kernel)
    }
}
