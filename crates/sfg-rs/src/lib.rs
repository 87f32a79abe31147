//! State flow graph scheduling for an asynchronous kernel execution engine.
//!
//! The graph sits between the kernel recorder and the backend launcher: it
//! observes a linear stream of launch records, reconstructs the true
//! data-dependency DAG by tracking per-state producers and readers, runs
//! list-generation deduplication, kernel fusion, and dead-store elimination
//! over it, and drains back a topologically valid, compacted launch stream.

pub mod engine;
mod env;
pub mod graph;
pub mod ir;
pub mod ir_bank;
pub mod kernel;
pub mod meta;
pub mod snode;
pub mod state;

pub use engine::{async_dump_dot, async_print_sfg, AsyncEngine, PassStats};
pub use graph::{Node, NodeId, StateFlowGraph};
pub use ir_bank::IrBank;
pub use kernel::{IrHandle, Kernel, TaskLaunchRecord};
pub use meta::{get_task_meta, TaskMeta, TaskMetaError};
pub use snode::{SNodeForest, SNodeId};
pub use state::{AsyncState, StateKind};
