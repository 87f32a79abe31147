use std::collections::HashMap;
use std::sync::Arc;

use crate::ir::{hashing, passes, OffloadedTask, StmtId, TaskType};
use crate::kernel::IrHandle;
use crate::meta::TaskMeta;

/// Content-addressed repository of offloaded-task IR.
///
/// The bank owns one shared copy of every distinct task body and hands out
/// [`IrHandle`]s pairing the shared task with its fingerprint. It also
/// allocates statement ids, so two clones taken for mutation can be spliced
/// into one body without id collisions, and caches derived task metas.
#[derive(Debug, Default)]
pub struct IrBank {
    tasks: HashMap<u64, Arc<OffloadedTask>>,
    meta_cache: HashMap<(u64, String), TaskMeta>,
    next_stmt_id: u32,
}

impl IrBank {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fresh_stmt_id(&mut self) -> StmtId {
        let id = StmtId(self.next_stmt_id);
        self.next_stmt_id += 1;
        id
    }

    /// Starts a task with a freshly allocated id and default loop metadata.
    pub fn new_task(&mut self, task_type: TaskType) -> OffloadedTask {
        let id = self.fresh_stmt_id();
        OffloadedTask::new(id, task_type)
    }

    /// Raw structural fingerprint. Normalize with [`passes::re_id`] first when
    /// the hash is meant to be content-addressed.
    pub fn get_hash(&self, task: &OffloadedTask) -> u64 {
        hashing::fingerprint(task)
    }

    /// Stores `task` under `hash`, returning the shared handle. The first
    /// task stored under a hash wins; later inserts reuse it.
    pub fn insert(&mut self, task: OffloadedTask, hash: u64) -> IrHandle {
        let ir = self
            .tasks
            .entry(hash)
            .or_insert_with(|| Arc::new(task))
            .clone();
        IrHandle::Ir { ir, hash }
    }

    /// Normalizes, fingerprints, and stores a task in one step.
    pub fn intern(&mut self, mut task: OffloadedTask) -> IrHandle {
        passes::re_id(&mut task);
        let hash = self.get_hash(&task);
        self.insert(task, hash)
    }

    /// Deep copy with fresh statement ids, ready for mutation or splicing.
    pub fn clone_for_mutation(&mut self, handle: &IrHandle) -> Option<OffloadedTask> {
        let mut task = handle.ir()?.clone();
        let mut remap: HashMap<StmtId, StmtId> = HashMap::with_capacity(task.body.len() + 1);
        let task_id = self.fresh_stmt_id();
        remap.insert(task.id, task_id);
        task.id = task_id;
        for stmt in &mut task.body {
            let fresh = self.fresh_stmt_id();
            remap.insert(stmt.id, fresh);
            stmt.id = fresh;
        }
        for stmt in &mut task.body {
            stmt.kind.for_each_operand_mut(|operand| {
                if let Some(mapped) = remap.get(operand) {
                    *operand = *mapped;
                }
            });
        }
        Some(task)
    }

    pub fn num_tasks(&self) -> usize {
        self.tasks.len()
    }

    pub(crate) fn cached_meta(&self, hash: u64, kernel_name: &str) -> Option<TaskMeta> {
        self.meta_cache
            .get(&(hash, kernel_name.to_string()))
            .cloned()
    }

    pub(crate) fn store_meta(&mut self, hash: u64, kernel_name: &str, meta: TaskMeta) {
        self.meta_cache
            .insert((hash, kernel_name.to_string()), meta);
    }
}
