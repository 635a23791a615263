//! Registry mapping thread ids to their process control block, so the
//! launcher can hand the newly-created child's task back to its parent once
//! the bootstrap publishes it.

use alloc::collections::BTreeMap;
use alloc::sync::Arc;

use ksync::mutex::SpinLock;

use crate::hal::ThreadId;
use crate::task::pcb::Task;

pub struct TaskManager {
    tasks: SpinLock<BTreeMap<ThreadId, Arc<Task>>>,
}

impl TaskManager {
    pub const fn new() -> Self {
        Self {
            tasks: SpinLock::new(BTreeMap::new()),
        }
    }

    pub fn insert(&self, task: Arc<Task>) {
        self.tasks.lock().insert(task.tid, task);
    }

    pub fn get(&self, tid: ThreadId) -> Option<Arc<Task>> {
        self.tasks.lock().get(&tid).cloned()
    }

    pub fn remove(&self, tid: ThreadId) {
        self.tasks.lock().remove(&tid);
    }
}

impl Default for TaskManager {
    fn default() -> Self {
        Self::new()
    }
}
