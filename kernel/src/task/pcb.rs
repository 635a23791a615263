//! The process control block: everything a running user process owns
//! exclusively, plus the two reference-counted edges connecting it to its
//! parent and children.

use alloc::string::String;
use alloc::sync::Arc;
use alloc::vec::Vec;

use ksync::mutex::SpinLock;

use crate::fs::DescriptorTable;
use crate::hal::{FileHandle, PageDirId, ThreadId};
use crate::task::wait_status::WaitStatus;

/// Everything mutated only by the thread that owns it. No field here needs
/// its own lock; the surrounding `SpinLock<ProcessRecord>` in [`Task`]
/// exists purely so the record can sit behind a shared `Arc<Task>` (the
/// scheduler and the task manager both need to reach it), not because of
/// any real concurrent access.
pub struct ProcessRecord {
    pub page_dir: Option<PageDirId>,
    pub exe_file: Option<FileHandle>,
    pub descriptors: DescriptorTable,
    pub children: Vec<Arc<WaitStatus>>,
    pub parent_edge: Option<Arc<WaitStatus>>,
}

impl ProcessRecord {
    pub fn new() -> Self {
        Self {
            page_dir: None,
            exe_file: None,
            descriptors: DescriptorTable::new(),
            children: Vec::new(),
            parent_edge: None,
        }
    }
}

impl Default for ProcessRecord {
    fn default() -> Self {
        Self::new()
    }
}

pub struct Task {
    pub tid: ThreadId,
    /// The program name, fixed at creation: used for `argv[0]`'s string
    /// content and the exit message.
    pub name: String,
    pub pcb: SpinLock<ProcessRecord>,
}

impl Task {
    pub fn new(tid: ThreadId, name: String) -> Arc<Self> {
        Arc::new(Self {
            tid,
            name,
            pcb: SpinLock::new(ProcessRecord::new()),
        })
    }
}
