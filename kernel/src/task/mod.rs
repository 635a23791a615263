//! Process control blocks, the wait-status registry, the launcher and the
//! bootstrap entry point.

pub(crate) mod bootstrap;
pub mod exit;
pub mod launcher;
pub mod manager;
pub mod pcb;
pub mod wait_status;

use alloc::sync::Arc;

use include::{KernelError, SysResult};

use crate::hal::{Platform, ThreadId};
use crate::task::pcb::Task;

pub use launcher::execute;

/// `wait(child_tid) -> exit_code`: looks up the matching wait-status record
/// among `caller`'s children and blocks for it.
pub fn wait(caller: &Arc<Task>, child_tid: ThreadId, platform: &Platform) -> SysResult<i32> {
    let record = {
        let pcb = caller.pcb.lock();
        pcb.children.iter().find(|ws| ws.child_tid == child_tid).cloned()
    };
    let record = record.ok_or(KernelError::NoSuchChild)?;
    record.wait(platform).ok_or(KernelError::DoubleWait)
}
