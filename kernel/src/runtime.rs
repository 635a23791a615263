//! Ties the hal collaborators, the task registry, and the global
//! file-system lock into the one object every entry point (`execute`, the
//! bootstrap, the dispatcher) is threaded through.

use ksync::mutex::SpinLock;

use crate::hal::{console_write, Platform};
use crate::task::manager::TaskManager;

pub struct Kernel {
    pub platform: Platform,
    pub tasks: TaskManager,
    /// The single global file-system lock: every file-system
    /// handler takes this before calling the collaborator and releases it
    /// on the way out. The collaborator's own contract is non-thread-safe,
    /// so finer-grained locking is explicitly out of scope.
    pub fs_lock: SpinLock<()>,
}

impl Kernel {
    pub fn new(platform: Platform) -> Self {
        crate::log::init();
        console_write(config::KERNEL_BANNER.as_bytes());
        log::info!("[kernel] userproc core ready");
        Self {
            platform,
            tasks: TaskManager::new(),
            fs_lock: SpinLock::new(()),
        }
    }
}
