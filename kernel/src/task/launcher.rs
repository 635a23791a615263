//! The process launcher: `execute`.
//!
//! The source copies the command line into two freshly palloc'd pages (one
//! for the child to destructively tokenize, one for the parent to extract
//! a thread name from) to avoid a race between the caller reusing its
//! buffer and the child parsing it. An owned `String` on the handshake
//! already rules out that race in Rust, so there is exactly one copy here.

use alloc::boxed::Box;
use alloc::string::{String, ToString};
use alloc::sync::Arc;
use alloc::vec::Vec;

use include::{KernelError, SysResult};
use ksync::mutex::SpinLock;
use ksync::Semaphore;

use crate::hal::ThreadId;
use crate::runtime::Kernel;
use crate::task::bootstrap;
use crate::task::pcb::Task;
use crate::task::wait_status::WaitStatus;

/// Transient parent/child synchronization state for one `execute` call.
/// Lives for the duration of the call on the source; here it is promoted to
/// a heap-allocated, reference-counted block so it can be shared with a
/// genuinely independent OS thread without unsafe lifetime games.
pub(crate) struct LoadHandshake {
    pub command_line: String,
    pub load_done: Semaphore<ThreadId>,
    pub wait_status_installed: Semaphore<ThreadId>,
    pub success: SpinLock<bool>,
}

impl LoadHandshake {
    fn new(command_line: &str) -> Self {
        Self {
            command_line: command_line.to_string(),
            load_done: Semaphore::new(0),
            wait_status_installed: Semaphore::new(0),
            success: SpinLock::new(false),
        }
    }
}

/// Splits a command line into whitespace-separated tokens; `tokens[0]` is
/// the program name.
pub(crate) fn tokenize(command_line: &str) -> Vec<&str> {
    command_line.split_whitespace().collect()
}

/// Parses `command_line`, spawns a bootstrap thread for it, and blocks
/// until that thread reports whether the load succeeded. On success,
/// installs the wait-status edge between `caller` and the new child before
/// returning the child's tid.
pub fn execute(kernel: &Arc<Kernel>, caller: &Arc<Task>, command_line: &str) -> SysResult<ThreadId> {
    let program_name = tokenize(command_line).into_iter().next().unwrap_or("").to_string();
    if program_name.is_empty() {
        return Err(KernelError::LoadFailure);
    }

    log::debug!("[launcher] execute({:?})", command_line);

    let handshake = Arc::new(LoadHandshake::new(command_line));
    let kernel_for_child = kernel.clone();
    let handshake_for_child = handshake.clone();

    let child_tid = kernel
        .platform
        .scheduler
        .spawn(
            &program_name,
            config::PRI_DEFAULT,
            Box::new(move || bootstrap::process_bootstrap(kernel_for_child, handshake_for_child)),
        )
        .ok_or(KernelError::OutOfMemory)?;

    handshake.load_done.down(&kernel.platform.parker());

    if !*handshake.success.lock() {
        log::warn!("[launcher] {} failed to load", program_name);
        return Err(KernelError::LoadFailure);
    }

    let wait_status = Arc::new(WaitStatus::new(child_tid));
    caller.pcb.lock().children.push(wait_status.clone());

    let child_task = kernel
        .tasks
        .get(child_tid)
        .expect("bootstrap registers its task before reporting success");
    child_task.pcb.lock().parent_edge = Some(wait_status);

    handshake.wait_status_installed.up(&kernel.platform.parker());

    Ok(child_tid)
}
