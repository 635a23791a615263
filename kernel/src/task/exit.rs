//! Process teardown: the exit-time ordering of closing files, releasing
//! wait-status edges, and tearing down the address space.

use alloc::sync::Arc;

use crate::hal::print_exit_message;
use crate::runtime::Kernel;
use crate::task::pcb::Task;

/// Runs every step of process exit in the order the design requires it:
/// close the executable, drop every file descriptor, release the
/// parent/child wait-status edges (publishing the exit code to a waiting
/// parent if one exists), then null the page-directory pointer, activate
/// the kernel-only directory, and only then destroy the old one. Prints the
/// exit message first, matching every termination path including
/// force-exit. Never returns: the calling thread ends here.
pub fn exit_current(kernel: &Arc<Kernel>, task: &Arc<Task>, code: i32) -> ! {
    log::debug!("[exit] {} (tid {}) exiting with code {}", task.name, task.tid.0, code);
    print_exit_message(&task.name, code);

    let mut pcb = task.pcb.lock();

    if let Some(exe) = pcb.exe_file.take() {
        kernel.platform.file_system.allow_write(exe);
        kernel.platform.file_system.close(exe);
    }

    for file in pcb.descriptors.drain_open_files() {
        kernel.platform.file_system.close(file);
    }

    // Drop this process's half of every child edge. Whichever side (this
    // one or the child, whichever runs last) sees the Arc's strong count
    // reach zero frees the wait-status record.
    pcb.children.clear();

    if let Some(parent_edge) = pcb.parent_edge.take() {
        parent_edge.publish_exit(code, &kernel.platform);
        drop(parent_edge);
    }

    if let Some(pd) = pcb.page_dir.take() {
        // Nulled above (via `.take()`) before switching away, so a timer
        // interrupt landing in between can't reactivate a directory that's
        // about to be destroyed.
        kernel.platform.page_directory.activate(None);
        kernel.platform.page_directory.destroy(pd);
    }

    drop(pcb);
    kernel.tasks.remove(task.tid);

    kernel.platform.scheduler.exit_current()
}
