//! The process bootstrap: runs on the freshly spawned child thread.

use alloc::string::ToString;
use alloc::sync::Arc;

use crate::elf;
use crate::mm::build_argument_stack;
use crate::runtime::Kernel;
use crate::task::exit;
use crate::task::launcher::{tokenize, LoadHandshake};
use crate::task::pcb::Task;

/// Reports load failure to the parent and exits the thread. Never returns.
fn fail_load(kernel: &Kernel, handshake: &LoadHandshake) -> ! {
    *handshake.success.lock() = false;
    handshake.load_done.up(&kernel.platform.parker());
    kernel.platform.scheduler.exit_current();
}

pub(crate) fn process_bootstrap(kernel: Arc<Kernel>, handshake: Arc<LoadHandshake>) {
    let tokens = tokenize(&handshake.command_line);
    // `execute` already rejected an empty command line before spawning this
    // thread, so `tokens` is never empty here.
    let program_name = tokens[0].to_string();

    let tid = kernel.platform.scheduler.current();

    let page_dir = match kernel.platform.page_directory.create() {
        Ok(pd) => pd,
        Err(_) => fail_load(&kernel, &handshake),
    };
    kernel.platform.page_directory.activate(Some(page_dir));

    let loaded = match elf::load(&kernel.platform, page_dir, &program_name) {
        Ok(loaded) => loaded,
        Err(_) => {
            kernel.platform.page_directory.activate(None);
            kernel.platform.page_directory.destroy(page_dir);
            fail_load(&kernel, &handshake);
        }
    };

    let task = Task::new(tid, program_name);
    {
        let mut pcb = task.pcb.lock();
        pcb.page_dir = Some(page_dir);
        pcb.exe_file = Some(loaded.exe_file);
    }
    kernel.tasks.insert(task.clone());

    *handshake.success.lock() = true;
    handshake.load_done.up(&kernel.platform.parker());

    let stack_result = build_argument_stack(&kernel.platform, page_dir, loaded.initial_sp, &tokens);

    // The parent may reach its own exit and tear down `parent_edge` before
    // it has finished publishing it here; block until that publication is
    // guaranteed complete.
    handshake.wait_status_installed.down(&kernel.platform.parker());
    drop(handshake);

    match stack_result {
        Ok(sp) => kernel.platform.scheduler.enter_user_mode(loaded.entry_point, sp),
        Err(_) => exit::exit_current(&kernel, &task, -1),
    }
}
