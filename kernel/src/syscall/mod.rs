//! The system-call dispatcher: on trap from user mode, validates the
//! saved user `esp` and every argument word the call needs, routes to one
//! of fourteen handlers, and returns the value the caller writes into the
//! saved `eax`.
//!
//! Argument fetch and pointer validation are deliberately the same
//! operation here: [`UserPtr::read`] re-validates the range it touches, so
//! a handler that calls it on an unchecked word gets exactly the
//! fail-closed behavior described without a separate "pre-check" pass.
//! Any failure (a bad call number, a bad argument word, or a buffer/string
//! pointer that doesn't resolve) force-exits the process with code -1,
//! implemented as an ordinary exit.

pub mod nr;

use alloc::string::String;
use alloc::sync::Arc;
use alloc::vec;

use config::{STDIN_FD, STDOUT_FD};

use crate::hal::{self, PageDirId, ThreadId};
use crate::mm::{validate_word, UserPtr};
use crate::runtime::Kernel;
use crate::task::pcb::Task;
use crate::task::{self, exit};

/// Length cap for a name or command-line string read out of user memory by
/// a single handler call; mirrors the source's fixed-size stack buffers.
const MAX_STRING_LEN: usize = 512;

fn arg_word(kernel: &Kernel, pd: PageDirId, esp: usize, index: usize) -> Option<u32> {
    let addr = esp.checked_add(index.checked_mul(4)?)?;
    validate_word(addr, &kernel.platform, pd).ok()?;
    UserPtr::<u32>::new(addr).read(&kernel.platform, pd).ok()
}

/// Fetches argument word `index` (0 is the call number itself), force-
/// exiting the process if it fails to validate.
fn require_arg(kernel: &Arc<Kernel>, task: &Arc<Task>, pd: PageDirId, esp: usize, index: usize) -> u32 {
    match arg_word(kernel, pd, esp, index) {
        Some(word) => word,
        None => force_exit(kernel, task),
    }
}

/// Validates a user pointer argument's first word, force-exiting on
/// failure. Buffers and strings validate the rest of their range inside
/// whichever [`UserPtr`] call actually touches them.
fn require_ptr(kernel: &Arc<Kernel>, task: &Arc<Task>, pd: PageDirId, addr: u32) {
    if validate_word(addr as usize, &kernel.platform, pd).is_err() {
        force_exit(kernel, task);
    }
}

fn require_string(kernel: &Arc<Kernel>, task: &Arc<Task>, pd: PageDirId, addr: u32) -> String {
    let mut buf = vec![0u8; MAX_STRING_LEN];
    match UserPtr::<u8>::new(addr as usize).read_c_string_into(&kernel.platform, pd, &mut buf) {
        Ok(len) => String::from_utf8_lossy(&buf[..len]).into_owned(),
        Err(_) => force_exit(kernel, task),
    }
}

fn force_exit(kernel: &Arc<Kernel>, task: &Arc<Task>) -> ! {
    log::warn!("[syscall] {} force-exited (bad call number or user pointer)", task.name);
    exit::exit_current(kernel, task, -1)
}

/// Entry point for a trap from user mode: `user_esp` is the saved user
/// stack pointer at the moment of the trap. Returns the handler's result,
/// or never returns if validation failure or `EXIT`/`HALT` tears the
/// process down first.
pub fn dispatch(kernel: &Arc<Kernel>, task: &Arc<Task>, user_esp: usize) -> i32 {
    let pd = task
        .pcb
        .lock()
        .page_dir
        .expect("dispatch only ever runs on a thread whose process has finished loading");

    let call = require_arg(kernel, task, pd, user_esp, 0);
    match call {
        nr::HALT => sys_halt(),
        nr::EXIT => sys_exit(kernel, task, pd, user_esp),
        nr::EXEC => sys_exec(kernel, task, pd, user_esp),
        nr::WAIT => sys_wait(kernel, task, pd, user_esp),
        nr::CREATE => sys_create(kernel, task, pd, user_esp),
        nr::REMOVE => sys_remove(kernel, task, pd, user_esp),
        nr::OPEN => sys_open(kernel, task, pd, user_esp),
        nr::FILESIZE => sys_filesize(kernel, task, pd, user_esp),
        nr::READ => sys_read(kernel, task, pd, user_esp),
        nr::WRITE => sys_write(kernel, task, pd, user_esp),
        nr::SEEK => sys_seek(kernel, task, pd, user_esp),
        nr::TELL => sys_tell(kernel, task, pd, user_esp),
        nr::CLOSE => sys_close(kernel, task, pd, user_esp),
        nr::NULL => sys_null(kernel, task, pd, user_esp),
        _ => force_exit(kernel, task),
    }
}

fn sys_halt() -> ! {
    hal::power_off()
}

fn sys_exit(kernel: &Arc<Kernel>, task: &Arc<Task>, pd: PageDirId, esp: usize) -> i32 {
    let code = require_arg(kernel, task, pd, esp, 1) as i32;
    exit::exit_current(kernel, task, code)
}

fn sys_exec(kernel: &Arc<Kernel>, task: &Arc<Task>, pd: PageDirId, esp: usize) -> i32 {
    let ptr = require_arg(kernel, task, pd, esp, 1);
    require_ptr(kernel, task, pd, ptr);
    let command_line = require_string(kernel, task, pd, ptr);
    match task::execute(kernel, task, &command_line) {
        Ok(tid) => tid.0 as i32,
        Err(_) => -1,
    }
}

fn sys_wait(kernel: &Arc<Kernel>, task: &Arc<Task>, pd: PageDirId, esp: usize) -> i32 {
    let tid = require_arg(kernel, task, pd, esp, 1);
    match task::wait(task, ThreadId(tid as usize), &kernel.platform) {
        Ok(code) => code,
        Err(_) => -1,
    }
}

fn sys_create(kernel: &Arc<Kernel>, task: &Arc<Task>, pd: PageDirId, esp: usize) -> i32 {
    let name_ptr = require_arg(kernel, task, pd, esp, 1);
    require_ptr(kernel, task, pd, name_ptr);
    let size = require_arg(kernel, task, pd, esp, 2);
    let name = require_string(kernel, task, pd, name_ptr);

    let _guard = kernel.fs_lock.lock();
    kernel.platform.file_system.create(&name, size) as i32
}

fn sys_remove(kernel: &Arc<Kernel>, task: &Arc<Task>, pd: PageDirId, esp: usize) -> i32 {
    let name_ptr = require_arg(kernel, task, pd, esp, 1);
    require_ptr(kernel, task, pd, name_ptr);
    let name = require_string(kernel, task, pd, name_ptr);

    let _guard = kernel.fs_lock.lock();
    kernel.platform.file_system.remove(&name) as i32
}

fn sys_open(kernel: &Arc<Kernel>, task: &Arc<Task>, pd: PageDirId, esp: usize) -> i32 {
    let name_ptr = require_arg(kernel, task, pd, esp, 1);
    require_ptr(kernel, task, pd, name_ptr);
    let name = require_string(kernel, task, pd, name_ptr);

    let file = {
        let _guard = kernel.fs_lock.lock();
        kernel.platform.file_system.open(&name)
    };
    let file = match file {
        Some(file) => file,
        None => return -1,
    };

    let mut pcb = task.pcb.lock();
    match pcb.descriptors.open(file) {
        Ok(id) => id as i32,
        Err(_) => {
            drop(pcb);
            let _guard = kernel.fs_lock.lock();
            kernel.platform.file_system.close(file);
            -1
        }
    }
}

fn sys_filesize(kernel: &Arc<Kernel>, task: &Arc<Task>, pd: PageDirId, esp: usize) -> i32 {
    let fd = require_arg(kernel, task, pd, esp, 1) as usize;
    let file = {
        let pcb = task.pcb.lock();
        match pcb.descriptors.get(fd) {
            Ok(file) => file,
            Err(_) => return -1,
        }
    };
    let _guard = kernel.fs_lock.lock();
    kernel.platform.file_system.length(file) as i32
}

fn sys_read(kernel: &Arc<Kernel>, task: &Arc<Task>, pd: PageDirId, esp: usize) -> i32 {
    let fd = require_arg(kernel, task, pd, esp, 1) as usize;
    let buf_ptr = require_arg(kernel, task, pd, esp, 2);
    require_ptr(kernel, task, pd, buf_ptr);
    let size = require_arg(kernel, task, pd, esp, 3) as usize;

    let read = if fd == STDIN_FD {
        let mut bytes = vec![0u8; size];
        for slot in bytes.iter_mut() {
            *slot = hal::read_char();
        }
        let written = UserPtr::<u8>::new(buf_ptr as usize).write_buf(&kernel.platform, pd, &bytes);
        if written.is_err() {
            force_exit(kernel, task);
        }
        size
    } else if fd == STDOUT_FD {
        return -1;
    } else {
        let file = {
            let pcb = task.pcb.lock();
            match pcb.descriptors.get(fd) {
                Ok(file) => file,
                Err(_) => return -1,
            }
        };
        let mut bytes = vec![0u8; size];
        let read = {
            let _guard = kernel.fs_lock.lock();
            kernel.platform.file_system.read(file, &mut bytes)
        };
        if UserPtr::<u8>::new(buf_ptr as usize)
            .write_buf(&kernel.platform, pd, &bytes[..read])
            .is_err()
        {
            force_exit(kernel, task);
        }
        read
    };
    read as i32
}

fn sys_write(kernel: &Arc<Kernel>, task: &Arc<Task>, pd: PageDirId, esp: usize) -> i32 {
    let fd = require_arg(kernel, task, pd, esp, 1) as usize;
    let buf_ptr = require_arg(kernel, task, pd, esp, 2);
    require_ptr(kernel, task, pd, buf_ptr);
    let size = require_arg(kernel, task, pd, esp, 3) as usize;

    let mut bytes = vec![0u8; size];
    if UserPtr::<u8>::new(buf_ptr as usize)
        .read_buf_into(&kernel.platform, pd, &mut bytes)
        .is_err()
    {
        force_exit(kernel, task);
    }

    if fd == STDOUT_FD {
        let _guard = kernel.fs_lock.lock();
        hal::console_write(&bytes);
        size as i32
    } else if fd == STDIN_FD {
        -1
    } else {
        let file = {
            let pcb = task.pcb.lock();
            match pcb.descriptors.get(fd) {
                Ok(file) => file,
                Err(_) => return -1,
            }
        };
        let _guard = kernel.fs_lock.lock();
        kernel.platform.file_system.write(file, &bytes) as i32
    }
}

fn sys_seek(kernel: &Arc<Kernel>, task: &Arc<Task>, pd: PageDirId, esp: usize) -> i32 {
    let fd = require_arg(kernel, task, pd, esp, 1) as usize;
    let position = require_arg(kernel, task, pd, esp, 2);
    let file = {
        let pcb = task.pcb.lock();
        match pcb.descriptors.get(fd) {
            Ok(file) => file,
            Err(_) => return -1,
        }
    };
    let _guard = kernel.fs_lock.lock();
    kernel.platform.file_system.seek(file, position);
    0
}

fn sys_tell(kernel: &Arc<Kernel>, task: &Arc<Task>, pd: PageDirId, esp: usize) -> i32 {
    let fd = require_arg(kernel, task, pd, esp, 1) as usize;
    let file = {
        let pcb = task.pcb.lock();
        match pcb.descriptors.get(fd) {
            Ok(file) => file,
            Err(_) => return -1,
        }
    };
    let _guard = kernel.fs_lock.lock();
    kernel.platform.file_system.tell(file) as i32
}

fn sys_close(kernel: &Arc<Kernel>, task: &Arc<Task>, pd: PageDirId, esp: usize) -> i32 {
    let fd = require_arg(kernel, task, pd, esp, 1) as usize;
    let file = {
        let mut pcb = task.pcb.lock();
        match pcb.descriptors.close(fd) {
            Ok(file) => file,
            Err(_) => return -1,
        }
    };
    let _guard = kernel.fs_lock.lock();
    kernel.platform.file_system.close(file);
    0
}

fn sys_null(kernel: &Arc<Kernel>, task: &Arc<Task>, pd: PageDirId, esp: usize) -> i32 {
    let value = require_arg(kernel, task, pd, esp, 1);
    (value + 1) as i32
}
