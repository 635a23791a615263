//! End-to-end process lifecycle scenarios, driven against the real launcher,
//! bootstrap, wait-status registry and syscall dispatcher through the
//! in-memory hal doubles in `kernel::testing`.

use std::sync::Arc;

use kernel::hal::PageDirId;
use kernel::runtime::Kernel;
use kernel::syscall::{self, nr};
use kernel::task::pcb::Task;
use kernel::testing::{self, TestHarness};

use config::{PAGE_SIZE, PHYS_BASE};

/// Writes `words` (a fake trapped syscall frame: call number then
/// arguments) into the process's stack page and returns the address a
/// trap's saved `esp` would have pointed at.
fn push_frame(kernel: &Arc<Kernel>, pd: PageDirId, words: &[u32]) -> usize {
    use kernel::hal::PageDirectory;
    let base = PHYS_BASE - PAGE_SIZE;
    let bytes: Vec<u8> = words.iter().flat_map(|w| w.to_le_bytes()).collect();
    assert!(kernel.platform.page_directory.write_bytes(pd, base, &bytes));
    base
}

/// Writes a byte buffer into the stack page above where `push_frame`'s
/// frames land, and returns its address.
fn push_buffer(kernel: &Arc<Kernel>, pd: PageDirId, data: &[u8]) -> usize {
    use kernel::hal::PageDirectory;
    let base = PHYS_BASE - PAGE_SIZE + 0x400;
    assert!(kernel.platform.page_directory.write_bytes(pd, base, data));
    base
}

fn current_pd(task: &Arc<Task>) -> PageDirId {
    task.pcb.lock().page_dir.expect("loaded process always has a page directory")
}

#[test]
fn echo_hello_world_prints_and_reports_exit_zero() {
    let _guard = testing::harness_lock();
    let harness = TestHarness::new();
    let parent = harness.spawn_initial_process("main");

    harness.install_program("echo", |kernel, task| {
        let pd = current_pd(task);
        let msg = b"hello world";
        let buf_addr = push_buffer(kernel, pd, msg);
        let frame = push_frame(kernel, pd, &[nr::WRITE, 1, buf_addr as u32, msg.len() as u32]);
        let written = syscall::dispatch(kernel, task, frame);
        assert_eq!(written, msg.len() as i32);

        let frame = push_frame(kernel, pd, &[nr::EXIT, 0]);
        syscall::dispatch(kernel, task, frame);
        unreachable!("SYS_EXIT never returns");
    });

    let child = kernel::task::execute(&harness.kernel, &parent, "echo hello world").expect("load succeeds");
    let code = kernel::task::wait(&parent, child, &harness.kernel.platform).expect("child is a known child");
    harness.check();
    assert_eq!(code, 0);

    let second_wait = kernel::task::wait(&parent, child, &harness.kernel.platform);
    assert!(second_wait.is_err(), "a second wait on the same child must fail");

    assert_eq!(testing::console_output(), b"hello world".to_vec());
}

#[test]
fn executing_a_nonexistent_program_returns_error_without_a_wait_status() {
    let _guard = testing::harness_lock();
    let harness = TestHarness::new();
    let parent = harness.spawn_initial_process("main");

    let result = kernel::task::execute(&harness.kernel, &parent, "bogus");
    assert!(result.is_err());
    assert!(parent.pcb.lock().children.is_empty());
}

#[test]
fn two_children_exiting_without_a_parent_wait_tear_down_cleanly() {
    let _guard = testing::harness_lock();
    let harness = TestHarness::new();
    let parent = harness.spawn_initial_process("main");

    for name in ["child_a", "child_b"] {
        harness.install_program(name, |kernel, task| {
            let pd = current_pd(task);
            let frame = push_frame(kernel, pd, &[nr::EXIT, 7]);
            syscall::dispatch(kernel, task, frame);
            unreachable!("SYS_EXIT never returns");
        });
    }

    let a = kernel::task::execute(&harness.kernel, &parent, "child_a").expect("load succeeds");
    let b = kernel::task::execute(&harness.kernel, &parent, "child_b").expect("load succeeds");
    assert_eq!(parent.pcb.lock().children.len(), 2);
    let _ = (a, b);

    // Parent exits without ever calling `wait` on either child; neither
    // child's wait-status has a reader left once this returns.
    let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
        kernel::task::exit::exit_current(&harness.kernel, &parent, 0);
    }));
    assert!(result.is_err(), "exit_current always diverges");
}

#[test]
fn invalid_user_pointer_force_exits_and_parent_observes_negative_one() {
    let _guard = testing::harness_lock();
    let harness = TestHarness::new();
    let parent = harness.spawn_initial_process("main");

    harness.install_program("bad_ptr", |kernel, task| {
        let pd = current_pd(task);
        // `PHYS_BASE - 1` is the last byte of user space: a 4-byte word
        // starting there straddles past `PHYS_BASE` and must fail
        // validation.
        let frame = push_frame(kernel, pd, &[nr::WRITE, 1, (PHYS_BASE - 1) as u32, 1]);
        syscall::dispatch(kernel, task, frame);
        unreachable!("an invalid pointer force-exits the process");
    });

    let child = kernel::task::execute(&harness.kernel, &parent, "bad_ptr").expect("load succeeds");
    let code = kernel::task::wait(&parent, child, &harness.kernel.platform).expect("child is a known child");
    harness.check();
    assert_eq!(code, -1);
}

#[test]
fn descriptor_table_exhaustion_then_reuse_through_real_syscalls() {
    let _guard = testing::harness_lock();
    let harness = TestHarness::new();
    let parent = harness.spawn_initial_process("main");

    for i in 0..config::MAX_FD {
        harness.fs.install_file(&seed_file_name(i), vec![0u8; 4]);
    }

    harness.install_program("opener", |kernel, task| {
        let pd = current_pd(task);
        let mut opened = Vec::new();
        for i in 0..config::MAX_FD {
            let name_addr = push_buffer(kernel, pd, format!("{}\0", seed_file_name(i)).as_bytes());
            let frame = push_frame(kernel, pd, &[nr::OPEN, name_addr as u32]);
            let fd = syscall::dispatch(kernel, task, frame);
            assert!(fd >= config::FIRST_FILE_FD as i32, "open {} should succeed, got {}", i, fd);
            opened.push(fd);
        }

        // Table is now at capacity: one more open must fail.
        let name_addr = push_buffer(kernel, pd, b"overflow\0");
        let frame = push_frame(kernel, pd, &[nr::OPEN, name_addr as u32]);
        assert_eq!(syscall::dispatch(kernel, task, frame), -1);

        // Closing one frees a slot that the next open reuses before
        // growing further (there is nowhere further to grow).
        let freed = opened[0];
        let frame = push_frame(kernel, pd, &[nr::CLOSE, freed as u32]);
        syscall::dispatch(kernel, task, frame);

        let name_addr = push_buffer(kernel, pd, b"reopen\0");
        let frame = push_frame(kernel, pd, &[nr::OPEN, name_addr as u32]);
        let reused = syscall::dispatch(kernel, task, frame);
        assert_eq!(reused, freed);

        let frame = push_frame(kernel, pd, &[nr::EXIT, 0]);
        syscall::dispatch(kernel, task, frame);
        unreachable!("SYS_EXIT never returns");
    });

    let child = kernel::task::execute(&harness.kernel, &parent, "opener").expect("load succeeds");
    let code = kernel::task::wait(&parent, child, &harness.kernel.platform).expect("child is a known child");
    harness.check();
    assert_eq!(code, 0);
}

fn seed_file_name(i: usize) -> String {
    format!("file_{}", i)
}

#[test]
fn elf_segment_at_the_null_page_fails_to_load() {
    let _guard = testing::harness_lock();
    let harness = TestHarness::new();
    let parent = harness.spawn_initial_process("main");

    let broken = testing::build_elf(
        0,
        &testing::FixtureSegment {
            vaddr: 0,
            memsz: PAGE_SIZE as u32,
            data: Vec::new(),
            writable: false,
        },
    );
    harness.fs.install_file("nullpage", broken);

    let result = kernel::task::execute(&harness.kernel, &parent, "nullpage");
    assert!(result.is_err());
}
