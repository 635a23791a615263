//! In-memory test doubles for every hal collaborator, built only under the
//! `testing` feature (always on for `#[cfg(test)]` builds). These let unit
//! and integration tests drive the real launcher, bootstrap, wait-status
//! registry and syscall dispatcher against real OS threads, an in-memory
//! file system, and an in-memory page table, without real hardware or a
//! toolchain-built executable.

mod device;
mod elf_fixture;
mod filesystem;
mod memory;
mod scheduler;

pub use device::{console_output, feed_keyboard, reset_console};
pub use elf_fixture::{build_elf, FixtureSegment};
pub use filesystem::TestFileSystem;
pub use memory::TestPageDirectory;
pub use scheduler::{ProgramBehavior, TestScheduler};

use std::sync::{Arc, Mutex, MutexGuard, OnceLock};

use crate::hal::Platform;
use crate::runtime::Kernel;
use crate::task::pcb::Task;

/// The real hal collaborators (console, keyboard, shutdown device) are
/// process-wide singletons wired through `crate_interface`, so scenarios
/// that read or feed them must not run concurrently with each other.
/// Every integration test takes this lock first.
pub fn harness_lock() -> MutexGuard<'static, ()> {
    static LOCK: OnceLock<Mutex<()>> = OnceLock::new();
    LOCK.get_or_init(|| Mutex::new(()))
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// A fully wired in-memory kernel, ready to `execute` fake programs
/// registered with [`TestHarness::install_program`].
pub struct TestHarness {
    pub kernel: Arc<Kernel>,
    pub scheduler: Arc<TestScheduler>,
    pub fs: Arc<TestFileSystem>,
}

impl TestHarness {
    pub fn new() -> Self {
        let scheduler = TestScheduler::new();
        let page_directory = Arc::new(TestPageDirectory::new());
        let fs = Arc::new(TestFileSystem::new());
        let platform = Platform::new(scheduler.clone(), page_directory, fs.clone());
        // `Kernel::new` writes the startup banner to the console; reset
        // after construction so scenarios see only what their own program
        // wrote.
        let kernel = Arc::new(Kernel::new(platform));
        reset_console();
        scheduler.bind(&kernel);
        Self { kernel, scheduler, fs }
    }

    /// Registers the calling thread as the initial process: the one every
    /// scenario's `execute`/`wait` calls are made from, mirroring the
    /// kernel's own first user thread.
    pub fn spawn_initial_process(&self, name: &str) -> Arc<Task> {
        let tid = self.scheduler.register_current();
        let task = Task::new(tid, name.to_string());
        self.kernel.tasks.insert(task.clone());
        task
    }

    /// Installs a fake executable named `name`: a syntactically valid ELF
    /// the real loader will accept, whose "user-mode" behavior is
    /// `behavior` rather than actual machine code. `behavior` runs on the
    /// child's thread once the bootstrap would otherwise have jumped to
    /// the entry point, and is expected to end by issuing a `SYS_EXIT`
    /// (or `SYS_HALT`) through [`crate::syscall::dispatch`] the same way a
    /// real trapping program would.
    pub fn install_program(
        &self,
        name: &str,
        behavior: impl Fn(&Arc<Kernel>, &Arc<Task>) + Send + Sync + 'static,
    ) {
        let segment = FixtureSegment::default_text();
        let elf = build_elf(segment.vaddr, &segment);
        self.fs.install_file(name, elf);
        self.scheduler.register_program(name, Arc::new(behavior));
    }

    /// Re-raises the oldest panic stashed from a program behavior, if any.
    /// Call after a `wait` (or other synchronization point) that proves the
    /// relevant child has run, so an assertion failure inside a behavior
    /// surfaces as a normal test failure rather than just an odd exit code.
    pub fn check(&self) {
        self.scheduler.propagate_panics();
    }
}

impl Default for TestHarness {
    fn default() -> Self {
        Self::new()
    }
}
