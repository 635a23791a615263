//! A scheduler double backed by real OS threads.
//!
//! `park`/`unpark` map directly onto `std::thread::park`/`Thread::unpark`:
//! both give a one-shot wakeup token that `park` consumes immediately if
//! it is already armed, which is exactly the down/up contract
//! [`ksync::Parker`] needs. `exit_current` has to diverge without tearing
//! down the whole test process, so it unwinds with a private marker type
//! that [`spawn`](TestScheduler::spawn) catches at the thread boundary;
//! any other panic is left to propagate so a real bug still fails the
//! test.
//!
//! Since there is no real CPU to trap from, "entering user mode" looks up
//! the behavior registered for the current thread's program name (see
//! `TestHarness::install_program`) and runs it directly: that closure
//! issues syscalls through the real [`crate::syscall::dispatch`], so
//! everything downstream of "a user program is now running" is exercised
//! for real.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, OnceLock, Weak};
use std::thread;

use crate::hal::{Scheduler, ThreadEntry, ThreadId};
use crate::runtime::Kernel;
use crate::task::pcb::Task;

pub type ProgramBehavior = Arc<dyn Fn(&Arc<Kernel>, &Arc<Task>) + Send + Sync>;

struct ThreadExit;

struct Inner {
    next_id: usize,
    handles: HashMap<ThreadId, thread::Thread>,
    programs: HashMap<String, ProgramBehavior>,
    panics: Vec<(ThreadId, Box<dyn std::any::Any + Send>)>,
}

pub struct TestScheduler {
    inner: Arc<Mutex<Inner>>,
    kernel: OnceLock<Weak<Kernel>>,
}

thread_local! {
    static CURRENT_ID: std::cell::Cell<Option<ThreadId>> = const { std::cell::Cell::new(None) };
}

impl TestScheduler {
    pub fn new() -> Arc<Self> {
        install_quiet_panic_hook();
        Arc::new(Self {
            inner: Arc::new(Mutex::new(Inner {
                next_id: 1,
                handles: HashMap::new(),
                programs: HashMap::new(),
                panics: Vec::new(),
            })),
            kernel: OnceLock::new(),
        })
    }

    /// Ties this scheduler back to the kernel it belongs to, so
    /// `enter_user_mode` can look the running task up. Must be called once,
    /// right after the owning `Kernel` is constructed.
    pub fn bind(&self, kernel: &Arc<Kernel>) {
        let _ = self.kernel.set(Arc::downgrade(kernel));
    }

    /// Registers the calling thread itself as a process, for the initial
    /// process the harness plays the role of (it never goes through
    /// `spawn`, matching how the kernel's own initial thread is never the
    /// bootstrap's child either).
    pub fn register_current(&self) -> ThreadId {
        let id = {
            let mut inner = self.inner.lock().unwrap();
            let id = ThreadId(inner.next_id);
            inner.next_id += 1;
            inner.handles.insert(id, thread::current());
            id
        };
        CURRENT_ID.with(|c| c.set(Some(id)));
        id
    }

    pub fn register_program(&self, name: &str, behavior: ProgramBehavior) {
        self.inner.lock().unwrap().programs.insert(name.to_string(), behavior);
    }

    fn kernel(&self) -> Arc<Kernel> {
        self.kernel
            .get()
            .and_then(Weak::upgrade)
            .expect("TestScheduler::bind must run before any thread enters user mode")
    }

    /// Re-raises the oldest panic a registered program behavior hit, if any.
    /// `enter_user_mode` catches those at the boundary so the owning OS
    /// thread can still reach `exit_current` and unblock a parent's `wait`;
    /// tests call this after such a synchronization point to turn a stashed
    /// assertion failure back into a real test failure with its original
    /// message, instead of just a surprising exit code.
    pub fn propagate_panics(&self) {
        let stashed = self.inner.lock().unwrap().panics.pop();
        if let Some((_, payload)) = stashed {
            std::panic::resume_unwind(payload);
        }
    }
}

impl Scheduler for TestScheduler {
    fn spawn(&self, name: &str, _priority: u32, entry: ThreadEntry) -> Option<ThreadId> {
        // A real OS thread has no notion of the kernel's own priority
        // levels, so the double just drops it; `launcher::execute` still
        // threads `config::PRI_DEFAULT` through the same call a real
        // scheduler collaborator would see.
        let id = {
            let mut inner = self.inner.lock().unwrap();
            let id = ThreadId(inner.next_id);
            inner.next_id += 1;
            id
        };
        let inner = self.inner.clone();
        thread::Builder::new()
            .name(name.to_string())
            .spawn(move || {
                inner.lock().unwrap().handles.insert(id, thread::current());
                CURRENT_ID.with(|c| c.set(Some(id)));
                let _ = std::panic::catch_unwind(std::panic::AssertUnwindSafe(entry));
            })
            .ok()?;
        Some(id)
    }

    fn current(&self) -> ThreadId {
        CURRENT_ID
            .with(|c| c.get())
            .expect("current() called on a thread the test scheduler never registered")
    }

    fn exit_current(&self) -> ! {
        std::panic::panic_any(ThreadExit)
    }

    fn park(&self) {
        thread::park();
    }

    fn unpark(&self, thread: ThreadId) {
        if let Some(handle) = self.inner.lock().unwrap().handles.get(&thread) {
            handle.unpark();
        }
    }

    fn enter_user_mode(&self, _entry: usize, _sp: usize) -> ! {
        let kernel = self.kernel();
        let tid = self.current();
        let task = kernel
            .tasks
            .get(tid)
            .expect("the bootstrap registers the task before entering user mode");
        let behavior = self.inner.lock().unwrap().programs.get(&task.name).cloned();
        if let Some(behavior) = behavior {
            // Caught here rather than left to `spawn`'s boundary: a behavior
            // that panics (e.g. a failed assertion) must still reach
            // `exit_current` so a parent blocked in `wait` unblocks, instead
            // of leaving it parked forever. The payload is stashed and
            // re-raised by `propagate_panics` once the test has synchronized
            // on that exit, so the original failure is not lost.
            let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| behavior(&kernel, &task)));
            if let Err(payload) = result {
                self.inner.lock().unwrap().panics.push((tid, payload));
                crate::task::exit::exit_current(&kernel, &task, -99);
            }
        }
        crate::task::exit::exit_current(&kernel, &task, 0)
    }
}

fn install_quiet_panic_hook() {
    static INIT: std::sync::Once = std::sync::Once::new();
    INIT.call_once(|| {
        let default_hook = std::panic::take_hook();
        std::panic::set_hook(Box::new(move |info| {
            if info.payload().downcast_ref::<ThreadExit>().is_some() {
                return;
            }
            default_hook(info);
        }));
    });
}
