//! The shared bookkeeping a parent uses to await and inspect a child's
//! exit.
//!
//! The source reference-counts this by hand: a mutex-guarded integer
//! starting at two, decremented once by each party, with whoever observes
//! it hit zero responsible for `free`. That is exactly what `Arc` already
//! gives for free in Rust: two strong owners (the parent's child-edges
//! entry and the child's own parent-edge field), each dropped at its
//! owner's teardown, with the record's destructor running on whichever side
//! drops last. So there is no `count` field here; the reference count
//! *is* `Arc::strong_count`, and "destroyed exactly once" is the ordinary
//! guarantee Rust's ownership model already gives a `Drop` impl.

use ksync::mutex::SpinLock;
use ksync::Semaphore;

use crate::hal::ThreadId;

/// Sentinel *unknown* is modeled as `None`; sentinel *consumed* is the
/// separate `consumed` flag, since it must survive past a second `wait`
/// even though the numeric code has already been read out.
struct ExitState {
    code: Option<i32>,
    consumed: bool,
}

pub struct WaitStatus {
    pub child_tid: ThreadId,
    state: SpinLock<ExitState>,
    exit_semaphore: Semaphore<ThreadId>,
}

impl WaitStatus {
    pub fn new(child_tid: ThreadId) -> Self {
        Self {
            child_tid,
            state: SpinLock::new(ExitState {
                code: None,
                consumed: false,
            }),
            exit_semaphore: Semaphore::new(0),
        }
    }

    /// Called by the child at exit: records its exit code (or `-1` if it
    /// was force-exited) and wakes a waiting parent. Idempotent is not
    /// required, since a child exits exactly once.
    pub fn publish_exit(&self, code: i32, platform: &crate::hal::Platform) {
        self.state.lock().code = Some(code);
        self.exit_semaphore.up(&platform.parker());
    }

    /// Fails fast if the code was already consumed, otherwise blocks for
    /// the child's exit and consumes the code.
    pub fn wait(&self, platform: &crate::hal::Platform) -> Option<i32> {
        if self.state.lock().consumed {
            return None;
        }
        self.exit_semaphore.down(&platform.parker());
        let mut state = self.state.lock();
        let code = state.code.take().expect("exit semaphore only ups after publish_exit");
        state.consumed = true;
        Some(code)
    }
}

#[cfg(test)]
mod tests {
    use alloc::sync::Arc;

    use super::*;
    use crate::hal::Platform;
    use crate::testing::{TestFileSystem, TestPageDirectory, TestScheduler};

    fn platform() -> Platform {
        Platform::new(
            TestScheduler::new(),
            Arc::new(TestPageDirectory::new()),
            Arc::new(TestFileSystem::new()),
        )
    }

    #[test]
    fn wait_after_publish_exit_returns_the_published_code() {
        let platform = platform();
        let status = WaitStatus::new(ThreadId(1));
        status.publish_exit(42, &platform);
        assert_eq!(status.wait(&platform), Some(42));
    }

    #[test]
    fn a_second_wait_returns_none_instead_of_reblocking() {
        let platform = platform();
        let status = WaitStatus::new(ThreadId(1));
        status.publish_exit(0, &platform);
        assert_eq!(status.wait(&platform), Some(0));
        assert_eq!(status.wait(&platform), None);
    }

    #[test]
    fn a_negative_exit_code_round_trips_unchanged() {
        let platform = platform();
        let status = WaitStatus::new(ThreadId(7));
        status.publish_exit(-1, &platform);
        assert_eq!(status.wait(&platform), Some(-1));
    }
}
