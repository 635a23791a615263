//! Spinlock wrappers.
//!
//! The source this lib was lifted from tracked per-hart lock depth and
//! toggled interrupts around every critical section. This core has no
//! interrupt controller of its own to manage (see the scheduler
//! collaborator), so that bookkeeping is gone; these are thin aliases over
//! `spin`.

pub type SpinLock<T> = spin::Mutex<T>;
pub type SpinLockGuard<'a, T> = spin::MutexGuard<'a, T>;
