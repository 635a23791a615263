//! Small synchronization primitives used across the core.

#![no_std]

extern crate alloc;

pub mod mutex;
pub mod semaphore;

pub use semaphore::{Parker, Semaphore};
