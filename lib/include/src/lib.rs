//! Shared error types for the userprog subsystem.

#![no_std]

mod errno;

pub use errno::{KernelError, SysResult};
