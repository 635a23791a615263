//! Error kinds produced by the userprog subsystem.
//!
//! Unlike a POSIX errno table, this core never hands a raw error code across
//! a boundary that can see it: every fallible path here either resolves to a
//! `-1` written into the saved user register file, or a thread teardown.
//! [`KernelError`] exists so the *internal* call chain (loader, launcher,
//! wait-status registry, dispatcher) can propagate failures with `?` before
//! that final flattening happens.

use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq, Clone, Copy)]
#[allow(dead_code)]
pub enum KernelError {
    /// A user pointer failed validation: null, past `PHYS_BASE`, or unmapped.
    #[error("invalid user pointer")]
    InvalidUserPointer,

    /// ELF header mismatch, a rejected or invalid segment, the executable
    /// could not be opened, or an allocation failed while installing it.
    #[error("executable failed to load")]
    LoadFailure,

    /// Allocation failure outside of loading (handshake, wait-status record,
    /// descriptor).
    #[error("out of memory")]
    OutOfMemory,

    /// `wait` named a tid that is not (or is no longer) one of the caller's
    /// children.
    #[error("no such child")]
    NoSuchChild,

    /// `wait` was called a second time for a child whose exit code has
    /// already been consumed.
    #[error("child already waited on")]
    DoubleWait,

    /// `open` was attempted with no free descriptor slot and the table
    /// already at `MAX_FD`.
    #[error("descriptor table exhausted")]
    DescriptorExhausted,

    /// A file call named a descriptor id that is not currently active.
    #[error("bad descriptor")]
    BadDescriptor,

    /// The file-system collaborator reported failure.
    #[error("file system error")]
    FileSystemError,
}

/// Result alias used throughout the core for fallible internal operations.
pub type SysResult<T> = core::result::Result<T, KernelError>;
