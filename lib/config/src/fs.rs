//! Per-process file table configuration

/// per-process descriptor cap; descriptor ids range over `[0, MAX_FD + 1]`
pub const MAX_FD: usize = 128;

/// reserved descriptor id for console input
pub const STDIN_FD: usize = 0;
/// reserved descriptor id for console output
pub const STDOUT_FD: usize = 1;

/// first descriptor id handed out to an opened file
pub const FIRST_FILE_FD: usize = 2;
