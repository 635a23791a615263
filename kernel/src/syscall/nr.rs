//! System-call numbers, matching the ABI's trap vector 0x30: the
//! call number is the first word at the trapped user `esp`.

pub const HALT: u32 = 0;
pub const EXIT: u32 = 1;
pub const EXEC: u32 = 2;
pub const WAIT: u32 = 3;
pub const CREATE: u32 = 4;
pub const REMOVE: u32 = 5;
pub const OPEN: u32 = 6;
pub const FILESIZE: u32 = 7;
pub const READ: u32 = 8;
pub const WRITE: u32 = 9;
pub const SEEK: u32 = 10;
pub const TELL: u32 = 11;
pub const CLOSE: u32 = 12;
/// Diagnostic: echoes `args[1] + 1`. Kept as a standalone call per the
/// source rather than folded into an existing one.
pub const NULL: u32 = 13;
