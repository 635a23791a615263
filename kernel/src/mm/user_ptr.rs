//! A fallible wrapper around raw user-space addresses.
//!
//! The source dereferenced user pointers directly once `valid_user_addr`
//! had blessed them, trusting the caller to have checked first. That
//! discipline is easy to get right in a five-hundred-line syscall.c and easy
//! to get wrong everywhere else, so here the validation lives inside the
//! pointer type itself: every read or write re-checks the range it touches
//! and returns [`KernelError::InvalidUserPointer`] instead of assuming
//! someone upstream already did the work.

use core::marker::PhantomData;
use core::mem::size_of;

use config::{PAGE_SIZE, PHYS_BASE};
use include::{KernelError, SysResult};

use crate::hal::{PageDirId, Platform};

/// A pointer into a user process's address space, not yet known to be valid.
pub struct UserPtr<T> {
    addr: usize,
    _marker: PhantomData<fn() -> T>,
}

impl<T> Clone for UserPtr<T> {
    fn clone(&self) -> Self {
        *self
    }
}
impl<T> Copy for UserPtr<T> {}

impl<T> UserPtr<T> {
    pub fn new(addr: usize) -> Self {
        Self {
            addr,
            _marker: PhantomData,
        }
    }

    pub fn addr(&self) -> usize {
        self.addr
    }

    pub fn is_null(&self) -> bool {
        self.addr == 0
    }

    /// Checks that `[addr, addr+len)` lies below `PHYS_BASE`, does not wrap,
    /// and is entirely mapped in `pd`.
    fn validate_range(addr: usize, len: usize, platform: &Platform, pd: PageDirId) -> SysResult<()> {
        if addr == 0 {
            return Err(KernelError::InvalidUserPointer);
        }
        let end = addr.checked_add(len).ok_or(KernelError::InvalidUserPointer)?;
        if end > PHYS_BASE {
            return Err(KernelError::InvalidUserPointer);
        }
        let first_page = addr & !(PAGE_SIZE - 1);
        let last_page = (end.saturating_sub(1)) & !(PAGE_SIZE - 1);
        let mut page = first_page;
        loop {
            if !platform.page_directory.is_mapped(pd, page) {
                return Err(KernelError::InvalidUserPointer);
            }
            if page == last_page {
                break;
            }
            page += PAGE_SIZE;
        }
        Ok(())
    }

    /// Validates the pointer covers `size_of::<T>()` readable/writable
    /// bytes, without reading them.
    pub fn validate(&self, platform: &Platform, pd: PageDirId) -> SysResult<()> {
        Self::validate_range(self.addr, size_of::<T>(), platform, pd)
    }
}

impl<T: Copy> UserPtr<T> {
    /// Validates and reads one `T` out of user memory.
    pub fn read(&self, platform: &Platform, pd: PageDirId) -> SysResult<T> {
        Self::validate_range(self.addr, size_of::<T>(), platform, pd)?;
        let mut buf = alloc::vec![0u8; size_of::<T>()];
        if !platform.page_directory.read_bytes(pd, self.addr, &mut buf) {
            return Err(KernelError::InvalidUserPointer);
        }
        // SAFETY: `buf` holds exactly `size_of::<T>()` bytes copied out of
        // the address space; `T: Copy` rules out any drop/validity
        // obligation beyond that.
        Ok(unsafe { (buf.as_ptr() as *const T).read_unaligned() })
    }

    /// Validates and writes one `T` into user memory.
    pub fn write(&self, platform: &Platform, pd: PageDirId, value: T) -> SysResult<()> {
        Self::validate_range(self.addr, size_of::<T>(), platform, pd)?;
        let bytes = unsafe {
            core::slice::from_raw_parts((&value as *const T) as *const u8, size_of::<T>())
        };
        if !platform.page_directory.write_bytes(pd, self.addr, bytes) {
            return Err(KernelError::InvalidUserPointer);
        }
        Ok(())
    }
}

impl UserPtr<u8> {
    /// Reads a NUL-terminated byte string, one mapped page at a time, into
    /// `buf`. Returns the string's length (excluding the terminator) on
    /// success. Fails if the terminator is never found within `buf`'s
    /// capacity, or any touched byte is unmapped.
    pub fn read_c_string_into(&self, platform: &Platform, pd: PageDirId, buf: &mut [u8]) -> SysResult<usize> {
        for (i, slot) in buf.iter_mut().enumerate() {
            let byte_addr = self.addr.checked_add(i).ok_or(KernelError::InvalidUserPointer)?;
            Self::validate_range(byte_addr, 1, platform, pd)?;
            let mut one = [0u8; 1];
            if !platform.page_directory.read_bytes(pd, byte_addr, &mut one) {
                return Err(KernelError::InvalidUserPointer);
            }
            if one[0] == 0 {
                return Ok(i);
            }
            *slot = one[0];
        }
        Err(KernelError::InvalidUserPointer)
    }

    /// Validates and reads `buf.len()` bytes out of user memory.
    pub fn read_buf_into(&self, platform: &Platform, pd: PageDirId, buf: &mut [u8]) -> SysResult<()> {
        Self::validate_range(self.addr, buf.len(), platform, pd)?;
        if !platform.page_directory.read_bytes(pd, self.addr, buf) {
            return Err(KernelError::InvalidUserPointer);
        }
        Ok(())
    }

    /// Validates and writes `data` into user memory.
    pub fn write_buf(&self, platform: &Platform, pd: PageDirId, data: &[u8]) -> SysResult<()> {
        Self::validate_range(self.addr, data.len(), platform, pd)?;
        if !platform.page_directory.write_bytes(pd, self.addr, data) {
            return Err(KernelError::InvalidUserPointer);
        }
        Ok(())
    }
}

/// Validates a raw user address without any associated length, matching the
/// dispatcher's "one word at a time" pointer check (`p != NULL`,
/// `p + 4 <= PHYS_BASE`, page containing `p` is mapped).
pub fn validate_word(addr: usize, platform: &Platform, pd: PageDirId) -> SysResult<()> {
    UserPtr::<u32>::validate_range(addr, 4, platform, pd)
}
