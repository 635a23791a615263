//! The initial user stack frame: argument strings, their pointers, `argc`,
//! `argv`, and a fake return address, laid out per the System V i386
//! calling convention (see the crate-level layout diagram in
//! `task::launcher`).
//!
//! Pointer arithmetic on a downward-growing buffer is naturally expressed as
//! a writer that prepends: every push moves the cursor down first, then
//! writes at the new cursor. The writer goes straight through the page
//! directory collaborator rather than a raw slice, since the stack page
//! lives in the child's (just-created) address space, not the kernel's.

use alloc::vec::Vec;

use config::PAGE_SIZE;
use include::{KernelError, SysResult};

use crate::hal::{PageDirId, Platform};

#[cfg(test)]
use config::PHYS_BASE;

/// Writes downward from an initial stack pointer, tracking the cursor.
pub struct StackWriter<'a> {
    platform: &'a Platform,
    pd: PageDirId,
    sp: usize,
    floor: usize,
}

impl<'a> StackWriter<'a> {
    /// `top` is the initial (highest) stack pointer, typically `PHYS_BASE`;
    /// the writer refuses to push past one page below it, matching the
    /// single stack page the loader installs.
    pub fn new(platform: &'a Platform, pd: PageDirId, top: usize) -> Self {
        Self {
            platform,
            pd,
            sp: top,
            floor: top - PAGE_SIZE,
        }
    }

    pub fn sp(&self) -> usize {
        self.sp
    }

    fn push_bytes(&mut self, bytes: &[u8]) -> SysResult<usize> {
        if self.sp < bytes.len() || self.sp - bytes.len() < self.floor {
            return Err(KernelError::LoadFailure);
        }
        self.sp -= bytes.len();
        if !self.platform.page_directory.write_bytes(self.pd, self.sp, bytes) {
            return Err(KernelError::LoadFailure);
        }
        Ok(self.sp)
    }

    fn push_u32(&mut self, word: u32) -> SysResult<usize> {
        self.push_bytes(&word.to_le_bytes())
    }

    fn align_down(&mut self, align: usize) -> SysResult<()> {
        let padding = self.sp % align;
        if padding != 0 {
            self.push_bytes(&alloc::vec![0u8; padding])?;
        }
        Ok(())
    }
}

/// Builds the initial user stack frame for `args[0]..args[n-1]`
/// (`args[0]` is the program name) and returns the final `esp`.
pub fn build_argument_stack(platform: &Platform, pd: PageDirId, top: usize, args: &[&str]) -> SysResult<usize> {
    let mut writer = StackWriter::new(platform, pd, top);

    // 1. push each argument string, highest index first, remembering where
    // it landed.
    let mut argv = Vec::with_capacity(args.len());
    for arg in args.iter().rev() {
        let mut bytes = Vec::with_capacity(arg.len() + 1);
        bytes.extend_from_slice(arg.as_bytes());
        bytes.push(0);
        let addr = writer.push_bytes(&bytes)?;
        argv.push(addr as u32);
    }
    argv.reverse(); // argv[0] first again

    // 2. word-align.
    writer.align_down(4)?;

    // 3. null sentinel.
    writer.push_u32(0)?;

    // 4. argv[n-1]..argv[0].
    for &addr in argv.iter().rev() {
        writer.push_u32(addr)?;
    }

    // 5. address of argv[0].
    let argv0_addr = writer.sp() as u32;
    writer.push_u32(argv0_addr)?;

    // 6. argc.
    writer.push_u32(args.len() as u32)?;

    // 7. fake return address.
    writer.push_u32(0)?;

    Ok(writer.sp())
}

#[cfg(test)]
mod tests {
    use alloc::sync::Arc;

    use super::*;
    use crate::testing::{TestFileSystem, TestPageDirectory, TestScheduler};

    /// `"prog a b c"` observed at entry: `argc == 4`, `argv[0..3]` point at
    /// the right strings in order, `argv[4] == NULL`, and `esp` stays
    /// 4-byte aligned once the fake return address is popped.
    #[test]
    fn prog_a_b_c_lays_out_argv_per_the_system_v_i386_convention() {
        let platform = Platform::new(
            TestScheduler::new(),
            Arc::new(TestPageDirectory::new()),
            Arc::new(TestFileSystem::new()),
        );
        let pd = platform.page_directory.create().unwrap();
        platform.page_directory.install_page(pd, PHYS_BASE - PAGE_SIZE, &[], true).unwrap();

        let esp = build_argument_stack(&platform, pd, PHYS_BASE, &["prog", "a", "b", "c"]).unwrap();
        assert_eq!(esp % 4, 0);

        let read_u32 = |addr: usize| -> u32 {
            let mut buf = [0u8; 4];
            assert!(platform.page_directory.read_bytes(pd, addr, &mut buf));
            u32::from_le_bytes(buf)
        };
        let read_cstr = |addr: u32| -> alloc::string::String {
            let mut out = alloc::vec::Vec::new();
            let mut addr = addr as usize;
            loop {
                let mut byte = [0u8; 1];
                assert!(platform.page_directory.read_bytes(pd, addr, &mut byte));
                if byte[0] == 0 {
                    break;
                }
                out.push(byte[0]);
                addr += 1;
            }
            alloc::string::String::from_utf8(out).unwrap()
        };

        assert_eq!(read_u32(esp), 0, "fake return address");
        assert_eq!(read_u32(esp + 4), 4, "argc");
        let argv = read_u32(esp + 8);
        assert_eq!(argv, (esp + 12) as u32, "argv points just past argc's slot");

        let argv0 = read_u32(argv as usize);
        let argv1 = read_u32(argv as usize + 4);
        let argv2 = read_u32(argv as usize + 8);
        let argv3 = read_u32(argv as usize + 12);
        let sentinel = read_u32(argv as usize + 16);

        assert_eq!(read_cstr(argv0), "prog");
        assert_eq!(read_cstr(argv1), "a");
        assert_eq!(read_cstr(argv2), "b");
        assert_eq!(read_cstr(argv3), "c");
        assert_eq!(sentinel, 0, "argv is NULL-terminated");
    }

    #[test]
    fn empty_argument_list_still_pushes_argc_zero_and_a_null_argv() {
        let platform = Platform::new(
            TestScheduler::new(),
            Arc::new(TestPageDirectory::new()),
            Arc::new(TestFileSystem::new()),
        );
        let pd = platform.page_directory.create().unwrap();
        platform.page_directory.install_page(pd, PHYS_BASE - PAGE_SIZE, &[], true).unwrap();

        let esp = build_argument_stack(&platform, pd, PHYS_BASE, &[]).unwrap();
        let mut argc = [0u8; 4];
        assert!(platform.page_directory.read_bytes(pd, esp + 4, &mut argc));
        assert_eq!(u32::from_le_bytes(argc), 0);
    }
}
