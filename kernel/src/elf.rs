//! The executable format reader: validates an ELF32 header, iterates
//! program headers, and installs `PT_LOAD` segments into a freshly created
//! page directory.
//!
//! The acceptance criteria here are byte-exact (magic, machine, entry-size,
//! header count) rather than delegated to a generic ELF crate's notion of
//! "valid", since a single mismatched field must fail the load the same way
//! the original `load()` does: treated here as a segment-list iterator
//! over the raw header bytes, exactly the framing this subsystem gives it.

use alloc::vec;

use config::{MAX_PROGRAM_HEADERS, PAGE_SIZE, PHYS_BASE};
use include::{KernelError, SysResult};

use crate::hal::{FileHandle, PageDirId, Platform};

const EHDR_SIZE: usize = 52;
const PHDR_SIZE: usize = 32;

const ET_EXEC: u16 = 2;
const EM_386: u16 = 3;

const PT_NULL: u32 = 0;
const PT_LOAD: u32 = 1;
const PT_DYNAMIC: u32 = 2;
const PT_INTERP: u32 = 3;
const PT_NOTE: u32 = 4;
const PT_SHLIB: u32 = 5;
const PT_PHDR: u32 = 6;
const PT_STACK: u32 = 0x6474_e551;

const PF_W: u32 = 2;

struct Ehdr {
    e_type: u16,
    e_machine: u16,
    e_version: u32,
    e_entry: u32,
    e_phoff: u32,
    e_phentsize: u16,
    e_phnum: u16,
}

impl Ehdr {
    fn parse(buf: &[u8]) -> Option<Self> {
        if buf.len() < EHDR_SIZE {
            return None;
        }
        if buf[0..7] != [0x7f, b'E', b'L', b'F', 1, 1, 1] {
            return None;
        }
        Some(Self {
            e_type: u16::from_le_bytes(buf[16..18].try_into().unwrap()),
            e_machine: u16::from_le_bytes(buf[18..20].try_into().unwrap()),
            e_version: u32::from_le_bytes(buf[20..24].try_into().unwrap()),
            e_entry: u32::from_le_bytes(buf[24..28].try_into().unwrap()),
            e_phoff: u32::from_le_bytes(buf[28..32].try_into().unwrap()),
            e_phentsize: u16::from_le_bytes(buf[42..44].try_into().unwrap()),
            e_phnum: u16::from_le_bytes(buf[44..46].try_into().unwrap()),
        })
    }

    fn is_acceptable(&self) -> bool {
        self.e_type == ET_EXEC
            && self.e_machine == EM_386
            && self.e_version == 1
            && self.e_phentsize as usize == PHDR_SIZE
            && self.e_phnum as usize <= MAX_PROGRAM_HEADERS
    }
}

struct Phdr {
    p_type: u32,
    p_offset: u32,
    p_vaddr: u32,
    p_filesz: u32,
    p_memsz: u32,
    p_flags: u32,
}

impl Phdr {
    fn parse(buf: &[u8]) -> Option<Self> {
        if buf.len() < PHDR_SIZE {
            return None;
        }
        Some(Self {
            p_type: u32::from_le_bytes(buf[0..4].try_into().unwrap()),
            p_offset: u32::from_le_bytes(buf[4..8].try_into().unwrap()),
            p_vaddr: u32::from_le_bytes(buf[8..12].try_into().unwrap()),
            p_filesz: u32::from_le_bytes(buf[16..20].try_into().unwrap()),
            p_memsz: u32::from_le_bytes(buf[20..24].try_into().unwrap()),
            p_flags: u32::from_le_bytes(buf[24..28].try_into().unwrap()),
        })
    }
}

/// What loading an executable hands back to the bootstrap.
pub struct LoadedExecutable {
    pub entry_point: usize,
    pub initial_sp: usize,
    pub exe_file: FileHandle,
}

/// Opens `program_name`, validates its ELF header and every program header,
/// installs all `PT_LOAD` segments plus the initial stack page into `pd`,
/// and returns the entry point and stack pointer the bootstrap should hand
/// to the simulated interrupt return.
pub fn load(platform: &Platform, pd: PageDirId, program_name: &str) -> SysResult<LoadedExecutable> {
    let file = platform
        .file_system
        .open(program_name)
        .ok_or(KernelError::LoadFailure)?;
    platform.file_system.deny_write(file);

    let result = load_inner(platform, pd, file);
    if result.is_err() {
        platform.file_system.allow_write(file);
        platform.file_system.close(file);
    }
    result
}

fn load_inner(platform: &Platform, pd: PageDirId, file: FileHandle) -> SysResult<LoadedExecutable> {
    let fs = &platform.file_system;
    let file_len = fs.length(file) as usize;

    let mut header_buf = [0u8; EHDR_SIZE];
    fs.seek(file, 0);
    if fs.read(file, &mut header_buf) != EHDR_SIZE {
        return Err(KernelError::LoadFailure);
    }
    let ehdr = Ehdr::parse(&header_buf).ok_or(KernelError::LoadFailure)?;
    if !ehdr.is_acceptable() {
        return Err(KernelError::LoadFailure);
    }

    let mut offset = ehdr.e_phoff as usize;
    for _ in 0..ehdr.e_phnum {
        if offset > file_len {
            return Err(KernelError::LoadFailure);
        }
        let mut phdr_buf = [0u8; PHDR_SIZE];
        fs.seek(file, offset as u32);
        if fs.read(file, &mut phdr_buf) != PHDR_SIZE {
            return Err(KernelError::LoadFailure);
        }
        offset += PHDR_SIZE;

        let phdr = Phdr::parse(&phdr_buf).ok_or(KernelError::LoadFailure)?;
        match phdr.p_type {
            PT_NULL | PT_NOTE | PT_PHDR | PT_STACK => continue,
            PT_DYNAMIC | PT_INTERP | PT_SHLIB => return Err(KernelError::LoadFailure),
            PT_LOAD => install_segment(platform, pd, file, file_len, &phdr)?,
            _ => continue,
        }
    }

    let initial_sp = install_stack(platform, pd)?;

    Ok(LoadedExecutable {
        entry_point: ehdr.e_entry as usize,
        initial_sp,
        exe_file: file,
    })
}

fn validate_segment(phdr: &Phdr, file_len: usize) -> bool {
    let page_mask = (PAGE_SIZE - 1) as u32;
    if (phdr.p_offset & page_mask) != (phdr.p_vaddr & page_mask) {
        return false;
    }
    if phdr.p_offset as usize > file_len {
        return false;
    }
    if phdr.p_memsz < phdr.p_filesz || phdr.p_memsz == 0 {
        return false;
    }
    let vaddr = phdr.p_vaddr as usize;
    let memsz = phdr.p_memsz as usize;
    let end = match vaddr.checked_add(memsz) {
        Some(end) => end,
        None => return false,
    };
    if vaddr >= PHYS_BASE || end > PHYS_BASE {
        return false;
    }
    if vaddr < PAGE_SIZE {
        return false;
    }
    true
}

fn install_segment(
    platform: &Platform,
    pd: PageDirId,
    file: FileHandle,
    file_len: usize,
    phdr: &Phdr,
) -> SysResult<()> {
    if !validate_segment(phdr, file_len) {
        return Err(KernelError::LoadFailure);
    }

    let writable = phdr.p_flags & PF_W != 0;
    let page_offset = phdr.p_vaddr as usize & (PAGE_SIZE - 1);
    let mem_page = (phdr.p_vaddr as usize) & !(PAGE_SIZE - 1);
    let total_span = round_up(page_offset + phdr.p_memsz as usize, PAGE_SIZE);

    let mut read_remaining = page_offset + phdr.p_filesz as usize;
    let fs = &platform.file_system;
    fs.seek(file, phdr.p_offset - page_offset as u32);

    let mut vaddr = mem_page;
    let mut consumed = 0usize;
    while consumed < total_span {
        let this_read = read_remaining.min(PAGE_SIZE);
        let mut page_buf = vec![0u8; this_read];
        if this_read > 0 && fs.read(file, &mut page_buf) != this_read {
            return Err(KernelError::LoadFailure);
        }
        platform
            .page_directory
            .install_page(pd, vaddr, &page_buf, writable)?;

        read_remaining = read_remaining.saturating_sub(this_read);
        consumed += PAGE_SIZE;
        vaddr += PAGE_SIZE;
    }
    Ok(())
}

fn install_stack(platform: &Platform, pd: PageDirId) -> SysResult<usize> {
    let stack_page = PHYS_BASE - PAGE_SIZE;
    platform.page_directory.install_page(pd, stack_page, &[], true)?;
    Ok(PHYS_BASE)
}

fn round_up(value: usize, align: usize) -> usize {
    (value + align - 1) & !(align - 1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::sync::Arc;
    use alloc::vec::Vec;

    use crate::hal::PageDirectory;
    use crate::testing::{build_elf, FixtureSegment, TestFileSystem, TestPageDirectory, TestScheduler};

    fn platform_with(fs: TestFileSystem) -> Platform {
        Platform::new(TestScheduler::new(), Arc::new(TestPageDirectory::new()), Arc::new(fs))
    }

    #[test]
    fn a_segment_at_page_zero_is_rejected() {
        let elf = build_elf(
            0,
            &FixtureSegment {
                vaddr: 0,
                memsz: PAGE_SIZE as u32,
                data: Vec::new(),
                writable: false,
            },
        );
        let fs = TestFileSystem::new();
        fs.install_file("nullpage", elf);
        let platform = platform_with(fs);
        let pd = platform.page_directory.create().unwrap();

        assert!(load(&platform, pd, "nullpage").is_err());
    }

    #[test]
    fn a_valid_pt_load_segment_installs_and_yields_the_stack_pointer() {
        let segment = FixtureSegment::default_text();
        let elf = build_elf(segment.vaddr, &segment);
        let fs = TestFileSystem::new();
        fs.install_file("prog", elf);
        let platform = platform_with(fs);
        let pd = platform.page_directory.create().unwrap();

        let loaded = load(&platform, pd, "prog").expect("a well-formed single-segment ELF loads");
        assert_eq!(loaded.entry_point, segment.vaddr as usize);
        assert_eq!(loaded.initial_sp, PHYS_BASE);
        assert!(platform.page_directory.is_mapped(pd, segment.vaddr as usize));
        assert!(platform.page_directory.is_mapped(pd, PHYS_BASE - PAGE_SIZE));
    }

    #[test]
    fn a_missing_file_fails_to_load() {
        let platform = platform_with(TestFileSystem::new());
        let pd = platform.page_directory.create().unwrap();
        assert!(load(&platform, pd, "does-not-exist").is_err());
    }
}
