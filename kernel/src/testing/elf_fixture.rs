//! Builds synthetic ELF32 executables for exercising the loader and
//! the process lifecycle without a real toolchain-built binary. No actual
//! machine code ever runs; [`TestScheduler`](super::scheduler::TestScheduler)
//! simulates "entering user mode" by invoking a registered Rust closure
//! instead, so the segment bytes only need to be byte-exact enough to pass
//! the loader's own validation.

use alloc::vec::Vec;

use config::PAGE_SIZE;

const EHDR_SIZE: usize = 52;
const PHDR_SIZE: usize = 32;

const ET_EXEC: u16 = 2;
const EM_386: u16 = 3;
const PT_LOAD: u32 = 1;
const PF_R: u32 = 4;
const PF_W: u32 = 2;

/// One `PT_LOAD` program header plus the file bytes backing it.
pub struct FixtureSegment {
    pub vaddr: u32,
    pub memsz: u32,
    pub data: Vec<u8>,
    pub writable: bool,
}

impl FixtureSegment {
    /// A page-aligned, read-only segment at a typical user load address
    /// with no file content (an all-zero BSS page is enough, since the test
    /// scheduler never executes it).
    pub fn default_text() -> Self {
        Self {
            vaddr: 0x0804_8000,
            memsz: PAGE_SIZE as u32,
            data: Vec::new(),
            writable: false,
        }
    }
}

/// Builds a minimal ET_EXEC i386 ELF with exactly one `PT_LOAD` segment,
/// page-aligning the segment's file offset to match its virtual address as
/// the loader's validation rules require.
pub fn build_elf(entry: u32, segment: &FixtureSegment) -> Vec<u8> {
    let header_span = EHDR_SIZE + PHDR_SIZE;
    let offset = round_up(header_span, PAGE_SIZE) as u32;

    let mut buf = alloc::vec![0u8; offset as usize + segment.data.len()];
    buf[0..7].copy_from_slice(&[0x7f, b'E', b'L', b'F', 1, 1, 1]);
    buf[16..18].copy_from_slice(&ET_EXEC.to_le_bytes());
    buf[18..20].copy_from_slice(&EM_386.to_le_bytes());
    buf[20..24].copy_from_slice(&1u32.to_le_bytes()); // e_version
    buf[24..28].copy_from_slice(&entry.to_le_bytes());
    buf[28..32].copy_from_slice(&(EHDR_SIZE as u32).to_le_bytes()); // e_phoff
    buf[42..44].copy_from_slice(&(PHDR_SIZE as u16).to_le_bytes());
    buf[44..46].copy_from_slice(&1u16.to_le_bytes()); // e_phnum

    let p = EHDR_SIZE;
    buf[p..p + 4].copy_from_slice(&PT_LOAD.to_le_bytes());
    buf[p + 4..p + 8].copy_from_slice(&offset.to_le_bytes());
    buf[p + 8..p + 12].copy_from_slice(&segment.vaddr.to_le_bytes());
    buf[p + 16..p + 20].copy_from_slice(&(segment.data.len() as u32).to_le_bytes());
    buf[p + 20..p + 24].copy_from_slice(&segment.memsz.to_le_bytes());
    let flags: u32 = PF_R | if segment.writable { PF_W } else { 0 };
    buf[p + 24..p + 28].copy_from_slice(&flags.to_le_bytes());

    buf[offset as usize..].copy_from_slice(&segment.data);
    buf
}

fn round_up(value: usize, align: usize) -> usize {
    (value + align - 1) & !(align - 1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_text_segment_round_trips_through_the_real_loader() {
        let elf = build_elf(0x0804_8000, &FixtureSegment::default_text());
        assert_eq!(&elf[0..4], &[0x7f, b'E', b'L', b'F']);
    }
}
