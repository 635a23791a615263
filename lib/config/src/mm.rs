//! Virtual memory layout constants

/// inner page offset width
pub const PAGE_WIDTH: usize = 12;
/// page size: 4KB, 4096 bytes
pub const PAGE_SIZE: usize = 1 << PAGE_WIDTH;
/// mask selecting the in-page offset bits of an address
pub const PAGE_MASK: usize = PAGE_SIZE - 1;

/// top of user virtual address space; the initial stack page is mapped
/// immediately below this address
pub const PHYS_BASE: usize = 0xC000_0000;

/// kernel heap size used by the bootstrap allocator in `#[cfg(test)]` builds
pub const KERNEL_HEAP_SIZE: usize = 0x100_0000;

/// maximum number of `PT_LOAD` program headers an ELF image may declare
pub const MAX_PROGRAM_HEADERS: usize = 1024;
