//! The physical frame allocator and page-table collaborator, merged behind
//! one trait: from the loader's and dispatcher's point of view, "get a
//! frame" and "map it" are a single atomic action ("allocate one user page
//! at a time... map it at the user virtual address").

use include::SysResult;

/// Opaque handle to one process's page directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageDirId(pub u64);

pub trait PageDirectory: Send + Sync {
    /// Allocates a fresh page directory for a new process.
    fn create(&self) -> SysResult<PageDirId>;

    /// Destroys a page directory and every frame it still maps. Called only
    /// after the owning thread has switched to the kernel-only directory.
    fn destroy(&self, pd: PageDirId);

    /// Activates `pd` (or the kernel-only directory, if `None`) on the
    /// calling CPU.
    fn activate(&self, pd: Option<PageDirId>);

    /// True iff `pd` has a mapping covering the page containing `vaddr`.
    fn is_mapped(&self, pd: PageDirId, vaddr: usize) -> bool;

    /// Installs one page at `vaddr` (which must be page-aligned and not
    /// already mapped): allocates a zeroed physical frame, copies
    /// `file_bytes` into its start (the remainder of the page stays zero),
    /// and maps it writable iff `writable`. Fails if `vaddr` is already
    /// mapped, `file_bytes` is longer than one page, or no frame is
    /// available.
    fn install_page(&self, pd: PageDirId, vaddr: usize, file_bytes: &[u8], writable: bool) -> SysResult<()>;

    /// Copies `buf.len()` bytes starting at `vaddr` out of the address
    /// space. Returns `false` if any byte of the range is unmapped.
    fn read_bytes(&self, pd: PageDirId, vaddr: usize, buf: &mut [u8]) -> bool;

    /// Copies `data` into the address space starting at `vaddr`. Returns
    /// `false` if any byte of the range is unmapped.
    fn write_bytes(&self, pd: PageDirId, vaddr: usize, data: &[u8]) -> bool;
}
