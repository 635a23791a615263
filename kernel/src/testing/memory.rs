//! An in-memory stand-in for the physical frame allocator and page tables:
//! each page directory is a map from page-aligned virtual address to a
//! page-sized byte buffer. Good enough to exercise every real call site
//! (install, read, write, the mapped/unmapped check `UserPtr` relies on)
//! without a real MMU.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use config::PAGE_SIZE;
use include::{KernelError, SysResult};

use crate::hal::{PageDirId, PageDirectory};

type Page = Vec<u8>;

struct Inner {
    directories: BTreeMap<PageDirId, BTreeMap<usize, Page>>,
}

pub struct TestPageDirectory {
    inner: Mutex<Inner>,
    next_id: AtomicU64,
}

impl TestPageDirectory {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner {
                directories: BTreeMap::new(),
            }),
            next_id: AtomicU64::new(1),
        }
    }

    fn page_of(vaddr: usize) -> usize {
        vaddr & !(PAGE_SIZE - 1)
    }
}

impl Default for TestPageDirectory {
    fn default() -> Self {
        Self::new()
    }
}

impl PageDirectory for TestPageDirectory {
    fn create(&self) -> SysResult<PageDirId> {
        let id = PageDirId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.inner.lock().unwrap().directories.insert(id, BTreeMap::new());
        Ok(id)
    }

    fn destroy(&self, pd: PageDirId) {
        self.inner.lock().unwrap().directories.remove(&pd);
    }

    fn activate(&self, _pd: Option<PageDirId>) {
        // No per-CPU state to simulate: every `PageDirectory` call already
        // takes the directory it means to touch explicitly.
    }

    fn is_mapped(&self, pd: PageDirId, vaddr: usize) -> bool {
        let guard = self.inner.lock().unwrap();
        guard
            .directories
            .get(&pd)
            .map(|table| table.contains_key(&Self::page_of(vaddr)))
            .unwrap_or(false)
    }

    fn install_page(&self, pd: PageDirId, vaddr: usize, file_bytes: &[u8], _writable: bool) -> SysResult<()> {
        if vaddr % PAGE_SIZE != 0 || file_bytes.len() > PAGE_SIZE {
            return Err(KernelError::LoadFailure);
        }
        let mut guard = self.inner.lock().unwrap();
        let table = guard.directories.get_mut(&pd).ok_or(KernelError::LoadFailure)?;
        if table.contains_key(&vaddr) {
            return Err(KernelError::LoadFailure);
        }
        let mut page = vec![0u8; PAGE_SIZE];
        page[..file_bytes.len()].copy_from_slice(file_bytes);
        table.insert(vaddr, page);
        Ok(())
    }

    fn read_bytes(&self, pd: PageDirId, vaddr: usize, buf: &mut [u8]) -> bool {
        let guard = self.inner.lock().unwrap();
        let Some(table) = guard.directories.get(&pd) else {
            return false;
        };
        for (i, slot) in buf.iter_mut().enumerate() {
            let addr = vaddr + i;
            let Some(page) = table.get(&Self::page_of(addr)) else {
                return false;
            };
            *slot = page[addr % PAGE_SIZE];
        }
        true
    }

    fn write_bytes(&self, pd: PageDirId, vaddr: usize, data: &[u8]) -> bool {
        let mut guard = self.inner.lock().unwrap();
        let Some(table) = guard.directories.get_mut(&pd) else {
            return false;
        };
        for (i, byte) in data.iter().enumerate() {
            let addr = vaddr + i;
            let Some(page) = table.get_mut(&Self::page_of(addr)) else {
                return false;
            };
            page[addr % PAGE_SIZE] = *byte;
        }
        true
    }
}
