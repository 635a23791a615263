//! The per-process open-file table: a fixed-capacity slot array plus an
//! ordered free list of closed-but-reusable descriptor records.
//!
//! Touched only by the thread that owns it (see the concurrency model's
//! "per-thread, owner-only" resources), so unlike the wait-status registry
//! this needs no internal locking at all: it lives inline in the process
//! control block behind whatever lock protects the block as a whole.

use alloc::collections::VecDeque;
use alloc::vec::Vec;

use config::{FIRST_FILE_FD, MAX_FD};
use include::{KernelError, SysResult};

use crate::hal::FileHandle;

/// A per-process handle associating a numeric id with an open file. `file`
/// is `None` only transiently, for a descriptor sitting in the free list.
#[derive(Debug, Clone, Copy)]
pub struct Descriptor {
    pub id: usize,
    pub file: Option<FileHandle>,
}

pub struct DescriptorTable {
    slots: Vec<Option<Descriptor>>,
    free_list: VecDeque<Descriptor>,
    last_issued_id: usize,
}

impl DescriptorTable {
    pub fn new() -> Self {
        Self {
            slots: alloc::vec![None; MAX_FD],
            free_list: VecDeque::new(),
            last_issued_id: FIRST_FILE_FD - 1,
        }
    }

    fn slot_index(id: usize) -> Option<usize> {
        if id < FIRST_FILE_FD {
            return None;
        }
        let index = id - FIRST_FILE_FD;
        if index >= MAX_FD {
            return None;
        }
        Some(index)
    }

    /// Allocates from the free list if non-empty, else appends a new slot
    /// while under the per-process cap.
    pub fn open(&mut self, file: FileHandle) -> SysResult<usize> {
        if let Some(mut descriptor) = self.free_list.pop_front() {
            descriptor.file = Some(file);
            let id = descriptor.id;
            self.slots[Self::slot_index(id).expect("free-list ids are always in range")] = Some(descriptor);
            return Ok(id);
        }

        if self.last_issued_id >= FIRST_FILE_FD - 1 + MAX_FD {
            return Err(KernelError::DescriptorExhausted);
        }
        let id = self.last_issued_id + 1;
        self.last_issued_id = id;
        let index = Self::slot_index(id).expect("newly issued id is always in range");
        self.slots[index] = Some(Descriptor { id, file: Some(file) });
        Ok(id)
    }

    /// Looks up the file handle behind `id`, if any slot is active there.
    pub fn get(&self, id: usize) -> SysResult<FileHandle> {
        let index = Self::slot_index(id).ok_or(KernelError::BadDescriptor)?;
        self.slots[index]
            .and_then(|d| d.file)
            .ok_or(KernelError::BadDescriptor)
    }

    /// Clears the slot and returns its descriptor record to the free list.
    /// Returns the file handle so the caller can close it.
    pub fn close(&mut self, id: usize) -> SysResult<FileHandle> {
        let index = Self::slot_index(id).ok_or(KernelError::BadDescriptor)?;
        let mut descriptor = self.slots[index].take().ok_or(KernelError::BadDescriptor)?;
        let file = descriptor.file.ok_or(KernelError::BadDescriptor)?;
        descriptor.file = None;
        self.free_list.push_back(descriptor);
        Ok(file)
    }

    /// Every file handle still open, for teardown.
    pub fn drain_open_files(&mut self) -> Vec<FileHandle> {
        self.slots
            .iter_mut()
            .filter_map(|slot| slot.take())
            .filter_map(|descriptor| descriptor.file)
            .collect()
    }
}

impl Default for DescriptorTable {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fh(id: u64) -> FileHandle {
        FileHandle(id)
    }

    #[test]
    fn open_assigns_ids_starting_at_first_file_fd() {
        let mut table = DescriptorTable::new();
        assert_eq!(table.open(fh(1)).unwrap(), FIRST_FILE_FD);
        assert_eq!(table.open(fh(2)).unwrap(), FIRST_FILE_FD + 1);
    }

    #[test]
    fn close_then_open_reuses_before_growing() {
        let mut table = DescriptorTable::new();
        let a = table.open(fh(1)).unwrap();
        let b = table.open(fh(2)).unwrap();
        table.close(a).unwrap();
        let reused = table.open(fh(3)).unwrap();
        assert_eq!(reused, a);
        assert_ne!(reused, b);
    }

    #[test]
    fn exhausting_the_table_returns_descriptor_exhausted() {
        let mut table = DescriptorTable::new();
        for i in 0..MAX_FD {
            table.open(fh(i as u64)).unwrap();
        }
        assert_eq!(table.open(fh(999)), Err(KernelError::DescriptorExhausted));
    }

    #[test]
    fn double_close_is_bad_descriptor() {
        let mut table = DescriptorTable::new();
        let a = table.open(fh(1)).unwrap();
        table.close(a).unwrap();
        assert_eq!(table.close(a), Err(KernelError::BadDescriptor));
    }

    #[test]
    fn unopened_id_is_bad_descriptor() {
        let table = DescriptorTable::new();
        assert_eq!(table.get(FIRST_FILE_FD), Err(KernelError::BadDescriptor));
        assert_eq!(table.get(0), Err(KernelError::BadDescriptor));
    }
}
