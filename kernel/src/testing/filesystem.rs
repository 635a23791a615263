//! An in-memory file system double: named byte-vector files, independent
//! open handles with their own seek position, and the deny-write flag the
//! loader sets on an active executable.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use crate::hal::FileHandle;
use crate::hal::FileSystem;

struct OpenFile {
    name: String,
    position: u32,
    denied: bool,
}

struct Inner {
    files: HashMap<String, Vec<u8>>,
    open: HashMap<u64, OpenFile>,
}

pub struct TestFileSystem {
    inner: Mutex<Inner>,
    next_handle: AtomicU64,
}

impl TestFileSystem {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner {
                files: HashMap::new(),
                open: HashMap::new(),
            }),
            next_handle: AtomicU64::new(1),
        }
    }

    /// Seeds a named file's content, as if created ahead of time. Used by
    /// tests to install the executable a fake `execute` call will load.
    pub fn install_file(&self, name: &str, content: Vec<u8>) {
        self.inner.lock().unwrap().files.insert(name.to_string(), content);
    }
}

impl Default for TestFileSystem {
    fn default() -> Self {
        Self::new()
    }
}

impl FileSystem for TestFileSystem {
    fn open(&self, name: &str) -> Option<FileHandle> {
        let mut guard = self.inner.lock().unwrap();
        if !guard.files.contains_key(name) {
            return None;
        }
        let handle = self.next_handle.fetch_add(1, Ordering::Relaxed);
        guard.open.insert(
            handle,
            OpenFile {
                name: name.to_string(),
                position: 0,
                denied: false,
            },
        );
        Some(FileHandle(handle))
    }

    fn close(&self, file: FileHandle) {
        self.inner.lock().unwrap().open.remove(&file.0);
    }

    fn read(&self, file: FileHandle, buf: &mut [u8]) -> usize {
        let mut guard = self.inner.lock().unwrap();
        let Inner { files, open } = &mut *guard;
        let Some(open_file) = open.get_mut(&file.0) else {
            return 0;
        };
        let Some(content) = files.get(&open_file.name) else {
            return 0;
        };
        let start = open_file.position as usize;
        let n = buf.len().min(content.len().saturating_sub(start));
        buf[..n].copy_from_slice(&content[start..start + n]);
        open_file.position += n as u32;
        n
    }

    fn write(&self, file: FileHandle, buf: &[u8]) -> usize {
        let mut guard = self.inner.lock().unwrap();
        let Inner { files, open } = &mut *guard;
        let Some(open_file) = open.get_mut(&file.0) else {
            return 0;
        };
        if open_file.denied {
            return 0;
        }
        let content = files.entry(open_file.name.clone()).or_default();
        let start = open_file.position as usize;
        if content.len() < start + buf.len() {
            content.resize(start + buf.len(), 0);
        }
        content[start..start + buf.len()].copy_from_slice(buf);
        open_file.position += buf.len() as u32;
        buf.len()
    }

    fn seek(&self, file: FileHandle, position: u32) {
        if let Some(open_file) = self.inner.lock().unwrap().open.get_mut(&file.0) {
            open_file.position = position;
        }
    }

    fn tell(&self, file: FileHandle) -> u32 {
        self.inner
            .lock()
            .unwrap()
            .open
            .get(&file.0)
            .map(|f| f.position)
            .unwrap_or(0)
    }

    fn length(&self, file: FileHandle) -> u32 {
        let guard = self.inner.lock().unwrap();
        let Some(open_file) = guard.open.get(&file.0) else {
            return 0;
        };
        guard.files.get(&open_file.name).map(|c| c.len() as u32).unwrap_or(0)
    }

    fn create(&self, name: &str, initial_size: u32) -> bool {
        let mut guard = self.inner.lock().unwrap();
        if guard.files.contains_key(name) {
            return false;
        }
        guard.files.insert(name.to_string(), vec![0u8; initial_size as usize]);
        true
    }

    fn remove(&self, name: &str) -> bool {
        self.inner.lock().unwrap().files.remove(name).is_some()
    }

    fn deny_write(&self, file: FileHandle) {
        if let Some(open_file) = self.inner.lock().unwrap().open.get_mut(&file.0) {
            open_file.denied = true;
        }
    }

    fn allow_write(&self, file: FileHandle) {
        if let Some(open_file) = self.inner.lock().unwrap().open.get_mut(&file.0) {
            open_file.denied = false;
        }
    }
}
