use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::node::InodeNumber;
use crate::{FsError, Result};

/// Binds a file name to its inode. Open descriptors share the entry they were
/// opened through, so they can tell when the name has been deleted under them.
#[derive(Debug)]
pub struct DirEntry {
    name: String,
    inum: InodeNumber,
    removed: AtomicBool,
}

impl DirEntry {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn inode_number(&self) -> InodeNumber {
        self.inum
    }

    /// Whether the entry has been deleted from its directory.
    pub fn is_removed(&self) -> bool {
        self.removed.load(Ordering::Acquire)
    }
}

/// The single flat namespace. Entries keep their insertion order.
///
/// One lock covers lookup, insert and remove, which makes create and delete
/// atomic with respect to each other.
#[derive(Debug, Default)]
pub struct Directory {
    entries: Mutex<Vec<Arc<DirEntry>>>,
}

impl Directory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lookup(&self, name: &str) -> Result<Arc<DirEntry>> {
        self.lock()
            .iter()
            .find(|entry| entry.name == name)
            .cloned()
            .ok_or_else(|| FsError::NotFound(name.to_string()))
    }

    /// Adds `name` bound to the inode returned by `allocate`. The name is checked
    /// and `allocate` runs under the directory lock, so a name is never claimed
    /// twice and a failed allocation leaves no entry behind.
    pub fn insert<F>(&self, name: &str, allocate: F) -> Result<Arc<DirEntry>>
    where
        F: FnOnce() -> Result<InodeNumber>,
    {
        if name.is_empty() {
            return Err(FsError::InvalidArgument("file name must not be empty".to_string()));
        }

        let mut entries = self.lock();
        if entries.iter().any(|entry| entry.name == name) {
            return Err(FsError::AlreadyExists(name.to_string()));
        }
        let entry = Arc::new(DirEntry {
            name: name.to_string(),
            inum: allocate()?,
            removed: AtomicBool::new(false),
        });
        entries.push(Arc::clone(&entry));
        Ok(entry)
    }

    /// Unlinks `name` and flags the entry as removed for anyone still holding it.
    pub fn remove(&self, name: &str) -> Result<Arc<DirEntry>> {
        let mut entries = self.lock();
        let pos = entries
            .iter()
            .position(|entry| entry.name == name)
            .ok_or_else(|| FsError::NotFound(name.to_string()))?;
        let entry = entries.remove(pos);
        entry.removed.store(true, Ordering::Release);
        Ok(entry)
    }

    /// A snapshot of the entries in insertion order.
    pub fn entries(&self) -> Vec<Arc<DirEntry>> {
        self.lock().clone()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<Arc<DirEntry>>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
