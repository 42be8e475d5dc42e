use std::sync::{Arc, Mutex, PoisonError};

use log::{debug, warn};

use crate::alloc::Allocator;
use crate::dir::DirEntry;
use crate::{FsError, Resource, Result};

/// A file descriptor: the index of a slot in the open file table.
pub type Fd = usize;

/// How a descriptor may touch its file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessMode {
    ReadOnly,
    ReadWrite,
}

impl TryFrom<i32> for AccessMode {
    type Error = FsError;

    fn try_from(flag: i32) -> Result<Self> {
        match flag {
            0 => Ok(AccessMode::ReadOnly),
            1 => Ok(AccessMode::ReadWrite),
            _ => Err(FsError::InvalidArgument(format!("unknown access mode {}", flag))),
        }
    }
}

/// The state bound to a claimed descriptor slot.
#[derive(Debug)]
pub struct OpenFile {
    entry: Arc<DirEntry>,
    mode: AccessMode,
    /// Byte offset of the next read or write.
    position: usize,
}

impl OpenFile {
    pub fn entry(&self) -> &DirEntry {
        &self.entry
    }

    pub fn mode(&self) -> AccessMode {
        self.mode
    }

    pub fn position(&self) -> usize {
        self.position
    }

    pub fn set_position(&mut self, position: usize) {
        self.position = position;
    }
}

/// The fixed array of descriptor slots.
///
/// Claiming and releasing slots goes through the table-wide bitmap lock. Each
/// slot also has its own lock, held for the whole of any operation made through
/// that descriptor, which orders the operations of one descriptor but not those
/// of different descriptors on the same file.
#[derive(Debug)]
pub struct OpenFileTable {
    slots: Vec<Mutex<Option<OpenFile>>>,
    used: Allocator,
}

impl OpenFileTable {
    pub fn new(count: usize) -> Self {
        Self {
            slots: (0..count).map(|_| Mutex::new(None)).collect(),
            used: Allocator::new(count),
        }
    }

    /// Claims the lowest free slot for `entry` with the cursor at 0.
    pub fn allocate_descriptor(&self, mode: AccessMode, entry: Arc<DirEntry>) -> Result<Fd> {
        let fd = match self.used.allocate() {
            Some(fd) => fd,
            None => {
                warn!("open file table full ({} slots)", self.slots.len());
                return Err(FsError::NoSpace(Resource::Descriptor));
            }
        };
        debug!("fd {} -> {:?} ({:?})", fd, entry.name(), mode);
        *self.slots[fd].lock().unwrap_or_else(PoisonError::into_inner) = Some(OpenFile {
            entry,
            mode,
            position: 0,
        });
        Ok(fd)
    }

    /// Unbinds the slot behind `fd` and hands it back to the table.
    pub fn free_descriptor(&self, fd: Fd) -> Result<()> {
        let slot = self.slots.get(fd).ok_or(FsError::BadDescriptor(fd))?;
        // Unbind before releasing the bit so a new claim never sees the old file.
        let file = slot.lock().unwrap_or_else(PoisonError::into_inner).take();
        if file.is_none() {
            return Err(FsError::BadDescriptor(fd));
        }
        self.used.free(fd);
        debug!("fd {} closed", fd);
        Ok(())
    }

    /// Runs `f` on the open file behind `fd` while holding the slot's lock.
    pub fn with_descriptor<F, R>(&self, fd: Fd, f: F) -> Result<R>
    where
        F: FnOnce(&mut OpenFile) -> Result<R>,
    {
        let slot = self.slots.get(fd).ok_or(FsError::BadDescriptor(fd))?;
        let mut guard = slot.lock().unwrap_or_else(PoisonError::into_inner);
        match guard.as_mut() {
            Some(file) => f(file),
            None => Err(FsError::BadDescriptor(fd)),
        }
    }

    pub fn used(&self) -> usize {
        self.used.used()
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }
}
