use std::sync::MutexGuard;

use log::{debug, info};
use thiserror::Error;

use crate::dir::Directory;
use crate::file::{AccessMode, Fd, OpenFile, OpenFileTable};
use crate::geometry::{FsBuilder, Geometry};
use crate::io::{BlockPool, BlockStorage, MemoryBlocks};
use crate::node::{Inode, InodeTable};
use crate::stat::{FileStat, Status, Usage};
use crate::Result;

/// The fixed-size tables that can run dry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resource {
    Inode,
    Block,
    /// An inode's direct pointer list.
    Pointer,
    Descriptor,
}

/// The broad class of an [`FsError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NotFound,
    AlreadyExists,
    ResourceExhausted,
    InvalidArgument,
    AccessViolation,
}

#[derive(Error, Debug)]
pub enum FsError {
    #[error("found no file named {0:?}")]
    NotFound(String),
    #[error("a file named {0:?} already exists")]
    AlreadyExists(String),
    #[error("no free {0:?} left")]
    NoSpace(Resource),
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    #[error("descriptor {0} is not open")]
    BadDescriptor(Fd),
    #[error("the file behind descriptor {0} was deleted")]
    StaleDescriptor(Fd),
    #[error("descriptor {0} is read-only")]
    AccessViolation(Fd),
}

impl FsError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            FsError::NotFound(_) | FsError::StaleDescriptor(_) => ErrorKind::NotFound,
            FsError::AlreadyExists(_) => ErrorKind::AlreadyExists,
            FsError::NoSpace(_) => ErrorKind::ResourceExhausted,
            FsError::InvalidArgument(_) | FsError::BadDescriptor(_) => ErrorKind::InvalidArgument,
            FsError::AccessViolation(_) => ErrorKind::AccessViolation,
        }
    }

    /// The classic integer status: `-2` when create finds no free inode, `-1`
    /// for every other failure.
    pub fn code(&self) -> i32 {
        match self {
            FsError::NoSpace(Resource::Inode) => -2,
            _ => -1,
        }
    }
}

/// The base a seek offset is applied to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Whence {
    /// The start of the file.
    Set,
    /// The descriptor's current position.
    Cur,
    /// The end of the file.
    End,
}

impl TryFrom<i32> for Whence {
    type Error = FsError;

    fn try_from(whence: i32) -> Result<Self> {
        match whence {
            0 => Ok(Whence::Set),
            1 => Ok(Whence::Cur),
            2 => Ok(Whence::End),
            _ => Err(FsError::InvalidArgument(format!("unknown whence {}", whence))),
        }
    }
}

/// An in-memory file system over a fixed pool of blocks, with one flat
/// directory and a fixed open file table.
///
/// Every operation takes `&self`; share the file system between threads by
/// reference. Locks are taken in the order descriptor slot, directory, inode,
/// block bitmap, block, and none is held across a call that takes an earlier one.
pub struct MemFs<T: BlockStorage = MemoryBlocks> {
    geometry: Geometry,
    blocks: BlockPool<T>,
    inodes: InodeTable,
    root: Directory,
    files: OpenFileTable,
}

impl MemFs<MemoryBlocks> {
    /// A file system with the default geometry, every table empty.
    pub fn new() -> Self {
        let geometry = Geometry::default();
        let dev = MemoryBlocks::new(geometry.block_size, geometry.block_count);
        Self::assemble(dev, geometry)
    }

    pub fn builder() -> FsBuilder {
        FsBuilder::new()
    }
}

impl Default for MemFs<MemoryBlocks> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: BlockStorage> MemFs<T> {
    pub(crate) fn assemble(dev: T, geometry: Geometry) -> Self {
        info!(
            "memfs: {} blocks of {} bytes, {} inodes, {} descriptors",
            geometry.block_count, geometry.block_size, geometry.inode_count, geometry.open_file_count
        );
        Self {
            geometry,
            blocks: BlockPool::new(dev),
            inodes: InodeTable::new(geometry.inode_count),
            root: Directory::new(),
            files: OpenFileTable::new(geometry.open_file_count),
        }
    }

    pub fn geometry(&self) -> &Geometry {
        &self.geometry
    }

    /// Creates an empty file called `name`.
    ///
    /// # Errors
    ///
    /// `AlreadyExists` if the name is taken, `NoSpace(Inode)` if every inode is
    /// in use. Neither leaves anything behind.
    pub fn create(&self, name: &str) -> Result<()> {
        let entry = self.root.insert(name, || self.inodes.allocate_inode())?;
        info!("created {:?} on inode {}", name, entry.inode_number());
        Ok(())
    }

    /// Opens `name` and returns a descriptor whose cursor starts at 0.
    pub fn open(&self, name: &str, mode: AccessMode) -> Result<Fd> {
        let entry = self.root.lookup(name)?;
        self.files.allocate_descriptor(mode, entry)
    }

    /// Reads up to `buf.len()` bytes from the descriptor's position and advances
    /// it past them. Returns 0 at or past the end of the file.
    pub fn read(&self, fd: Fd, buf: &mut [u8]) -> Result<usize> {
        self.files.with_descriptor(fd, |file| {
            let node = self.live_inode(fd, file)?;
            let n = node.read_at(file.position(), buf, &self.blocks)?;
            file.set_position(file.position() + n);
            debug!("fd {}: read {} bytes", fd, n);
            Ok(n)
        })
    }

    /// Writes `data` at the descriptor's position and advances it past the bytes
    /// stored. Writing past the end grows the file; a hole between the old end
    /// and the position reads back as zeros.
    ///
    /// When blocks or pointers run out part way the write is short: the count
    /// returned is below `data.len()` and the file keeps what was stored.
    ///
    /// # Errors
    ///
    /// `AccessViolation` on a read-only descriptor, `NoSpace` if not one byte
    /// could be stored.
    pub fn write(&self, fd: Fd, data: &[u8]) -> Result<usize> {
        self.files.with_descriptor(fd, |file| {
            if file.mode() != AccessMode::ReadWrite {
                return Err(FsError::AccessViolation(fd));
            }
            let mut node = self.live_inode(fd, file)?;
            let n = node.write_at(file.position(), data, &self.blocks)?;
            file.set_position(file.position() + n);
            debug!("fd {}: wrote {} bytes, length now {}", fd, n, node.len());
            Ok(n)
        })
    }

    /// Moves the descriptor's position and returns it. Positions past the end of
    /// the file are allowed.
    ///
    /// # Errors
    ///
    /// `InvalidArgument` if the new position would be negative; the position is
    /// left where it was.
    pub fn seek(&self, fd: Fd, offset: i64, whence: Whence) -> Result<usize> {
        self.files.with_descriptor(fd, |file| {
            let node = self.live_inode(fd, file)?;
            let base = match whence {
                Whence::Set => 0,
                Whence::Cur => file.position(),
                Whence::End => node.len(),
            };
            let position = i64::try_from(base)
                .ok()
                .and_then(|base| base.checked_add(offset))
                .filter(|position| *position >= 0)
                .and_then(|position| usize::try_from(position).ok())
                .ok_or_else(|| {
                    FsError::InvalidArgument(format!(
                        "seek by {} from {:?} leaves the file",
                        offset, whence
                    ))
                })?;
            file.set_position(position);
            Ok(position)
        })
    }

    /// The descriptor's current position.
    pub fn tell(&self, fd: Fd) -> Result<usize> {
        self.files.with_descriptor(fd, |file| {
            self.live_inode(fd, file)?;
            Ok(file.position())
        })
    }

    /// Shrinks the file behind a read-write descriptor to `length` bytes. The
    /// descriptor's position is left alone.
    pub fn truncate(&self, fd: Fd, length: usize) -> Result<()> {
        self.files.with_descriptor(fd, |file| {
            if file.mode() != AccessMode::ReadWrite {
                return Err(FsError::AccessViolation(fd));
            }
            let mut node = self.live_inode(fd, file)?;
            node.truncate(length, &self.blocks)
        })
    }

    /// Releases the descriptor. The file and its data are untouched.
    pub fn close(&self, fd: Fd) -> Result<()> {
        self.files.free_descriptor(fd)
    }

    /// Removes `name` and reclaims its inode and blocks.
    ///
    /// Descriptors still open on the file are not closed, but every later
    /// operation through them except `close` fails with `StaleDescriptor`.
    pub fn delete(&self, name: &str) -> Result<()> {
        let entry = self.root.remove(name)?;
        let inum = entry.inode_number();
        let mut node = self.inodes.lock(inum)?;
        node.release(&self.blocks)?;
        self.inodes.free_inode(inum, &mut node);
        info!("deleted {:?} from inode {}", name, inum);
        Ok(())
    }

    /// Metadata of the file called `name`.
    pub fn file_stat(&self, name: &str) -> Result<FileStat> {
        let entry = self.root.lookup(name)?;
        let node = self.inodes.lock(entry.inode_number())?;
        if entry.is_removed() {
            return Err(FsError::NotFound(name.to_string()));
        }
        Ok(FileStat::new(&entry, &node))
    }

    /// A snapshot of the directory and of block, inode and descriptor occupancy.
    pub fn stat(&self) -> Result<Status> {
        let mut files = Vec::new();
        for entry in self.root.entries() {
            let node = self.inodes.lock(entry.inode_number())?;
            // Deleted since the directory was read.
            if entry.is_removed() {
                continue;
            }
            files.push(FileStat::new(&entry, &node));
        }

        Ok(Status {
            files,
            blocks: Usage::new(self.blocks.used(), self.blocks.capacity()),
            inodes: Usage::new(self.inodes.used(), self.inodes.capacity()),
            descriptors: Usage::new(self.files.used(), self.files.capacity()),
            bytes_stored: self.blocks.bytes_stored()?,
            block_map: self.blocks.bitmap().serialize().to_vec(),
        })
    }

    /// Locks the inode behind an open file, failing if the file was deleted.
    /// The check happens under the inode lock, which delete takes before it
    /// frees anything.
    fn live_inode(&self, fd: Fd, file: &OpenFile) -> Result<MutexGuard<'_, Inode>> {
        let node = self.inodes.lock(file.entry().inode_number())?;
        if file.entry().is_removed() {
            return Err(FsError::StaleDescriptor(fd));
        }
        Ok(node)
    }
}
