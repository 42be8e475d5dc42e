use std::fmt;

use crate::dir::DirEntry;
use crate::node::{Inode, InodeNumber};

/// Metadata of one file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileStat {
    pub name: String,
    pub inode: InodeNumber,
    /// File length in bytes.
    pub length: usize,
    /// Number of data blocks the file holds.
    pub blocks: usize,
}

impl FileStat {
    pub(crate) fn new(entry: &DirEntry, node: &Inode) -> Self {
        Self {
            name: entry.name().to_string(),
            inode: entry.inode_number(),
            length: node.len(),
            blocks: node.blocks().count(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Usage {
    pub used: usize,
    pub total: usize,
}

impl Usage {
    pub fn new(used: usize, total: usize) -> Self {
        Self { used, total }
    }

    pub fn free(&self) -> usize {
        self.total - self.used
    }
}

/// A point-in-time report of the whole file system. Each table is read under its
/// own lock, so a report taken while other threads are working may mix states
/// from slightly different moments.
#[derive(Debug, Clone)]
pub struct Status {
    /// Every file in directory order.
    pub files: Vec<FileStat>,
    pub blocks: Usage,
    pub inodes: Usage,
    pub descriptors: Usage,
    /// The sum of the fill marks of all allocated blocks.
    pub bytes_stored: usize,
    /// The raw data block bitmap, one bit per block, in native byte order.
    pub block_map: Vec<u8>,
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{:<16} {:>8} {:>6}", "name", "length", "inode")?;
        for file in &self.files {
            writeln!(f, "{:<16} {:>8} {:>6}", file.name, file.length, file.inode)?;
        }
        writeln!(f)?;
        writeln!(
            f,
            "blocks       {}/{} used, {} free, {} bytes stored",
            self.blocks.used,
            self.blocks.total,
            self.blocks.free(),
            self.bytes_stored
        )?;
        writeln!(
            f,
            "inodes       {}/{} used, {} free",
            self.inodes.used,
            self.inodes.total,
            self.inodes.free()
        )?;
        writeln!(f, "descriptors  {}/{} open", self.descriptors.used, self.descriptors.total)?;
        write!(f, "block map    ")?;
        for byte in &self.block_map {
            write!(f, "{:02x}", byte)?;
        }
        writeln!(f)
    }
}
