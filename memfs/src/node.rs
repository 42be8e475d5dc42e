use std::sync::{Mutex, MutexGuard, PoisonError};

use log::{debug, warn};

use crate::alloc::Allocator;
use crate::io::{BlockNumber, BlockPool, BlockStorage};
use crate::{FsError, Resource, Result};

/// The number of direct block pointers in an inode. There are no indirect
/// blocks, so a file never grows past `NUM_POINTERS * block_size` bytes.
pub const NUM_POINTERS: usize = 8;

/// Marks an unused slot in an inode's pointer list.
const EMPTY: u32 = u32::MAX;

pub type InodeNumber = usize;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Inode {
    /// The total size of the file in bytes.
    length: usize,
    /// Pointers for the data blocks that belong to the file, in file order. Slot
    /// `i` holds the block covering bytes `i * block_size..(i + 1) * block_size`.
    blocks: [u32; NUM_POINTERS],
}

impl Default for Inode {
    fn default() -> Self {
        Self {
            length: 0,
            blocks: [EMPTY; NUM_POINTERS],
        }
    }
}

impl Inode {
    pub fn len(&self) -> usize {
        self.length
    }

    /// The block holding logical block `index` of the file, if one is allocated.
    pub fn block(&self, index: usize) -> Option<BlockNumber> {
        match self.blocks.get(index) {
            Some(&ptr) if ptr != EMPTY => Some(ptr as BlockNumber),
            _ => None,
        }
    }

    /// Every allocated block of the file in file order.
    pub fn blocks(&self) -> impl Iterator<Item = BlockNumber> + '_ {
        self.blocks
            .iter()
            .filter(|&&ptr| ptr != EMPTY)
            .map(|&ptr| ptr as BlockNumber)
    }

    /// Copies file bytes starting at `offset` into `buf`, stopping at the end of
    /// the file. Bytes a block holds past the file length are never returned.
    pub fn read_at<T: BlockStorage>(
        &self,
        offset: usize,
        buf: &mut [u8],
        pool: &BlockPool<T>,
    ) -> Result<usize> {
        let end = offset.saturating_add(buf.len()).min(self.length);
        if offset >= end {
            return Ok(0);
        }

        let block_size = pool.block_size();
        let mut start = offset;
        let mut read = 0;
        while start < end {
            let index = start / block_size;
            let block_end = ((index + 1) * block_size).min(end);
            // Every byte below the length lives in an allocated block.
            let Some(blocknr) = self.block(index) else {
                break;
            };
            let dest = &mut buf[read..read + (block_end - start)];
            read += pool.read_block(blocknr, start % block_size, dest)?;
            start = block_end;
        }
        Ok(read)
    }

    /// Copies `buf` into the file starting at `offset`, growing the file as
    /// needed. Blocks are claimed on demand, one logical block at a time, which
    /// includes any blocks spanning a hole between the old end of the file and
    /// `offset`.
    ///
    /// Running out of blocks or pointers part way is a short write: the bytes
    /// already copied stay and their count is returned. Only a write that could
    /// not store a single byte fails.
    pub fn write_at<T: BlockStorage>(
        &mut self,
        offset: usize,
        buf: &[u8],
        pool: &BlockPool<T>,
    ) -> Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }

        let block_size = pool.block_size();
        let end = offset.saturating_add(buf.len());
        let mut start = offset;
        let mut written = 0;
        while start < end {
            let index = start / block_size;
            let blocknr = match self.ensure_blocks(index, pool) {
                Ok(blocknr) => blocknr,
                Err(e) if written == 0 => return Err(e),
                Err(e) => {
                    warn!("short write: {} of {} bytes stored ({})", written, buf.len(), e);
                    break;
                }
            };
            let block_end = ((index + 1) * block_size).min(end);
            let src = &buf[written..written + (block_end - start)];
            written += pool.write_block(blocknr, start % block_size, src)?;
            start = block_end;
            self.length = self.length.max(start);
        }
        Ok(written)
    }

    /// Shrinks the file to `length` bytes. Blocks wholly past the new end go back
    /// to the pool and the tail of the last kept block is zeroed.
    pub fn truncate<T: BlockStorage>(&mut self, length: usize, pool: &BlockPool<T>) -> Result<()> {
        if length > self.length {
            return Err(FsError::InvalidArgument(format!(
                "cannot truncate a {} byte file to {} bytes",
                self.length, length
            )));
        }

        let block_size = pool.block_size();
        let keep = (length + block_size - 1) / block_size;
        for slot in keep..NUM_POINTERS {
            if let Some(blocknr) = self.block(slot) {
                pool.free_block(blocknr)?;
                self.blocks[slot] = EMPTY;
            }
        }
        if length % block_size != 0 {
            if let Some(blocknr) = self.block(keep - 1) {
                pool.clear_block(blocknr, length % block_size)?;
            }
        }
        self.length = length;
        Ok(())
    }

    /// Hands every block back to the pool and empties the inode.
    pub fn release<T: BlockStorage>(&mut self, pool: &BlockPool<T>) -> Result<()> {
        for slot in 0..NUM_POINTERS {
            if let Some(blocknr) = self.block(slot) {
                pool.free_block(blocknr)?;
                self.blocks[slot] = EMPTY;
            }
        }
        self.length = 0;
        Ok(())
    }

    /// Makes sure logical blocks `0..=index` are all backed and returns the block
    /// behind `index`. Blocks claimed here are handed back if a later claim in
    /// the same call fails.
    fn ensure_blocks<T: BlockStorage>(&mut self, index: usize, pool: &BlockPool<T>) -> Result<BlockNumber> {
        if index >= NUM_POINTERS {
            return Err(FsError::NoSpace(Resource::Pointer));
        }
        if let Some(blocknr) = self.block(index) {
            return Ok(blocknr);
        }

        let mut claimed = Vec::new();
        for slot in 0..=index {
            if self.block(slot).is_some() {
                continue;
            }
            match pool.allocate_block() {
                Ok(blocknr) => {
                    self.blocks[slot] = blocknr as u32;
                    claimed.push(slot);
                }
                Err(e) => {
                    for slot in claimed {
                        if let Some(blocknr) = self.block(slot) {
                            pool.free_block(blocknr)?;
                        }
                        self.blocks[slot] = EMPTY;
                    }
                    return Err(e);
                }
            }
        }
        Ok(self.blocks[index] as BlockNumber)
    }
}

/// The fixed table of inodes and the bitmap recording which are in use.
///
/// Each inode sits behind its own lock. Whoever holds that lock may change the
/// inode's length and pointer list.
#[derive(Debug)]
pub struct InodeTable {
    nodes: Vec<Mutex<Inode>>,
    alloc_tracker: Allocator,
}

impl InodeTable {
    pub fn new(count: usize) -> Self {
        Self {
            nodes: (0..count).map(|_| Mutex::new(Inode::default())).collect(),
            alloc_tracker: Allocator::new(count),
        }
    }

    /// Claims the lowest free inode. Freed inodes are already reset, so the
    /// claimed inode describes an empty file.
    pub fn allocate_inode(&self) -> Result<InodeNumber> {
        match self.alloc_tracker.allocate() {
            Some(inum) => {
                debug!("allocated inode {}", inum);
                Ok(inum)
            }
            None => {
                warn!("inode table exhausted ({} inodes)", self.nodes.len());
                Err(FsError::NoSpace(Resource::Inode))
            }
        }
    }

    /// Resets `node`, which must be the locked inode `inum`, and marks it free.
    /// The caller releases the inode's blocks first.
    pub fn free_inode(&self, inum: InodeNumber, node: &mut Inode) {
        *node = Inode::default();
        self.alloc_tracker.free(inum);
        debug!("freed inode {}", inum);
    }

    pub fn lock(&self, inum: InodeNumber) -> Result<MutexGuard<'_, Inode>> {
        let node = self.nodes.get(inum).ok_or_else(|| {
            FsError::InvalidArgument(format!("inode {} out of range", inum))
        })?;
        Ok(node.lock().unwrap_or_else(PoisonError::into_inner))
    }

    pub fn used(&self) -> usize {
        self.alloc_tracker.used()
    }

    pub fn capacity(&self) -> usize {
        self.nodes.len()
    }
}
