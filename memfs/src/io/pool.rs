use log::{debug, warn};

use crate::alloc::{Allocator, Bitmap, State};
use crate::io::{BlockNumber, BlockStorage};
use crate::{FsError, Resource, Result};

/// The data region: a block store plus the bitmap recording which of its blocks
/// belong to a file.
///
/// The bitmap is the only record of ownership. Block bytes are not guarded by
/// the bitmap lock; the store locks each block on its own.
#[derive(Debug)]
pub struct BlockPool<T: BlockStorage> {
    dev: T,
    data_map: Allocator,
}

impl<T: BlockStorage> BlockPool<T> {
    pub fn new(dev: T) -> Self {
        let data_map = Allocator::new(dev.block_count());
        Self { dev, data_map }
    }

    pub fn block_size(&self) -> usize {
        self.dev.block_size()
    }

    /// Grants the lowest free block. The block comes back zeroed with an empty
    /// fill mark, so nothing from a previous owner is visible through it.
    pub fn allocate_block(&self) -> Result<BlockNumber> {
        let blocknr = match self.data_map.allocate() {
            Some(blocknr) => blocknr,
            None => {
                warn!("data region exhausted ({} blocks)", self.data_map.capacity());
                return Err(FsError::NoSpace(Resource::Block));
            }
        };
        if let Err(e) = self.dev.clear_block(blocknr, 0) {
            self.data_map.free(blocknr);
            return Err(e);
        }
        debug!("allocated block {}", blocknr);
        Ok(blocknr)
    }

    /// Returns a block to the pool and drops its fill mark. Freeing a block that
    /// is already free does nothing.
    pub fn free_block(&self, blocknr: BlockNumber) -> Result<()> {
        if !self.data_map.is_used(blocknr) {
            return Ok(());
        }
        // The fill mark goes before the bit; once the bit clears another file may
        // claim the block.
        self.dev.reset_block(blocknr)?;
        self.data_map.free(blocknr);
        debug!("freed block {}", blocknr);
        Ok(())
    }

    pub fn read_block(&self, blocknr: BlockNumber, offset: usize, buf: &mut [u8]) -> Result<usize> {
        self.dev.read_block(blocknr, offset, buf)
    }

    pub fn write_block(&self, blocknr: BlockNumber, offset: usize, buf: &[u8]) -> Result<usize> {
        self.dev.write_block(blocknr, offset, buf)
    }

    pub fn clear_block(&self, blocknr: BlockNumber, from: usize) -> Result<()> {
        self.dev.clear_block(blocknr, from)
    }

    pub fn used_bytes(&self, blocknr: BlockNumber) -> Result<usize> {
        self.dev.used_bytes(blocknr)
    }

    pub fn used(&self) -> usize {
        self.data_map.used()
    }

    pub fn capacity(&self) -> usize {
        self.data_map.capacity()
    }

    pub fn bitmap(&self) -> Bitmap {
        self.data_map.snapshot()
    }

    /// Sums the fill marks of every allocated block.
    pub fn bytes_stored(&self) -> Result<usize> {
        let bitmap = self.bitmap();
        let mut total = 0;
        for blocknr in 0..bitmap.capacity() {
            if bitmap.get(blocknr) == State::Used {
                total += self.used_bytes(blocknr)?;
            }
        }
        Ok(total)
    }
}
