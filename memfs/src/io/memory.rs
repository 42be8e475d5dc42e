use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::io::{BlockNumber, BlockStorage};
use crate::{FsError, Result};

#[derive(Debug)]
struct Block {
    data: Box<[u8]>,
    /// Bytes written since the block was last reset.
    used: usize,
}

/// Emulates block storage with heap buffers. Nothing survives the process.
#[derive(Debug)]
pub struct MemoryBlocks {
    block_size: usize,
    blocks: Vec<Mutex<Block>>,
}

impl MemoryBlocks {
    /// Allocates `block_count` zeroed blocks of `block_size` bytes each.
    pub fn new(block_size: usize, block_count: usize) -> Self {
        let blocks = (0..block_count)
            .map(|_| {
                Mutex::new(Block {
                    data: vec![0x00; block_size].into_boxed_slice(),
                    used: 0,
                })
            })
            .collect();
        Self { block_size, blocks }
    }

    fn block(&self, blocknr: BlockNumber) -> Result<MutexGuard<'_, Block>> {
        let block = self.blocks.get(blocknr).ok_or_else(|| {
            FsError::InvalidArgument(format!(
                "block {} out of range for store of {} blocks",
                blocknr,
                self.blocks.len()
            ))
        })?;
        Ok(block.lock().unwrap_or_else(PoisonError::into_inner))
    }
}

impl BlockStorage for MemoryBlocks {
    fn block_size(&self) -> usize {
        self.block_size
    }

    fn block_count(&self) -> usize {
        self.blocks.len()
    }

    fn read_block(&self, blocknr: BlockNumber, offset: usize, buf: &mut [u8]) -> Result<usize> {
        let block = self.block(blocknr)?;
        let start = offset.min(self.block_size);
        let end = start + buf.len().min(self.block_size - start);
        buf[..end - start].copy_from_slice(&block.data[start..end]);
        Ok(end - start)
    }

    fn write_block(&self, blocknr: BlockNumber, offset: usize, buf: &[u8]) -> Result<usize> {
        let mut block = self.block(blocknr)?;
        let start = offset.min(self.block_size);
        let end = start + buf.len().min(self.block_size - start);
        block.data[start..end].copy_from_slice(&buf[..end - start]);
        if end > start {
            block.used = block.used.max(end);
        }
        Ok(end - start)
    }

    fn used_bytes(&self, blocknr: BlockNumber) -> Result<usize> {
        Ok(self.block(blocknr)?.used)
    }

    fn clear_block(&self, blocknr: BlockNumber, from: usize) -> Result<()> {
        let mut block = self.block(blocknr)?;
        let from = from.min(self.block_size);
        block.data[from..].fill(0x00);
        block.used = block.used.min(from);
        Ok(())
    }

    fn reset_block(&self, blocknr: BlockNumber) -> Result<()> {
        self.block(blocknr)?.used = 0;
        Ok(())
    }
}
