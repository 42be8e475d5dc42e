use crate::Result;

/// The block number to access ranging from 0 (the first block) to n - 1 (the last
/// block) where n is number of blocks available.
pub type BlockNumber = usize;

/// Byte level access to a fixed set of equally sized blocks.
///
/// Besides its bytes every block carries a fill mark: the high-water mark of
/// bytes written into it since it was last reset. The fill mark is local to the
/// block and says nothing about the length of the file that owns it.
///
/// Implementations synchronize access to each block internally so a store can be
/// shared between threads.
pub trait BlockStorage: Send + Sync {
    /// The capacity of every block in bytes.
    fn block_size(&self) -> usize;

    /// The number of blocks in the store.
    fn block_count(&self) -> usize;

    /// Copies bytes from block `blocknr`, starting at `offset`, into `buf`.
    /// Returns the number of bytes copied, which is short only when the block
    /// ends before `buf` is full.
    ///
    /// # Errors
    ///
    /// Attempting to read a block out of range will return an error.
    fn read_block(&self, blocknr: BlockNumber, offset: usize, buf: &mut [u8]) -> Result<usize>;

    /// Copies `buf` into block `blocknr` starting at `offset` and raises the
    /// block's fill mark to cover the written span. Writes that run past the end
    /// of the block are truncated; the number of bytes copied is returned.
    ///
    /// # Errors
    ///
    /// Attempting to write a block out of range will return an error.
    fn write_block(&self, blocknr: BlockNumber, offset: usize, buf: &[u8]) -> Result<usize>;

    /// The fill mark of block `blocknr`.
    fn used_bytes(&self, blocknr: BlockNumber) -> Result<usize>;

    /// Zeroes every byte from `from` to the end of the block and lowers the fill
    /// mark to at most `from`.
    fn clear_block(&self, blocknr: BlockNumber, from: usize) -> Result<()>;

    /// Drops the fill mark to zero, leaving the bytes in place.
    fn reset_block(&self, blocknr: BlockNumber) -> Result<()>;
}
