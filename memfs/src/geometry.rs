use crate::fs::MemFs;
use crate::io::{BlockStorage, MemoryBlocks};
use crate::node::NUM_POINTERS;
use crate::{FsError, Result};

/// The fixed dimensions of a file system. Every table is sized once at build time
/// and never grows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Geometry {
    /// Capacity of each data block in bytes.
    pub block_size: usize,
    /// Number of data blocks shared by all files.
    pub block_count: usize,
    /// Number of inodes, which bounds the number of files.
    pub inode_count: usize,
    /// Number of descriptor slots, which bounds the number of open files.
    pub open_file_count: usize,
}

impl Default for Geometry {
    fn default() -> Self {
        Self {
            block_size: 32,
            block_count: 64,
            inode_count: 8,
            open_file_count: 8,
        }
    }
}

impl Geometry {
    /// The largest file the direct pointers of one inode can address.
    pub fn max_file_size(&self) -> usize {
        self.block_size * NUM_POINTERS
    }

    pub fn validate(&self) -> Result<()> {
        let fields = [
            ("block size", self.block_size),
            ("block count", self.block_count),
            ("inode count", self.inode_count),
            ("open file count", self.open_file_count),
        ];
        for (name, value) in fields.iter() {
            if *value == 0 {
                return Err(FsError::InvalidArgument(format!("{} must be non-zero", name)));
            }
        }
        // Inodes store block numbers as u32 with u32::MAX reserved for empty slots.
        if self.block_count >= u32::MAX as usize {
            return Err(FsError::InvalidArgument(format!(
                "block count {} does not fit a block pointer",
                self.block_count
            )));
        }
        if self.block_size.checked_mul(NUM_POINTERS).is_none() {
            return Err(FsError::InvalidArgument(format!(
                "block size {} overflows the maximum file size",
                self.block_size
            )));
        }
        Ok(())
    }
}

/// Builds a [`MemFs`]. Unset dimensions take their [`Geometry::default`] values.
///
/// ```
/// let fs = memfs::MemFs::builder()
///     .with_block_size(64)
///     .with_block_count(16)
///     .build()
///     .unwrap();
/// assert_eq!(fs.geometry().max_file_size(), 64 * memfs::NUM_POINTERS);
/// ```
#[derive(Debug, Default, Clone)]
pub struct FsBuilder {
    geometry: Geometry,
}

impl FsBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the capacity of each data block in bytes.
    pub fn with_block_size(mut self, bytes: usize) -> Self {
        self.geometry.block_size = bytes;
        self
    }

    /// Sets the number of data blocks.
    pub fn with_block_count(mut self, blocks: usize) -> Self {
        self.geometry.block_count = blocks;
        self
    }

    pub fn with_inode_count(mut self, inodes: usize) -> Self {
        self.geometry.inode_count = inodes;
        self
    }

    pub fn with_open_file_count(mut self, slots: usize) -> Self {
        self.geometry.open_file_count = slots;
        self
    }

    /// Validates the geometry and builds a file system over fresh heap blocks.
    pub fn build(self) -> Result<MemFs<MemoryBlocks>> {
        self.geometry.validate()?;
        let dev = MemoryBlocks::new(self.geometry.block_size, self.geometry.block_count);
        Ok(MemFs::assemble(dev, self.geometry))
    }

    /// Builds a file system over caller supplied storage. The block size and
    /// count are taken from `dev`, overriding anything set on the builder.
    pub fn build_on<T: BlockStorage>(mut self, dev: T) -> Result<MemFs<T>> {
        self.geometry.block_size = dev.block_size();
        self.geometry.block_count = dev.block_count();
        self.geometry.validate()?;
        Ok(MemFs::assemble(dev, self.geometry))
    }
}
