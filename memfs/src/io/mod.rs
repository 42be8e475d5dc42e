//! Block storage backing the data region.

mod block;
mod memory;
mod pool;

pub use block::{BlockNumber, BlockStorage};
pub use memory::MemoryBlocks;
pub(crate) use pool::BlockPool;
