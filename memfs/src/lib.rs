//! An in-memory file system over a fixed pool of fixed-size blocks.
//!
//! Files live in one flat directory. Each file is an inode holding its length
//! and a short list of direct block pointers, so the largest possible file is
//! [`NUM_POINTERS`] blocks. Files are reached through descriptors that carry
//! an access mode and their own cursor:
//!
//! ```
//! use memfs::{AccessMode, MemFs, Whence};
//!
//! let fs = MemFs::new();
//! fs.create("a").unwrap();
//! let fd = fs.open("a", AccessMode::ReadWrite).unwrap();
//! assert_eq!(fs.write(fd, b"hello").unwrap(), 5);
//! fs.seek(fd, 0, Whence::Set).unwrap();
//!
//! let mut buf = [0; 5];
//! assert_eq!(fs.read(fd, &mut buf).unwrap(), 5);
//! assert_eq!(&buf, b"hello");
//! fs.close(fd).unwrap();
//! fs.delete("a").unwrap();
//! ```
//!
//! Nothing is persisted; the file system lives as long as its [`MemFs`].
mod alloc;
mod dir;
mod file;
mod fs;
mod geometry;
pub mod io;
mod node;
mod stat;

pub use crate::file::{AccessMode, Fd};
pub use crate::fs::{ErrorKind, FsError, MemFs, Resource, Whence};
pub use crate::geometry::{FsBuilder, Geometry};
pub use crate::node::{InodeNumber, NUM_POINTERS};
pub use crate::stat::{FileStat, Status, Usage};

pub type Result<T> = std::result::Result<T, FsError>;
