use clap::Parser;

/// Runs a concurrent workload against an in-memory file system and prints its
/// status report.
#[derive(Parser, Debug)]
#[command(name = "memfs-demo")]
pub struct Cli {
    /// Capacity of each data block in bytes
    #[arg(long, default_value_t = 32)]
    pub block_size: usize,

    /// Number of data blocks
    #[arg(long, default_value_t = 64)]
    pub blocks: usize,

    /// Number of inodes
    #[arg(long, default_value_t = 8)]
    pub inodes: usize,

    /// Number of descriptor slots
    #[arg(long, default_value_t = 8)]
    pub open_files: usize,

    /// Worker threads, each writing its own file
    #[arg(long, short, default_value_t = 3)]
    pub threads: usize,

    /// Bytes each worker writes
    #[arg(long, short, default_value_t = 100)]
    pub bytes: usize,
}
