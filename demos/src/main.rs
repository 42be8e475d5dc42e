mod cli;

use std::thread;

use clap::Parser;
use log::{error, info};
use memfs::{AccessMode, FsError, MemFs, Whence};

use crate::cli::Cli;

const SHARED: &str = "shared";

fn main() -> Result<(), FsError> {
    env_logger::init();
    let cli = Cli::parse();

    let fs = MemFs::builder()
        .with_block_size(cli.block_size)
        .with_block_count(cli.blocks)
        .with_inode_count(cli.inodes)
        .with_open_file_count(cli.open_files)
        .build()?;
    fs.create(SHARED)?;

    thread::scope(|s| {
        for worker in 0..cli.threads {
            let fs = &fs;
            s.spawn(move || {
                if let Err(e) = run_worker(fs, worker, cli.bytes) {
                    error!("worker {} failed: {}", worker, e);
                }
            });
        }
    });
    println!("{}", fs.stat()?);

    for worker in 0..cli.threads {
        // Workers that failed to create their file have nothing to delete.
        let _ = fs.delete(&worker_file(worker));
    }
    fs.delete(SHARED)?;
    println!("{}", fs.stat()?);
    Ok(())
}

fn worker_file(worker: usize) -> String {
    format!("worker{}", worker)
}

/// Writes a private file and checks it reads back, then writes its line of the
/// shared file through a descriptor of its own.
fn run_worker(fs: &MemFs, worker: usize, bytes: usize) -> Result<(), FsError> {
    let name = worker_file(worker);
    fs.create(&name)?;
    let fd = fs.open(&name, AccessMode::ReadWrite)?;

    let data: Vec<u8> = (0..bytes).map(|i| b'a' + ((worker + i) % 26) as u8).collect();
    let written = fs.write(fd, &data)?;
    if written < data.len() {
        info!("worker {}: short write, {} of {} bytes", worker, written, data.len());
    }

    fs.seek(fd, 0, Whence::Set)?;
    let mut readback = vec![0; written];
    let read = fs.read(fd, &mut readback)?;
    if readback[..read] != data[..written] {
        error!("worker {}: read back bytes differ from those written", worker);
    }
    fs.close(fd)?;

    // Each worker owns one fixed-width line, so descriptors never overlap.
    let line = format!("worker {:>4} done\n", worker);
    let shared = fs.open(SHARED, AccessMode::ReadWrite)?;
    fs.seek(shared, (worker * line.len()) as i64, Whence::Set)?;
    fs.write(shared, line.as_bytes())?;
    fs.close(shared)?;
    info!("worker {}: {} bytes written", worker, written);
    Ok(())
}
