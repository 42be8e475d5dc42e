use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;

use memfs::io::{BlockNumber, BlockStorage, MemoryBlocks};
use memfs::{AccessMode, ErrorKind, FsError, MemFs, Resource, Whence};

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn read_all(fs: &MemFs, fd: usize) -> Vec<u8> {
    let mut out = Vec::new();
    let mut buf = [0; 13];
    loop {
        let n = fs.read(fd, &mut buf).unwrap();
        if n == 0 {
            return out;
        }
        out.extend_from_slice(&buf[..n]);
    }
}

#[test]
fn create_write_read_delete_scenario() {
    init_logging();
    let fs = MemFs::new();

    fs.create("a").unwrap();
    let fd = fs.open("a", AccessMode::ReadWrite).unwrap();
    assert_eq!(fd, 0);
    assert_eq!(fs.write(fd, b"hello").unwrap(), 5);
    assert_eq!(fs.seek(fd, 0, Whence::Set).unwrap(), 0);

    let mut buf = [0; 5];
    assert_eq!(fs.read(fd, &mut buf).unwrap(), 5);
    assert_eq!(&buf, b"hello");

    fs.close(fd).unwrap();
    fs.delete("a").unwrap();
    let err = fs.open("a", AccessMode::ReadOnly).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
    assert_eq!(err.code(), -1);
}

#[test]
fn open_and_close_do_not_leak() {
    init_logging();
    let fs = MemFs::new();
    fs.create("a").unwrap();
    let before = fs.stat().unwrap();

    let fd = fs.open("a", AccessMode::ReadWrite).unwrap();
    assert_eq!(fs.stat().unwrap().descriptors.used, 1);
    fs.close(fd).unwrap();

    let after = fs.stat().unwrap();
    assert_eq!(after.files, before.files);
    assert_eq!(after.inodes, before.inodes);
    assert_eq!(after.blocks, before.blocks);
    assert_eq!(after.descriptors.used, 0);
}

#[test]
fn round_trip_across_block_boundaries() {
    init_logging();
    let fs = MemFs::new();
    let block_size = fs.geometry().block_size;

    for (i, len) in [0, block_size / 2, block_size, 3 * block_size + 7].iter().enumerate() {
        let name = format!("file{}", i);
        let data: Vec<u8> = (0..*len).map(|b| (b % 251) as u8).collect();
        fs.create(&name).unwrap();
        let fd = fs.open(&name, AccessMode::ReadWrite).unwrap();

        assert_eq!(fs.write(fd, &data).unwrap(), *len);
        assert_eq!(fs.seek(fd, 0, Whence::Set).unwrap(), 0);
        let mut buf = vec![0; *len];
        assert_eq!(fs.read(fd, &mut buf).unwrap(), *len);
        assert_eq!(buf, data);

        let stat = fs.file_stat(&name).unwrap();
        assert_eq!(stat.length, *len);
        assert_eq!(stat.blocks, (*len + block_size - 1) / block_size);
        fs.close(fd).unwrap();
    }
}

#[test]
fn second_close_is_rejected() {
    init_logging();
    let fs = MemFs::new();
    fs.create("a").unwrap();
    let fd = fs.open("a", AccessMode::ReadOnly).unwrap();

    fs.close(fd).unwrap();
    match fs.close(fd) {
        Err(FsError::BadDescriptor(bad)) => assert_eq!(bad, fd),
        other => panic!("Unexpected result {:?}", other),
    }
    assert_eq!(fs.close(fd).unwrap_err().kind(), ErrorKind::InvalidArgument);
}

#[test]
fn read_at_or_past_end_returns_zero() {
    init_logging();
    let fs = MemFs::new();
    fs.create("a").unwrap();
    let fd = fs.open("a", AccessMode::ReadWrite).unwrap();
    let mut buf = [0; 8];

    assert_eq!(fs.read(fd, &mut buf).unwrap(), 0);
    fs.write(fd, b"0123456789").unwrap();
    assert_eq!(fs.read(fd, &mut buf).unwrap(), 0);

    fs.seek(fd, 100, Whence::Set).unwrap();
    assert_eq!(fs.read(fd, &mut buf).unwrap(), 0);
    assert_eq!(fs.tell(fd).unwrap(), 100);

    fs.seek(fd, -3, Whence::End).unwrap();
    assert_eq!(fs.read(fd, &mut buf).unwrap(), 3);
    assert_eq!(&buf[..3], b"789");
    assert_eq!(fs.read(fd, &mut buf).unwrap(), 0);
}

#[test]
fn exhausting_the_pool_gives_short_write() {
    init_logging();
    let fs = MemFs::builder().with_block_size(32).with_block_count(2).build().unwrap();
    fs.create("big").unwrap();
    fs.create("small").unwrap();
    let big = fs.open("big", AccessMode::ReadWrite).unwrap();
    let small = fs.open("small", AccessMode::ReadWrite).unwrap();

    let written = fs.write(big, &[0xAB; 100]).unwrap();
    assert_eq!(written, 64);
    assert_eq!(fs.file_stat("big").unwrap().length, 64);
    assert_eq!(fs.tell(big).unwrap(), 64);

    match fs.write(small, b"x") {
        Err(FsError::NoSpace(Resource::Block)) => (),
        other => panic!("Unexpected result {:?}", other),
    }
    assert_eq!(fs.file_stat("small").unwrap().length, 0);

    fs.seek(big, 0, Whence::Set).unwrap();
    assert_eq!(read_all(&fs, big), vec![0xAB; 64]);
}

#[test]
fn file_size_is_capped_by_direct_pointers() {
    init_logging();
    let fs = MemFs::new();
    let max = fs.geometry().max_file_size();
    fs.create("a").unwrap();
    let fd = fs.open("a", AccessMode::ReadWrite).unwrap();

    assert_eq!(fs.write(fd, &vec![1; max + 1]).unwrap(), max);
    match fs.write(fd, b"x") {
        Err(FsError::NoSpace(Resource::Pointer)) => (),
        other => panic!("Unexpected result {:?}", other),
    }
    assert_eq!(fs.file_stat("a").unwrap().length, max);
}

#[test]
fn descriptors_keep_independent_cursors() {
    init_logging();
    let fs = MemFs::new();
    fs.create("a").unwrap();
    let writer = fs.open("a", AccessMode::ReadWrite).unwrap();
    let reader = fs.open("a", AccessMode::ReadOnly).unwrap();

    fs.write(writer, b"abcdef").unwrap();
    assert_eq!(fs.tell(writer).unwrap(), 6);
    assert_eq!(fs.tell(reader).unwrap(), 0);

    let mut buf = [0; 2];
    fs.read(reader, &mut buf).unwrap();
    assert_eq!(&buf, b"ab");
    assert_eq!(fs.tell(reader).unwrap(), 2);
    assert_eq!(fs.tell(writer).unwrap(), 6);
}

#[test]
fn holes_read_back_as_zeros_after_block_reuse() {
    init_logging();
    let fs = MemFs::new();
    fs.create("old").unwrap();
    let fd = fs.open("old", AccessMode::ReadWrite).unwrap();
    fs.write(fd, &[0xFF; 64]).unwrap();
    fs.close(fd).unwrap();
    fs.delete("old").unwrap();

    fs.create("new").unwrap();
    let fd = fs.open("new", AccessMode::ReadWrite).unwrap();
    fs.seek(fd, 40, Whence::Set).unwrap();
    fs.write(fd, b"y").unwrap();
    fs.seek(fd, 0, Whence::Set).unwrap();

    let mut expected = vec![0; 40];
    expected.push(b'y');
    assert_eq!(read_all(&fs, fd), expected);
}

#[test]
fn status_report_lists_files_in_creation_order() {
    init_logging();
    let fs = MemFs::new();
    for name in ["zeta", "alpha", "mid"] {
        fs.create(name).unwrap();
    }
    let fd = fs.open("alpha", AccessMode::ReadWrite).unwrap();
    fs.write(fd, &[1; 40]).unwrap();

    let status = fs.stat().unwrap();
    let names: Vec<&str> = status.files.iter().map(|f| f.name.as_str()).collect();
    assert_eq!(names, vec!["zeta", "alpha", "mid"]);
    assert_eq!(status.files[1].length, 40);
    assert_eq!(status.files[1].inode, 1);
    assert_eq!(status.inodes.used, 3);
    assert_eq!(status.blocks.used, 2);
    assert_eq!(status.bytes_stored, 40);
    assert_eq!(status.descriptors.used, 1);

    let report = status.to_string();
    assert!(report.contains("alpha"));
    assert!(report.contains("2/64 used"));
}

#[test]
fn concurrent_writers_on_separate_files() {
    init_logging();
    let fs = MemFs::new();
    let threads = 4;
    let len = 100;

    thread::scope(|s| {
        for t in 0..threads {
            let fs = &fs;
            s.spawn(move || {
                let name = format!("worker{}", t);
                fs.create(&name).unwrap();
                let fd = fs.open(&name, AccessMode::ReadWrite).unwrap();
                let data = vec![t as u8; len];
                for chunk in data.chunks(7) {
                    assert_eq!(fs.write(fd, chunk).unwrap(), chunk.len());
                }
                fs.seek(fd, 0, Whence::Set).unwrap();
                assert_eq!(read_all(fs, fd), data);
                fs.close(fd).unwrap();
            });
        }
    });

    let status = fs.stat().unwrap();
    assert_eq!(status.files.len(), threads);
    assert_eq!(status.blocks.used, threads * 4);
    assert_eq!(status.bytes_stored, threads * len);
    assert_eq!(status.descriptors.used, 0);
}

#[test]
fn concurrent_writers_on_one_file_at_disjoint_offsets() {
    init_logging();
    let fs = MemFs::new();
    let block_size = fs.geometry().block_size;
    fs.create("shared").unwrap();

    thread::scope(|s| {
        for t in 0..4usize {
            let fs = &fs;
            s.spawn(move || {
                let fd = fs.open("shared", AccessMode::ReadWrite).unwrap();
                fs.seek(fd, (t * block_size) as i64, Whence::Set).unwrap();
                assert_eq!(fs.write(fd, &vec![t as u8; block_size]).unwrap(), block_size);
                fs.close(fd).unwrap();
            });
        }
    });

    let fd = fs.open("shared", AccessMode::ReadOnly).unwrap();
    let content = read_all(&fs, fd);
    assert_eq!(content.len(), 4 * block_size);
    for (t, chunk) in content.chunks(block_size).enumerate() {
        assert!(chunk.iter().all(|&b| b == t as u8));
    }
    assert_eq!(fs.file_stat("shared").unwrap().blocks, 4);
}

#[test]
fn racing_opens_claim_distinct_slots() {
    init_logging();
    let fs = MemFs::new();
    fs.create("a").unwrap();
    let slots = fs.geometry().open_file_count;

    let results: Vec<_> = thread::scope(|s| {
        let handles: Vec<_> = (0..slots * 2)
            .map(|_| {
                let fs = &fs;
                s.spawn(move || fs.open("a", AccessMode::ReadOnly))
            })
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });

    let fds: HashSet<usize> = results.iter().filter_map(|r| r.as_ref().ok().copied()).collect();
    assert_eq!(fds.len(), slots);
    for err in results.iter().filter_map(|r| r.as_ref().err()) {
        assert_eq!(err.kind(), ErrorKind::ResourceExhausted);
    }
}

#[test]
fn racing_creates_of_one_name_succeed_once() {
    init_logging();
    let fs = MemFs::new();

    let created = thread::scope(|s| {
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let fs = &fs;
                s.spawn(move || fs.create("same").is_ok())
            })
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).filter(|ok| *ok).count()
    });

    assert_eq!(created, 1);
    assert_eq!(fs.stat().unwrap().inodes.used, 1);
}

/// Block storage that counts the writes it serves.
struct CountingBlocks {
    inner: MemoryBlocks,
    writes: Arc<AtomicUsize>,
}

impl BlockStorage for CountingBlocks {
    fn block_size(&self) -> usize {
        self.inner.block_size()
    }

    fn block_count(&self) -> usize {
        self.inner.block_count()
    }

    fn read_block(&self, blocknr: BlockNumber, offset: usize, buf: &mut [u8]) -> memfs::Result<usize> {
        self.inner.read_block(blocknr, offset, buf)
    }

    fn write_block(&self, blocknr: BlockNumber, offset: usize, buf: &[u8]) -> memfs::Result<usize> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        self.inner.write_block(blocknr, offset, buf)
    }

    fn used_bytes(&self, blocknr: BlockNumber) -> memfs::Result<usize> {
        self.inner.used_bytes(blocknr)
    }

    fn clear_block(&self, blocknr: BlockNumber, from: usize) -> memfs::Result<()> {
        self.inner.clear_block(blocknr, from)
    }

    fn reset_block(&self, blocknr: BlockNumber) -> memfs::Result<()> {
        self.inner.reset_block(blocknr)
    }
}

#[test]
fn file_system_runs_on_custom_storage() {
    init_logging();
    let writes = Arc::new(AtomicUsize::new(0));
    let dev = CountingBlocks {
        inner: MemoryBlocks::new(16, 8),
        writes: Arc::clone(&writes),
    };
    let fs = MemFs::builder().build_on(dev).unwrap();
    fs.create("a").unwrap();
    let fd = fs.open("a", AccessMode::ReadWrite).unwrap();

    // 40 bytes over 16 byte blocks touch three blocks.
    assert_eq!(fs.write(fd, &[3; 40]).unwrap(), 40);
    assert_eq!(fs.file_stat("a").unwrap().blocks, 3);
    assert_eq!(writes.load(Ordering::SeqCst), 3);
    assert_eq!(fs.stat().unwrap().blocks.total, 8);
}
