use std::sync::{Mutex, MutexGuard, PoisonError};

use zerocopy::AsBytes;

#[derive(Debug, PartialEq, Clone, Copy)]
pub enum State {
    Free,
    Used,
}

#[derive(Debug, Clone)]
pub struct Bitmap {
    /// Stores one bit per tracked object, packed into 64 bit words. Bit `n` lives
    /// in word `n / 64` at position `n % 64`.
    bitmap: Vec<u64>,
    /// The number of objects tracked. Bits past this index are never set.
    cap: usize,
}

impl Bitmap {
    pub fn new(cap: usize) -> Self {
        Self {
            bitmap: vec![0; (cap + 63) / 64],
            cap,
        }
    }

    pub fn capacity(&self) -> usize {
        self.cap
    }

    /// The raw words of the map in native byte order.
    pub fn serialize(&self) -> &[u8] {
        self.bitmap.as_slice().as_bytes()
    }

    pub fn get(&self, nr: usize) -> State {
        assert!(nr < self.cap, "bit {} out of range for bitmap of {}", nr, self.cap);
        // Grab the u64 containing the significant bit.
        let outer_offset = self.bitmap[nr / 64];

        let inner_offset = nr % 64;
        let mask = 0b01_u64 << inner_offset;
        match (outer_offset & mask) >> inner_offset {
            0 => State::Free,
            1 => State::Used,
            _ => unreachable!("Bit state returned a non 0 or 1 value. This likely indicates an error with bitmasking"),
        }
    }

    pub fn set_reserved(&mut self, nr: usize) {
        assert!(nr < self.cap, "bit {} out of range for bitmap of {}", nr, self.cap);
        self.bitmap[nr / 64] |= 0b01_u64 << (nr % 64);
    }

    pub fn set_free(&mut self, nr: usize) {
        assert!(nr < self.cap, "bit {} out of range for bitmap of {}", nr, self.cap);
        self.bitmap[nr / 64] &= !(0b01_u64 << (nr % 64));
    }

    pub fn count_used(&self) -> usize {
        self.bitmap.iter().map(|word| word.count_ones() as usize).sum()
    }
}

/// Implements a first-fit allocation policy. Each call to the iterator returns the
/// lowest free index at or after the previous one, scanning from index 0.
pub struct NextAvailableAllocation<'a> {
    /// Keeps track of the next starting place for looking for available bits.
    marker: usize,
    bitmap: &'a Bitmap,
}

impl<'a> NextAvailableAllocation<'a> {
    pub fn new(bitmap: &'a Bitmap) -> Self {
        Self { marker: 0, bitmap }
    }
}

impl Iterator for NextAvailableAllocation<'_> {
    type Item = usize;

    fn next(&mut self) -> Option<Self::Item> {
        for i in self.marker..self.bitmap.capacity() {
            if let State::Free = self.bitmap.get(i) {
                self.marker = i + 1;
                return Some(i);
            }
        }
        self.marker = self.bitmap.capacity();
        None
    }
}

/// A bitmap behind its own lock. Both the data block pool and the inode table
/// hand out indices through one of these; the open file table uses one to
/// claim descriptor slots.
#[derive(Debug)]
pub struct Allocator {
    bitmap: Mutex<Bitmap>,
}

impl Allocator {
    pub fn new(cap: usize) -> Self {
        Self {
            bitmap: Mutex::new(Bitmap::new(cap)),
        }
    }

    /// Reserves the lowest free index, or `None` when every index is taken.
    pub fn allocate(&self) -> Option<usize> {
        let mut bitmap = self.lock();
        let nr = NextAvailableAllocation::new(&bitmap).next()?;
        bitmap.set_reserved(nr);
        Some(nr)
    }

    /// Releases `nr`. Returns whether it was reserved; releasing a free or
    /// out of range index does nothing.
    pub fn free(&self, nr: usize) -> bool {
        let mut bitmap = self.lock();
        if nr >= bitmap.capacity() || bitmap.get(nr) == State::Free {
            return false;
        }
        bitmap.set_free(nr);
        true
    }

    pub fn is_used(&self, nr: usize) -> bool {
        let bitmap = self.lock();
        nr < bitmap.capacity() && bitmap.get(nr) == State::Used
    }

    pub fn used(&self) -> usize {
        self.lock().count_used()
    }

    pub fn capacity(&self) -> usize {
        self.lock().capacity()
    }

    pub fn snapshot(&self) -> Bitmap {
        self.lock().clone()
    }

    // Every critical section leaves the bitmap whole, so a poisoned lock
    // still guards valid state.
    fn lock(&self) -> MutexGuard<'_, Bitmap> {
        self.bitmap.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
