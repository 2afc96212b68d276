//! Pool-backed chunk storage for `ChunkStack`.
//!
//! Grounded on `MTObjects::SmartStackStuff`: `DataChunk` is a fixed-capacity
//! slab, `DataChunkMemoryPool64` hands slabs out by index using a two-level
//! occupancy bitset, and `SmartStack<T>` is the chunked LIFO built on top.
//! The two-level bitset (a "range" word tracking which 64-chunk bands are
//! exhausted, over per-band occupancy words) keeps allocation to a single
//! `trailing_zeros` scan instead of a linear search over thousands of slots.
//!
//! `ChunkStack<T>` requires `T: Copy`. This crate only ever instantiates it
//! with `ObjectRef` (a plain index), so every push/pop/iteration step can
//! move values by copy through the pool's mutex rather than handing back a
//! lock-guarded reference — the public API never leaks a guard's lifetime.

use crate::error::Error;
use parking_lot::Mutex;
use std::mem;

/// Payload of one chunk, in bytes, selected at compile time by the
/// `chunk-payload-*` Cargo features (mirroring the `bitset-*` features'
/// effect on `depset::MAX_CLUSTERS`). `chunk-payload-256` is the default and
/// matches the 256-byte `DataChunk` in the original pool (two 4-byte link
/// fields plus payload); `chunk-payload-128`/`chunk-payload-512` trade chunk
/// count against per-chunk locality for smaller or larger populations.
#[cfg(feature = "chunk-payload-512")]
pub const CHUNK_PAYLOAD_BYTES: usize = 512 - 2 * mem::size_of::<u32>();
#[cfg(all(feature = "chunk-payload-128", not(feature = "chunk-payload-512")))]
pub const CHUNK_PAYLOAD_BYTES: usize = 128 - 2 * mem::size_of::<u32>();
#[cfg(not(any(feature = "chunk-payload-128", feature = "chunk-payload-512")))]
pub const CHUNK_PAYLOAD_BYTES: usize = 256 - 2 * mem::size_of::<u32>();

const NULL_CHUNK: u32 = u32::MAX;

struct ChunkSlot<T> {
    previous: u32,
    next: u32,
    items: Vec<T>,
}

impl<T> ChunkSlot<T> {
    fn new(capacity: usize) -> Self {
        ChunkSlot { previous: NULL_CHUNK, next: NULL_CHUNK, items: Vec::with_capacity(capacity) }
    }

    fn reset(&mut self) {
        self.previous = NULL_CHUNK;
        self.next = NULL_CHUNK;
        self.items.clear();
    }
}

/// Two-level occupancy tracker over `num_chunks` slots.
struct Occupancy {
    ranges: Vec<u64>,
    range_full: Vec<u64>,
}

impl Occupancy {
    fn new(num_chunks: usize) -> Self {
        let num_ranges = (num_chunks + 63) / 64;
        let num_full_words = (num_ranges + 63) / 64;
        Occupancy { ranges: vec![0u64; num_ranges.max(1)], range_full: vec![0u64; num_full_words.max(1)] }
    }

    fn capacity(&self) -> usize {
        self.ranges.len() * 64
    }

    fn first_free(&self) -> Option<usize> {
        for (w, &word) in self.range_full.iter().enumerate() {
            if word == u64::MAX {
                continue;
            }
            let mut bit = (!word).trailing_zeros() as usize;
            loop {
                let range = w * 64 + bit;
                if range >= self.ranges.len() {
                    return None;
                }
                let range_word = self.ranges[range];
                if range_word != u64::MAX {
                    let slot = (!range_word).trailing_zeros() as usize;
                    let index = range * 64 + slot;
                    return Some(index);
                }
                bit += 1;
                if bit >= 64 {
                    break;
                }
            }
        }
        None
    }

    fn set_used(&mut self, index: usize, used: bool) {
        let range = index / 64;
        let bit = index % 64;
        if used {
            self.ranges[range] |= 1u64 << bit;
        } else {
            self.ranges[range] &= !(1u64 << bit);
        }
        let full = self.ranges[range] == u64::MAX;
        let w = range / 64;
        let b = range % 64;
        if full {
            self.range_full[w] |= 1u64 << b;
        } else {
            self.range_full[w] &= !(1u64 << b);
        }
    }
}

struct PoolInner<T> {
    slots: Vec<ChunkSlot<T>>,
    occupancy: Occupancy,
}

impl<T> PoolInner<T> {
    fn new(capacity: usize, elements_per_chunk: usize) -> Self {
        let slots = (0..capacity).map(|_| ChunkSlot::new(elements_per_chunk)).collect();
        PoolInner { slots, occupancy: Occupancy::new(capacity) }
    }

    fn allocate(&mut self) -> Option<u32> {
        let index = self.occupancy.first_free()?;
        self.occupancy.set_used(index, true);
        self.slots[index].reset();
        Some(index as u32)
    }

    fn release(&mut self, index: u32) {
        self.occupancy.set_used(index as usize, false);
    }
}

/// Pool of fixed-capacity chunks shared by every `ChunkStack` built over it.
/// Protected by `parking_lot::Mutex`, whose uncontended fast path is cheap
/// enough to serve both the builder's single-threaded traversal and the
/// executor's concurrent per-object handle resets without a second,
/// lock-free implementation (`aptos-core`, `tfs`'s `chashmap`/`mlcr` and this
/// crate all reach for `parking_lot` over a hand-rolled spinlock for the
/// same reason).
pub struct ChunkPool<T> {
    inner: Mutex<PoolInner<T>>,
    elements_per_chunk: usize,
}

impl<T> ChunkPool<T> {
    pub fn new(capacity: usize) -> Self {
        let elements_per_chunk = (CHUNK_PAYLOAD_BYTES / mem::size_of::<T>().max(1)).max(1);
        ChunkPool { inner: Mutex::new(PoolInner::new(capacity, elements_per_chunk)), elements_per_chunk }
    }

    pub fn capacity(&self) -> usize {
        self.inner.lock().occupancy.capacity()
    }

    fn allocate(&self) -> Result<u32, Error> {
        self.inner.lock().allocate().ok_or_else(|| Error::ChunkPoolExhausted { capacity: self.capacity() })
    }

    fn release(&self, index: u32) {
        self.inner.lock().release(index);
    }

    fn with_slot<R>(&self, index: u32, f: impl FnOnce(&ChunkSlot<T>) -> R) -> R {
        f(&self.inner.lock().slots[index as usize])
    }

    fn with_slot_mut<R>(&self, index: u32, f: impl FnOnce(&mut ChunkSlot<T>) -> R) -> R {
        f(&mut self.inner.lock().slots[index as usize])
    }
}

/// Chunked LIFO container. Push/pop are amortized O(1); `merge` absorbs
/// another stack's contents in O(1) chunks plus at most one chunk's worth of
/// element moves (to keep the destination's tail chunk full), matching the
/// unordered merge the original `SmartStack::UnorderedMerge` performs.
pub struct ChunkStack<'p, T: Copy> {
    pool: &'p ChunkPool<T>,
    first_chunk: u32,
    last_chunk: u32,
    num_chunks: u32,
    len: usize,
}

impl<'p, T: Copy> ChunkStack<'p, T> {
    pub fn new(pool: &'p ChunkPool<T>) -> Self {
        ChunkStack { pool, first_chunk: NULL_CHUNK, last_chunk: NULL_CHUNK, num_chunks: 0, len: 0 }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    fn elements_per_chunk(&self) -> usize {
        self.pool.elements_per_chunk
    }

    fn allocate_next_chunk(&mut self) -> Result<(), Error> {
        let new_chunk = self.pool.allocate()?;
        if self.last_chunk != NULL_CHUNK {
            self.pool.with_slot_mut(self.last_chunk, |s| s.next = new_chunk);
            self.pool.with_slot_mut(new_chunk, |s| s.previous = self.last_chunk);
            self.last_chunk = new_chunk;
        } else {
            self.first_chunk = new_chunk;
            self.last_chunk = new_chunk;
        }
        self.num_chunks += 1;
        Ok(())
    }

    fn release_last_chunk(&mut self) {
        let released = self.last_chunk;
        let prev = self.pool.with_slot(released, |s| s.previous);
        self.pool.release(released);
        self.num_chunks -= 1;
        self.last_chunk = prev;
        if prev != NULL_CHUNK {
            self.pool.with_slot_mut(prev, |s| s.next = NULL_CHUNK);
        } else {
            self.first_chunk = NULL_CHUNK;
        }
    }

    /// Push one value, allocating a fresh chunk from the pool when the tail
    /// chunk is full. Fails only if the pool itself is exhausted.
    pub fn push_back(&mut self, value: T) -> Result<(), Error> {
        let full = self.last_chunk == NULL_CHUNK
            || self.pool.with_slot(self.last_chunk, |s| s.items.len() == self.elements_per_chunk());
        if full {
            self.allocate_next_chunk()?;
        }
        self.pool.with_slot_mut(self.last_chunk, |s| s.items.push(value));
        self.len += 1;
        Ok(())
    }

    pub fn pop_back(&mut self) -> Option<T> {
        if self.is_empty() {
            return None;
        }
        let value = self.pool.with_slot_mut(self.last_chunk, |s| s.items.pop());
        self.len -= 1;
        let now_empty = self.pool.with_slot(self.last_chunk, |s| s.items.is_empty());
        if now_empty {
            self.release_last_chunk();
        }
        value
    }

    pub fn back(&self) -> Option<T> {
        if self.is_empty() {
            return None;
        }
        self.pool.with_slot(self.last_chunk, |s| s.items.last().copied())
    }

    pub fn clear(&mut self) {
        while self.pop_back().is_some() {}
    }

    pub fn iter(&self) -> Iter<'_, 'p, T> {
        Iter { stack: self, chunk: self.first_chunk, idx: 0 }
    }

    /// Absorb `other`'s contents into `self` without regard for order,
    /// moving at most one chunk's worth of elements and splicing the rest of
    /// the chunk chain in place. `other` is left empty.
    pub fn merge(&mut self, other: &mut Self) {
        let other_len = other.len;
        if other_len == 0 {
            return;
        }
        if self.is_empty() {
            self.first_chunk = other.first_chunk;
            self.last_chunk = other.last_chunk;
            self.num_chunks = other.num_chunks;
        } else {
            let elems_per_chunk = self.elements_per_chunk();
            let dst_last_len = self.pool.with_slot(self.last_chunk, |s| s.items.len());
            let src_last_len = self.pool.with_slot(other.last_chunk, |s| s.items.len());
            let free_in_dst = elems_per_chunk - dst_last_len;
            let num_to_move = free_in_dst.min(src_last_len);

            if num_to_move > 0 {
                let moved: Vec<T> = self
                    .pool
                    .with_slot_mut(other.last_chunk, |s| s.items.split_off(src_last_len - num_to_move));
                self.pool.with_slot_mut(self.last_chunk, |s| s.items.extend_from_slice(&moved));

                if src_last_len - num_to_move == 0 {
                    let released = other.last_chunk;
                    let prev = self.pool.with_slot(released, |s| s.previous);
                    self.pool.release(released);
                    other.num_chunks -= 1;
                    other.last_chunk = prev;
                    if prev != NULL_CHUNK {
                        self.pool.with_slot_mut(prev, |s| s.next = NULL_CHUNK);
                    } else {
                        other.first_chunk = NULL_CHUNK;
                    }
                }
            }

            if other.num_chunks > 0 {
                let dst_last_full = self.pool.with_slot(self.last_chunk, |s| s.items.len() == elems_per_chunk);
                if dst_last_full {
                    self.pool.with_slot_mut(self.last_chunk, |s| s.next = other.first_chunk);
                    self.pool.with_slot_mut(other.first_chunk, |s| s.previous = self.last_chunk);
                    self.last_chunk = other.last_chunk;
                } else {
                    self.pool.with_slot_mut(other.last_chunk, |s| s.next = self.first_chunk);
                    self.pool.with_slot_mut(self.first_chunk, |s| s.previous = other.last_chunk);
                    self.first_chunk = other.first_chunk;
                }
                self.num_chunks += other.num_chunks;
            }
        }
        self.len += other_len;
        other.first_chunk = NULL_CHUNK;
        other.last_chunk = NULL_CHUNK;
        other.num_chunks = 0;
        other.len = 0;
    }
}

pub struct Iter<'s, 'p, T: Copy> {
    stack: &'s ChunkStack<'p, T>,
    chunk: u32,
    idx: usize,
}

impl<'s, 'p, T: Copy> Iterator for Iter<'s, 'p, T> {
    type Item = T;

    fn next(&mut self) -> Option<T> {
        if self.chunk == NULL_CHUNK {
            return None;
        }
        let (value, next_chunk, chunk_len) = self.stack.pool.with_slot(self.chunk, |s| {
            (s.items.get(self.idx).copied(), s.next, s.items.len())
        });
        let value = value?;
        self.idx += 1;
        if self.idx >= chunk_len {
            self.chunk = next_chunk;
            self.idx = 0;
        }
        Some(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn push_pop_is_lifo() {
        let pool = ChunkPool::<usize>::new(8);
        let mut stack = ChunkStack::new(&pool);
        for i in 0..5 {
            stack.push_back(i).unwrap();
        }
        assert_eq!(stack.len(), 5);
        let mut popped = Vec::new();
        while let Some(v) = stack.pop_back() {
            popped.push(v);
        }
        assert_eq!(popped, vec![4, 3, 2, 1, 0]);
        assert!(stack.is_empty());
    }

    #[test]
    fn spans_multiple_chunks() {
        let pool = ChunkPool::<usize>::new(64);
        let elements_per_chunk = pool.elements_per_chunk;
        let mut stack = ChunkStack::new(&pool);
        let total = elements_per_chunk * 3 + 1;
        for i in 0..total {
            stack.push_back(i).unwrap();
        }
        assert_eq!(stack.len(), total);
        let collected: Vec<usize> = stack.iter().collect();
        assert_eq!(collected.len(), total);
        assert_eq!(collected, (0..total).collect::<Vec<_>>());
    }

    #[test]
    fn merge_is_unordered_but_complete() {
        let pool = ChunkPool::<usize>::new(64);
        let mut a = ChunkStack::new(&pool);
        let mut b = ChunkStack::new(&pool);
        for i in 0..10 {
            a.push_back(i).unwrap();
        }
        for i in 10..17 {
            b.push_back(i).unwrap();
        }
        a.merge(&mut b);
        assert!(b.is_empty());
        assert_eq!(a.len(), 17);
        let mut collected: Vec<usize> = a.iter().collect();
        collected.sort_unstable();
        assert_eq!(collected, (0..17).collect::<Vec<_>>());
    }

    #[test]
    fn merge_into_empty_adopts_other() {
        let pool = ChunkPool::<usize>::new(8);
        let mut a = ChunkStack::new(&pool);
        let mut b = ChunkStack::new(&pool);
        b.push_back(1).unwrap();
        b.push_back(2).unwrap();
        a.merge(&mut b);
        assert_eq!(a.len(), 2);
        assert!(b.is_empty());
    }

    #[test]
    fn pool_exhaustion_is_reported() {
        let pool = ChunkPool::<usize>::new(1);
        let elements_per_chunk = pool.elements_per_chunk;
        let mut a = ChunkStack::new(&pool);
        let mut b = ChunkStack::new(&pool);
        for i in 0..elements_per_chunk {
            a.push_back(i).unwrap();
        }
        // `a` holds the pool's one chunk; `b` has none to allocate.
        assert!(b.push_back(0).is_err());
    }
}
