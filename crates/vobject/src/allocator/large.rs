//! Large Object Allocator
//!
//! Thread-local requests above `large_threshold` would waste most of a
//! TLAB, so each gets a dedicated chunk instead. Oversized owners carrying
//! a big trailing payload land here.

use crate::allocator::chunk::Chunk;
use crate::error::Result;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

/// LargeObjectAllocator - one chunk per object, kept for the process lifetime
pub struct LargeObjectAllocator {
    chunks: Mutex<Vec<Chunk>>,
    total_allocated: AtomicUsize,
    object_count: AtomicUsize,
}

impl LargeObjectAllocator {
    pub fn new() -> Self {
        Self {
            chunks: Mutex::new(Vec::new()),
            total_allocated: AtomicUsize::new(0),
            object_count: AtomicUsize::new(0),
        }
    }

    /// Allocate a dedicated chunk of at least `size` bytes
    pub fn allocate(&self, size: usize) -> Result<usize> {
        let chunk = Chunk::new(size)?;
        let addr = chunk.start();
        let chunk_size = chunk.size();

        self.chunks.lock().push(chunk);
        self.total_allocated.fetch_add(chunk_size, Ordering::Relaxed);
        self.object_count.fetch_add(1, Ordering::Relaxed);

        log::debug!("Large allocation of {} bytes at {:#x}", size, addr);
        Ok(addr)
    }

    pub fn total_allocated(&self) -> usize {
        self.total_allocated.load(Ordering::Relaxed)
    }

    pub fn object_count(&self) -> usize {
        self.object_count.load(Ordering::Relaxed)
    }
}

impl Default for LargeObjectAllocator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::VobjectError;
    use crate::util::page;

    #[test]
    fn test_large_allocation_page_aligned() {
        let allocator = LargeObjectAllocator::new();
        let addr = allocator.allocate(10_000).unwrap();

        assert!(page::is_page_aligned(addr));
        assert_eq!(allocator.object_count(), 1);
        assert_eq!(
            allocator.total_allocated(),
            page::align_to_page(10_000).unwrap()
        );
    }

    #[test]
    fn test_impossible_size_fails() {
        let allocator = LargeObjectAllocator::new();
        assert!(matches!(
            allocator.allocate(usize::MAX),
            Err(VobjectError::OutOfMemory { .. })
        ));
        assert_eq!(allocator.object_count(), 0);
    }
}
