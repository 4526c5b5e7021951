//! TLAB - Thread-Local Allocation Buffer
//!
//! Owners allocated without an explicit allocator come from the calling
//! thread's TLAB, so the common case takes no lock.
//!
//! ## How it works
//!
//! 1. Thread requests a TLAB chunk from the [`TlabManager`]
//! 2. Thread bump-allocates from its own TLAB
//! 3. TLAB full: thread requests a new TLAB
//! 4. Thread exits: the TLAB is dropped, its chunk stays with the manager
//!
//! Objects outlive the thread that allocated them, so TLAB chunks are
//! retained by the manager for the rest of the process.

use crate::allocator::bump::BumpPointerAllocator;
use crate::allocator::chunk::Chunk;
use crate::error::Result;
use crate::util::constants::OBJECT_ALIGNMENT;
use parking_lot::Mutex;
use std::cell::RefCell;
use std::sync::atomic::{AtomicUsize, Ordering};

/// TLAB - private allocation buffer for a single thread
pub struct Tlab {
    allocator: BumpPointerAllocator,
    allocation_count: usize,
}

impl Tlab {
    fn new(chunk: &Chunk) -> Result<Self> {
        Ok(Self {
            allocator: BumpPointerAllocator::new(chunk.start(), chunk.end(), OBJECT_ALIGNMENT)?,
            allocation_count: 0,
        })
    }

    /// Allocate from TLAB
    ///
    /// Fast path: bump pointer increment. Fails when the TLAB is full.
    pub fn allocate(&mut self, size: usize) -> Result<usize> {
        let addr = self.allocator.allocate(size)?;
        self.allocation_count += 1;
        Ok(addr)
    }

    pub fn has_space(&self, size: usize) -> bool {
        self.allocator.has_space(size)
    }

    pub fn remaining(&self) -> usize {
        self.allocator.remaining()
    }

    pub fn allocation_count(&self) -> usize {
        self.allocation_count
    }
}

/// TLAB Manager - hands out TLAB chunks and keeps them alive
pub struct TlabManager {
    chunks: Mutex<Vec<Chunk>>,
    refill_count: AtomicUsize,
    reserved: AtomicUsize,
}

impl TlabManager {
    pub fn new() -> Self {
        Self {
            chunks: Mutex::new(Vec::new()),
            refill_count: AtomicUsize::new(0),
            reserved: AtomicUsize::new(0),
        }
    }

    /// Create a fresh TLAB of at least `size` bytes
    pub fn refill(&self, size: usize) -> Result<Tlab> {
        let chunk = Chunk::new(size)?;
        let tlab = Tlab::new(&chunk)?;
        let reserved = chunk.size();

        self.chunks.lock().push(chunk);
        self.reserved.fetch_add(reserved, Ordering::Relaxed);
        let refills = self.refill_count.fetch_add(1, Ordering::Relaxed) + 1;

        log::debug!(
            "TLAB refill #{} on {:?}: {} bytes",
            refills,
            std::thread::current().id(),
            reserved
        );

        Ok(tlab)
    }

    /// Allocate `size` bytes from the calling thread's TLAB
    ///
    /// `size` must not exceed `tlab_size`.
    pub fn allocate(&self, size: usize, tlab_size: usize) -> Result<usize> {
        debug_assert!(size <= tlab_size);

        CURRENT_TLAB.with(|slot| {
            let mut slot = slot.borrow_mut();

            if let Some(tlab) = slot.as_mut() {
                if tlab.has_space(size) {
                    return tlab.allocate(size);
                }
                log::trace!(
                    "Retiring TLAB after {} allocations, {} bytes unused",
                    tlab.allocation_count(),
                    tlab.remaining()
                );
            }

            let mut tlab = self.refill(tlab_size)?;
            let addr = tlab.allocate(size)?;
            *slot = Some(tlab);
            Ok(addr)
        })
    }

    pub fn total_refills(&self) -> usize {
        self.refill_count.load(Ordering::Relaxed)
    }

    /// Bytes reserved for TLABs so far
    pub fn reserved(&self) -> usize {
        self.reserved.load(Ordering::Relaxed)
    }
}

impl Default for TlabManager {
    fn default() -> Self {
        Self::new()
    }
}

thread_local! {
    static CURRENT_TLAB: RefCell<Option<Tlab>> = const { RefCell::new(None) };
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::util::page;

    #[test]
    fn test_first_allocation_refills() {
        let manager = TlabManager::new();
        let tlab_size = page::page_size();
        std::thread::spawn(move || {
            let addr = manager.allocate(64, tlab_size).unwrap();

            assert_eq!(addr % OBJECT_ALIGNMENT, 0);
            assert_eq!(manager.total_refills(), 1);
            assert_eq!(manager.reserved(), tlab_size);
        })
        .join()
        .unwrap();
    }

    #[test]
    fn test_full_tlab_refills() {
        let manager = TlabManager::new();
        let tlab_size = page::page_size();
        let size = tlab_size / 2 + 512;
        std::thread::spawn(move || {
            let a = manager.allocate(size, tlab_size).unwrap();
            let b = manager.allocate(size, tlab_size).unwrap();

            assert_ne!(a, b);
            assert_eq!(manager.total_refills(), 2);
            assert_eq!(manager.reserved(), 2 * tlab_size);
        })
        .join()
        .unwrap();
    }

    #[test]
    fn test_tlab_allocation_count() {
        let chunk = Chunk::new(page::page_size()).unwrap();
        let mut tlab = Tlab::new(&chunk).unwrap();

        tlab.allocate(16).unwrap();
        tlab.allocate(32).unwrap();
        assert_eq!(tlab.allocation_count(), 2);
        assert_eq!(tlab.remaining(), chunk.size() - 48);
    }
}
