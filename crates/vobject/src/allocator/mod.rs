//! Allocator Module - memory sources for managed objects
//!
//! This module provides the raw-memory side of the runtime:
//! - Thread-local allocation buffers (TLABs) for owners
//! - Large object allocation above `large_threshold`
//! - Explicit arenas implementing [`Allocate`]
//!
//! ## Allocation Strategy
//!
//! ```text
//! thread_local_allocate(size)
//!   ├── size <= large_threshold  ──>  calling thread's TLAB (no lock)
//!   └── size >  large_threshold  ──>  dedicated chunk
//!
//! explicit_allocate(allocator, size)  ──>  allocator.allocate(size)
//! ```
//!
//! Every allocator hands out zero-filled memory and never reuses it. Chunks
//! of torn-down regions are retired here and stay mapped for the process.

pub mod arena;
pub mod bump;
pub mod chunk;
pub mod large;
pub mod tlab;

pub use arena::Arena;
pub use bump::BumpPointerAllocator;
pub use chunk::Chunk;
pub use large::LargeObjectAllocator;
pub use tlab::{Tlab, TlabManager};

use crate::config;
use crate::error::{Result, VobjectError};
use parking_lot::Mutex;
use std::ptr::NonNull;
use std::sync::atomic::{AtomicUsize, Ordering};

/// A source of raw memory for managed objects
///
/// Implementations return zero-filled memory of at least `size` bytes,
/// aligned to `OBJECT_ALIGNMENT`, valid for as long as the allocator lives.
pub trait Allocate: Send + Sync {
    fn allocate(&self, size: usize) -> Result<NonNull<u8>>;
}

/// Process-wide thread-local allocation path
struct Heap {
    tlabs: TlabManager,
    large: LargeObjectAllocator,
    allocations: AtomicUsize,
    bytes_allocated: AtomicUsize,
    failures: AtomicUsize,
    retired: Mutex<Vec<Chunk>>,
    retired_bytes: AtomicUsize,
}

lazy_static::lazy_static! {
    static ref HEAP: Heap = Heap {
        tlabs: TlabManager::new(),
        large: LargeObjectAllocator::new(),
        allocations: AtomicUsize::new(0),
        bytes_allocated: AtomicUsize::new(0),
        failures: AtomicUsize::new(0),
        retired: Mutex::new(Vec::new()),
        retired_bytes: AtomicUsize::new(0),
    };
}

/// Allocate `size` bytes from the calling thread's allocator
///
/// Requests above the configured `large_threshold` get a dedicated chunk.
///
/// # Returns
/// * `Err(VobjectError::InvalidArgument)` - `size` is zero
/// * `Err(VobjectError::OutOfMemory)` - no memory could be obtained
pub fn thread_local_allocate(size: usize) -> Result<NonNull<u8>> {
    if size == 0 {
        return Err(VobjectError::InvalidArgument(
            "allocation size must be non-zero".to_string(),
        ));
    }

    let config = config::current();
    let result = if size > config.large_threshold {
        HEAP.large.allocate(size)
    } else {
        HEAP.tlabs.allocate(size, config.tlab_size)
    };

    let addr = match result {
        Ok(addr) => addr,
        Err(e) => {
            HEAP.failures.fetch_add(1, Ordering::Relaxed);
            log::warn!("Thread-local allocation of {} bytes failed: {}", size, e);
            return Err(e);
        },
    };

    HEAP.allocations.fetch_add(1, Ordering::Relaxed);
    HEAP.bytes_allocated.fetch_add(size, Ordering::Relaxed);
    if config.verbose {
        log::debug!("Thread-local allocation: {} bytes at {:#x}", size, addr);
    } else {
        log::trace!("Thread-local allocation: {} bytes at {:#x}", size, addr);
    }

    NonNull::new(addr as *mut u8)
        .ok_or_else(|| VobjectError::Internal("heap returned a null address".to_string()))
}

/// Allocate `size` bytes from a caller-supplied allocator
pub fn explicit_allocate<A: Allocate + ?Sized>(allocator: &A, size: usize) -> Result<NonNull<u8>> {
    allocator.allocate(size).inspect_err(|e| {
        log::warn!("Explicit allocation of {} bytes failed: {}", size, e);
    })
}

/// Keep `chunks` mapped for the rest of the process
///
/// Handles into released regions may outlive the region itself; their
/// headers must stay readable and their addresses must never be handed out
/// again.
pub(crate) fn retire(chunks: Vec<Chunk>) {
    if chunks.is_empty() {
        return;
    }

    let bytes: usize = chunks.iter().map(Chunk::size).sum();
    HEAP.retired_bytes.fetch_add(bytes, Ordering::Relaxed);
    log::trace!("Retiring {} chunks ({} bytes)", chunks.len(), bytes);
    HEAP.retired.lock().extend(chunks);
}

/// Snapshot of the thread-local allocation path
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AllocatorStats {
    /// Successful thread-local allocations
    pub allocations: usize,
    /// Bytes requested by successful thread-local allocations
    pub bytes_allocated: usize,
    /// Failed thread-local allocations
    pub failed_allocations: usize,
    /// TLABs created across all threads
    pub tlab_refills: usize,
    /// Bytes reserved for TLABs
    pub tlab_bytes: usize,
    /// Allocations served by the large object path
    pub large_objects: usize,
    /// Bytes reserved by the large object path
    pub large_bytes: usize,
    /// Bytes of region memory retired after release
    pub retired_bytes: usize,
}

/// Current allocation statistics
pub fn stats() -> AllocatorStats {
    AllocatorStats {
        allocations: HEAP.allocations.load(Ordering::Relaxed),
        bytes_allocated: HEAP.bytes_allocated.load(Ordering::Relaxed),
        failed_allocations: HEAP.failures.load(Ordering::Relaxed),
        tlab_refills: HEAP.tlabs.total_refills(),
        tlab_bytes: HEAP.tlabs.reserved(),
        large_objects: HEAP.large.object_count(),
        large_bytes: HEAP.large.total_allocated(),
        retired_bytes: HEAP.retired_bytes.load(Ordering::Relaxed),
    }
}
