//! Arena - explicit chunked bump allocator
//!
//! An arena is an allocator the caller names explicitly. It grows by
//! whole chunks and can be given a capacity; requests beyond the capacity
//! fail with `OutOfMemory` instead of growing. Regions keep their members
//! in an arena of their own.
//!
//! Memory handed out stays valid until the arena is dropped.

use crate::allocator::bump::BumpPointerAllocator;
use crate::allocator::chunk::Chunk;
use crate::allocator::Allocate;
use crate::config;
use crate::error::{Result, VobjectError};
use crate::util::constants::OBJECT_ALIGNMENT;
use crate::util::{page_size, Alignment};
use parking_lot::Mutex;
use std::ptr::NonNull;

struct ArenaState {
    chunks: Vec<Chunk>,
    current: Option<BumpPointerAllocator>,
    reserved: usize,
    allocated: usize,
}

/// Chunked bump allocator with an optional capacity
///
/// # Examples
///
/// ```rust
/// use vobject::{Allocate, Arena};
///
/// let arena = Arena::bounded(4096, 64);
/// assert!(arena.allocate(48).is_ok());
/// assert!(arena.allocate(32).is_err());
/// ```
pub struct Arena {
    chunk_size: usize,
    capacity: Option<usize>,
    state: Mutex<ArenaState>,
}

impl Arena {
    /// Create an unbounded arena using the configured chunk size
    pub fn new() -> Self {
        Self::with_chunk_size(config::current().arena_chunk_size)
    }

    /// Create an unbounded arena growing by `chunk_size` bytes
    pub fn with_chunk_size(chunk_size: usize) -> Self {
        Self::build(chunk_size, None)
    }

    /// Create an arena that hands out at most `capacity` bytes
    pub fn bounded(chunk_size: usize, capacity: usize) -> Self {
        Self::build(chunk_size, Some(capacity))
    }

    fn build(chunk_size: usize, capacity: Option<usize>) -> Self {
        Self {
            chunk_size: chunk_size.max(page_size()),
            capacity,
            state: Mutex::new(ArenaState {
                chunks: Vec::new(),
                current: None,
                reserved: 0,
                allocated: 0,
            }),
        }
    }

    /// Allocate `size` bytes, returning the address
    ///
    /// Addresses are aligned to `OBJECT_ALIGNMENT`; each request is
    /// accounted at its aligned size.
    pub fn allocate_addr(&self, size: usize) -> Result<usize> {
        if size == 0 {
            return Err(VobjectError::InvalidArgument(
                "allocation size must be non-zero".to_string(),
            ));
        }

        let aligned = Alignment::checked_align_up(size, OBJECT_ALIGNMENT).ok_or(
            VobjectError::OutOfMemory {
                requested: size,
                available: 0,
            },
        )?;

        let mut guard = self.state.lock();
        let state = &mut *guard;

        if let Some(capacity) = self.capacity {
            let available = capacity.saturating_sub(state.allocated);
            if aligned > available {
                log::warn!(
                    "Arena capacity exhausted: requested {} bytes, {} available",
                    size,
                    available
                );
                return Err(VobjectError::OutOfMemory {
                    requested: size,
                    available,
                });
            }
        }

        if let Some(current) = &state.current {
            if current.has_space(aligned) {
                let addr = current.allocate(aligned)?;
                state.allocated += aligned;
                return Ok(addr);
            }
        }

        let chunk = Chunk::new(aligned.max(self.chunk_size))?;
        let bump = BumpPointerAllocator::new(chunk.start(), chunk.end(), OBJECT_ALIGNMENT)?;
        let addr = bump.allocate(aligned)?;

        state.reserved += chunk.size();
        state.chunks.push(chunk);
        state.current = Some(bump);
        state.allocated += aligned;

        Ok(addr)
    }

    /// Bytes handed out so far
    pub fn allocated(&self) -> usize {
        self.state.lock().allocated
    }

    /// Bytes reserved from the system
    pub fn reserved(&self) -> usize {
        self.state.lock().reserved
    }

    pub fn chunk_count(&self) -> usize {
        self.state.lock().chunks.len()
    }

    pub fn capacity(&self) -> Option<usize> {
        self.capacity
    }

    /// Give up every chunk, leaving the arena empty
    ///
    /// Addresses handed out so far stay valid for as long as the returned
    /// chunks live.
    pub(crate) fn take_chunks(&self) -> Vec<Chunk> {
        let mut state = self.state.lock();
        state.current = None;
        state.reserved = 0;
        std::mem::take(&mut state.chunks)
    }

    /// Check if `addr` lies inside memory owned by this arena
    pub fn contains(&self, addr: usize) -> bool {
        self.state
            .lock()
            .chunks
            .iter()
            .any(|chunk| chunk.contains(addr))
    }
}

impl Default for Arena {
    fn default() -> Self {
        Self::new()
    }
}

impl Allocate for Arena {
    fn allocate(&self, size: usize) -> Result<NonNull<u8>> {
        let addr = self.allocate_addr(size)?;
        NonNull::new(addr as *mut u8)
            .ok_or_else(|| VobjectError::Internal("arena returned a null address".to_string()))
    }
}
