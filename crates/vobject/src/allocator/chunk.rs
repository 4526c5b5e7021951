//! Chunk - owned block of zero-filled memory
//!
//! Every allocator in this crate hands out memory carved from chunks.
//! A chunk is an anonymous memory mapping: page-aligned and zero-filled by
//! the OS. Chunk bytes are never reused, so memory returned by an allocator
//! always reads as zero: reference fields are null until the payload is
//! written.

use crate::error::{Result, VobjectError};
use crate::util::page;
use memmap2::{MmapMut, MmapOptions};

/// Owned, zero-filled, page-aligned memory block
pub struct Chunk {
    mmap: MmapMut,
}

impl Chunk {
    /// Map a chunk of at least `size` bytes
    ///
    /// The size is rounded up to the page size.
    ///
    /// # Returns
    /// * `Err(VobjectError::InvalidArgument)` - `size` is zero
    /// * `Err(VobjectError::OutOfMemory)` - the mapping could not be created
    pub fn new(size: usize) -> Result<Self> {
        if size == 0 {
            return Err(VobjectError::InvalidArgument(
                "chunk size must be non-zero".to_string(),
            ));
        }

        let aligned_size = page::align_to_page(size).ok_or(VobjectError::OutOfMemory {
            requested: size,
            available: 0,
        })?;

        let mmap = MmapOptions::new()
            .len(aligned_size)
            .map_anon()
            .map_err(|e| {
                log::error!("Failed to map a {} byte chunk: {}", aligned_size, e);
                VobjectError::OutOfMemory {
                    requested: size,
                    available: 0,
                }
            })?;

        Ok(Self { mmap })
    }

    /// First address of the chunk
    #[inline]
    pub fn start(&self) -> usize {
        self.mmap.as_ptr() as usize
    }

    /// One past the last address of the chunk
    #[inline]
    pub fn end(&self) -> usize {
        self.start() + self.size()
    }

    #[inline]
    pub fn size(&self) -> usize {
        self.mmap.len()
    }

    /// Check if `addr` lies inside this chunk
    #[inline]
    pub fn contains(&self, addr: usize) -> bool {
        addr >= self.start() && addr < self.end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chunk_is_zeroed_and_aligned() {
        let size = 2 * page::page_size();
        let chunk = Chunk::new(size).unwrap();

        assert_eq!(chunk.size(), size);
        assert!(page::is_page_aligned(chunk.start()));
        let bytes = unsafe { std::slice::from_raw_parts(chunk.start() as *const u8, size) };
        assert!(bytes.iter().all(|&b| b == 0));
    }

    #[test]
    fn test_chunk_rounds_to_page() {
        let chunk = Chunk::new(100).unwrap();
        assert_eq!(chunk.size(), page::page_size());
    }

    #[test]
    fn test_chunk_zero_size_rejected() {
        assert!(matches!(
            Chunk::new(0),
            Err(VobjectError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_chunk_oversized_is_out_of_memory() {
        assert!(matches!(
            Chunk::new(usize::MAX - 16),
            Err(VobjectError::OutOfMemory { .. })
        ));
        assert!(matches!(
            Chunk::new(usize::MAX / 2),
            Err(VobjectError::OutOfMemory { .. })
        ));
    }

    #[test]
    fn test_contains() {
        let chunk = Chunk::new(4096).unwrap();
        assert!(chunk.contains(chunk.start()));
        assert!(chunk.contains(chunk.end() - 1));
        assert!(!chunk.contains(chunk.end()));
    }
}
