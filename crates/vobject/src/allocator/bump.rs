//! Allocator Submodule - Bump Pointer Allocation
//!
//! Bump pointer allocator is the fastest allocation technique.
//! Allocation only requires a single atomic increment operation.

use crate::error::{Result, VobjectError};
use std::sync::atomic::{AtomicUsize, Ordering};

/// BumpPointerAllocator - fast bump pointer allocator over `[start, end)`
pub struct BumpPointerAllocator {
    start: usize,
    top: AtomicUsize,
    end: usize,
    alignment: usize,
}

impl BumpPointerAllocator {
    pub fn new(start: usize, end: usize, alignment: usize) -> Result<Self> {
        if start >= end {
            return Err(VobjectError::InvalidArgument(format!(
                "start ({:#x}) must be less than end ({:#x})",
                start, end
            )));
        }
        if !alignment.is_power_of_two() {
            return Err(VobjectError::InvalidArgument(format!(
                "alignment ({}) must be a power of two",
                alignment
            )));
        }
        if start % alignment != 0 {
            return Err(VobjectError::InvalidArgument(format!(
                "start ({:#x}) must be aligned to {}",
                start, alignment
            )));
        }

        Ok(Self {
            start,
            top: AtomicUsize::new(start),
            end,
            alignment,
        })
    }

    /// Allocate `size` bytes, returning the start address
    pub fn allocate(&self, size: usize) -> Result<usize> {
        if size == 0 {
            return Err(VobjectError::InvalidArgument(
                "allocation size must be non-zero".to_string(),
            ));
        }

        let aligned_size = self.align_size(size)?;
        let mut current_top = self.top.load(Ordering::Relaxed);

        loop {
            let new_top = self.new_top(current_top, aligned_size, size)?;

            match self.top.compare_exchange_weak(
                current_top,
                new_top,
                Ordering::AcqRel,
                Ordering::Relaxed,
            ) {
                Ok(_) => return Ok(current_top),
                Err(actual) => current_top = actual,
            }
        }
    }

    fn new_top(
        &self,
        current_top: usize,
        aligned_size: usize,
        requested_size: usize,
    ) -> Result<usize> {
        let new_top = current_top
            .checked_add(aligned_size)
            .ok_or(VobjectError::OutOfMemory {
                requested: requested_size,
                available: 0,
            })?;

        if new_top > self.end {
            return Err(VobjectError::OutOfMemory {
                requested: requested_size,
                available: self.end.saturating_sub(current_top),
            });
        }

        Ok(new_top)
    }

    fn align_size(&self, size: usize) -> Result<usize> {
        let mask = self.alignment - 1;
        size.checked_add(mask)
            .map(|s| s & !mask)
            .ok_or(VobjectError::OutOfMemory {
                requested: size,
                available: 0,
            })
    }

    pub fn remaining(&self) -> usize {
        self.end - self.top.load(Ordering::Relaxed)
    }

    pub fn capacity(&self) -> usize {
        self.end - self.start
    }

    pub fn allocated(&self) -> usize {
        self.top.load(Ordering::Relaxed) - self.start
    }

    pub fn has_space(&self, size: usize) -> bool {
        self.align_size(size)
            .map(|aligned| aligned <= self.remaining())
            .unwrap_or(false)
    }
}
