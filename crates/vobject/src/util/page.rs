//! Page Utilities
//!
//! Backing chunks are whole pages of anonymous memory, so chunk sizes are
//! rounded to the system page size.

use crate::util::Alignment;
use std::sync::atomic::{AtomicUsize, Ordering};

/// System page size (cached)
static SYSTEM_PAGE_SIZE: AtomicUsize = AtomicUsize::new(0);

/// Get system page size
///
/// Queried from the OS once and cached.
pub fn page_size() -> usize {
    let cached = SYSTEM_PAGE_SIZE.load(Ordering::Relaxed);
    if cached != 0 {
        return cached;
    }

    let size = page_size::get();
    SYSTEM_PAGE_SIZE.store(size, Ordering::Relaxed);
    size
}

/// Round `size` up to a whole number of pages, `None` on overflow
#[inline]
pub fn align_to_page(size: usize) -> Option<usize> {
    Alignment::checked_align_up(size, page_size())
}

/// Check if address is page-aligned
#[inline]
pub fn is_page_aligned(addr: usize) -> bool {
    Alignment::is_aligned(addr, page_size())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_size_is_power_of_two() {
        let size = page_size();
        assert!(size.is_power_of_two());
        assert_eq!(page_size(), size);
    }

    #[test]
    fn test_align_to_page() {
        let page = page_size();
        assert_eq!(align_to_page(1), Some(page));
        assert_eq!(align_to_page(page), Some(page));
        assert_eq!(align_to_page(page + 1), Some(2 * page));
        assert_eq!(align_to_page(usize::MAX), None);
        assert!(is_page_aligned(3 * page));
        assert!(!is_page_aligned(page + 16));
    }
}
