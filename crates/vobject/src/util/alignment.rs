//! Alignment Utilities
//!
//! Helper functions for memory alignment.

/// Alignment - utility for alignment operations
pub struct Alignment;

impl Alignment {
    /// Align value up to boundary
    ///
    /// # Examples
    /// ```
    /// use vobject::util::Alignment;
    ///
    /// assert_eq!(Alignment::align_up(100, 8), 104);
    /// assert_eq!(Alignment::align_up(64, 8), 64);
    /// ```
    #[inline]
    pub const fn align_up(value: usize, alignment: usize) -> usize {
        (value + alignment - 1) & !(alignment - 1)
    }

    /// Align value up to boundary, `None` on overflow
    #[inline]
    pub const fn checked_align_up(value: usize, alignment: usize) -> Option<usize> {
        match value.checked_add(alignment - 1) {
            Some(v) => Some(v & !(alignment - 1)),
            None => None,
        }
    }

    /// Check if value is aligned
    #[inline]
    pub const fn is_aligned(value: usize, alignment: usize) -> bool {
        value & (alignment - 1) == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_align_up() {
        assert_eq!(Alignment::align_up(0, 16), 0);
        assert_eq!(Alignment::align_up(1, 16), 16);
        assert_eq!(Alignment::align_up(17, 16), 32);
        assert_eq!(Alignment::align_up(24, 8), 24);
    }

    #[test]
    fn test_checked_align_up_overflow() {
        assert_eq!(Alignment::checked_align_up(usize::MAX, 16), None);
        assert_eq!(Alignment::checked_align_up(30, 16), Some(32));
    }

    #[test]
    fn test_is_aligned() {
        assert!(Alignment::is_aligned(48, 16));
        assert!(!Alignment::is_aligned(40, 16));
    }
}
