//! Util Module - Shared Utilities

pub mod alignment;
pub mod page;

pub use alignment::Alignment;
pub use page::{align_to_page, is_page_aligned, page_size};

/// Size and alignment constants
pub mod constants {
    /// 1 Kilobyte
    pub const KB: usize = 1024;
    /// 1 Megabyte
    pub const MB: usize = 1024 * 1024;

    /// Alignment of every managed allocation: 16 bytes
    pub const OBJECT_ALIGNMENT: usize = 16;
}
