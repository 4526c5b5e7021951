//! Adapter Module - typed allocation entry points
//!
//! Plain objects live in regions; owners are shared across threads.

pub mod owner;
pub mod plain;

pub use owner::{
    allocate_owner, allocate_owner_with_allocator, allocate_owner_with_capacity, Owner,
    OwnerGuard,
};
pub use plain::{allocate_plain, allocate_region_root, Obj};
