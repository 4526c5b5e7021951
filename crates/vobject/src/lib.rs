//! # Vobject - Managed Object Model and Allocation Dispatch
//!
//! Vobject lets ordinary Rust value types live behind a runtime object
//! header, so that a tracing collector and a concurrent-ownership runtime
//! can operate on them without knowing their types.
//!
//! ## Overview
//!
//! - **Capabilities**: a type declares its optional lifecycle hooks with
//!   [`managed!`]; a missing or wrongly shaped hook fails the build
//! - **Descriptors**: one immutable callback table per (type, header)
//!   pair, built once on first use and shared for the rest of the process
//! - **Plain objects**: values placed in a region, or as the root of a new one
//! - **Owners**: values shared across threads, with at most one active
//!   invocation at a time
//!
//! ## Quick Start
//!
//! ```rust
//! use vobject::region::{release_region, RegionContext, RegionKind};
//! use vobject::{allocate_owner, allocate_plain, allocate_region_root, managed};
//! use vobject::{ObjectRef, ObjectStack, Trace};
//!
//! struct Node {
//!     value: u64,
//!     next: Option<ObjectRef>,
//! }
//!
//! impl Trace for Node {
//!     fn trace(&self, stack: &mut ObjectStack) {
//!         stack.push_opt(self.next);
//!     }
//! }
//!
//! managed!(Node: trace);
//!
//! fn main() -> Result<(), vobject::VobjectError> {
//!     // A region rooted at a Node
//!     let root = allocate_region_root(RegionKind::Trace, Node { value: 0, next: None })?;
//!
//!     // Allocate into it while it is open
//!     let guard = RegionContext::open_root(root.as_object())?;
//!     let child = allocate_plain(Node { value: 1, next: None })?;
//!     unsafe { root.get_mut().next = Some(child.as_object()) };
//!
//!     let mut stack = ObjectStack::new();
//!     unsafe { root.as_object().trace(&mut stack) };
//!     assert_eq!(stack.pop(), Some(child.as_object()));
//!
//!     drop(guard);
//!     release_region(root.as_object())?;
//!
//!     // An owner shared across threads
//!     let owner = allocate_owner(Node { value: 7, next: None })?;
//!     std::thread::spawn(move || {
//!         let node = owner.try_acquire().unwrap();
//!         assert_eq!(node.value, 7);
//!     })
//!     .join()
//!     .unwrap();
//!
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │                      Adapters                            │
//! │  allocate_plain   allocate_region_root   allocate_owner* │
//! └───────┬──────────────────┬──────────────────┬────────────┘
//!         │  descriptor_of::<T, H>()            │
//!         ▼                  ▼                  ▼
//! ┌───────────────┐  ┌───────────────┐  ┌──────────────────┐
//! │ RegionContext │  │ Region table  │  │ TLAB / large /   │
//! │ (ambient)     │  │ (by root)     │  │ explicit Arena   │
//! └───────┬───────┘  └───────┬───────┘  └────────┬─────────┘
//!         └────────── register_object ───────────┘
//! ```
//!
//! ## Safety
//!
//! Handles are addresses. A plain object is valid until its region is
//! released; an owner is valid for the rest of the process unless the
//! surrounding runtime destroys it. Descriptor callbacks are invoked
//! through `unsafe` methods on [`ObjectRef`] and must never run
//! concurrently on the same object.
//!
//! ## Modules
//!
//! - [`adapter`]: Typed allocation entry points
//! - [`allocator`]: Thread-local buffers, large objects and arenas
//! - [`config`]: Sizing parameters and validation
//! - [`error`]: Error types for all vobject operations
//! - [`object`]: Headers, capabilities and descriptors
//! - [`region`]: Regions, the ambient region and release
//! - [`util`]: Alignment helpers and constants

pub mod config;
pub mod error;

// Object model
pub mod object;

// Memory
pub mod allocator;
pub mod region;

// Entry points
pub mod adapter;

pub mod util;

pub use adapter::{
    allocate_owner, allocate_owner_with_allocator, allocate_owner_with_capacity, allocate_plain,
    allocate_region_root, Obj, Owner, OwnerGuard,
};
pub use allocator::{Allocate, Arena};
pub use config::RuntimeConfig;
pub use error::{Result, VobjectError};
pub use object::{
    descriptor_of, Finaliser, Managed, Notified, ObjectDescriptor, ObjectRef, ObjectStack, Trace,
};
pub use region::{Region, RegionContext, RegionKind};

/// Vobject version string from Cargo.toml
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Initialize vobject from the environment
///
/// Reads [`RuntimeConfig::from_env`] and installs it for the process.
/// Calling this is optional: the first allocation does the same lazily.
///
/// # Returns
///
/// - `Ok(())` - configuration installed
/// - `Err(VobjectError::Configuration)` - the environment holds invalid values
/// - `Err(VobjectError::AlreadyInitialized)` - a configuration is already in place
pub fn init() -> Result<()> {
    config::install(RuntimeConfig::from_env())
}

/// Initialize vobject with a custom configuration
///
/// # Examples
///
/// ```rust
/// let config = vobject::RuntimeConfig {
///     tlab_size: 64 * 1024,
///     large_threshold: 8 * 1024,
///     ..Default::default()
/// };
///
/// vobject::init_with_config(config)?;
/// assert_eq!(vobject::config::current().tlab_size, 64 * 1024);
/// # Ok::<(), vobject::VobjectError>(())
/// ```
pub fn init_with_config(config: RuntimeConfig) -> Result<()> {
    config::install(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_not_empty() {
        assert!(!VERSION.is_empty());
    }

    #[test]
    fn test_init_with_invalid_config() {
        let config = RuntimeConfig {
            tlab_size: 1,
            ..Default::default()
        };
        assert!(matches!(
            init_with_config(config),
            Err(VobjectError::Configuration(_))
        ));
    }

    #[test]
    fn test_second_init_fails() {
        // Either this call or an earlier lazy lookup installed the config.
        let _ = config::current();
        assert!(matches!(
            init_with_config(RuntimeConfig::default()),
            Err(VobjectError::AlreadyInitialized)
        ));
    }
}
