//! Region Context - the ambient region of the calling thread
//!
//! Plain allocations go to the region on top of a per-thread stack. Opening
//! a region pushes it and returns a guard; dropping the guard pops it.
//!
//! ```rust
//! use vobject::region::{region_of, RegionContext, RegionKind};
//! use vobject::{allocate_plain, allocate_region_root, managed};
//!
//! struct Cell(u32);
//! managed!(Cell);
//!
//! let root = allocate_region_root(RegionKind::Trace, Cell(0)).unwrap();
//! let region = region_of(root.as_object()).unwrap();
//!
//! {
//!     let _guard = RegionContext::open(&region);
//!     let cell = allocate_plain(Cell(1)).unwrap();
//!     assert!(region.contains(cell.as_object()));
//! }
//! assert!(allocate_plain(Cell(2)).is_err());
//! ```

use crate::error::{Result, VobjectError};
use crate::object::ObjectRef;
use crate::region::isolated::Region;
use std::cell::RefCell;
use std::marker::PhantomData;
use std::sync::Arc;

thread_local! {
    static OPEN_REGIONS: RefCell<Vec<Arc<Region>>> = const { RefCell::new(Vec::new()) };
}

/// Access to the calling thread's region stack
pub struct RegionContext;

impl RegionContext {
    /// Make `region` the ambient region until the guard drops
    pub fn open(region: &Arc<Region>) -> RegionGuard {
        let depth = OPEN_REGIONS.with(|stack| {
            let mut stack = stack.borrow_mut();
            stack.push(Arc::clone(region));
            stack.len()
        });

        log::trace!("Opened region {} at depth {}", region.id(), depth);

        RegionGuard {
            region: Arc::clone(region),
            depth,
            _not_send: PhantomData,
        }
    }

    /// Open the live region rooted at `root`
    pub fn open_root(root: ObjectRef) -> Result<RegionGuard> {
        let region = crate::region::region_of(root)
            .ok_or(VobjectError::UnknownRegion { root: root.addr() })?;
        Ok(Self::open(&region))
    }

    /// The ambient region, if one is open
    pub fn current() -> Option<Arc<Region>> {
        OPEN_REGIONS.with(|stack| stack.borrow().last().cloned())
    }

    /// Number of regions open on this thread
    pub fn depth() -> usize {
        OPEN_REGIONS.with(|stack| stack.borrow().len())
    }
}

/// Keeps a region open on the current thread
///
/// Guards must be dropped in reverse order of opening.
#[must_use = "the region closes when the guard is dropped"]
pub struct RegionGuard {
    region: Arc<Region>,
    depth: usize,
    _not_send: PhantomData<*const ()>,
}

impl RegionGuard {
    pub fn region(&self) -> &Arc<Region> {
        &self.region
    }
}

impl Drop for RegionGuard {
    fn drop(&mut self) {
        OPEN_REGIONS.with(|stack| {
            let mut stack = stack.borrow_mut();
            debug_assert_eq!(stack.len(), self.depth, "region guards dropped out of order");
            if let Some(top) = stack.pop() {
                debug_assert!(Arc::ptr_eq(&top, &self.region));
            }
        });
    }
}
