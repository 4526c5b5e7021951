//! Region Module - region-managed object placement
//!
//! The collaborator behind plain objects:
//! - [`create_object`] places an object in the calling thread's ambient region
//! - [`create_fresh_region`] starts a new region with the object as its root
//! - [`region_of`] looks a live region up by its root
//! - [`release_region`] finalises and destroys a region and its sub-regions

pub mod context;
pub mod isolated;

pub use context::{RegionContext, RegionGuard};
pub use isolated::{Region, RegionKind};

use crate::error::{Result, VobjectError};
use crate::object::{ObjectDescriptor, ObjectRef, ObjectStack};
use indexmap::IndexMap;
use parking_lot::Mutex;
use std::sync::Arc;

lazy_static::lazy_static! {
    /// Live regions keyed by root object
    static ref REGIONS: Mutex<IndexMap<ObjectRef, Arc<Region>>> = Mutex::new(IndexMap::new());
}

/// Allocate an object described by `descriptor` in the ambient region
///
/// # Returns
/// * `Err(VobjectError::NoOpenRegion)` - no region is open on this thread
/// * `Err(VobjectError::RegionReleased)` - the ambient region was released
/// * `Err(VobjectError::OutOfMemory)` - the region's arena is exhausted
pub fn create_object(descriptor: &'static ObjectDescriptor) -> Result<ObjectRef> {
    create_object_with(descriptor, |_| {})
}

/// Allocate an object in the ambient region and construct it with `init`
///
/// See [`Region::allocate_with`].
pub fn create_object_with<F>(descriptor: &'static ObjectDescriptor, init: F) -> Result<ObjectRef>
where
    F: FnOnce(ObjectRef),
{
    let region = RegionContext::current().ok_or(VobjectError::NoOpenRegion)?;
    region.allocate_with(descriptor, init)
}

/// Create a region of `kind` rooted at a new object described by `descriptor`
///
/// Returns the root. The region is live until [`release_region`].
pub fn create_fresh_region(
    kind: RegionKind,
    descriptor: &'static ObjectDescriptor,
) -> Result<ObjectRef> {
    create_fresh_region_with(kind, descriptor, |_| {})
}

/// Create a region whose root is constructed by `init` before it goes live
pub fn create_fresh_region_with<F>(
    kind: RegionKind,
    descriptor: &'static ObjectDescriptor,
    init: F,
) -> Result<ObjectRef>
where
    F: FnOnce(ObjectRef),
{
    let region = Region::with_root_init(kind, descriptor, init)?;
    let root = region.root();

    log::debug!(
        "Created {} region {} rooted at {:?} ({})",
        kind,
        region.id(),
        root,
        descriptor.type_name()
    );

    REGIONS.lock().insert(root, Arc::new(region));
    Ok(root)
}

/// The live region rooted at `root`
pub fn region_of(root: ObjectRef) -> Option<Arc<Region>> {
    REGIONS.lock().get(&root).cloned()
}

/// Number of live regions
pub fn live_regions() -> usize {
    REGIONS.lock().len()
}

/// Release the region rooted at `root`
///
/// Every member is finalised, then destroyed, exactly once. Sub-regions
/// reported by finalisers are released the same way. Payloads of released
/// objects must not be used afterwards. Their headers stay readable, carry
/// the destroyed flag, and their addresses are never reused.
///
/// Returns the number of regions released.
pub fn release_region(root: ObjectRef) -> Result<usize> {
    let region = REGIONS
        .lock()
        .shift_remove(&root)
        .ok_or(VobjectError::UnknownRegion { root: root.addr() })?;

    let mut worklist = vec![region];
    let mut released = 0;

    while let Some(region) = worklist.pop() {
        let mut sub_regions = ObjectStack::new();

        // SAFETY: members were constructed by the adapters before becoming
        // reachable, and the region left the table so no one can open it.
        if unsafe { region.teardown(&mut sub_regions) } {
            released += 1;
        }

        for sub in sub_regions.drain() {
            match REGIONS.lock().shift_remove(&sub) {
                Some(sub_region) => worklist.push(sub_region),
                None => log::warn!("Sub-region {:?} is not live", sub),
            }
        }
    }

    Ok(released)
}
