//! Plain Object Adapter - region-managed values
//!
//! Two entry points place a value behind an [`ObjectHeader`]:
//! - [`allocate_plain`] into the calling thread's ambient region
//! - [`allocate_region_root`] as the root of a brand-new region
//!
//! The value is constructed before memory is requested and written while
//! the region still holds its member lock, so nothing can fail or observe
//! the object between acquiring memory and writing the payload. There is no
//! deallocation entry point: members are torn down only when their region
//! is released.

use crate::error::Result;
use crate::object::{
    descriptor_of, Managed, ObjectDescriptor, ObjectHeader, ObjectLayout, ObjectRef,
};
use crate::region::{self, RegionKind};
use std::fmt;
use std::marker::PhantomData;

/// Typed handle to a region-managed object
///
/// A handle is an address: it stays usable while the object's region is
/// live. Handles are confined to the thread that allocated them.
pub struct Obj<T: Managed> {
    object: ObjectRef,
    _marker: PhantomData<*mut T>,
}

impl<T: Managed> Obj<T> {
    /// Storage footprint of `T` behind an object header
    pub const FOOTPRINT: usize = ObjectLayout::<T, ObjectHeader>::FOOTPRINT;

    /// Descriptor shared by every plain `T`
    #[inline]
    pub fn descriptor() -> &'static ObjectDescriptor {
        descriptor_of::<T, ObjectHeader>()
    }

    /// Place `value` in freshly registered memory
    ///
    /// # Safety
    /// `object` must be registered against `Self::descriptor()` with an
    /// unconstructed payload.
    unsafe fn emplace(object: ObjectRef, value: T) {
        ObjectLayout::<T, ObjectHeader>::payload(object).write(value);
    }

    /// Reinterpret an untyped reference
    ///
    /// # Safety
    /// `object` must be a plain object whose payload is a constructed `T`.
    #[inline]
    pub unsafe fn from_object(object: ObjectRef) -> Self {
        debug_assert!(std::ptr::eq(object.descriptor(), Self::descriptor()));
        Self {
            object,
            _marker: PhantomData,
        }
    }

    #[inline]
    pub fn as_object(self) -> ObjectRef {
        self.object
    }

    /// Pointer to the payload
    #[inline]
    pub fn as_ptr(self) -> *mut T {
        ObjectLayout::<T, ObjectHeader>::payload(self.object)
    }

    /// Shared access to the payload
    ///
    /// # Safety
    /// The region must be live and the payload not mutably borrowed.
    #[inline]
    pub unsafe fn get<'a>(self) -> &'a T {
        &*self.as_ptr()
    }

    /// Exclusive access to the payload
    ///
    /// # Safety
    /// The region must be live and the payload not otherwise borrowed.
    #[inline]
    pub unsafe fn get_mut<'a>(self) -> &'a mut T {
        &mut *self.as_ptr()
    }
}

impl<T: Managed> Clone for Obj<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T: Managed> Copy for Obj<T> {}

impl<T: Managed> PartialEq for Obj<T> {
    fn eq(&self, other: &Self) -> bool {
        self.object == other.object
    }
}

impl<T: Managed> Eq for Obj<T> {}

impl<T: Managed> From<Obj<T>> for ObjectRef {
    fn from(obj: Obj<T>) -> ObjectRef {
        obj.object
    }
}

impl<T: Managed> fmt::Debug for Obj<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Obj<{}>({:p})", std::any::type_name::<T>(), self.object.as_ptr())
    }
}

/// Allocate `value` in the calling thread's ambient region
///
/// # Returns
/// * `Err(VobjectError::NoOpenRegion)` - no region is open
/// * `Err(VobjectError::OutOfMemory)` - the region cannot grow
///
/// [`VobjectError::NoOpenRegion`]: crate::VobjectError::NoOpenRegion
pub fn allocate_plain<T: Managed>(value: T) -> Result<Obj<T>> {
    // SAFETY: the region registered fresh memory against T's descriptor.
    let object = region::create_object_with(Obj::<T>::descriptor(), |object| unsafe {
        Obj::<T>::emplace(object, value)
    })?;
    // SAFETY: the payload was constructed before the object joined the region.
    Ok(unsafe { Obj::from_object(object) })
}

/// Allocate `value` as the root of a new region of `kind`
///
/// The region is live until released through
/// [`release_region`](crate::region::release_region).
pub fn allocate_region_root<T: Managed>(kind: RegionKind, value: T) -> Result<Obj<T>> {
    // SAFETY: as in `allocate_plain`.
    let root = region::create_fresh_region_with(kind, Obj::<T>::descriptor(), |root| unsafe {
        Obj::<T>::emplace(root, value)
    })?;
    // SAFETY: as in `allocate_plain`.
    Ok(unsafe { Obj::from_object(root) })
}
