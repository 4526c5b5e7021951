//! Object Header - Metadata for managed objects
//!
//! Object Header Layout (16 bytes on 64-bit):
//! ┌─────────────────────────────────────────┐
//! │       Descriptor (8 bytes)              │  <- &'static ObjectDescriptor
//! ├─────────────────────────────────────────┤
//! │         Mark Word (8 bytes)             │  <- AtomicUsize
//! │  - Bit 0: Finalised                     │
//! │  - Bit 1: Destroyed                     │
//! └─────────────────────────────────────────┘
//!
//! Owner Header Layout (32 bytes on 64-bit):
//! ┌─────────────────────────────────────────┐
//! │       ObjectHeader (16 bytes)           │
//! ├─────────────────────────────────────────┤
//! │       Acquired flag (1 byte + pad)      │  <- AtomicBool
//! ├─────────────────────────────────────────┤
//! │       Capacity (8 bytes)                │  <- allocation size in bytes
//! └─────────────────────────────────────────┘
//!
//! The payload follows the header at `ObjectLayout::<T, H>::PAYLOAD_OFFSET`.
//! An [`ObjectRef`] always points at the `ObjectHeader`, for both header
//! kinds, so the runtime can reach the descriptor without knowing `T`.

use crate::object::descriptor::ObjectDescriptor;
use crate::object::stack::ObjectStack;
use crate::util::constants::OBJECT_ALIGNMENT;
use crate::util::Alignment;
use std::fmt;
use std::marker::PhantomData;
use std::mem::{align_of, size_of};
use std::ptr::NonNull;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

/// Mark bit positions
pub const FINALISED_BIT: usize = 0;
pub const DESTROYED_BIT: usize = 1;

/// Masks for mark word fields
pub const FINALISED_MASK: usize = 1 << FINALISED_BIT;
pub const DESTROYED_MASK: usize = 1 << DESTROYED_BIT;

/// Which header precedes the payload
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HeaderKind {
    /// Region-managed value
    Object,
    /// Concurrently shared owner
    Owner,
}

impl fmt::Display for HeaderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HeaderKind::Object => write!(f, "object"),
            HeaderKind::Owner => write!(f, "owner"),
        }
    }
}

/// A runtime header that can precede a managed payload
///
/// Implemented by [`ObjectHeader`] and [`OwnerHeader`]. Every implementor is
/// `#[repr(C)]` and starts with an `ObjectHeader`.
pub trait Header: Sized + Send + Sync + 'static {
    /// Kind recorded in descriptors built for this header
    const KIND: HeaderKind;

    /// Build the header for an allocation of `capacity` bytes
    fn new(descriptor: &'static ObjectDescriptor, capacity: usize) -> Self;
}

/// Object Header
///
/// Every managed object starts with this header. The collector reads the
/// descriptor through it and keeps its own bookkeeping in the mark word.
#[repr(C)]
pub struct ObjectHeader {
    descriptor: &'static ObjectDescriptor,
    mark_word: AtomicUsize,
}

impl ObjectHeader {
    /// Descriptor of the object's concrete type
    #[inline]
    pub fn descriptor(&self) -> &'static ObjectDescriptor {
        self.descriptor
    }

    // === Mark Bit Operations ===

    /// Check if the finaliser has run
    #[inline]
    pub fn is_finalised(&self) -> bool {
        self.mark_word.load(Ordering::Acquire) & FINALISED_MASK != 0
    }

    /// Check if the object has been destroyed
    #[inline]
    pub fn is_destroyed(&self) -> bool {
        self.mark_word.load(Ordering::Acquire) & DESTROYED_MASK != 0
    }

    /// Set `mask`, returning true if it was already set
    #[inline]
    fn test_and_set(&self, mask: usize) -> bool {
        self.mark_word.fetch_or(mask, Ordering::AcqRel) & mask != 0
    }
}

impl Header for ObjectHeader {
    const KIND: HeaderKind = HeaderKind::Object;

    fn new(descriptor: &'static ObjectDescriptor, _capacity: usize) -> Self {
        Self {
            descriptor,
            mark_word: AtomicUsize::new(0),
        }
    }
}

/// Owner Header
///
/// Carries the concurrency bookkeeping of a shared owner. The acquisition
/// flag is driven by the external scheduler to guarantee at most one active
/// invocation; this layer only initializes it.
#[repr(C)]
pub struct OwnerHeader {
    object: ObjectHeader,
    acquired: AtomicBool,
    capacity: usize,
}

impl OwnerHeader {
    /// The embedded object header
    #[inline]
    pub fn object(&self) -> &ObjectHeader {
        &self.object
    }

    /// Try to start an invocation on this owner
    ///
    /// Returns false if another invocation is active.
    #[inline]
    pub fn try_acquire(&self) -> bool {
        self.acquired
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    /// End the active invocation
    #[inline]
    pub fn release(&self) {
        let was_acquired = self.acquired.swap(false, Ordering::Release);
        debug_assert!(was_acquired, "released an owner that was not acquired");
    }

    /// Check if an invocation is active
    #[inline]
    pub fn is_acquired(&self) -> bool {
        self.acquired.load(Ordering::Acquire)
    }

    /// Total bytes reserved for this owner, header included
    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl Header for OwnerHeader {
    const KIND: HeaderKind = HeaderKind::Owner;

    fn new(descriptor: &'static ObjectDescriptor, capacity: usize) -> Self {
        Self {
            object: ObjectHeader::new(descriptor, capacity),
            acquired: AtomicBool::new(false),
            capacity,
        }
    }
}

/// Compile-time layout of a payload `T` behind header `H`
///
/// Using these constants with a payload aligned above `OBJECT_ALIGNMENT`
/// fails the build.
pub struct ObjectLayout<T, H>(PhantomData<fn() -> (T, H)>);

impl<T, H: Header> ObjectLayout<T, H> {
    /// Offset of the payload from the start of the header
    pub const PAYLOAD_OFFSET: usize = {
        assert!(
            align_of::<T>() <= OBJECT_ALIGNMENT,
            "payload alignment exceeds OBJECT_ALIGNMENT"
        );
        Alignment::align_up(size_of::<H>(), align_of::<T>())
    };

    /// Storage footprint of the object, header included
    pub const FOOTPRINT: usize =
        Alignment::align_up(Self::PAYLOAD_OFFSET + size_of::<T>(), OBJECT_ALIGNMENT);

    /// Pointer to the payload of `object`
    #[inline]
    pub fn payload(object: ObjectRef) -> *mut T {
        // SAFETY: the payload lies inside the allocation that starts at the header.
        unsafe { object.as_ptr().add(Self::PAYLOAD_OFFSET).cast::<T>() }
    }
}

/// Storage footprint of payload `T` behind header `H`
#[inline]
pub const fn footprint<T, H: Header>() -> usize {
    ObjectLayout::<T, H>::FOOTPRINT
}

/// Untyped reference to a managed object
///
/// Points at the object's [`ObjectHeader`]. Handed to descriptor callbacks
/// and stored in [`ObjectStack`]s.
///
/// The header stays readable for the rest of the process, even after the
/// object is destroyed; [`ObjectHeader::is_destroyed`] tells the two apart.
/// The payload is only meaningful from registration until `destroy` runs.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
#[repr(transparent)]
pub struct ObjectRef(NonNull<ObjectHeader>);

// SAFETY: ObjectRef is an address; access to the object is governed by the
// region/owner runtime, not by the reference.
unsafe impl Send for ObjectRef {}
unsafe impl Sync for ObjectRef {}

impl ObjectRef {
    /// Create from a pointer to a registered header
    ///
    /// # Safety
    /// `ptr` must point at a header written by [`register_object`].
    #[inline]
    pub const unsafe fn from_non_null(ptr: NonNull<u8>) -> Self {
        ObjectRef(ptr.cast())
    }

    /// Raw pointer to the start of the object
    #[inline]
    pub const fn as_ptr(self) -> *mut u8 {
        self.0.as_ptr().cast()
    }

    /// Address of the object
    #[inline]
    pub fn addr(self) -> usize {
        self.as_ptr() as usize
    }

    /// The object's header
    #[inline]
    pub fn header(&self) -> &ObjectHeader {
        // SAFETY: an ObjectRef is only created over a registered header.
        unsafe { self.0.as_ref() }
    }

    /// The descriptor of the object's concrete type
    #[inline]
    pub fn descriptor(self) -> &'static ObjectDescriptor {
        self.header().descriptor()
    }

    /// The owner header, if this object is an owner
    #[inline]
    pub fn owner_header(&self) -> Option<&OwnerHeader> {
        match self.descriptor().header_kind() {
            // SAFETY: owner descriptors are only registered over OwnerHeaders,
            // which start with the ObjectHeader this reference points at.
            HeaderKind::Owner => Some(unsafe { self.0.cast::<OwnerHeader>().as_ref() }),
            HeaderKind::Object => None,
        }
    }

    /// Push this object's outgoing references onto `stack`
    ///
    /// # Safety
    /// The payload must be constructed and not concurrently mutated.
    #[inline]
    pub unsafe fn trace(self, stack: &mut ObjectStack) {
        (self.descriptor().trace_fn())(self, stack)
    }

    /// Run the finaliser, if the type has one and it has not run yet
    ///
    /// Returns true if the finaliser ran.
    ///
    /// # Safety
    /// Never concurrently with another callback on the same object.
    pub unsafe fn finalise(
        self,
        region: Option<ObjectRef>,
        sub_regions: &mut ObjectStack,
    ) -> bool {
        let Some(finalise) = self.descriptor().finalise_fn() else {
            return false;
        };
        if self.header().test_and_set(FINALISED_MASK) {
            return false;
        }
        finalise(self, region, sub_regions);
        true
    }

    /// Deliver a notification, if the type handles them
    ///
    /// Returns true if the handler ran.
    ///
    /// # Safety
    /// Never concurrently with another callback on the same object.
    pub unsafe fn notify(self) -> bool {
        match self.descriptor().notify_fn() {
            Some(notify) => {
                notify(self);
                true
            },
            None => false,
        }
    }

    /// Tear the payload down
    ///
    /// The teardown runs at most once per object; later calls return false.
    ///
    /// # Safety
    /// Never concurrently with another callback on the same object, and the
    /// payload must not be used afterwards.
    pub unsafe fn destroy(self) -> bool {
        if self.header().test_and_set(DESTROYED_MASK) {
            log::warn!("Object {:#x} destroyed twice", self.addr());
            return false;
        }
        match self.descriptor().destroy_fn() {
            Some(destroy) => {
                destroy(self);
                true
            },
            None => false,
        }
    }
}

impl fmt::Debug for ObjectRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ObjectRef({:p})", self.0)
    }
}

/// Write a header of kind `H` for `descriptor` at `memory`
///
/// The capacity recorded in owner headers is the descriptor's footprint.
///
/// # Safety
/// `memory` must be valid for `descriptor.size()` bytes, aligned to
/// `OBJECT_ALIGNMENT`, and `descriptor` must have been built for `H`.
#[inline]
pub unsafe fn register_object<H: Header>(
    memory: NonNull<u8>,
    descriptor: &'static ObjectDescriptor,
) -> ObjectRef {
    register_object_with_capacity::<H>(memory, descriptor, descriptor.size())
}

/// Write a header of kind `H` for an allocation of `capacity` bytes
///
/// # Safety
/// As [`register_object`], with `memory` valid for `capacity` bytes and
/// `capacity >= descriptor.size()`.
pub unsafe fn register_object_with_capacity<H: Header>(
    memory: NonNull<u8>,
    descriptor: &'static ObjectDescriptor,
    capacity: usize,
) -> ObjectRef {
    debug_assert_eq!(descriptor.header_kind(), H::KIND);
    debug_assert!(capacity >= descriptor.size());
    debug_assert!(Alignment::is_aligned(memory.as_ptr() as usize, OBJECT_ALIGNMENT));

    memory.cast::<H>().as_ptr().write(H::new(descriptor, capacity));
    log::trace!(
        "Registered {} {} at {:p} ({} bytes)",
        H::KIND,
        descriptor.type_name(),
        memory,
        capacity
    );
    ObjectRef::from_non_null(memory)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::object::descriptor::descriptor_of;
    use crate::Managed;

    #[repr(C, align(16))]
    struct Slot([u8; 128]);

    struct Pair {
        _a: u64,
        _b: u32,
    }
    impl Managed for Pair {}

    fn registered<H: Header>(slot: &mut Slot) -> ObjectRef {
        let memory = NonNull::new(slot.0.as_mut_ptr()).unwrap();
        unsafe { register_object::<H>(memory, descriptor_of::<Pair, H>()) }
    }

    #[test]
    fn test_header_sizes() {
        assert_eq!(size_of::<ObjectHeader>(), 2 * size_of::<usize>());
        assert!(size_of::<OwnerHeader>() > size_of::<ObjectHeader>());
    }

    #[test]
    fn test_layout_includes_header() {
        let plain = ObjectLayout::<Pair, ObjectHeader>::FOOTPRINT;
        let owner = ObjectLayout::<Pair, OwnerHeader>::FOOTPRINT;

        assert!(plain >= size_of::<ObjectHeader>() + size_of::<Pair>());
        assert!(owner >= size_of::<OwnerHeader>() + size_of::<Pair>());
        assert_eq!(plain % OBJECT_ALIGNMENT, 0);
        assert_eq!(owner % OBJECT_ALIGNMENT, 0);
    }

    #[test]
    fn test_footprint_fn_matches_layout() {
        assert_eq!(
            footprint::<Pair, OwnerHeader>(),
            ObjectLayout::<Pair, OwnerHeader>::FOOTPRINT
        );
    }

    #[test]
    fn test_zero_sized_payload_footprint() {
        assert_eq!(
            ObjectLayout::<(), ObjectHeader>::FOOTPRINT,
            Alignment::align_up(size_of::<ObjectHeader>(), OBJECT_ALIGNMENT)
        );
    }

    #[test]
    fn test_fresh_header_flags_clear() {
        let mut slot = Slot([0; 128]);
        let object = registered::<ObjectHeader>(&mut slot);

        assert!(!object.header().is_finalised());
        assert!(!object.header().is_destroyed());
        assert_ne!(FINALISED_MASK, DESTROYED_MASK);
    }

    #[test]
    fn test_register_writes_descriptor() {
        let mut slot = Slot([0; 128]);
        let object = registered::<ObjectHeader>(&mut slot);

        assert!(std::ptr::eq(
            object.descriptor(),
            descriptor_of::<Pair, ObjectHeader>()
        ));
        assert!(object.owner_header().is_none());
    }

    #[test]
    fn test_owner_acquire_release() {
        let mut slot = Slot([0; 128]);
        let object = registered::<OwnerHeader>(&mut slot);
        let owner = object.owner_header().unwrap();

        assert_eq!(owner.capacity(), ObjectLayout::<Pair, OwnerHeader>::FOOTPRINT);
        assert!(!owner.is_acquired());
        assert!(owner.try_acquire());
        assert!(!owner.try_acquire());
        owner.release();
        assert!(owner.try_acquire());
    }

    #[test]
    fn test_destroy_without_destructor_sets_flag() {
        let mut slot = Slot([0; 128]);
        let object = registered::<ObjectHeader>(&mut slot);

        unsafe {
            assert!(!object.destroy());
            assert!(object.header().is_destroyed());
            assert!(!object.destroy());
        }
    }
}
