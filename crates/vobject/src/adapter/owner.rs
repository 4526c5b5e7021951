//! Concurrent Owner Adapter - values shared across execution contexts
//!
//! Owners carry an [`OwnerHeader`] whose acquisition flag admits at most one
//! active invocation. Three entry points:
//! - [`allocate_owner`] from the calling thread's allocator
//! - [`allocate_owner_with_allocator`] from a caller-supplied allocator
//! - [`allocate_owner_with_capacity`] with room for a trailing payload
//!   managed outside this crate
//!
//! ```text
//! ┌──────────────┬───────────────┬─────────────────────────────┐
//! │ OwnerHeader  │ T (+ padding) │ trailing payload (optional) │
//! └──────────────┴───────────────┴─────────────────────────────┘
//! 0              PAYLOAD_OFFSET  FOOTPRINT                     capacity
//! ```

use crate::allocator::{self, Allocate};
use crate::assert_context;
use crate::error::Result;
use crate::object::{
    descriptor_of, register_object_with_capacity, Managed, ObjectDescriptor, ObjectLayout,
    ObjectRef, OwnerHeader,
};
use std::fmt;
use std::marker::PhantomData;
use std::ops::{Deref, DerefMut};
use std::ptr::NonNull;

/// Typed handle to a concurrent owner
///
/// Handles can be copied and sent across threads; the payload is reached
/// only through [`Owner::try_acquire`].
pub struct Owner<T: Managed> {
    object: ObjectRef,
    _marker: PhantomData<*mut T>,
}

// SAFETY: the payload is only reachable through an acquisition, which
// admits one thread at a time; `Managed` implies `T: Send`.
unsafe impl<T: Managed> Send for Owner<T> {}
unsafe impl<T: Managed> Sync for Owner<T> {}

impl<T: Managed> Owner<T> {
    /// Storage footprint of `T` behind an owner header
    pub const FOOTPRINT: usize = ObjectLayout::<T, OwnerHeader>::FOOTPRINT;

    /// Descriptor shared by every owner of `T`
    #[inline]
    pub fn descriptor() -> &'static ObjectDescriptor {
        descriptor_of::<T, OwnerHeader>()
    }

    /// Register `memory` and place `value` in it
    ///
    /// # Safety
    /// `memory` must be fresh, aligned to `OBJECT_ALIGNMENT` and valid for
    /// `capacity >= Self::FOOTPRINT` bytes for the rest of the process.
    unsafe fn emplace(memory: NonNull<u8>, capacity: usize, value: T) -> Self {
        let object =
            register_object_with_capacity::<OwnerHeader>(memory, Self::descriptor(), capacity);
        ObjectLayout::<T, OwnerHeader>::payload(object).write(value);
        Self::from_object(object)
    }

    /// Reinterpret an untyped reference
    ///
    /// # Safety
    /// `object` must be an owner whose payload is a constructed `T`.
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

    /// The owner header
    #[inline]
    pub fn header(&self) -> &OwnerHeader {
        // SAFETY: owners are always registered over an OwnerHeader.
        unsafe { &*self.object.as_ptr().cast::<OwnerHeader>() }
    }

    /// Start an invocation, if none is active
    pub fn try_acquire(&self) -> Option<OwnerGuard<'_, T>> {
        if self.header().try_acquire() {
            Some(OwnerGuard { owner: self })
        } else {
            None
        }
    }

    #[inline]
    pub fn is_acquired(&self) -> bool {
        self.header().is_acquired()
    }

    /// Total bytes reserved for this owner, header included
    #[inline]
    pub fn capacity(&self) -> usize {
        self.header().capacity()
    }

    /// Start of the trailing payload
    ///
    /// Aligned to `OBJECT_ALIGNMENT`. Points one past the object when
    /// [`trailing_len`](Self::trailing_len) is zero.
    #[inline]
    pub fn trailing(&self) -> NonNull<u8> {
        // SAFETY: capacity >= FOOTPRINT, so the offset stays within (or one
        // past) the allocation.
        unsafe { NonNull::new_unchecked(self.object.as_ptr().add(Self::FOOTPRINT)) }
    }

    /// Bytes available for the trailing payload
    #[inline]
    pub fn trailing_len(&self) -> usize {
        self.capacity() - Self::FOOTPRINT
    }

    /// Pointer to the payload
    #[inline]
    pub fn as_ptr(self) -> *mut T {
        ObjectLayout::<T, OwnerHeader>::payload(self.object)
    }
}

impl<T: Managed> Clone for Owner<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T: Managed> Copy for Owner<T> {}

impl<T: Managed> PartialEq for Owner<T> {
    fn eq(&self, other: &Self) -> bool {
        self.object == other.object
    }
}

impl<T: Managed> Eq for Owner<T> {}

impl<T: Managed> From<Owner<T>> for ObjectRef {
    fn from(owner: Owner<T>) -> ObjectRef {
        owner.object
    }
}

impl<T: Managed> fmt::Debug for Owner<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Owner")
            .field("type", &std::any::type_name::<T>())
            .field("object", &self.object)
            .field("capacity", &self.capacity())
            .field("acquired", &self.is_acquired())
            .finish()
    }
}

/// An active invocation on an owner
///
/// Releases the owner when dropped.
pub struct OwnerGuard<'a, T: Managed> {
    owner: &'a Owner<T>,
}

impl<T: Managed> Deref for OwnerGuard<'_, T> {
    type Target = T;

    fn deref(&self) -> &T {
        // SAFETY: the acquisition grants exclusive access to the payload.
        unsafe { &*self.owner.as_ptr() }
    }
}

impl<T: Managed> DerefMut for OwnerGuard<'_, T> {
    fn deref_mut(&mut self) -> &mut T {
        // SAFETY: as above.
        unsafe { &mut *self.owner.as_ptr() }
    }
}

impl<T: Managed> Drop for OwnerGuard<'_, T> {
    fn drop(&mut self) {
        self.owner.header().release();
    }
}

/// Allocate an owner for `value` from the calling thread's allocator
pub fn allocate_owner<T: Managed>(value: T) -> Result<Owner<T>> {
    let memory = allocator::thread_local_allocate(Owner::<T>::FOOTPRINT)?;
    // SAFETY: thread-local memory is fresh, aligned and never freed.
    Ok(unsafe { Owner::emplace(memory, Owner::<T>::FOOTPRINT, value) })
}

/// Allocate an owner for `value` from `allocator`
///
/// The allocator outlives every owner it backs.
pub fn allocate_owner_with_allocator<T: Managed, A: Allocate + ?Sized>(
    allocator: &'static A,
    value: T,
) -> Result<Owner<T>> {
    let memory = allocator::explicit_allocate(allocator, Owner::<T>::FOOTPRINT)?;
    // SAFETY: `Allocate` hands out fresh aligned memory valid while the
    // allocator lives, which is the rest of the process.
    Ok(unsafe { Owner::emplace(memory, Owner::<T>::FOOTPRINT, value) })
}

/// Allocate an owner for `value` with `capacity` bytes in total
///
/// The bytes past the payload are left zeroed for a trailing payload.
///
/// # Panics
/// If `capacity` is smaller than the owner's footprint.
pub fn allocate_owner_with_capacity<T: Managed>(value: T, capacity: usize) -> Result<Owner<T>> {
    assert_context!(
        capacity >= Owner::<T>::FOOTPRINT,
        format!(
            "owner capacity {} is below the {} byte footprint of {}",
            capacity,
            Owner::<T>::FOOTPRINT,
            std::any::type_name::<T>()
        )
    );

    let memory = allocator::thread_local_allocate(capacity)?;
    // SAFETY: as in `allocate_owner`, with `capacity` checked above.
    Ok(unsafe { Owner::emplace(memory, capacity, value) })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::allocator::Arena;
    use crate::error::VobjectError;

    struct Account {
        balance: u64,
    }
    crate::managed!(Account);

    #[test]
    fn test_allocate_owner() {
        let owner = allocate_owner(Account { balance: 10 }).unwrap();

        assert_eq!(owner.capacity(), Owner::<Account>::FOOTPRINT);
        assert_eq!(owner.trailing_len(), 0);
        assert!(std::ptr::eq(
            owner.as_object().descriptor(),
            Owner::<Account>::descriptor()
        ));
        assert_eq!(owner.try_acquire().unwrap().balance, 10);
    }

    #[test]
    fn test_single_active_invocation() {
        let owner = allocate_owner(Account { balance: 0 }).unwrap();

        let mut guard = owner.try_acquire().unwrap();
        guard.balance += 5;
        assert!(owner.try_acquire().is_none());
        drop(guard);

        assert!(!owner.is_acquired());
        assert_eq!(owner.try_acquire().unwrap().balance, 5);
    }

    #[test]
    fn test_with_capacity_trailing() {
        let capacity = Owner::<Account>::FOOTPRINT + 100;
        let owner = allocate_owner_with_capacity(Account { balance: 1 }, capacity).unwrap();

        assert_eq!(owner.capacity(), capacity);
        assert_eq!(owner.trailing_len(), 100);

        let trailing = unsafe { std::slice::from_raw_parts_mut(owner.trailing().as_ptr(), 100) };
        assert!(trailing.iter().all(|b| *b == 0));
        trailing.fill(0xAB);
        assert_eq!(owner.try_acquire().unwrap().balance, 1);
    }

    #[test]
    #[should_panic(expected = "footprint")]
    fn test_with_capacity_below_footprint() {
        let capacity = Owner::<Account>::FOOTPRINT - 1;
        let _ = allocate_owner_with_capacity(Account { balance: 0 }, capacity);
    }

    #[test]
    fn test_with_allocator() {
        let arena: &'static Arena = Box::leak(Box::new(Arena::with_chunk_size(4096)));
        let owner = allocate_owner_with_allocator(arena, Account { balance: 7 }).unwrap();

        assert!(arena.contains(owner.as_object().addr()));
        assert_eq!(owner.try_acquire().unwrap().balance, 7);
    }

    #[test]
    fn test_with_exhausted_allocator() {
        let arena: &'static Arena = Box::leak(Box::new(Arena::bounded(4096, 16)));
        assert!(matches!(
            allocate_owner_with_allocator(arena, Account { balance: 0 }),
            Err(VobjectError::OutOfMemory { .. })
        ));
    }
}
