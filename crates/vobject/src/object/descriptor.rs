//! Object Descriptor - per-type callback table
//!
//! The runtime operates on objects without knowing their types: it reads
//! the descriptor from the object header and calls through its entries.
//!
//! ```text
//! ObjectDescriptor
//! ┌──────────────┬──────────────────────────────────────────────┐
//! │ size         │ footprint of payload + header                │
//! │ trace        │ always present; leaves share an empty tracer │
//! │ finaliser    │ None unless the type declared `finaliser`    │
//! │ notified     │ None unless the type declared `notified`     │
//! │ destructor   │ None when dropping the payload is a no-op    │
//! └──────────────┴──────────────────────────────────────────────┘
//! ```
//!
//! Exactly one descriptor exists per (payload type, header kind) pair. It is
//! built on first request, leaked, and stays valid for the rest of the
//! process. Concurrent first requests are single-flight: the registry's
//! write lock admits one builder, later arrivals find its result.

use crate::object::capability::{Capability, CapabilitySet, Managed};
use crate::object::header::{Header, HeaderKind, ObjectLayout, ObjectRef};
use crate::object::stack::ObjectStack;
use indexmap::IndexMap;
use parking_lot::RwLock;
use std::any::{type_name, TypeId};
use std::sync::atomic::{AtomicUsize, Ordering};

/// Enumerate the object's outgoing references
pub type TraceFn = unsafe fn(ObjectRef, &mut ObjectStack);
/// Finalise the object: (object, region root, sub-regions out)
pub type FinaliseFn = unsafe fn(ObjectRef, Option<ObjectRef>, &mut ObjectStack);
/// Deliver a notification to the object
pub type NotifyFn = unsafe fn(ObjectRef);
/// Tear the payload down
pub type DestroyFn = unsafe fn(ObjectRef);

/// Immutable callback table for one concrete managed type
#[derive(Debug)]
pub struct ObjectDescriptor {
    size: usize,
    trace: TraceFn,
    finaliser: Option<FinaliseFn>,
    notified: Option<NotifyFn>,
    destructor: Option<DestroyFn>,
    header_kind: HeaderKind,
    capabilities: CapabilitySet,
    type_name: &'static str,
}

impl ObjectDescriptor {
    /// Build the descriptor for payload `T` behind header `H`
    ///
    /// Prefer [`descriptor_of`], which returns the process-wide instance.
    pub fn build<T: Managed, H: Header>() -> Self {
        let trace: TraceFn = if T::TRACE.is_some() {
            trace_shim::<T, H>
        } else {
            trace_leaf
        };
        let finaliser: Option<FinaliseFn> = match T::FINALISER {
            Some(_) => Some(finalise_shim::<T, H>),
            None => None,
        };
        let notified: Option<NotifyFn> = match T::NOTIFIED {
            Some(_) => Some(notify_shim::<T, H>),
            None => None,
        };
        let destructor: Option<DestroyFn> = if std::mem::needs_drop::<T>() {
            Some(destroy_shim::<T, H>)
        } else {
            None
        };

        Self {
            size: ObjectLayout::<T, H>::FOOTPRINT,
            trace,
            finaliser,
            notified,
            destructor,
            header_kind: H::KIND,
            capabilities: CapabilitySet::of::<T>(),
            type_name: type_name::<T>(),
        }
    }

    /// Storage footprint, header included
    #[inline]
    pub fn size(&self) -> usize {
        self.size
    }

    #[inline]
    pub fn trace_fn(&self) -> TraceFn {
        self.trace
    }

    #[inline]
    pub fn finalise_fn(&self) -> Option<FinaliseFn> {
        self.finaliser
    }

    #[inline]
    pub fn notify_fn(&self) -> Option<NotifyFn> {
        self.notified
    }

    #[inline]
    pub fn destroy_fn(&self) -> Option<DestroyFn> {
        self.destructor
    }

    /// True if tracing never yields references
    #[inline]
    pub fn is_leaf(&self) -> bool {
        !self.capabilities.contains(Capability::Trace)
    }

    #[inline]
    pub fn header_kind(&self) -> HeaderKind {
        self.header_kind
    }

    #[inline]
    pub fn capabilities(&self) -> CapabilitySet {
        self.capabilities
    }

    #[inline]
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }
}

unsafe fn trace_leaf(_object: ObjectRef, _stack: &mut ObjectStack) {}

unsafe fn trace_shim<T: Managed, H: Header>(object: ObjectRef, stack: &mut ObjectStack) {
    if let Some(trace) = T::TRACE {
        trace(&*ObjectLayout::<T, H>::payload(object), stack);
    }
}

unsafe fn finalise_shim<T: Managed, H: Header>(
    object: ObjectRef,
    region: Option<ObjectRef>,
    sub_regions: &mut ObjectStack,
) {
    if let Some(finaliser) = T::FINALISER {
        finaliser(&mut *ObjectLayout::<T, H>::payload(object), region, sub_regions);
    }
}

unsafe fn notify_shim<T: Managed, H: Header>(object: ObjectRef) {
    if let Some(notified) = T::NOTIFIED {
        notified(&mut *ObjectLayout::<T, H>::payload(object), object);
    }
}

unsafe fn destroy_shim<T: Managed, H: Header>(object: ObjectRef) {
    std::ptr::drop_in_place(ObjectLayout::<T, H>::payload(object));
}

type DescriptorKey = (TypeId, TypeId);

/// Process-wide table of descriptors keyed by type identity
pub struct DescriptorRegistry {
    entries: RwLock<IndexMap<DescriptorKey, &'static ObjectDescriptor>>,
    constructions: AtomicUsize,
}

impl DescriptorRegistry {
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(IndexMap::new()),
            constructions: AtomicUsize::new(0),
        }
    }

    /// Get the descriptor for `T` behind `H`, building it on first use
    pub fn get_or_build<T: Managed, H: Header>(&self) -> &'static ObjectDescriptor {
        let key = (TypeId::of::<T>(), TypeId::of::<H>());

        if let Some(descriptor) = self.entries.read().get(&key).copied() {
            return descriptor;
        }

        let mut entries = self.entries.write();

        // Another thread may have built it while we waited for the lock.
        if let Some(descriptor) = entries.get(&key).copied() {
            return descriptor;
        }

        let descriptor: &'static ObjectDescriptor =
            Box::leak(Box::new(ObjectDescriptor::build::<T, H>()));
        entries.insert(key, descriptor);
        self.constructions.fetch_add(1, Ordering::Relaxed);

        log::debug!(
            "Built {} descriptor for {} ({} bytes, {})",
            H::KIND,
            descriptor.type_name(),
            descriptor.size(),
            descriptor.capabilities()
        );

        descriptor
    }

    /// Get the descriptor if it was already built
    pub fn get<T: Managed, H: Header>(&self) -> Option<&'static ObjectDescriptor> {
        let key = (TypeId::of::<T>(), TypeId::of::<H>());
        self.entries.read().get(&key).copied()
    }

    /// Number of descriptors held
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// Number of descriptors ever built by this registry
    pub fn constructions(&self) -> usize {
        self.constructions.load(Ordering::Relaxed)
    }
}

impl Default for DescriptorRegistry {
    fn default() -> Self {
        Self::new()
    }
}

lazy_static::lazy_static! {
    static ref REGISTRY: DescriptorRegistry = DescriptorRegistry::new();
}

/// The process-wide descriptor registry
pub fn registry() -> &'static DescriptorRegistry {
    &REGISTRY
}

/// The descriptor for payload `T` behind header `H`
///
/// Every call for the same pair returns the same instance.
#[inline]
pub fn descriptor_of<T: Managed, H: Header>() -> &'static ObjectDescriptor {
    REGISTRY.get_or_build::<T, H>()
}
