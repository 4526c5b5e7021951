//! Object Module - managed object model
//!
//! Headers, the outgoing-reference stack, capability declaration and the
//! per-type descriptor factory.

pub mod capability;
pub mod descriptor;
pub mod header;
pub mod stack;

pub use capability::{
    has_capability, Capability, CapabilitySet, Finaliser, FinaliserHook, Managed, Notified,
    NotifiedHook, Trace, TraceHook,
};
pub use descriptor::{
    descriptor_of, registry, DescriptorRegistry, DestroyFn, FinaliseFn, NotifyFn,
    ObjectDescriptor, TraceFn,
};
pub use header::{
    footprint, register_object, register_object_with_capacity, Header, HeaderKind, ObjectHeader,
    ObjectLayout, ObjectRef, OwnerHeader,
};
pub use stack::ObjectStack;
