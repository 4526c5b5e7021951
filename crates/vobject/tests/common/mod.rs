//! Test Utilities for the vobject test suite
//!
//! Fixture types covering each capability combination, plus helpers that
//! assert on descriptors and region membership.

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use vobject::region::{region_of, RegionGuard};
use vobject::{
    allocate_region_root, managed, Finaliser, Managed, Notified, Obj, ObjectDescriptor, ObjectRef,
    ObjectStack, RegionContext, RegionKind, Trace,
};

/// Number of threads used by concurrency tests
pub const THREADS: usize = 8;

// ============================================================================
// FIXTURE TYPES
// ============================================================================

/// No references, no hooks, trivially destructible
pub struct Leaf(pub u64);
managed!(Leaf);

/// Singly linked node
pub struct Node {
    pub value: u64,
    pub next: Option<ObjectRef>,
}

impl Trace for Node {
    fn trace(&self, stack: &mut ObjectStack) {
        stack.push_opt(self.next);
    }
}

managed!(Node: trace);

impl Node {
    pub fn new(value: u64) -> Self {
        Self { value, next: None }
    }
}

/// A hook invocation recorded by [`Hooked`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HookCall {
    Finalised { id: u32, region: Option<ObjectRef> },
    Notified { id: u32, object: ObjectRef },
    Dropped { id: u32 },
}

pub type CallLog = Arc<Mutex<Vec<HookCall>>>;

pub fn call_log() -> CallLog {
    Arc::new(Mutex::new(Vec::new()))
}

/// Declares every capability and records each call with its arguments
pub struct Hooked {
    pub id: u32,
    pub log: CallLog,
    pub sub_region: Option<ObjectRef>,
}

impl Hooked {
    pub fn new(id: u32, log: &CallLog) -> Self {
        Self {
            id,
            log: Arc::clone(log),
            sub_region: None,
        }
    }

    fn record(&self, call: HookCall) {
        self.log.lock().unwrap().push(call);
    }
}

impl Trace for Hooked {
    fn trace(&self, stack: &mut ObjectStack) {
        stack.push_opt(self.sub_region);
    }
}

impl Finaliser for Hooked {
    fn finaliser(&mut self, region: Option<ObjectRef>, sub_regions: &mut ObjectStack) {
        self.record(HookCall::Finalised {
            id: self.id,
            region,
        });
        sub_regions.push_opt(self.sub_region.take());
    }
}

impl Notified for Hooked {
    fn notified(&mut self, object: ObjectRef) {
        self.record(HookCall::Notified {
            id: self.id,
            object,
        });
    }
}

impl Drop for Hooked {
    fn drop(&mut self) {
        self.record(HookCall::Dropped { id: self.id });
    }
}

managed!(Hooked: trace, finaliser, notified);

/// Counts how many times it is dropped
pub struct DropCounter(pub Arc<AtomicUsize>);

impl Drop for DropCounter {
    fn drop(&mut self) {
        self.0.fetch_add(1, Ordering::SeqCst);
    }
}

managed!(DropCounter);

// ============================================================================
// HELPERS
// ============================================================================

/// Create a region rooted at `value` and open it on this thread
pub fn open_fresh_region<T: Managed>(kind: RegionKind, value: T) -> (Obj<T>, RegionGuard) {
    let root = allocate_region_root(kind, value).expect("fresh region should allocate");
    let region = region_of(root.as_object()).expect("fresh region should be registered");
    (root, RegionContext::open(&region))
}

/// Assert `object` is tagged with `descriptor`
///
/// **Bug this finds:** objects registered against the wrong descriptor
pub fn assert_tagged(object: ObjectRef, descriptor: &'static ObjectDescriptor) {
    assert!(
        std::ptr::eq(object.descriptor(), descriptor),
        "{:?} is tagged {} but expected {}",
        object,
        object.descriptor().type_name(),
        descriptor.type_name()
    );
}

/// Collect an object's outgoing references
pub fn outgoing(object: ObjectRef) -> Vec<ObjectRef> {
    let mut stack = ObjectStack::new();
    unsafe { object.trace(&mut stack) };
    stack.iter().collect()
}
