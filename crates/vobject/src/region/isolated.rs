//! Isolated Region - an arena of objects collected as a unit
//!
//! A region is created together with its root object and owns every object
//! later allocated into it. Releasing the region finalises all members and
//! then destroys them. The backing chunks are retired when the last handle
//! to the region drops, so stale references still read a destroyed header
//! rather than unmapped or reused memory.

use crate::allocator::{self, Allocate, Arena};
use crate::config;
use crate::error::{Result, VobjectError};
use crate::object::{
    register_object, HeaderKind, ObjectDescriptor, ObjectHeader, ObjectRef, ObjectStack,
};
use indexmap::IndexSet;
use parking_lot::Mutex;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

/// Isolation strategy of a region
///
/// The collection policy behind each kind belongs to the surrounding
/// runtime; this layer records the kind and hands it back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RegionKind {
    /// Collected by tracing from the root
    Trace,
    /// Never collected piecemeal, freed as a whole
    Arena,
    /// Reference counted members
    Rc,
}

impl fmt::Display for RegionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RegionKind::Trace => write!(f, "trace"),
            RegionKind::Arena => write!(f, "arena"),
            RegionKind::Rc => write!(f, "rc"),
        }
    }
}

static NEXT_REGION_ID: AtomicUsize = AtomicUsize::new(1);

/// A set of managed objects rooted at one object
pub struct Region {
    id: usize,
    kind: RegionKind,
    root: ObjectRef,
    arena: Arena,
    members: Mutex<IndexSet<ObjectRef>>,
    released: AtomicBool,
}

impl Region {
    /// Create a region whose root is a fresh object described by `descriptor`
    ///
    /// The root's payload is left zeroed; the caller constructs it.
    pub fn with_root(kind: RegionKind, descriptor: &'static ObjectDescriptor) -> Result<Self> {
        Self::with_root_init(kind, descriptor, |_| {})
    }

    /// Create a region and construct its root with `init`
    ///
    /// `init` runs before the region exists anywhere else.
    pub fn with_root_init<F>(
        kind: RegionKind,
        descriptor: &'static ObjectDescriptor,
        init: F,
    ) -> Result<Self>
    where
        F: FnOnce(ObjectRef),
    {
        check_plain(descriptor)?;

        let arena = Arena::with_chunk_size(config::current().region_chunk_size);
        let memory = arena.allocate(descriptor.size())?;

        // SAFETY: the arena returned zeroed, aligned memory of descriptor.size() bytes.
        let root = unsafe { register_object::<ObjectHeader>(memory, descriptor) };
        init(root);

        let mut members = IndexSet::new();
        members.insert(root);

        Ok(Self {
            id: NEXT_REGION_ID.fetch_add(1, Ordering::Relaxed),
            kind,
            root,
            arena,
            members: Mutex::new(members),
            released: AtomicBool::new(false),
        })
    }

    /// Allocate and register a member object
    ///
    /// The payload is left zeroed; the caller constructs it.
    pub fn allocate(&self, descriptor: &'static ObjectDescriptor) -> Result<ObjectRef> {
        self.allocate_with(descriptor, |_| {})
    }

    /// Allocate a member object and construct it with `init`
    ///
    /// Membership is checked and recorded under the same lock that
    /// teardown takes, and `init` runs inside it. A member is therefore
    /// either constructed before teardown sees it, or never created.
    /// `init` must not call back into this region.
    pub fn allocate_with<F>(
        &self,
        descriptor: &'static ObjectDescriptor,
        init: F,
    ) -> Result<ObjectRef>
    where
        F: FnOnce(ObjectRef),
    {
        check_plain(descriptor)?;

        let mut members = self.members.lock();
        if self.released.load(Ordering::Acquire) {
            return Err(VobjectError::RegionReleased {
                root: self.root.addr(),
            });
        }

        let memory = self.arena.allocate(descriptor.size())?;

        // SAFETY: as in `with_root_init`.
        let object = unsafe { register_object::<ObjectHeader>(memory, descriptor) };
        init(object);
        members.insert(object);
        drop(members);

        log::trace!(
            "Region {} allocated {} at {:?}",
            self.id,
            descriptor.type_name(),
            object
        );
        Ok(object)
    }

    #[inline]
    pub fn id(&self) -> usize {
        self.id
    }

    #[inline]
    pub fn kind(&self) -> RegionKind {
        self.kind
    }

    #[inline]
    pub fn root(&self) -> ObjectRef {
        self.root
    }

    /// Check if `object` is a live member of this region
    pub fn contains(&self, object: ObjectRef) -> bool {
        self.members.lock().contains(&object)
    }

    /// Number of live members, root included
    pub fn object_count(&self) -> usize {
        self.members.lock().len()
    }

    /// Bytes of member storage handed out by the region's arena
    pub fn allocated_bytes(&self) -> usize {
        self.arena.allocated()
    }

    pub fn is_released(&self) -> bool {
        self.released.load(Ordering::Acquire)
    }

    /// Finalise then destroy every member
    ///
    /// Finalisers run in allocation order with this region's root; the
    /// sub-region roots they report are pushed onto `sub_regions`.
    /// Returns false if the region was already torn down.
    ///
    /// # Safety
    /// Every member's payload must be constructed, and no member may be
    /// used once this returns.
    pub(crate) unsafe fn teardown(&self, sub_regions: &mut ObjectStack) -> bool {
        let members = {
            let mut members = self.members.lock();
            if self.released.swap(true, Ordering::AcqRel) {
                return false;
            }
            std::mem::take(&mut *members)
        };

        let mut finalised = 0;
        for object in &members {
            if object.finalise(Some(self.root), sub_regions) {
                finalised += 1;
            }
        }

        let mut destroyed = 0;
        for object in &members {
            if object.destroy() {
                destroyed += 1;
            }
        }

        log::debug!(
            "Released {} region {}: {} objects, {} finalised, {} destroyed, {} sub-regions",
            self.kind,
            self.id,
            members.len(),
            finalised,
            destroyed,
            sub_regions.len()
        );
        true
    }
}

impl Drop for Region {
    fn drop(&mut self) {
        allocator::retire(self.arena.take_chunks());
    }
}

impl fmt::Debug for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Region")
            .field("id", &self.id)
            .field("kind", &self.kind)
            .field("root", &self.root)
            .field("objects", &self.object_count())
            .field("released", &self.is_released())
            .finish()
    }
}

fn check_plain(descriptor: &ObjectDescriptor) -> Result<()> {
    if descriptor.header_kind() != HeaderKind::Object {
        return Err(VobjectError::InvalidArgument(format!(
            "{} descriptor for {} cannot live in a region",
            descriptor.header_kind(),
            descriptor.type_name()
        )));
    }
    Ok(())
}
