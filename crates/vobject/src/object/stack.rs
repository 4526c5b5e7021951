//! Object Stack - outgoing reference set
//!
//! Trace callbacks push the objects a value refers to; finalisers push the
//! roots of sub-regions the value owns.

use crate::object::header::ObjectRef;

/// LIFO set of object references filled in by descriptor callbacks
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ObjectStack {
    items: Vec<ObjectRef>,
}

impl ObjectStack {
    /// Create an empty stack
    pub fn new() -> Self {
        Self::default()
    }

    /// Push an outgoing reference
    #[inline]
    pub fn push(&mut self, object: impl Into<ObjectRef>) {
        self.items.push(object.into());
    }

    /// Push an optional outgoing reference, skipping `None`
    #[inline]
    pub fn push_opt<R: Into<ObjectRef>>(&mut self, object: Option<R>) {
        if let Some(object) = object {
            self.push(object);
        }
    }

    /// Pop the most recently pushed reference
    #[inline]
    pub fn pop(&mut self) -> Option<ObjectRef> {
        self.items.pop()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn contains(&self, object: ObjectRef) -> bool {
        self.items.contains(&object)
    }

    pub fn iter(&self) -> impl Iterator<Item = ObjectRef> + '_ {
        self.items.iter().copied()
    }

    /// Remove and return every reference, oldest first
    pub fn drain(&mut self) -> impl Iterator<Item = ObjectRef> + '_ {
        self.items.drain(..)
    }
}

impl Extend<ObjectRef> for ObjectStack {
    fn extend<I: IntoIterator<Item = ObjectRef>>(&mut self, iter: I) {
        self.items.extend(iter);
    }
}
