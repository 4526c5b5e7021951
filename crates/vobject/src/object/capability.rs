//! Capabilities - optional lifecycle hooks a managed type declares
//!
//! A type opts into the runtime by implementing [`Managed`]. Each optional
//! hook is a capability that the type declares by name:
//!
//! | Capability   | Hook trait    | Shape                                                  |
//! |--------------|---------------|--------------------------------------------------------|
//! | `trace`      | [`Trace`]     | `fn trace(&self, &mut ObjectStack)`                    |
//! | `finaliser`  | [`Finaliser`] | `fn finaliser(&mut self, Option<ObjectRef>, &mut _)`   |
//! | `notified`   | [`Notified`]  | `fn notified(&mut self, ObjectRef)`                    |
//! | `destructor` | `Drop`        | detected with `std::mem::needs_drop`                   |
//!
//! The [`managed!`](crate::managed) macro maps capability names to hooks.
//! Declaring a name without implementing its hook trait, implementing the
//! trait with another signature, declaring an unknown name or declaring a
//! name twice all fail the build. A type that declares nothing is a leaf
//! with no outgoing references and no hooks.
//!
//! ```rust
//! use vobject::{managed, Finaliser, ObjectRef, ObjectStack, Trace};
//! use vobject::object::{has_capability, Capability};
//!
//! struct Leaf(u64);
//! managed!(Leaf);
//!
//! struct Node {
//!     next: Option<ObjectRef>,
//! }
//!
//! impl Trace for Node {
//!     fn trace(&self, stack: &mut ObjectStack) {
//!         stack.push_opt(self.next);
//!     }
//! }
//!
//! impl Finaliser for Node {
//!     fn finaliser(&mut self, _region: Option<ObjectRef>, _sub_regions: &mut ObjectStack) {}
//! }
//!
//! managed!(Node: trace, finaliser);
//!
//! assert!(!has_capability::<Leaf>(Capability::Trace));
//! assert!(has_capability::<Node>(Capability::Finaliser));
//! assert!(!has_capability::<Node>(Capability::Notified));
//! ```
//!
//! Adding a capability means adding a hook trait, an associated constant on
//! `Managed` and a macro arm; existing `managed!` invocations are untouched.

use crate::object::header::ObjectRef;
use crate::object::stack::ObjectStack;
use std::fmt;

/// Enumerate outgoing references
pub trait Trace {
    fn trace(&self, stack: &mut ObjectStack);
}

/// Run before the region holding the object is torn down
///
/// `region` is the root of the region being released; sub-regions owned by
/// this object are reported by pushing their roots onto `sub_regions`.
pub trait Finaliser {
    fn finaliser(&mut self, region: Option<ObjectRef>, sub_regions: &mut ObjectStack);
}

/// Handle a notification delivered to the object
pub trait Notified {
    fn notified(&mut self, object: ObjectRef);
}

/// Typed trace hook
pub type TraceHook<T> = fn(&T, &mut ObjectStack);
/// Typed finaliser hook
pub type FinaliserHook<T> = fn(&mut T, Option<ObjectRef>, &mut ObjectStack);
/// Typed notification hook
pub type NotifiedHook<T> = fn(&mut T, ObjectRef);

/// A value type that can live behind a managed object header
///
/// Each constant is `None` unless the type declared the capability; use
/// [`managed!`](crate::managed) rather than setting them by hand.
pub trait Managed: Sized + Send + 'static {
    const TRACE: Option<TraceHook<Self>> = None;
    const FINALISER: Option<FinaliserHook<Self>> = None;
    const NOTIFIED: Option<NotifiedHook<Self>> = None;
}

/// Declare a [`Managed`] type and its capabilities
///
/// ```rust
/// # use vobject::{managed, Notified, ObjectRef};
/// struct Counter(u32);
///
/// impl Notified for Counter {
///     fn notified(&mut self, _object: ObjectRef) {
///         self.0 += 1;
///     }
/// }
///
/// managed!(Counter: notified);
/// ```
///
/// ```compile_fail
/// # use vobject::managed;
/// struct Missing;
/// // No `Finaliser` impl: the build fails.
/// managed!(Missing: finaliser);
/// ```
///
/// ```compile_fail
/// # use vobject::managed;
/// struct Typo;
/// managed!(Typo: finalizer);
/// ```
#[macro_export]
macro_rules! managed {
    ($ty:ty) => {
        impl $crate::Managed for $ty {}
    };
    ($ty:ty : $($capability:ident),+ $(,)?) => {
        impl $crate::Managed for $ty {
            $( $crate::__managed_capability!($capability); )+
        }
    };
}

#[doc(hidden)]
#[macro_export]
macro_rules! __managed_capability {
    (trace) => {
        const TRACE: ::core::option::Option<$crate::object::TraceHook<Self>> =
            ::core::option::Option::Some(<Self as $crate::object::Trace>::trace);
    };
    (finaliser) => {
        const FINALISER: ::core::option::Option<$crate::object::FinaliserHook<Self>> =
            ::core::option::Option::Some(<Self as $crate::object::Finaliser>::finaliser);
    };
    (notified) => {
        const NOTIFIED: ::core::option::Option<$crate::object::NotifiedHook<Self>> =
            ::core::option::Option::Some(<Self as $crate::object::Notified>::notified);
    };
}

/// An optional behavior wired into descriptors
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Capability {
    Trace,
    Finaliser,
    Notified,
    Destructor,
}

impl Capability {
    pub const ALL: [Capability; 4] = [
        Capability::Trace,
        Capability::Finaliser,
        Capability::Notified,
        Capability::Destructor,
    ];

    /// Name used in `managed!` declarations
    pub const fn name(self) -> &'static str {
        match self {
            Capability::Trace => "trace",
            Capability::Finaliser => "finaliser",
            Capability::Notified => "notified",
            Capability::Destructor => "destructor",
        }
    }
}

/// Does `T` provide `capability`?
///
/// Evaluated from constants fixed when `T` is compiled.
pub const fn has_capability<T: Managed>(capability: Capability) -> bool {
    match capability {
        Capability::Trace => T::TRACE.is_some(),
        Capability::Finaliser => T::FINALISER.is_some(),
        Capability::Notified => T::NOTIFIED.is_some(),
        Capability::Destructor => std::mem::needs_drop::<T>(),
    }
}

/// Set of capabilities present on a type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CapabilitySet {
    bits: u8,
}

impl CapabilitySet {
    pub const EMPTY: CapabilitySet = CapabilitySet { bits: 0 };

    /// Capabilities of `T`
    pub const fn of<T: Managed>() -> Self {
        let mut bits = 0;
        let mut i = 0;
        while i < Capability::ALL.len() {
            if has_capability::<T>(Capability::ALL[i]) {
                bits |= 1 << i;
            }
            i += 1;
        }
        CapabilitySet { bits }
    }

    pub const fn contains(self, capability: Capability) -> bool {
        self.bits & (1 << capability as u8) != 0
    }

    pub const fn is_empty(self) -> bool {
        self.bits == 0
    }

    pub fn iter(self) -> impl Iterator<Item = Capability> {
        Capability::ALL
            .into_iter()
            .filter(move |capability| self.contains(*capability))
    }
}

impl fmt::Display for CapabilitySet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            return write!(f, "leaf");
        }
        for (i, capability) in self.iter().enumerate() {
            if i > 0 {
                write!(f, "|")?;
            }
            write!(f, "{}", capability.name())?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Plain(u32);
    crate::managed!(Plain);

    struct Full {
        seen: u32,
        next: Option<ObjectRef>,
        _name: String,
    }

    impl Trace for Full {
        fn trace(&self, stack: &mut ObjectStack) {
            stack.push_opt(self.next);
        }
    }

    impl Finaliser for Full {
        fn finaliser(&mut self, _region: Option<ObjectRef>, _sub_regions: &mut ObjectStack) {
            self.seen += 1;
        }
    }

    impl Notified for Full {
        fn notified(&mut self, _object: ObjectRef) {
            self.seen += 10;
        }
    }

    crate::managed!(Full: trace, finaliser, notified);

    // Implements the hook trait but does not declare it.
    struct Undeclared;
    impl Notified for Undeclared {
        fn notified(&mut self, _object: ObjectRef) {}
    }
    crate::managed!(Undeclared);

    #[test]
    fn test_leaf_has_no_capabilities() {
        for capability in Capability::ALL {
            assert!(!has_capability::<Plain>(capability), "{:?}", capability);
        }
        assert!(CapabilitySet::of::<Plain>().is_empty());
        assert_eq!(CapabilitySet::of::<Plain>().to_string(), "leaf");
        let _ = Plain(0).0;
    }

    #[test]
    fn test_full_has_all_capabilities() {
        let set = CapabilitySet::of::<Full>();
        for capability in Capability::ALL {
            assert!(set.contains(capability), "{:?}", capability);
        }
        assert_eq!(set.to_string(), "trace|finaliser|notified|destructor");
    }

    #[test]
    fn test_detection_is_declaration_based() {
        assert!(!has_capability::<Undeclared>(Capability::Notified));
    }

    #[test]
    fn test_has_capability_is_const() {
        const FULL_FINALISES: bool = has_capability::<Full>(Capability::Finaliser);
        const PLAIN_SET: CapabilitySet = CapabilitySet::of::<Plain>();
        assert!(FULL_FINALISES);
        assert!(PLAIN_SET.is_empty());
    }

    #[test]
    fn test_hooks_forward_to_impls() {
        let mut full = Full {
            seen: 0,
            next: None,
            _name: String::new(),
        };
        let mut stack = ObjectStack::new();

        (Full::FINALISER.unwrap())(&mut full, None, &mut stack);
        assert_eq!(full.seen, 1);

        (Full::TRACE.unwrap())(&full, &mut stack);
        assert!(stack.is_empty());
    }

    #[test]
    fn test_capability_names() {
        let names: Vec<_> = Capability::ALL.iter().map(|c| c.name()).collect();
        assert_eq!(names, ["trace", "finaliser", "notified", "destructor"]);
    }
}
