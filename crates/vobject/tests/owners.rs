//! Concurrent owners: allocation variants and acquisition

mod common;

use common::*;
use std::sync::{Arc, Barrier};
use std::thread;
use vobject::allocator::stats;
use vobject::{
    allocate_owner, allocate_owner_with_allocator, allocate_owner_with_capacity, Arena, Owner,
    VobjectError,
};

#[test]
fn test_owner_is_tagged() {
    let owner = allocate_owner(Node::new(3)).unwrap();

    assert_tagged(owner.as_object(), Owner::<Node>::descriptor());
    assert_eq!(owner.capacity(), Owner::<Node>::FOOTPRINT);
    assert!(owner.as_object().owner_header().is_some());
    assert_eq!(owner.try_acquire().unwrap().value, 3);
}

#[test]
fn test_owner_outlives_allocating_thread() {
    let owner = thread::spawn(|| allocate_owner(Leaf(11)).unwrap())
        .join()
        .unwrap();

    assert_eq!(owner.try_acquire().unwrap().0, 11);
}

#[test]
fn test_at_most_one_active_invocation() {
    const ROUNDS: u64 = 500;

    let owner = allocate_owner(Leaf(0)).unwrap();
    let barrier = Arc::new(Barrier::new(THREADS));

    let handles: Vec<_> = (0..THREADS)
        .map(|_| {
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                let mut done = 0;
                while done < ROUNDS {
                    if let Some(mut leaf) = owner.try_acquire() {
                        let seen = leaf.0;
                        thread::yield_now();
                        leaf.0 = seen + 1;
                        done += 1;
                    }
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap();
    }

    assert!(!owner.is_acquired());
    assert_eq!(owner.try_acquire().unwrap().0, ROUNDS * THREADS as u64);
}

#[test]
fn test_oversized_owner() {
    let capacity = Owner::<Node>::FOOTPRINT + 256;
    let owner = allocate_owner_with_capacity(Node::new(5), capacity).unwrap();

    assert_eq!(owner.capacity(), capacity);
    assert_eq!(owner.trailing_len(), 256);
    assert_eq!(
        owner.trailing().as_ptr() as usize,
        owner.as_object().addr() + Owner::<Node>::FOOTPRINT
    );
    assert_eq!(owner.try_acquire().unwrap().value, 5);
}

#[test]
fn test_oversized_owner_at_exact_footprint() {
    let owner = allocate_owner_with_capacity(Leaf(1), Owner::<Leaf>::FOOTPRINT).unwrap();
    assert_eq!(owner.trailing_len(), 0);
}

#[test]
fn test_oversized_owner_uses_large_path() {
    let before = stats().large_objects;
    let capacity = vobject::config::current().large_threshold + 1;

    let owner = allocate_owner_with_capacity(Leaf(2), capacity).unwrap();
    assert_eq!(owner.capacity(), capacity);
    assert!(stats().large_objects > before);
}

#[test]
#[should_panic(expected = "footprint")]
fn test_undersized_owner_panics() {
    let _ = allocate_owner_with_capacity(Node::new(0), Owner::<Node>::FOOTPRINT - 1);
}

#[test]
fn test_explicit_allocator() {
    let arena: &'static Arena = Box::leak(Box::new(Arena::with_chunk_size(8192)));
    let a = allocate_owner_with_allocator(arena, Leaf(1)).unwrap();
    let b = allocate_owner_with_allocator(arena, Leaf(2)).unwrap();

    assert!(arena.contains(a.as_object().addr()));
    assert!(arena.contains(b.as_object().addr()));
    assert_eq!(arena.allocated(), 2 * Owner::<Leaf>::FOOTPRINT);
    assert_eq!(b.try_acquire().unwrap().0, 2);
}

#[test]
fn test_explicit_allocator_exhaustion() {
    let footprint = Owner::<Leaf>::FOOTPRINT;
    let arena: &'static Arena = Box::leak(Box::new(Arena::bounded(4096, footprint)));

    allocate_owner_with_allocator(arena, Leaf(1)).unwrap();
    assert!(matches!(
        allocate_owner_with_allocator(arena, Leaf(2)),
        Err(VobjectError::OutOfMemory { .. })
    ));
    assert_eq!(arena.allocated(), footprint);
}

#[test]
fn test_thread_local_exhaustion() {
    let result = allocate_owner_with_capacity(Leaf(0), usize::MAX / 2);
    match result {
        Err(err) => {
            assert!(matches!(err, VobjectError::OutOfMemory { .. }));
            assert!(err.is_recoverable());
        },
        Ok(_) => panic!("allocation of usize::MAX / 2 bytes succeeded"),
    }
}

#[test]
fn test_owner_callbacks_via_object() {
    let log = call_log();
    let owner = allocate_owner(Hooked::new(4, &log)).unwrap();
    let object = owner.as_object();

    {
        let _invocation = owner.try_acquire().unwrap();
        unsafe { assert!(object.notify()) };
    }

    unsafe { assert!(object.destroy()) };
    assert_eq!(
        *log.lock().unwrap(),
        vec![
            HookCall::Notified { id: 4, object },
            HookCall::Dropped { id: 4 },
        ]
    );
}
