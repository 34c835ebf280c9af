//! Integration test: concurrent lookups and membership changes.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::thread;

use chash_integration_tests::{Backend, backend_options, test_keys};
use chash_ring::{HashRing, RING_SPACE, RingError};

const FACTOR: u32 = 20;

fn ring_with(names: &[&str]) -> HashRing<Backend> {
    HashRing::new(
        names.iter().map(|n| Backend::new(n, 1)),
        backend_options().with_virtual_node_factor(FACTOR),
    )
    .unwrap()
}

/// Readers never observe a half-applied add or remove.
#[test]
#[ntest::timeout(30000)]
fn test_readers_see_whole_mutations() {
    let ring = ring_with(&["stable"]);
    let stop = AtomicBool::new(false);
    let lookups = AtomicUsize::new(0);
    let keys = test_keys(256);

    thread::scope(|s| {
        for _ in 0..4 {
            s.spawn(|| {
                while !stop.load(Ordering::Relaxed) {
                    for key in &keys {
                        let node = ring.locate(key).expect("ring keeps a stable node");
                        assert!(node.name == "stable" || node.name.starts_with("churn-"));
                        lookups.fetch_add(1, Ordering::Relaxed);
                    }

                    let snap = ring.snapshot();
                    assert_eq!(
                        snap.virtual_node_count(),
                        snap.node_count() * FACTOR as usize,
                        "snapshot caught a partial mutation"
                    );
                    assert_eq!(snap.positions().len(), snap.virtual_node_count());
                    assert_eq!(
                        snap.ownership().iter().map(|o| o.span).sum::<u64>(),
                        RING_SPACE
                    );
                }
            });
        }

        // Each writer toggles its own five names 200 times, so every name
        // is toggled an even number of times and ends up removed.
        let writers: Vec<_> = (0..2)
            .map(|w| {
                let ring = &ring;
                s.spawn(move || {
                    for round in 0..200 {
                        let node = Backend::new(&format!("churn-{w}-{}", round % 5), 1);
                        if ring.contains(&node).unwrap() {
                            ring.remove_node(&node).unwrap();
                        } else {
                            ring.add_node(node).unwrap();
                        }
                    }
                })
            })
            .collect();
        for writer in writers {
            writer.join().unwrap();
        }
        stop.store(true, Ordering::Relaxed);
    });

    assert!(lookups.load(Ordering::Relaxed) > 0);
    assert_eq!(ring.node_count(), 1);
    assert!(ring.contains(&Backend::new("stable", 1)).unwrap());
}

/// Concurrent adds of distinct nodes all land; concurrent duplicates are
/// rejected exactly once.
#[test]
#[ntest::timeout(30000)]
fn test_concurrent_adds() {
    let ring = ring_with(&["seed"]);
    let duplicates = AtomicUsize::new(0);

    thread::scope(|s| {
        for t in 0..8 {
            let ring = &ring;
            let duplicates = &duplicates;
            s.spawn(move || {
                for i in 0..25 {
                    ring.add_node(Backend::new(&format!("n-{t}-{i}"), 1)).unwrap();
                }
                match ring.add_node(Backend::new("contended", 1)) {
                    Ok(()) => {}
                    Err(RingError::DuplicateNode(_)) => {
                        duplicates.fetch_add(1, Ordering::Relaxed);
                    }
                    Err(e) => panic!("unexpected error: {e}"),
                }
            });
        }
    });

    assert_eq!(duplicates.load(Ordering::Relaxed), 7);
    assert_eq!(ring.node_count(), 1 + 8 * 25 + 1);
    assert_eq!(ring.virtual_node_count(), ring.node_count() * FACTOR as usize);
}

/// Lookups racing with removal of the last node see a node or an empty
/// ring, never anything else.
#[test]
#[ntest::timeout(30000)]
fn test_lookup_racing_with_last_removal() {
    let ring = ring_with(&["only"]);
    let keys = test_keys(64);

    thread::scope(|s| {
        for _ in 0..4 {
            let ring = &ring;
            let keys = &keys;
            s.spawn(move || {
                for _ in 0..200 {
                    for key in keys {
                        match ring.locate(key) {
                            Ok(node) => assert_eq!(node.name, "only"),
                            Err(RingError::EmptyRing) => {}
                            Err(e) => panic!("unexpected error: {e}"),
                        }
                    }
                }
            });
        }

        let ring = &ring;
        s.spawn(move || {
            for _ in 0..100 {
                ring.remove_node(&Backend::new("only", 1)).unwrap();
                ring.add_node(Backend::new("only", 1)).unwrap();
            }
        });
    });

    assert_eq!(ring.node_count(), 1);
}
