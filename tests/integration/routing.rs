//! Integration test: routing through the public API.
//!
//! Determinism, identity handling and the error surface seen by callers.

use chash_integration_tests::{
    Backend, THREE_NODES, backend_options, backend_ring, init_tracing, test_keys,
};
use chash_ring::{HashRing, NodeIdentity, RingConfig, RingError, RingOptions};

#[test]
fn test_repeated_lookups_agree() {
    init_tracing();
    let ring = backend_ring(&THREE_NODES);

    for key in test_keys(500) {
        let first = ring.locate(&key).unwrap();
        for _ in 0..3 {
            assert_eq!(ring.locate(&key).unwrap(), first);
        }
    }
}

#[test]
fn test_locate_by_identity_capability() {
    let ring = backend_ring(&THREE_NODES);
    let session = Backend::new("session-1234", 1);

    assert_eq!(
        ring.locate_identified(&session).unwrap(),
        ring.locate(b"session-1234").unwrap()
    );
}

#[test]
fn test_returns_registered_node_value() {
    let ring = HashRing::new([Backend::new("node-a", 1)], backend_options()).unwrap();

    // Removal is by identity: any value with the same name matches, and
    // the registered value comes back.
    let probe = Backend {
        name: "node-a".into(),
        addr: "elsewhere:1".into(),
        weight: 9,
    };
    let removed = ring.remove_node(&probe).unwrap();
    assert_eq!(removed, Backend::new("node-a", 1));
}

#[test]
fn test_error_surface() {
    let ring = backend_ring(&["node-a"]);

    let err = ring.add_node(Backend::new("node-a", 1)).unwrap_err();
    assert!(matches!(&err, RingError::DuplicateNode(id) if *id == NodeIdentity::from("node-a")));

    let err = ring.add_node(Backend::new("node-z", 0)).unwrap_err();
    assert_eq!(
        err.to_string(),
        "invalid weight 0 for node node-z: weight must be at least 1"
    );

    let err = ring.remove_node(&Backend::new("node-q", 1)).unwrap_err();
    assert!(matches!(err, RingError::NodeNotFound(_)));

    ring.remove_node(&Backend::new("node-a", 1)).unwrap();
    assert!(matches!(ring.locate(b"k"), Err(RingError::EmptyRing)));
    assert_eq!(RingError::EmptyRing.to_string(), "ring is empty");
}

#[test]
fn test_ring_from_toml_config() {
    let config = RingConfig::from_toml(
        r#"
        virtual_node_factor = 64
        digest = "blake3"
        "#,
    )
    .unwrap();
    let ring = HashRing::new(
        THREE_NODES.map(String::from),
        RingOptions::identified().with_config(config),
    )
    .unwrap();

    assert_eq!(ring.virtual_node_factor(), 64);
    assert_eq!(ring.virtual_node_count(), 3 * 64);
    assert_eq!(
        ring.locate(b"k").unwrap(),
        ring.snapshot().locate(b"k").unwrap()
    );
}

#[test]
fn test_digest_choice_changes_placement_not_correctness() {
    let crc = HashRing::new(THREE_NODES, RingOptions::identified()).unwrap();
    let blake = HashRing::new(
        THREE_NODES,
        RingOptions::identified().with_digest_kind(chash_ring::DigestKind::Blake3),
    )
    .unwrap();

    let keys = test_keys(2000);
    let differing = keys
        .iter()
        .filter(|k| crc.locate(k).unwrap() != blake.locate(k).unwrap())
        .count();
    assert!(differing > 0, "independent digests should disagree somewhere");
    for ring in [&crc, &blake] {
        let own = ring.snapshot().ownership();
        assert_eq!(own.len(), 3);
        assert_eq!(own.iter().map(|o| o.span).sum::<u64>(), chash_ring::RING_SPACE);
    }
}

#[test]
fn test_structural_identity_ring() {
    // No explicit identity: the whole serialized value is the identity.
    let ring = HashRing::with_nodes([Backend::new("node-a", 1), Backend::new("node-b", 1)])
        .unwrap();

    // Same name, different address: a distinct node under structural
    // identity.
    let moved = Backend {
        addr: "node-a.other:6379".into(),
        ..Backend::new("node-a", 1)
    };
    ring.add_node(moved.clone()).unwrap();
    assert_eq!(ring.node_count(), 3);
    assert!(ring.contains(&moved).unwrap());
}
