//! Consistent hashing ring for routing keys to a changing set of nodes.
//!
//! This crate implements a weighted consistent hash ring over a 32-bit
//! position space. Adding or removing a node only remaps the keys that node
//! gains or loses; every other key keeps its owner.
//!
//! Each node gets `factor * weight` virtual nodes at positions
//! `digest(identity ++ "#" ++ i)`. A key is routed to the first virtual node
//! strictly after `digest(key)`, wrapping around at the top of the ring. The
//! factor is either configured or derived from the initial node count as
//! `max(5, 1500 / nodes)`.
//!
//! The ring is a pure in-memory index: it does not talk to the nodes, check
//! their health or persist anything.
//!
//! # Example
//!
//! ```
//! use chash_ring::{HashRing, RingOptions};
//!
//! let ring = HashRing::new(
//!     ["cache-a".to_string(), "cache-b".to_string(), "cache-c".to_string()],
//!     RingOptions::identified(),
//! )?;
//!
//! let owner = ring.locate(b"user:42")?;
//! assert_eq!(ring.locate(b"user:42")?, owner);
//!
//! ring.remove_node(&"cache-b".to_string())?;
//! assert_eq!(ring.node_count(), 2);
//! # Ok::<(), chash_ring::RingError>(())
//! ```

mod config;
mod digest;
mod error;
mod identity;
mod ring;
mod snapshot;
mod state;

pub use config::{
    DEFAULT_PROBE_RATIO, MIN_VIRTUAL_NODE_FACTOR, RingConfig, RingOptions, VIRTUAL_NODE_BUDGET,
    WeightFn, suggest_virtual_node_factor,
};
pub use digest::{DigestFn, DigestKind, blake3_32, crc32};
pub use error::RingError;
pub use identity::{
    BoxError, Identify, IdentityError, IdentityFn, NodeIdentity, structural_identity,
};
pub use ring::HashRing;
pub use snapshot::{Ownership, RING_SPACE, Reassignment, RingSnapshot};
