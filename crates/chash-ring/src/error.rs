//! Error types for ring construction, mutation and lookup.

use crate::identity::{IdentityError, NodeIdentity};

/// Errors returned by [`HashRing`](crate::HashRing) operations.
///
/// Every variant is recoverable. A mutation that fails leaves the ring
/// exactly as it was before the call.
#[derive(Debug, thiserror::Error)]
pub enum RingError {
    /// The ring options or the initial node set are unusable.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// A node was added with a weight below 1.
    #[error("invalid weight {weight} for node {identity}: weight must be at least 1")]
    InvalidWeight {
        /// Identity of the rejected node.
        identity: NodeIdentity,
        /// The weight that was supplied.
        weight: u32,
    },

    /// A node with the same identity is already registered.
    #[error("duplicate node: {0}")]
    DuplicateNode(NodeIdentity),

    /// The node to remove is not registered.
    #[error("node not found: {0}")]
    NodeNotFound(NodeIdentity),

    /// The identity function failed for a node or key.
    #[error(transparent)]
    Identity(#[from] IdentityError),

    /// A lookup was attempted while no virtual nodes are registered.
    #[error("ring is empty")]
    EmptyRing,

    /// Not enough free positions could be found for a node before the probe
    /// budget ran out.
    #[error("ring saturated: placed {placed} of {wanted} virtual nodes for {identity}")]
    Saturated {
        /// Identity of the node being added.
        identity: NodeIdentity,
        /// Unique free positions found before giving up.
        placed: usize,
        /// Positions the node needed.
        wanted: usize,
    },
}
