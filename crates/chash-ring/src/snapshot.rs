//! Immutable ring copies, ownership accounting and rebalancing plans.

use std::collections::BTreeMap;

use crate::digest::DigestFn;
use crate::error::RingError;
use crate::identity::NodeIdentity;
use crate::state::RingState;

/// Size of the ring's position space, `2^32`.
pub const RING_SPACE: u64 = 1 << 32;

/// How much of the ring one node owns.
#[derive(Debug, Clone, PartialEq)]
pub struct Ownership<N> {
    /// Identity of the node.
    pub identity: NodeIdentity,
    /// The node value.
    pub node: N,
    /// Weight the node was added with.
    pub weight: u32,
    /// Virtual nodes the node owns.
    pub virtual_nodes: usize,
    /// Number of ring positions routed to the node.
    pub span: u64,
}

impl<N> Ownership<N> {
    /// Fraction of the ring routed to this node.
    pub fn share(&self) -> f64 {
        self.span as f64 / RING_SPACE as f64
    }
}

/// A key whose owner differs between two ring states.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reassignment {
    /// The key that moves.
    pub key: Vec<u8>,
    /// Owner in the old ring.
    pub from: NodeIdentity,
    /// Owner in the new ring.
    pub to: NodeIdentity,
}

/// A point-in-time copy of a [`HashRing`](crate::HashRing).
///
/// Later mutations of the ring do not affect the snapshot.
pub struct RingSnapshot<N> {
    state: RingState<N>,
    digest: DigestFn,
}

impl<N> Clone for RingSnapshot<N> {
    fn clone(&self) -> Self {
        Self {
            state: self.state.clone(),
            digest: self.digest.clone(),
        }
    }
}

impl<N: Clone> RingSnapshot<N> {
    pub(crate) fn new(state: RingState<N>, digest: DigestFn) -> Self {
        Self { state, digest }
    }

    /// Route a key to its owning node.
    pub fn locate(&self, key: impl AsRef<[u8]>) -> Result<N, RingError> {
        self.state
            .route(&*self.digest, key.as_ref())
            .map(|real| real.node.clone())
    }

    /// Identity of the node owning `key`.
    pub fn owner_identity(&self, key: impl AsRef<[u8]>) -> Result<NodeIdentity, RingError> {
        self.state
            .route(&*self.digest, key.as_ref())
            .map(|real| real.identity.clone())
    }

    /// Node owning ring position `position`, or `None` on an empty ring.
    pub fn owner_of(&self, position: u32) -> Option<N> {
        self.state.find(position).map(|real| real.node.clone())
    }

    /// Number of registered nodes.
    pub fn node_count(&self) -> usize {
        self.state.node_count()
    }

    /// Number of virtual nodes.
    pub fn virtual_node_count(&self) -> usize {
        self.state.vnode_count()
    }

    /// Virtual-node positions in ascending order, with their owners.
    pub fn positions(&self) -> Vec<(u32, NodeIdentity)> {
        self.state
            .vnodes()
            .map(|(pos, real)| (pos, real.identity.clone()))
            .collect()
    }

    /// Ring ownership per node, sorted by identity.
    ///
    /// The virtual node at position `P` owns digests in `[P_prev, P)`, and
    /// the smallest position also owns everything from the largest one
    /// upward. Spans therefore always add up to [`RING_SPACE`] on a
    /// non-empty ring.
    pub fn ownership(&self) -> Vec<Ownership<N>> {
        let mut spans: BTreeMap<NodeIdentity, u64> = BTreeMap::new();
        let last = self.state.last_position();

        let mut prev: Option<u32> = None;
        for (pos, real) in self.state.vnodes() {
            let span = match (prev, last) {
                (Some(p), _) => u64::from(pos - p),
                (None, Some(l)) => RING_SPACE - u64::from(l) + u64::from(pos),
                (None, None) => 0,
            };
            *spans.entry(real.identity.clone()).or_default() += span;
            prev = Some(pos);
        }

        let mut out: Vec<Ownership<N>> = self
            .state
            .real_nodes()
            .map(|real| Ownership {
                identity: real.identity.clone(),
                node: real.node.clone(),
                weight: real.weight,
                virtual_nodes: real.positions.len(),
                span: spans.get(&real.identity).copied().unwrap_or(0),
            })
            .collect();
        out.sort_by(|a, b| a.identity.cmp(&b.identity));
        out
    }

    /// Compute which keys change owner between two ring states.
    ///
    /// Keys that cannot be routed in either snapshot (empty ring) are
    /// skipped.
    pub fn diff<K: AsRef<[u8]>>(
        old: &RingSnapshot<N>,
        new: &RingSnapshot<N>,
        keys: impl IntoIterator<Item = K>,
    ) -> Vec<Reassignment> {
        let mut moves = Vec::new();
        for key in keys {
            let key = key.as_ref();
            let (Ok(from), Ok(to)) = (old.owner_identity(key), new.owner_identity(key)) else {
                continue;
            };
            if from != to {
                moves.push(Reassignment {
                    key: key.to_vec(),
                    from,
                    to,
                });
            }
        }
        moves
    }
}
