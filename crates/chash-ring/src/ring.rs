//! The shared, lock-guarded hash ring.

use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use serde::Serialize;
use tracing::debug;

use crate::config::RingOptions;
use crate::error::RingError;
use crate::identity::{Identify, NodeIdentity};
use crate::snapshot::RingSnapshot;
use crate::state::{RealNode, RingState};

/// Consistent hashing ring routing byte keys to nodes.
///
/// Each node is mapped to `factor * weight` virtual nodes on a `u32` ring.
/// A key is routed to the first virtual node strictly after its digest,
/// wrapping around at the top of the ring.
///
/// Mutations take the write lock for their whole duration and lookups take
/// the read lock, so a lookup sees a mutation either entirely or not at all.
/// Share the ring between threads with `Arc<HashRing<N>>`.
pub struct HashRing<N> {
    state: RwLock<RingState<N>>,
    options: RingOptions<N>,
    /// Virtual nodes per unit of weight, fixed at construction.
    factor: u32,
}

impl<N: Clone + 'static> HashRing<N> {
    /// Build a ring from an initial, non-empty node set.
    ///
    /// Each node is added with the weight returned by the options' weight
    /// function. The first failing node aborts construction.
    pub fn new(
        nodes: impl IntoIterator<Item = N>,
        options: RingOptions<N>,
    ) -> Result<Self, RingError> {
        let nodes: Vec<N> = nodes.into_iter().collect();
        if nodes.is_empty() {
            return Err(RingError::InvalidConfig(
                "want at least one node".to_string(),
            ));
        }

        let factor = options.config.virtual_node_factor(nodes.len())?;
        let ring = Self {
            state: RwLock::new(RingState::default()),
            options,
            factor,
        };

        {
            let mut state = ring.write();
            for node in nodes {
                let weight = (ring.options.weight)(&node);
                ring.add_locked(&mut state, node, weight)?;
            }
            debug!(
                nodes = state.node_count(),
                vnodes = state.vnode_count(),
                factor,
                "built hash ring"
            );
        }

        Ok(ring)
    }

    /// Build a ring with default options: nodes are identified by their
    /// JSON serialization and all weigh 1.
    pub fn with_nodes(nodes: impl IntoIterator<Item = N>) -> Result<Self, RingError>
    where
        N: Serialize,
    {
        Self::new(nodes, RingOptions::default())
    }

    /// Add a node, weighted by the options' weight function.
    pub fn add_node(&self, node: N) -> Result<(), RingError> {
        let weight = (self.options.weight)(&node);
        self.add_node_with_weight(node, weight)
    }

    /// Add a node with an explicit weight.
    ///
    /// Fails if `weight` is zero, if the node's identity is already
    /// registered, or if not enough free positions can be found. On failure the
    /// ring is unchanged.
    pub fn add_node_with_weight(&self, node: N, weight: u32) -> Result<(), RingError> {
        let mut state = self.write();
        self.add_locked(&mut state, node, weight)
    }

    /// Remove a node and every virtual node it owns.
    ///
    /// Returns the node value that was registered under the same identity.
    pub fn remove_node(&self, node: &N) -> Result<N, RingError> {
        let identity = self.identity_of(node)?;
        let mut state = self.write();
        let real = state
            .remove(&identity)
            .ok_or_else(|| RingError::NodeNotFound(identity.clone()))?;

        debug!(
            %identity,
            positions = real.positions.len(),
            nodes = state.node_count(),
            vnodes = state.vnode_count(),
            "removed node from ring"
        );
        Ok(real.node.clone())
    }

    /// Route a key to its owning node.
    pub fn locate(&self, key: impl AsRef<[u8]>) -> Result<N, RingError> {
        let state = self.read();
        let real = state.route(&*self.options.digest, key.as_ref())?;
        Ok(real.node.clone())
    }

    /// Route a value that can produce its own key bytes.
    pub fn locate_identified<K: Identify + ?Sized>(&self, key: &K) -> Result<N, RingError> {
        let bytes = key.identify()?;
        self.locate(bytes)
    }

    /// Whether a node with the same identity as `node` is registered.
    pub fn contains(&self, node: &N) -> Result<bool, RingError> {
        let identity = self.identity_of(node)?;
        Ok(self.read().contains(&identity))
    }

    /// Registered nodes, in no particular order.
    pub fn nodes(&self) -> Vec<N> {
        self.read()
            .real_nodes()
            .map(|real| real.node.clone())
            .collect()
    }

    /// Number of registered nodes.
    pub fn node_count(&self) -> usize {
        self.read().node_count()
    }

    /// Number of virtual nodes on the ring.
    pub fn virtual_node_count(&self) -> usize {
        self.read().vnode_count()
    }

    /// Virtual nodes allocated per unit of weight.
    pub fn virtual_node_factor(&self) -> u32 {
        self.factor
    }

    /// The options this ring was built with.
    pub fn options(&self) -> &RingOptions<N> {
        &self.options
    }

    /// Take a consistent, immutable copy of the current ring.
    pub fn snapshot(&self) -> RingSnapshot<N> {
        let state = self.read().clone();
        RingSnapshot::new(state, self.options.digest.clone())
    }

    fn identity_of(&self, node: &N) -> Result<NodeIdentity, RingError> {
        Ok(NodeIdentity::new((self.options.identity)(node)?))
    }

    /// Place and register `node`. Nothing is written until every check and
    /// every caller-supplied function has succeeded.
    fn add_locked(
        &self,
        state: &mut RingState<N>,
        node: N,
        weight: u32,
    ) -> Result<(), RingError> {
        let identity = self.identity_of(&node)?;
        if weight < 1 {
            return Err(RingError::InvalidWeight { identity, weight });
        }
        if state.contains(&identity) {
            return Err(RingError::DuplicateNode(identity));
        }

        let quota = (self.factor as usize)
            .checked_mul(weight as usize)
            .ok_or_else(|| {
                RingError::InvalidConfig(format!(
                    "{} virtual nodes per weight times weight {weight} overflows",
                    self.factor
                ))
            })?;
        let positions = state.place(
            &identity,
            quota,
            &*self.options.digest,
            self.options.config.probe_ratio(),
        )?;

        debug!(%identity, weight, positions = positions.len(), "added node to ring");
        state.insert(RealNode {
            identity,
            node,
            weight,
            positions,
        });
        Ok(())
    }

    fn read(&self) -> RwLockReadGuard<'_, RingState<N>> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, RingState<N>> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }
}
