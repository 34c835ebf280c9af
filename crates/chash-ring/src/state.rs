//! Ring state: virtual-node positions and the real-node registry.
//!
//! Both tables live in one [`RingState`] so a single lock covers them. The
//! position table is a `BTreeMap`, which keeps positions sorted at all
//! times: there is no separate sorted sequence to rebuild after a mutation.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::ops::Bound::{Excluded, Unbounded};
use std::sync::Arc;

use crate::error::RingError;
use crate::identity::NodeIdentity;
use crate::snapshot::RING_SPACE;

/// Separator between a node's identity and its virtual-node index when
/// deriving positions.
const VNODE_SEPARATOR: u8 = b'#';

/// Upper bound on positions reserved up front by [`RingState::place`].
const MAX_PREALLOC: usize = 1 << 16;

/// One registered node and the positions it owns.
#[derive(Debug)]
pub(crate) struct RealNode<N> {
    pub(crate) identity: NodeIdentity,
    pub(crate) node: N,
    pub(crate) weight: u32,
    pub(crate) positions: Vec<u32>,
}

/// Everything guarded by the ring lock.
#[derive(Debug)]
pub(crate) struct RingState<N> {
    /// Virtual node positions: ring position -> owning real node.
    vnodes: BTreeMap<u32, Arc<RealNode<N>>>,
    /// Real nodes keyed by identity.
    nodes: HashMap<NodeIdentity, Arc<RealNode<N>>>,
}

impl<N> Default for RingState<N> {
    fn default() -> Self {
        Self {
            vnodes: BTreeMap::new(),
            nodes: HashMap::new(),
        }
    }
}

impl<N> Clone for RingState<N> {
    fn clone(&self) -> Self {
        Self {
            vnodes: self.vnodes.clone(),
            nodes: self.nodes.clone(),
        }
    }
}

impl<N> RingState<N> {
    pub(crate) fn contains(&self, identity: &NodeIdentity) -> bool {
        self.nodes.contains_key(identity)
    }

    pub(crate) fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub(crate) fn vnode_count(&self) -> usize {
        self.vnodes.len()
    }

    pub(crate) fn real_nodes(&self) -> impl Iterator<Item = &Arc<RealNode<N>>> {
        self.nodes.values()
    }

    pub(crate) fn vnodes(&self) -> impl Iterator<Item = (u32, &Arc<RealNode<N>>)> {
        self.vnodes.iter().map(|(pos, node)| (*pos, node))
    }

    /// Largest occupied position, if any.
    pub(crate) fn last_position(&self) -> Option<u32> {
        self.vnodes.last_key_value().map(|(pos, _)| *pos)
    }

    /// Find the real node owning `position`.
    ///
    /// The owner is the first virtual node strictly after `position`,
    /// wrapping to the smallest one. Returns `None` only on an empty ring.
    pub(crate) fn find(&self, position: u32) -> Option<&Arc<RealNode<N>>> {
        self.vnodes
            .range((Excluded(position), Unbounded))
            .next()
            .or_else(|| self.vnodes.first_key_value())
            .map(|(_, node)| node)
    }

    /// Route `key` through `digest` to its owner.
    pub(crate) fn route(
        &self,
        digest: &(dyn Fn(&[u8]) -> u32 + Send + Sync),
        key: &[u8],
    ) -> Result<&Arc<RealNode<N>>, RingError> {
        self.find(digest(key)).ok_or(RingError::EmptyRing)
    }

    /// Pick `quota` free positions for `identity` without touching the ring.
    ///
    /// Candidate `i` is `digest(identity ++ "#" ++ i)`. Candidates already
    /// taken, by another node or by an earlier candidate, are skipped and do
    /// not count. At most `quota * probe_ratio` candidates are tried, and a
    /// quota larger than the free space fails before any probing.
    pub(crate) fn place(
        &self,
        identity: &NodeIdentity,
        quota: usize,
        digest: &(dyn Fn(&[u8]) -> u32 + Send + Sync),
        probe_ratio: u32,
    ) -> Result<Vec<u32>, RingError> {
        let free = RING_SPACE - self.vnodes.len() as u64;
        if quota as u64 > free {
            return Err(RingError::Saturated {
                identity: identity.clone(),
                placed: 0,
                wanted: quota,
            });
        }

        let max_probes = quota.saturating_mul(probe_ratio as usize);
        let mut accepted = Vec::with_capacity(quota.min(MAX_PREALLOC));
        let mut taken = HashSet::with_capacity(quota.min(MAX_PREALLOC));
        let mut key = Vec::with_capacity(identity.as_bytes().len() + 12);

        for i in 0..max_probes {
            if accepted.len() == quota {
                break;
            }
            vnode_key(&mut key, identity, i);
            let pos = digest(&key);
            if self.vnodes.contains_key(&pos) || !taken.insert(pos) {
                continue;
            }
            accepted.push(pos);
        }

        if accepted.len() < quota {
            return Err(RingError::Saturated {
                identity: identity.clone(),
                placed: accepted.len(),
                wanted: quota,
            });
        }
        Ok(accepted)
    }

    /// Register a real node and all of its positions.
    ///
    /// Positions must come from [`RingState::place`] on this same state.
    pub(crate) fn insert(&mut self, real: RealNode<N>) {
        let real = Arc::new(real);
        for pos in &real.positions {
            self.vnodes.insert(*pos, Arc::clone(&real));
        }
        self.nodes.insert(real.identity.clone(), real);
    }

    /// Unregister a real node and drop every position it owns.
    pub(crate) fn remove(&mut self, identity: &NodeIdentity) -> Option<Arc<RealNode<N>>> {
        let real = self.nodes.remove(identity)?;
        for pos in &real.positions {
            self.vnodes.remove(pos);
        }
        Some(real)
    }
}

/// Write the digest input for virtual node `index` of `identity` into `buf`.
fn vnode_key(buf: &mut Vec<u8>, identity: &NodeIdentity, index: usize) {
    buf.clear();
    buf.extend_from_slice(identity.as_bytes());
    buf.push(VNODE_SEPARATOR);
    buf.extend_from_slice(index.to_string().as_bytes());
}
