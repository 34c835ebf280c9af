//! Ring configuration.
//!
//! [`RingConfig`] holds the plain-data settings and can be embedded in a
//! caller's TOML file. [`RingOptions`] layers the function values (identity,
//! weight, digest) on top and is what [`HashRing::new`](crate::HashRing::new)
//! consumes. Options are fixed once the ring is built.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::digest::{DigestFn, DigestKind};
use crate::error::RingError;
use crate::identity::{Identify, IdentityError, IdentityFn, structural_identity};

/// Smallest virtual-node factor picked automatically.
pub const MIN_VIRTUAL_NODE_FACTOR: u32 = 5;

/// Total virtual nodes aimed for when the factor is derived from the
/// initial node count.
pub const VIRTUAL_NODE_BUDGET: u32 = 1500;

/// Default number of candidate positions tried per position needed.
pub const DEFAULT_PROBE_RATIO: u32 = 16;

/// Caller-supplied function returning a node's weight.
pub type WeightFn<N> = Arc<dyn Fn(&N) -> u32 + Send + Sync>;

/// Plain-data ring settings.
///
/// ```toml
/// virtual_node_factor = 160
/// digest = "blake3"
/// probe_ratio = 32
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RingConfig {
    /// Virtual nodes per unit of weight. Derived from the initial node count
    /// when omitted.
    pub virtual_node_factor: Option<u32>,
    /// Digest used for keys and virtual-node positions.
    pub digest: DigestKind,
    /// Candidate positions tried per position needed before an add gives up
    /// with [`RingError::Saturated`].
    pub probe_ratio: Option<u32>,
}

impl RingConfig {
    /// Parse a config from a TOML string.
    pub fn from_toml(s: &str) -> Result<Self, RingError> {
        toml::from_str(s).map_err(|e| RingError::InvalidConfig(e.to_string()))
    }

    /// Effective probe ratio (configured value or 16, never below 1).
    pub fn probe_ratio(&self) -> u32 {
        self.probe_ratio.unwrap_or(DEFAULT_PROBE_RATIO).max(1)
    }

    /// Effective virtual-node factor for a ring built from
    /// `initial_nodes` nodes.
    pub fn virtual_node_factor(&self, initial_nodes: usize) -> Result<u32, RingError> {
        match self.virtual_node_factor {
            Some(0) => Err(RingError::InvalidConfig(
                "virtual_node_factor must be at least 1".into(),
            )),
            Some(factor) => Ok(factor),
            None => Ok(suggest_virtual_node_factor(initial_nodes)),
        }
    }
}

/// Suggest a virtual-node factor for a ring of `node_count` nodes.
///
/// Aims for roughly [`VIRTUAL_NODE_BUDGET`] positions in total, with at
/// least [`MIN_VIRTUAL_NODE_FACTOR`] per node:
///
/// | Nodes | Factor |
/// |-------|--------|
/// | 1     | 1500   |
/// | 3     | 500    |
/// | 100   | 15     |
/// | 300+  | 5      |
pub fn suggest_virtual_node_factor(node_count: usize) -> u32 {
    let per_node = VIRTUAL_NODE_BUDGET as usize / node_count.max(1);
    (per_node as u32).max(MIN_VIRTUAL_NODE_FACTOR)
}

/// Everything a ring needs to place nodes and route keys.
pub struct RingOptions<N> {
    pub(crate) identity: IdentityFn<N>,
    pub(crate) weight: WeightFn<N>,
    pub(crate) digest: DigestFn,
    pub(crate) config: RingConfig,
}

impl<N: 'static> RingOptions<N> {
    /// Options with the given identity function, weight 1 for every node,
    /// CRC-32 digest and a derived virtual-node factor.
    pub fn new<F>(identity: F) -> Self
    where
        F: Fn(&N) -> Result<Vec<u8>, IdentityError> + Send + Sync + 'static,
    {
        let config = RingConfig::default();
        Self {
            identity: Arc::new(identity),
            weight: Arc::new(|_: &N| 1),
            digest: config.digest.digest_fn(),
            config,
        }
    }

    /// Options for nodes that know their own identity.
    pub fn identified() -> Self
    where
        N: Identify,
    {
        Self::new(|node: &N| node.identify())
    }

    /// Options for nodes identified by their JSON serialization.
    pub fn structural() -> Self
    where
        N: Serialize,
    {
        Self::new(|node: &N| structural_identity(node))
    }

    /// Replace the identity function.
    pub fn with_identity<F>(mut self, identity: F) -> Self
    where
        F: Fn(&N) -> Result<Vec<u8>, IdentityError> + Send + Sync + 'static,
    {
        self.identity = Arc::new(identity);
        self
    }

    /// Replace the weight function used by
    /// [`HashRing::add_node`](crate::HashRing::add_node) and construction.
    pub fn with_weight<F>(mut self, weight: F) -> Self
    where
        F: Fn(&N) -> u32 + Send + Sync + 'static,
    {
        self.weight = Arc::new(weight);
        self
    }

    /// Use a custom digest function.
    pub fn with_digest<F>(mut self, digest: F) -> Self
    where
        F: Fn(&[u8]) -> u32 + Send + Sync + 'static,
    {
        self.digest = Arc::new(digest);
        self
    }

    /// Use one of the built-in digests.
    pub fn with_digest_kind(mut self, kind: DigestKind) -> Self {
        self.config.digest = kind;
        self.digest = kind.digest_fn();
        self
    }

    /// Fix the virtual-node factor instead of deriving it.
    pub fn with_virtual_node_factor(mut self, factor: u32) -> Self {
        self.config.virtual_node_factor = Some(factor);
        self
    }

    /// Set the probe ratio.
    pub fn with_probe_ratio(mut self, ratio: u32) -> Self {
        self.config.probe_ratio = Some(ratio);
        self
    }

    /// Apply a whole [`RingConfig`], including its digest selection.
    pub fn with_config(mut self, config: RingConfig) -> Self {
        self.digest = config.digest.digest_fn();
        self.config = config;
        self
    }

    /// The plain-data settings.
    pub fn config(&self) -> &RingConfig {
        &self.config
    }
}

impl<N: Serialize + 'static> Default for RingOptions<N> {
    fn default() -> Self {
        Self::structural()
    }
}

impl<N> Clone for RingOptions<N> {
    fn clone(&self) -> Self {
        Self {
            identity: Arc::clone(&self.identity),
            weight: Arc::clone(&self.weight),
            digest: Arc::clone(&self.digest),
            config: self.config.clone(),
        }
    }
}

impl<N> fmt::Debug for RingOptions<N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RingOptions")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
