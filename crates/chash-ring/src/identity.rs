//! Node and key identities.
//!
//! The ring never looks inside a node value. It asks an identity function
//! for a byte string, uses those bytes to place the node's virtual nodes, and
//! keys its registry by them. Lookup keys go through the same [`Identify`]
//! capability when they are not plain bytes already.

use std::borrow::Cow;
use std::error::Error as StdError;
use std::fmt;
use std::sync::Arc;

use serde::Serialize;

/// Boxed error produced by a caller-supplied identity function.
pub type BoxError = Box<dyn StdError + Send + Sync>;

/// Caller-supplied function deriving the identity bytes of a node.
pub type IdentityFn<N> = Arc<dyn Fn(&N) -> Result<Vec<u8>, IdentityError> + Send + Sync>;

/// The identity bytes of a registered node.
///
/// Identities compare byte-for-byte. They are displayed as UTF-8, with
/// invalid sequences replaced, which covers the usual case of names and
/// addresses.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeIdentity(Vec<u8>);

impl NodeIdentity {
    /// Wrap raw identity bytes.
    pub fn new(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }

    /// Return the raw identity bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Return the identity as text, replacing invalid UTF-8.
    pub fn to_string_lossy(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.0)
    }
}

impl From<Vec<u8>> for NodeIdentity {
    fn from(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }
}

impl From<&str> for NodeIdentity {
    fn from(s: &str) -> Self {
        Self(s.as_bytes().to_vec())
    }
}

impl AsRef<[u8]> for NodeIdentity {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Display for NodeIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_string_lossy())
    }
}

impl fmt::Debug for NodeIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NodeIdentity({:?})", self.to_string_lossy())
    }
}

/// Failure to derive an identity for a node or key.
#[derive(Debug, thiserror::Error)]
#[error("identity derivation failed: {source}")]
pub struct IdentityError {
    #[source]
    source: BoxError,
}

impl IdentityError {
    /// Wrap the underlying error of an identity function.
    pub fn new(source: impl Into<BoxError>) -> Self {
        Self {
            source: source.into(),
        }
    }
}

/// Values that can produce the identity bytes used to place them on a ring.
pub trait Identify {
    /// Return the identity bytes of `self`.
    fn identify(&self) -> Result<Vec<u8>, IdentityError>;
}

impl Identify for [u8] {
    fn identify(&self) -> Result<Vec<u8>, IdentityError> {
        Ok(self.to_vec())
    }
}

impl Identify for Vec<u8> {
    fn identify(&self) -> Result<Vec<u8>, IdentityError> {
        Ok(self.clone())
    }
}

impl Identify for str {
    fn identify(&self) -> Result<Vec<u8>, IdentityError> {
        Ok(self.as_bytes().to_vec())
    }
}

impl Identify for String {
    fn identify(&self) -> Result<Vec<u8>, IdentityError> {
        Ok(self.as_bytes().to_vec())
    }
}

impl<T: Identify + ?Sized> Identify for &T {
    fn identify(&self) -> Result<Vec<u8>, IdentityError> {
        (**self).identify()
    }
}

impl<T: Identify + ?Sized> Identify for Arc<T> {
    fn identify(&self) -> Result<Vec<u8>, IdentityError> {
        (**self).identify()
    }
}

/// Identity derived from the structure of a value: its JSON serialization.
///
/// Two values with equal fields map to the same identity, regardless of
/// where they live in memory.
pub fn structural_identity<T: Serialize + ?Sized>(value: &T) -> Result<Vec<u8>, IdentityError> {
    serde_json::to_vec(value).map_err(IdentityError::new)
}
