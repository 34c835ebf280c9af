//! 32-bit digest functions that place keys and virtual nodes on the ring.

use std::sync::Arc;

use serde::Deserialize;

/// Caller-supplied digest: maps bytes to a ring position.
///
/// Must be deterministic. Distribution quality directly drives how evenly
/// keys spread across nodes.
pub type DigestFn = Arc<dyn Fn(&[u8]) -> u32 + Send + Sync>;

/// Built-in digest functions, selectable from configuration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DigestKind {
    /// CRC-32 (IEEE polynomial), the same checksum as zlib and Go's
    /// `crc32.ChecksumIEEE`.
    #[default]
    Crc32,
    /// First four bytes of the BLAKE3 hash, little endian.
    Blake3,
}

impl DigestKind {
    /// Return the digest as a shareable function value.
    pub fn digest_fn(self) -> DigestFn {
        let f: fn(&[u8]) -> u32 = match self {
            DigestKind::Crc32 => crc32,
            DigestKind::Blake3 => blake3_32,
        };
        Arc::new(f)
    }
}

/// CRC-32/IEEE of `data`.
pub fn crc32(data: &[u8]) -> u32 {
    crc32fast::hash(data)
}

/// BLAKE3 of `data`, truncated to 32 bits.
pub fn blake3_32(data: &[u8]) -> u32 {
    let hash = blake3::hash(data);
    let bytes = hash.as_bytes();
    u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]])
}
