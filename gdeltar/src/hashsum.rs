use std::fmt;

use blake2::{Blake2s256, Digest};

/// Size of a content hash in bytes.
pub const HASH_SIZE: usize = 32;

/// A 256-bit content hash identifying a chunk or file payload.
///
/// Hash equality is treated as content equality throughout the archive
/// formats, so the full digest is always kept.
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HashSum([u8; HASH_SIZE]);

impl HashSum {
    /// Digest the given data.
    pub fn digest(data: &[u8]) -> Self {
        let mut hasher = Blake2s256::new();
        hasher.update(data);
        Self(hasher.finalize().into())
    }
    pub fn from_bytes(bytes: [u8; HASH_SIZE]) -> Self {
        Self(bytes)
    }
    pub fn as_bytes(&self) -> &[u8; HASH_SIZE] {
        &self.0
    }
    /// Returns a new vec containing the hash sum.
    pub fn to_vec(&self) -> Vec<u8> {
        self.0.to_vec()
    }
}

impl From<[u8; HASH_SIZE]> for HashSum {
    fn from(bytes: [u8; HASH_SIZE]) -> Self {
        Self(bytes)
    }
}

impl fmt::Display for HashSum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in &self.0 {
            write!(f, "{:02x}", byte)?;
        }
        Ok(())
    }
}

impl fmt::Debug for HashSum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Eight hex chars is enough to tell hashes apart in a log line.
        for byte in &self.0[..4] {
            write!(f, "{:02x}", byte)?;
        }
        write!(f, "..")
    }
}
