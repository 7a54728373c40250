//! Streaming SHA-1
//!
//! Bytes are accumulated with `add_bytes` and finalized with
//! `compute_hash`, which also resets the hasher for reuse.

use ::sha1::{Digest, Sha1 as Sha1Hasher};

pub const SHA1_DIGEST_LEN: usize = 20;

pub type Sha1Digest = [u8; SHA1_DIGEST_LEN];

#[derive(Clone, Default)]
pub struct Sha1 {
    hasher: Sha1Hasher,
}

impl Sha1 {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_bytes(&mut self, input: impl AsRef<[u8]>) {
        self.hasher.update(input.as_ref());
    }

    /// Finalize the digest and reset to the empty state
    pub fn compute_hash(&mut self) -> Sha1Digest {
        let mut digest = [0u8; SHA1_DIGEST_LEN];
        digest.copy_from_slice(&self.hasher.finalize_reset());
        digest
    }

    /// Hex of `digest`, truncated to `limit` characters
    pub fn hex_digest(digest: &Sha1Digest, limit: usize) -> String {
        let mut hex = hex::encode(digest);
        hex.truncate(limit);
        hex
    }

    /// `compute_hash` then `hex_digest`
    pub fn compute_hex_digest(&mut self, limit: usize) -> String {
        let digest = self.compute_hash();
        Self::hex_digest(&digest, limit)
    }
}
