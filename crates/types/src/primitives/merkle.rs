//! Merkle summarization over ordered 32-byte leaves.

use crate::primitives::hash::Hash32;
use sha2::{Digest, Sha256};

/// Computes the Merkle root of an ordered leaf sequence.
///
/// Adjacent leaves are paired strictly left-to-right and hashed with
/// SHA-256; an odd layer duplicates its final leaf. An empty sequence
/// yields the all-zero digest and a single leaf is returned unchanged.
pub fn merkle_root(leaves: &[Hash32]) -> Hash32 {
    if leaves.is_empty() {
        return Hash32::ZERO;
    }
    let mut level: Vec<Hash32> = leaves.to_vec();
    while level.len() > 1 {
        let mut next = Vec::with_capacity(level.len().div_ceil(2));
        for pair in level.chunks(2) {
            let left = pair[0];
            let right = pair.get(1).copied().unwrap_or(left);
            let mut hasher = Sha256::new();
            hasher.update(left.0);
            hasher.update(right.0);
            next.push(Hash32(hasher.finalize().into()));
        }
        level = next;
    }
    level[0]
}

/// The canonical block identifier: `SHA256(SHA256(header) ‖ body_mr)`.
pub fn compute_keymr(header: &[u8], body_mr: &Hash32) -> Hash32 {
    let header_hash: [u8; 32] = Sha256::digest(header).into();
    let mut hasher = Sha256::new();
    hasher.update(header_hash);
    hasher.update(body_mr.0);
    Hash32(hasher.finalize().into())
}
