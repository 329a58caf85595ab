//! Chain predicates used by the block-syncing fast path.

use crate::primitives::hash::ChainId;

const IDENTITY_PREFIX: [u8; 3] = [0x88, 0x88, 0x88];
const EXCHANGE_RATE_PREFIX: [u8; 3] = [0x11, 0x11, 0x11];

/// True for chains a syncing node must replicate eagerly: server identity
/// chains and the exchange-rate chain.
pub fn is_needed_for_syncing(chain_id: &ChainId) -> bool {
    chain_id.0.starts_with(&IDENTITY_PREFIX) || chain_id.0.starts_with(&EXCHANGE_RATE_PREFIX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::primitives::hash::{sha256, Hash32};

    #[test]
    fn test_prefixes() {
        let mut identity = [0u8; 32];
        identity[..3].copy_from_slice(&IDENTITY_PREFIX);
        assert!(is_needed_for_syncing(&Hash32(identity)));

        let mut rate = [0u8; 32];
        rate[..3].copy_from_slice(&EXCHANGE_RATE_PREFIX);
        assert!(is_needed_for_syncing(&Hash32(rate)));

        assert!(!is_needed_for_syncing(&sha256(b"user chain")));
    }
}
