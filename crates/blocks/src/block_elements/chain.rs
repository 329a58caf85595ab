//! A chain and the derivation of its id from the founding entry.

use crate::block_elements::Entry;
use factom_types::primitives::hash::{ChainId, Hash32};
use serde_json::{json, Value};
use sha2::{Digest, Sha256};

/// An append-only sequence of entries sharing one chain id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chain {
    /// The derived 32-byte chain id.
    pub chain_id: ChainId,
    /// The founding entry whose external ids name the chain.
    pub first_entry: Entry,
}

impl Chain {
    /// Creates a chain from its founding entry, deriving the chain id.
    pub fn from_first_entry(first_entry: Entry) -> Self {
        let chain_id = derive_chain_id(&first_entry.external_ids);
        Chain {
            chain_id,
            first_entry,
        }
    }

    /// JSON projection for the RPC facade.
    pub fn to_json(&self) -> Value {
        json!({
            "chain_id": self.chain_id.to_hex(),
            "first_entry": self.first_entry.to_json(),
        })
    }
}

/// `chain_id = SHA256(SHA256(ExtId[0]) ‖ SHA256(ExtId[1]) ‖ …)`.
pub fn derive_chain_id(external_ids: &[Vec<u8>]) -> ChainId {
    let mut outer = Sha256::new();
    for external_id in external_ids {
        outer.update(Sha256::digest(external_id));
    }
    Hash32(outer.finalize().into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use factom_types::primitives::hash::sha256;

    #[test]
    fn test_chain_id_is_hash_of_hashed_ext_ids() {
        let ids = vec![b"my chain".to_vec(), b"2019".to_vec()];
        let mut joined = Vec::new();
        joined.extend_from_slice(&sha256(b"my chain").0);
        joined.extend_from_slice(&sha256(b"2019").0);
        assert_eq!(derive_chain_id(&ids), sha256(&joined));
    }

    #[test]
    fn test_from_first_entry_uses_entry_ext_ids() {
        let ids = vec![b"alpha".to_vec(), b"beta".to_vec()];
        let entry = Entry::new(derive_chain_id(&ids), ids.clone(), b"genesis".to_vec());
        let chain = Chain::from_first_entry(entry);
        assert_eq!(chain.chain_id, derive_chain_id(&ids));
        assert_eq!(chain.chain_id, chain.first_entry.chain_id);
    }
}
