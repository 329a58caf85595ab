//! The chain commit: pays for and pre-announces a new chain.

use factom_types::codec;
use factom_types::error::DecodeError;
use factom_types::primitives::hash::Hash32;
use factom_types::primitives::timestamp;
use serde_json::{json, Value};

/// A commitment creating a new chain, paid in entry credits.
///
/// The signature covers the marshalled prefix ending at the ec-spent byte
/// inclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChainCommit {
    /// Milliseconds since the Unix epoch (6 bytes on the wire).
    pub timestamp: u64,
    /// `SHA256(SHA256(chain_id))` — hides the chain id until reveal.
    pub chain_id_hash: Hash32,
    /// `SHA256(entry_hash ‖ chain_id)` — welds the first entry to the chain.
    pub commit_weld: Hash32,
    /// Hash of the chain's first entry.
    pub entry_hash: Hash32,
    /// Entry credits spent: 10 EC creation fee + 1 EC/KiB up to 10 KiB.
    pub ec_spent: u8,
    /// The paying entry-credit public key.
    pub ec_public_key: [u8; 32],
    /// Signature over the prefix through `ec_spent`.
    pub signature: [u8; 64],
}

impl ChainCommit {
    /// Entry-credit body tag.
    pub const ECID: u8 = 0x02;
    /// Exact wire width in bytes.
    pub const LENGTH: usize = 200;
    /// Wire version byte.
    pub const VERSION: u8 = 0x00;

    /// Marshals the signed prefix: version through ec-spent inclusive.
    pub fn marshal_for_signature(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(Self::LENGTH - 96);
        buf.push(Self::VERSION);
        buf.extend_from_slice(&timestamp::encode_millis(self.timestamp));
        buf.extend_from_slice(&self.chain_id_hash.0);
        buf.extend_from_slice(&self.commit_weld.0);
        buf.extend_from_slice(&self.entry_hash.0);
        buf.push(self.ec_spent);
        buf
    }

    /// Marshals the full commit.
    pub fn marshal(&self) -> Vec<u8> {
        let mut buf = self.marshal_for_signature();
        buf.extend_from_slice(&self.ec_public_key);
        buf.extend_from_slice(&self.signature);
        buf
    }

    /// Unmarshals exactly one commit; trailing bytes are an error.
    pub fn unmarshal(raw: &[u8]) -> Result<Self, DecodeError> {
        let (version, data) = codec::take_u8(raw)?;
        if version != Self::VERSION {
            return Err(DecodeError::UnknownTag {
                context: "chain commit version",
                tag: version,
            });
        }
        let (ts_bytes, data) = codec::take_array::<6>(data)?;
        let (chain_id_hash, data) = codec::take_array::<32>(data)?;
        let (commit_weld, data) = codec::take_array::<32>(data)?;
        let (entry_hash, data) = codec::take_array::<32>(data)?;
        let (ec_spent, data) = codec::take_u8(data)?;
        if !(11..=20).contains(&ec_spent) {
            return Err(DecodeError::FieldOutOfRange {
                field: "chain commit ec_spent",
                value: u64::from(ec_spent),
            });
        }
        let (ec_public_key, data) = codec::take_array::<32>(data)?;
        let (signature, data) = codec::take_array::<64>(data)?;
        codec::expect_empty(data)?;
        Ok(ChainCommit {
            timestamp: timestamp::decode_millis(&ts_bytes),
            chain_id_hash: Hash32(chain_id_hash),
            commit_weld: Hash32(commit_weld),
            entry_hash: Hash32(entry_hash),
            ec_spent,
            ec_public_key,
            signature,
        })
    }

    /// Verifies the embedded signature over the signed prefix.
    pub fn verify_signature(&self) -> bool {
        factom_types::FullSignature {
            public_key: self.ec_public_key,
            signature: self.signature,
        }
        .verify(&self.marshal_for_signature())
    }

    /// JSON projection for the RPC facade.
    pub fn to_json(&self) -> Value {
        json!({
            "timestamp": self.timestamp,
            "chain_id_hash": self.chain_id_hash.to_hex(),
            "commit_weld": self.commit_weld.to_hex(),
            "entry_hash": self.entry_hash.to_hex(),
            "ec_spent": self.ec_spent,
            "ec_public_key": hex::encode(self.ec_public_key),
            "signature": hex::encode(self.signature),
        })
    }
}
