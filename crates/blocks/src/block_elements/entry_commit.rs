//! The entry commit: pays for one entry ahead of its reveal.

use factom_types::codec;
use factom_types::error::DecodeError;
use factom_types::primitives::hash::Hash32;
use factom_types::primitives::timestamp;
use serde_json::{json, Value};

/// A commitment paying for a single entry, 1 EC per KiB up to 10 KiB.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EntryCommit {
    /// Milliseconds since the Unix epoch (6 bytes on the wire).
    pub timestamp: u64,
    /// Hash of the entry being paid for.
    pub entry_hash: Hash32,
    /// Entry credits spent, 1 through 10.
    pub ec_spent: u8,
    /// The paying entry-credit public key.
    pub ec_public_key: [u8; 32],
    /// Signature over the prefix through `ec_spent`.
    pub signature: [u8; 64],
}

impl EntryCommit {
    /// Entry-credit body tag.
    pub const ECID: u8 = 0x03;
    /// Exact wire width in bytes.
    pub const LENGTH: usize = 136;
    /// Wire version byte.
    pub const VERSION: u8 = 0x00;

    /// Marshals the signed prefix: version through ec-spent inclusive.
    pub fn marshal_for_signature(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(Self::LENGTH - 96);
        buf.push(Self::VERSION);
        buf.extend_from_slice(&timestamp::encode_millis(self.timestamp));
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
                context: "entry commit version",
                tag: version,
            });
        }
        let (ts_bytes, data) = codec::take_array::<6>(data)?;
        let (entry_hash, data) = codec::take_array::<32>(data)?;
        let (ec_spent, data) = codec::take_u8(data)?;
        if !(1..=10).contains(&ec_spent) {
            return Err(DecodeError::FieldOutOfRange {
                field: "entry commit ec_spent",
                value: u64::from(ec_spent),
            });
        }
        let (ec_public_key, data) = codec::take_array::<32>(data)?;
        let (signature, data) = codec::take_array::<64>(data)?;
        codec::expect_empty(data)?;
        Ok(EntryCommit {
            timestamp: timestamp::decode_millis(&ts_bytes),
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
            "entry_hash": self.entry_hash.to_hex(),
            "ec_spent": self.ec_spent,
            "ec_public_key": hex::encode(self.ec_public_key),
            "signature": hex::encode(self.signature),
        })
    }
}
