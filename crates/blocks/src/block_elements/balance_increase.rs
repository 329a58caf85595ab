//! The balance increase: entry credits granted by a factoid purchase.

use factom_types::codec;
use factom_types::error::DecodeError;
use factom_types::primitives::hash::Hash32;
use factom_types::primitives::varint;
use serde_json::{json, Value};

/// Entry credits credited to a key by an EC purchase in a factoid
/// transaction. Variable width: two trailing varints.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BalanceIncrease {
    /// The entry-credit public key being credited.
    pub ec_public_key: [u8; 32],
    /// Id of the factoid transaction that purchased the credits.
    pub tx_id: Hash32,
    /// Index of the purchase output inside that transaction.
    pub index: u64,
    /// Number of entry credits granted.
    pub quantity: u64,
}

impl BalanceIncrease {
    /// Entry-credit body tag.
    pub const ECID: u8 = 0x04;

    /// Marshals the balance increase.
    pub fn marshal(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(64 + 4);
        buf.extend_from_slice(&self.ec_public_key);
        buf.extend_from_slice(&self.tx_id.0);
        buf.extend_from_slice(&varint::encode(self.index));
        buf.extend_from_slice(&varint::encode(self.quantity));
        buf
    }

    /// Unmarshals a balance increase, returning the remainder.
    pub fn unmarshal_with_remainder(raw: &[u8]) -> Result<(Self, &[u8]), DecodeError> {
        let (ec_public_key, data) = codec::take_array::<32>(raw)?;
        let (tx_id, data) = codec::take_array::<32>(data)?;
        let (index, data) = varint::decode(data)?;
        let (quantity, data) = varint::decode(data)?;
        Ok((
            BalanceIncrease {
                ec_public_key,
                tx_id: Hash32(tx_id),
                index,
                quantity,
            },
            data,
        ))
    }

    /// Unmarshals exactly one balance increase; trailing bytes are an error.
    pub fn unmarshal(raw: &[u8]) -> Result<Self, DecodeError> {
        let (increase, rest) = Self::unmarshal_with_remainder(raw)?;
        codec::expect_empty(rest)?;
        Ok(increase)
    }

    /// JSON projection for the RPC facade.
    pub fn to_json(&self) -> Value {
        json!({
            "ec_public_key": hex::encode(self.ec_public_key),
            "tx_id": self.tx_id.to_hex(),
            "index": self.index,
            "quantity": self.quantity,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use factom_types::primitives::hash::sha256;

    #[test]
    fn test_round_trip_with_remainder() {
        let increase = BalanceIncrease {
            ec_public_key: [0xAB; 32],
            tx_id: sha256(b"purchase tx"),
            index: 3,
            quantity: 20_000,
        };
        let mut raw = increase.marshal();
        raw.extend_from_slice(&[0x01, 0x02]);
        let (decoded, rest) = BalanceIncrease::unmarshal_with_remainder(&raw).unwrap();
        assert_eq!(decoded, increase);
        assert_eq!(rest, &[0x01, 0x02]);
    }

    #[test]
    fn test_strict_unmarshal_rejects_trailing() {
        let increase = BalanceIncrease {
            ec_public_key: [0; 32],
            tx_id: Hash32::ZERO,
            index: 0,
            quantity: 1,
        };
        let mut raw = increase.marshal();
        assert_eq!(BalanceIncrease::unmarshal(&raw).unwrap(), increase);
        raw.push(0);
        assert!(BalanceIncrease::unmarshal(&raw).is_err());
    }
}
