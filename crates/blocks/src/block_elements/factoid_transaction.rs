//! The factoid transaction and its redeem-condition records.

use factom_types::codec;
use factom_types::error::DecodeError;
use factom_types::primitives::hash::{sha256, Hash32};
use factom_types::primitives::{timestamp, varint};
use once_cell::sync::OnceCell;
use serde_json::{json, Value};

/// A (varint amount, 32-byte address) pair. Inputs and outputs carry a
/// factoid address (RCD hash); EC purchases carry an EC public key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AmountAddress {
    /// Amount in factoshis (or entry credits for purchases).
    pub value: u64,
    /// The receiving or spending address.
    pub address: Hash32,
}

/// A type-1 redeem-condition record: raw Ed25519 key plus signature.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RcdSignature {
    /// The spending public key; its hash must equal the input address.
    pub public_key: [u8; 32],
    /// Signature over the transaction's ledger prefix.
    pub signature: [u8; 64],
}

impl RcdSignature {
    /// The only RCD version in circulation.
    pub const VERSION: u8 = 0x01;
}

/// A factoid transfer: inputs, outputs, EC purchases, and one RCD per
/// input.
///
/// The transaction id commits to the ledger prefix only (everything before
/// the RCD records), so adding signatures never changes the id.
#[derive(Debug, Clone, Default)]
pub struct FactoidTransaction {
    /// Milliseconds since the Unix epoch (6 bytes on the wire).
    pub timestamp: u64,
    /// Spent outputs.
    pub inputs: Vec<AmountAddress>,
    /// Newly created outputs.
    pub outputs: Vec<AmountAddress>,
    /// Entry-credit purchases.
    pub ec_purchases: Vec<AmountAddress>,
    /// One redeemer record per input, in input order.
    pub rcds: Vec<RcdSignature>,
    cached_tx_id: OnceCell<Hash32>,
}

impl FactoidTransaction {
    /// Wire version byte.
    pub const VERSION: u8 = 0x02;

    /// Builds a transaction; the tx id is derived lazily.
    pub fn new(
        timestamp: u64,
        inputs: Vec<AmountAddress>,
        outputs: Vec<AmountAddress>,
        ec_purchases: Vec<AmountAddress>,
        rcds: Vec<RcdSignature>,
    ) -> Self {
        FactoidTransaction {
            timestamp,
            inputs,
            outputs,
            ec_purchases,
            rcds,
            cached_tx_id: OnceCell::new(),
        }
    }

    /// True for the block reward: no inputs, no purchases, no redeemers.
    pub fn is_coinbase(&self) -> bool {
        self.inputs.is_empty() && self.ec_purchases.is_empty() && self.rcds.is_empty()
    }

    /// Marshals the ledger prefix: everything up to and excluding the RCDs.
    pub fn marshal_ledger(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        buf.push(Self::VERSION);
        buf.extend_from_slice(&timestamp::encode_millis(self.timestamp));
        buf.push(self.inputs.len() as u8);
        buf.push(self.outputs.len() as u8);
        buf.push(self.ec_purchases.len() as u8);
        for io in self
            .inputs
            .iter()
            .chain(&self.outputs)
            .chain(&self.ec_purchases)
        {
            buf.extend_from_slice(&varint::encode(io.value));
            buf.extend_from_slice(&io.address.0);
        }
        buf
    }

    /// Marshals the full transaction.
    pub fn marshal(&self) -> Vec<u8> {
        let mut buf = self.marshal_ledger();
        for rcd in &self.rcds {
            buf.push(RcdSignature::VERSION);
            buf.extend_from_slice(&rcd.public_key);
            buf.extend_from_slice(&rcd.signature);
        }
        buf
    }

    /// The transaction id: `SHA256` over the ledger prefix.
    pub fn tx_id(&self) -> Hash32 {
        *self
            .cached_tx_id
            .get_or_init(|| sha256(&self.marshal_ledger()))
    }

    /// The full-content hash used as this transaction's Merkle leaf.
    pub fn hash(&self) -> Hash32 {
        sha256(&self.marshal())
    }

    /// Unmarshals a transaction, returning the remainder.
    pub fn unmarshal_with_remainder(raw: &[u8]) -> Result<(Self, &[u8]), DecodeError> {
        let (version, data) = codec::take_u8(raw)?;
        if version != Self::VERSION {
            return Err(DecodeError::UnknownTag {
                context: "factoid transaction version",
                tag: version,
            });
        }
        let (ts_bytes, data) = codec::take_array::<6>(data)?;
        let (input_count, data) = codec::take_u8(data)?;
        let (output_count, data) = codec::take_u8(data)?;
        let (purchase_count, data) = codec::take_u8(data)?;

        let (inputs, data) = take_amount_addresses(input_count, data)?;
        let (outputs, data) = take_amount_addresses(output_count, data)?;
        let (ec_purchases, mut data) = take_amount_addresses(purchase_count, data)?;

        let mut rcds = Vec::with_capacity(input_count as usize);
        for _ in 0..input_count {
            let (rcd_version, rest) = codec::take_u8(data)?;
            if rcd_version != RcdSignature::VERSION {
                return Err(DecodeError::UnknownTag {
                    context: "rcd version",
                    tag: rcd_version,
                });
            }
            let (public_key, rest) = codec::take_array::<32>(rest)?;
            let (signature, rest) = codec::take_array::<64>(rest)?;
            rcds.push(RcdSignature {
                public_key,
                signature,
            });
            data = rest;
        }

        Ok((
            FactoidTransaction::new(
                timestamp::decode_millis(&ts_bytes),
                inputs,
                outputs,
                ec_purchases,
                rcds,
            ),
            data,
        ))
    }

    /// Unmarshals exactly one transaction; trailing bytes are an error.
    pub fn unmarshal(raw: &[u8]) -> Result<Self, DecodeError> {
        let (tx, rest) = Self::unmarshal_with_remainder(raw)?;
        codec::expect_empty(rest)?;
        Ok(tx)
    }

    /// JSON projection for the RPC facade.
    pub fn to_json(&self) -> Value {
        let io_json = |io: &AmountAddress, key: &str| {
            let mut object = serde_json::Map::new();
            object.insert("value".to_string(), json!(io.value));
            object.insert(key.to_string(), json!(io.address.to_hex()));
            Value::Object(object)
        };
        json!({
            "tx_id": self.tx_id().to_hex(),
            "timestamp": self.timestamp,
            "inputs": self.inputs.iter().map(|io| io_json(io, "fct_address")).collect::<Vec<_>>(),
            "outputs": self.outputs.iter().map(|io| io_json(io, "fct_address")).collect::<Vec<_>>(),
            "ec_purchases": self.ec_purchases.iter().map(|io| io_json(io, "ec_public_key")).collect::<Vec<_>>(),
            "rcds": self.rcds.iter().map(|rcd| json!({
                "fct_public_key": hex::encode(rcd.public_key),
                "signature": hex::encode(rcd.signature),
            })).collect::<Vec<_>>(),
        })
    }
}

fn take_amount_addresses(
    count: u8,
    mut data: &[u8],
) -> Result<(Vec<AmountAddress>, &[u8]), DecodeError> {
    let mut ios = Vec::with_capacity(count as usize);
    for _ in 0..count {
        let (value, rest) = varint::decode(data)?;
        let (address, rest) = codec::take_array::<32>(rest)?;
        ios.push(AmountAddress {
            value,
            address: Hash32(address),
        });
        data = rest;
    }
    Ok((ios, data))
}

impl PartialEq for FactoidTransaction {
    fn eq(&self, other: &Self) -> bool {
        self.timestamp == other.timestamp
            && self.inputs == other.inputs
            && self.outputs == other.outputs
            && self.ec_purchases == other.ec_purchases
            && self.rcds == other.rcds
    }
}

impl Eq for FactoidTransaction {}
