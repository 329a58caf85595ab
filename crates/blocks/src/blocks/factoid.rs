//! The factoid block: value transfers at one height.

use crate::block_elements::FactoidTransaction;
use crate::{FIRST_MINUTE, LAST_MINUTE};
use factom_types::codec;
use factom_types::error::DecodeError;
use factom_types::primitives::hash::{sha256, ChainId, Hash32, FACTOID_BLOCK_CHAIN_ID};
use factom_types::primitives::{merkle, varint};
use once_cell::sync::OnceCell;
use serde_json::{json, Value};
use std::collections::BTreeMap;

/// Variable-width factoid-block header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FactoidBlockHeader {
    /// Merkle root of the body (transaction hashes plus minute markers).
    pub body_mr: Hash32,
    /// Key-MR of the previous factoid block (zero at genesis).
    pub prev_keymr: Hash32,
    /// Ledger key-MR of the previous factoid block (zero at genesis).
    pub prev_ledger_keymr: Hash32,
    /// Entry credits granted per factoid kilo-unit, set by the oracle.
    pub ec_exchange_rate: u64,
    /// Block height.
    pub height: u32,
    /// Reserved forward-compatibility area, empty today.
    pub expansion_area: Vec<u8>,
    /// Number of transactions in the body, markers excluded.
    pub transaction_count: u32,
    /// Marshalled body size in bytes.
    pub body_size: u32,
}

impl FactoidBlockHeader {
    /// Reserved chain id (`…0f`).
    pub const CHAIN_ID: ChainId = FACTOID_BLOCK_CHAIN_ID;

    /// Marshals the header.
    pub fn marshal(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        buf.extend_from_slice(&Self::CHAIN_ID.0);
        buf.extend_from_slice(&self.body_mr.0);
        buf.extend_from_slice(&self.prev_keymr.0);
        buf.extend_from_slice(&self.prev_ledger_keymr.0);
        buf.extend_from_slice(&self.ec_exchange_rate.to_be_bytes());
        buf.extend_from_slice(&self.height.to_be_bytes());
        buf.extend_from_slice(&varint::encode(self.expansion_area.len() as u64));
        buf.extend_from_slice(&self.expansion_area);
        buf.extend_from_slice(&self.transaction_count.to_be_bytes());
        buf.extend_from_slice(&self.body_size.to_be_bytes());
        buf
    }

    /// Unmarshals a header, returning the remainder.
    pub fn unmarshal_with_remainder(raw: &[u8]) -> Result<(Self, &[u8]), DecodeError> {
        let (chain_id, data) = codec::take_array::<32>(raw)?;
        if Hash32(chain_id) != Self::CHAIN_ID {
            return Err(DecodeError::BadChainId("factoid block header"));
        }
        let (body_mr, data) = codec::take_array::<32>(data)?;
        let (prev_keymr, data) = codec::take_array::<32>(data)?;
        let (prev_ledger_keymr, data) = codec::take_array::<32>(data)?;
        let (ec_exchange_rate, data) = codec::take_u64_be(data)?;
        let (height, data) = codec::take_u32_be(data)?;
        let (expansion_size, data) = varint::decode(data)?;
        let (expansion_area, data) = codec::take(data, expansion_size as usize)?;
        let (transaction_count, data) = codec::take_u32_be(data)?;
        let (body_size, data) = codec::take_u32_be(data)?;
        Ok((
            FactoidBlockHeader {
                body_mr: Hash32(body_mr),
                prev_keymr: Hash32(prev_keymr),
                prev_ledger_keymr: Hash32(prev_ledger_keymr),
                ec_exchange_rate,
                height,
                expansion_area: expansion_area.to_vec(),
                transaction_count,
                body_size,
            },
            data,
        ))
    }
}

/// Factoid body: transactions partitioned by minute, each minute closed by
/// a single `0x00` terminator. A transaction always starts with version
/// `0x02`, so the terminator is unambiguous.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct FactoidBlockBody {
    /// Transactions keyed by minute (1..=10), insertion-ordered within a
    /// minute.
    pub transactions: BTreeMap<u8, Vec<FactoidTransaction>>,
}

impl FactoidBlockBody {
    /// Marshals every minute's transactions followed by its terminator.
    pub fn marshal(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        for transactions in self.transactions.values() {
            for tx in transactions {
                buf.extend_from_slice(&tx.marshal());
            }
            buf.push(0x00);
        }
        buf
    }

    /// Merkle leaves: the hash of each transaction plus a `SHA256(0x00)`
    /// marker per minute.
    pub fn merkle_root(&self) -> Hash32 {
        let marker = sha256(&[0x00]);
        let mut leaves = Vec::new();
        for transactions in self.transactions.values() {
            for tx in transactions {
                leaves.push(tx.hash());
            }
            leaves.push(marker);
        }
        merkle::merkle_root(&leaves)
    }

    /// Ledger Merkle leaves: per-transaction tx-ids (the signature-free
    /// view) plus the same per-minute marker.
    pub fn ledger_merkle_root(&self) -> Hash32 {
        let marker = sha256(&[0x00]);
        let mut leaves = Vec::new();
        for transactions in self.transactions.values() {
            for tx in transactions {
                leaves.push(tx.tx_id());
            }
            leaves.push(marker);
        }
        merkle::merkle_root(&leaves)
    }

    /// Number of transactions, markers excluded.
    pub fn transaction_count(&self) -> u32 {
        self.transactions
            .values()
            .map(|transactions| transactions.len() as u32)
            .sum()
    }

    /// Ensures every minute 1..=10 is present, so a sealed body always
    /// ends with exactly ten terminators.
    pub fn pad_minutes(&mut self) {
        for minute in FIRST_MINUTE..=LAST_MINUTE {
            self.transactions.entry(minute).or_default();
        }
    }

    /// Unmarshals a body by walking transactions until the tenth minute
    /// terminator, returning the remainder.
    pub fn unmarshal_with_remainder(raw: &[u8]) -> Result<(Self, &[u8]), DecodeError> {
        let mut data = raw;
        let mut transactions = BTreeMap::new();
        let mut current_minute = Vec::new();
        let mut minute = FIRST_MINUTE;
        loop {
            let (first, _) = codec::take_u8(data)?;
            if first == 0x00 {
                data = &data[1..];
                transactions.insert(minute, std::mem::take(&mut current_minute));
                if minute == LAST_MINUTE {
                    break;
                }
                minute += 1;
                continue;
            }
            let (tx, rest) = FactoidTransaction::unmarshal_with_remainder(data)?;
            current_minute.push(tx);
            data = rest;
        }
        Ok((FactoidBlockBody { transactions }, data))
    }

    /// Derives the header for this body.
    pub fn construct_header(
        &self,
        prev_keymr: Hash32,
        prev_ledger_keymr: Hash32,
        ec_exchange_rate: u64,
        height: u32,
    ) -> FactoidBlockHeader {
        FactoidBlockHeader {
            body_mr: self.merkle_root(),
            prev_keymr,
            prev_ledger_keymr,
            ec_exchange_rate,
            height,
            expansion_area: Vec::new(),
            transaction_count: self.transaction_count(),
            body_size: self.marshal().len() as u32,
        }
    }
}

/// A sealed factoid block.
#[derive(Debug, Clone)]
pub struct FactoidBlock {
    /// The derived header.
    pub header: FactoidBlockHeader,
    /// The transaction body.
    pub body: FactoidBlockBody,
    cached_keymr: OnceCell<Hash32>,
    cached_ledger_keymr: OnceCell<Hash32>,
    cached_full_hash: OnceCell<Hash32>,
}

impl FactoidBlock {
    /// Assembles a block from a header and its body.
    pub fn new(header: FactoidBlockHeader, body: FactoidBlockBody) -> Self {
        FactoidBlock {
            header,
            body,
            cached_keymr: OnceCell::new(),
            cached_ledger_keymr: OnceCell::new(),
            cached_full_hash: OnceCell::new(),
        }
    }

    /// The canonical identifier: `SHA256(SHA256(header) ‖ body_mr)`.
    pub fn keymr(&self) -> Hash32 {
        *self
            .cached_keymr
            .get_or_init(|| merkle::compute_keymr(&self.header.marshal(), &self.body.merkle_root()))
    }

    /// The ledger identifier: the key-MR formula over the ledger MR, which
    /// omits every signature.
    pub fn ledger_keymr(&self) -> Hash32 {
        *self.cached_ledger_keymr.get_or_init(|| {
            merkle::compute_keymr(&self.header.marshal(), &self.body.ledger_merkle_root())
        })
    }

    /// `SHA256` of header ‖ body.
    pub fn full_hash(&self) -> Hash32 {
        *self.cached_full_hash.get_or_init(|| sha256(&self.marshal()))
    }

    /// Marshals header then body.
    pub fn marshal(&self) -> Vec<u8> {
        let mut buf = self.header.marshal();
        buf.extend_from_slice(&self.body.marshal());
        buf
    }

    /// Unmarshals a block, returning the remainder.
    pub fn unmarshal_with_remainder(raw: &[u8]) -> Result<(Self, &[u8]), DecodeError> {
        let (header, data) = FactoidBlockHeader::unmarshal_with_remainder(raw)?;
        let before = data.len();
        let (body, data) = FactoidBlockBody::unmarshal_with_remainder(data)?;
        let consumed = (before - data.len()) as u64;
        if consumed != u64::from(header.body_size) {
            return Err(DecodeError::BodySizeMismatch {
                expected: u64::from(header.body_size),
                actual: consumed,
            });
        }
        let actual_count = body.transaction_count();
        if actual_count != header.transaction_count {
            return Err(DecodeError::CountMismatch {
                context: "factoid block transactions",
                expected: u64::from(header.transaction_count),
                actual: u64::from(actual_count),
            });
        }
        Ok((FactoidBlock::new(header, body), data))
    }

    /// Unmarshals exactly one block; trailing bytes are an error.
    pub fn unmarshal(raw: &[u8]) -> Result<Self, DecodeError> {
        let (block, rest) = Self::unmarshal_with_remainder(raw)?;
        codec::expect_empty(rest)?;
        Ok(block)
    }

    /// JSON projection for the RPC facade.
    pub fn to_json(&self) -> Value {
        json!({
            "keymr": self.keymr().to_hex(),
            "body_mr": self.header.body_mr.to_hex(),
            "prev_keymr": self.header.prev_keymr.to_hex(),
            "prev_ledger_keymr": self.header.prev_ledger_keymr.to_hex(),
            "ec_exchange_rate": self.header.ec_exchange_rate,
            "height": self.header.height,
            "transaction_count": self.header.transaction_count,
            "body_size": self.header.body_size,
            "transactions": self.body.transactions.iter().map(|(minute, transactions)| {
                (minute.to_string(), json!(transactions.iter().map(FactoidTransaction::to_json).collect::<Vec<_>>()))
            }).collect::<serde_json::Map<_, _>>(),
        })
    }
}

impl PartialEq for FactoidBlock {
    fn eq(&self, other: &Self) -> bool {
        self.header == other.header && self.body == other.body
    }
}

impl Eq for FactoidBlock {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::block_elements::{AmountAddress, RcdSignature};

    fn coinbase() -> FactoidTransaction {
        FactoidTransaction::new(
            1_409_850_000_000,
            Vec::new(),
            vec![AmountAddress {
                value: 5_000_000_000,
                address: sha256(b"miner"),
            }],
            Vec::new(),
            Vec::new(),
        )
    }

    fn transfer() -> FactoidTransaction {
        FactoidTransaction::new(
            1_409_850_060_000,
            vec![AmountAddress {
                value: 1_000_000,
                address: sha256(b"spender"),
            }],
            vec![AmountAddress {
                value: 900_000,
                address: sha256(b"receiver"),
            }],
            vec![AmountAddress {
                value: 50_000,
                address: sha256(b"ec buyer"),
            }],
            vec![RcdSignature {
                public_key: [0x77; 32],
                signature: [0x88; 64],
            }],
        )
    }

    fn sealed_block() -> FactoidBlock {
        let mut body = FactoidBlockBody::default();
        body.transactions.entry(1).or_default().push(coinbase());
        body.transactions.entry(3).or_default().push(transfer());
        body.pad_minutes();
        let header = body.construct_header(sha256(b"prev keymr"), sha256(b"prev ledger"), 1000, 9);
        FactoidBlock::new(header, body)
    }

    #[test]
    fn test_round_trip() {
        let block = sealed_block();
        let raw = block.marshal();
        let decoded = FactoidBlock::unmarshal(&raw).unwrap();
        assert_eq!(decoded, block);
        assert_eq!(decoded.marshal(), raw);
    }

    #[test]
    fn test_sealed_body_ends_with_ten_terminators() {
        let block = sealed_block();
        let body = block.body.marshal();
        // Minutes 4..=10 are empty, so the body ends in seven bare
        // terminators; ten in total.
        assert!(body.ends_with(&[0x00; 7]));
        let (decoded, rest) = FactoidBlockBody::unmarshal_with_remainder(&body).unwrap();
        assert!(rest.is_empty());
        assert_eq!(decoded.transactions.len(), 10);
    }

    #[test]
    fn test_transaction_count_excludes_markers() {
        let block = sealed_block();
        assert_eq!(block.header.transaction_count, 2);
    }

    #[test]
    fn test_ledger_keymr_ignores_signatures() {
        let block = sealed_block();

        let mut stripped_body = block.body.clone();
        for transactions in stripped_body.transactions.values_mut() {
            for tx in transactions.iter_mut() {
                for rcd in tx.rcds.iter_mut() {
                    rcd.signature = [0u8; 64];
                }
            }
        }
        // Same ledger view, different full-content view.
        assert_eq!(
            stripped_body.ledger_merkle_root(),
            block.body.ledger_merkle_root()
        );
        assert_ne!(stripped_body.merkle_root(), block.body.merkle_root());
        assert_ne!(block.keymr(), block.ledger_keymr());
    }

    #[test]
    fn test_count_mismatch_rejected() {
        let block = sealed_block();
        let mut raw = block.marshal();
        // The transaction count sits 8 bytes before the body.
        let count_offset = raw.len() - block.header.body_size as usize - 8;
        raw[count_offset..count_offset + 4].copy_from_slice(&3u32.to_be_bytes());
        assert!(matches!(
            FactoidBlock::unmarshal(&raw),
            Err(DecodeError::CountMismatch { .. })
        ));
    }
}
