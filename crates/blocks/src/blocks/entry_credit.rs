//! The entry-credit block: commits and balance changes at one height.

use crate::block_elements::{BalanceIncrease, ChainCommit, EntryCommit};
use crate::{FIRST_MINUTE, LAST_MINUTE};
use factom_types::codec;
use factom_types::error::DecodeError;
use factom_types::primitives::hash::{sha256, ChainId, Hash32, ENTRY_CREDIT_BLOCK_CHAIN_ID};
use factom_types::primitives::varint;
use once_cell::sync::OnceCell;
use serde_json::{json, Value};
use std::collections::BTreeMap;

/// One typed record in the entry-credit body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EcObject {
    /// `0x00` — an M1-era server index number, decoded passively.
    ServerIndexNumber(u8),
    /// `0x02` — a chain commit.
    ChainCommit(ChainCommit),
    /// `0x03` — an entry commit.
    EntryCommit(EntryCommit),
    /// `0x04` — a balance increase.
    BalanceIncrease(BalanceIncrease),
}

/// Body tag of the per-minute marker record.
const MINUTE_ECID: u8 = 0x01;

impl EcObject {
    /// The record's ECID tag byte.
    pub fn ecid(&self) -> u8 {
        match self {
            EcObject::ServerIndexNumber(_) => 0x00,
            EcObject::ChainCommit(_) => ChainCommit::ECID,
            EcObject::EntryCommit(_) => EntryCommit::ECID,
            EcObject::BalanceIncrease(_) => BalanceIncrease::ECID,
        }
    }

    /// Marshals the tag byte followed by the record payload.
    pub fn marshal(&self) -> Vec<u8> {
        let mut buf = vec![self.ecid()];
        match self {
            EcObject::ServerIndexNumber(index) => buf.push(*index),
            EcObject::ChainCommit(commit) => buf.extend_from_slice(&commit.marshal()),
            EcObject::EntryCommit(commit) => buf.extend_from_slice(&commit.marshal()),
            EcObject::BalanceIncrease(increase) => buf.extend_from_slice(&increase.marshal()),
        }
        buf
    }

    /// JSON projection for the RPC facade.
    pub fn to_json(&self) -> Value {
        match self {
            EcObject::ServerIndexNumber(index) => json!({ "server_index_number": index }),
            EcObject::ChainCommit(commit) => commit.to_json(),
            EcObject::EntryCommit(commit) => commit.to_json(),
            EcObject::BalanceIncrease(increase) => increase.to_json(),
        }
    }
}

/// Variable-width entry-credit-block header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryCreditBlockHeader {
    /// `SHA256` of the marshalled body.
    pub body_hash: Hash32,
    /// Header hash of the previous entry-credit block (zero at genesis).
    pub prev_header_hash: Hash32,
    /// Full hash of the previous entry-credit block (zero at genesis).
    pub prev_full_hash: Hash32,
    /// Block height.
    pub height: u32,
    /// Reserved forward-compatibility area, empty today.
    pub expansion_area: Vec<u8>,
    /// Number of body records, the ten minute markers included.
    pub object_count: u64,
    /// Marshalled body size in bytes.
    pub body_size: u64,
}

impl EntryCreditBlockHeader {
    /// Reserved chain id (`…0c`).
    pub const CHAIN_ID: ChainId = ENTRY_CREDIT_BLOCK_CHAIN_ID;

    /// Marshals the header.
    pub fn marshal(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        buf.extend_from_slice(&Self::CHAIN_ID.0);
        buf.extend_from_slice(&self.body_hash.0);
        buf.extend_from_slice(&self.prev_header_hash.0);
        buf.extend_from_slice(&self.prev_full_hash.0);
        buf.extend_from_slice(&self.height.to_be_bytes());
        buf.extend_from_slice(&varint::encode(self.expansion_area.len() as u64));
        buf.extend_from_slice(&self.expansion_area);
        buf.extend_from_slice(&self.object_count.to_be_bytes());
        buf.extend_from_slice(&self.body_size.to_be_bytes());
        buf
    }

    /// Unmarshals a header, returning the remainder.
    pub fn unmarshal_with_remainder(raw: &[u8]) -> Result<(Self, &[u8]), DecodeError> {
        let (chain_id, data) = codec::take_array::<32>(raw)?;
        if Hash32(chain_id) != Self::CHAIN_ID {
            return Err(DecodeError::BadChainId("entry credit block header"));
        }
        let (body_hash, data) = codec::take_array::<32>(data)?;
        let (prev_header_hash, data) = codec::take_array::<32>(data)?;
        let (prev_full_hash, data) = codec::take_array::<32>(data)?;
        let (height, data) = codec::take_u32_be(data)?;
        let (expansion_size, data) = varint::decode(data)?;
        let (expansion_area, data) = codec::take(data, expansion_size as usize)?;
        let (object_count, data) = codec::take_u64_be(data)?;
        let (body_size, data) = codec::take_u64_be(data)?;
        Ok((
            EntryCreditBlockHeader {
                body_hash: Hash32(body_hash),
                prev_header_hash: Hash32(prev_header_hash),
                prev_full_hash: Hash32(prev_full_hash),
                height,
                expansion_area: expansion_area.to_vec(),
                object_count,
                body_size,
            },
            data,
        ))
    }
}

/// Entry-credit body: typed records partitioned by minute, each minute
/// closed by an `0x01, minute` marker.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct EntryCreditBlockBody {
    /// Records keyed by minute (1..=10), insertion-ordered within a minute.
    pub objects: BTreeMap<u8, Vec<EcObject>>,
}

impl EntryCreditBlockBody {
    /// Marshals every minute's records followed by its marker.
    pub fn marshal(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        for (&minute, objects) in &self.objects {
            for object in objects {
                buf.extend_from_slice(&object.marshal());
            }
            buf.push(MINUTE_ECID);
            buf.push(minute);
        }
        buf
    }

    /// `SHA256` of the marshalled body.
    pub fn body_hash(&self) -> Hash32 {
        sha256(&self.marshal())
    }

    /// Number of records including one marker per minute present.
    pub fn object_count(&self) -> u64 {
        self.objects
            .values()
            .map(|objects| objects.len() as u64 + 1)
            .sum()
    }

    /// Ensures every minute 1..=10 is present, so a sealed body always
    /// carries exactly ten markers in ascending order.
    pub fn pad_minutes(&mut self) {
        for minute in FIRST_MINUTE..=LAST_MINUTE {
            self.objects.entry(minute).or_default();
        }
    }

    /// Unmarshals `object_count` records, returning the remainder.
    pub fn unmarshal_with_remainder(
        raw: &[u8],
        object_count: u64,
    ) -> Result<(Self, &[u8]), DecodeError> {
        let mut data = raw;
        let mut objects = BTreeMap::new();
        let mut current_minute = Vec::new();
        for _ in 0..object_count {
            let (ecid, rest) = codec::take_u8(data)?;
            match ecid {
                0x00 => {
                    let (index, rest) = codec::take_u8(rest)?;
                    current_minute.push(EcObject::ServerIndexNumber(index));
                    data = rest;
                }
                MINUTE_ECID => {
                    let (minute, rest) = codec::take_u8(rest)?;
                    if !(FIRST_MINUTE..=LAST_MINUTE).contains(&minute) {
                        return Err(DecodeError::FieldOutOfRange {
                            field: "entry credit minute",
                            value: u64::from(minute),
                        });
                    }
                    objects.insert(minute, std::mem::take(&mut current_minute));
                    data = rest;
                }
                tag if tag == ChainCommit::ECID => {
                    let (commit_bytes, rest) = codec::take(rest, ChainCommit::LENGTH)?;
                    current_minute.push(EcObject::ChainCommit(ChainCommit::unmarshal(
                        commit_bytes,
                    )?));
                    data = rest;
                }
                tag if tag == EntryCommit::ECID => {
                    let (commit_bytes, rest) = codec::take(rest, EntryCommit::LENGTH)?;
                    current_minute.push(EcObject::EntryCommit(EntryCommit::unmarshal(
                        commit_bytes,
                    )?));
                    data = rest;
                }
                tag if tag == BalanceIncrease::ECID => {
                    let (increase, rest) = BalanceIncrease::unmarshal_with_remainder(rest)?;
                    current_minute.push(EcObject::BalanceIncrease(increase));
                    data = rest;
                }
                tag => {
                    return Err(DecodeError::UnknownTag {
                        context: "entry credit object",
                        tag,
                    })
                }
            }
        }
        if !current_minute.is_empty() {
            return Err(DecodeError::CountMismatch {
                context: "entry credit body (records after the last minute marker)",
                expected: object_count,
                actual: object_count + current_minute.len() as u64,
            });
        }
        Ok((EntryCreditBlockBody { objects }, data))
    }

    /// Derives the header for this body.
    pub fn construct_header(
        &self,
        prev_header_hash: Hash32,
        prev_full_hash: Hash32,
        height: u32,
    ) -> EntryCreditBlockHeader {
        EntryCreditBlockHeader {
            body_hash: self.body_hash(),
            prev_header_hash,
            prev_full_hash,
            height,
            expansion_area: Vec::new(),
            object_count: self.object_count(),
            body_size: self.marshal().len() as u64,
        }
    }
}

/// A sealed entry-credit block.
#[derive(Debug, Clone)]
pub struct EntryCreditBlock {
    /// The derived header.
    pub header: EntryCreditBlockHeader,
    /// The record body.
    pub body: EntryCreditBlockBody,
    cached_header_hash: OnceCell<Hash32>,
    cached_full_hash: OnceCell<Hash32>,
}

impl EntryCreditBlock {
    /// Assembles a block from a header and its body.
    pub fn new(header: EntryCreditBlockHeader, body: EntryCreditBlockBody) -> Self {
        EntryCreditBlock {
            header,
            body,
            cached_header_hash: OnceCell::new(),
            cached_full_hash: OnceCell::new(),
        }
    }

    /// The store lookup key: `SHA256(marshalled header)`.
    pub fn header_hash(&self) -> Hash32 {
        *self
            .cached_header_hash
            .get_or_init(|| sha256(&self.header.marshal()))
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
        let (header, data) = EntryCreditBlockHeader::unmarshal_with_remainder(raw)?;
        let before = data.len();
        let (body, data) =
            EntryCreditBlockBody::unmarshal_with_remainder(data, header.object_count)?;
        let consumed = (before - data.len()) as u64;
        if consumed != header.body_size {
            return Err(DecodeError::BodySizeMismatch {
                expected: header.body_size,
                actual: consumed,
            });
        }
        Ok((EntryCreditBlock::new(header, body), data))
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
            "header_hash": self.header_hash().to_hex(),
            "body_hash": self.header.body_hash.to_hex(),
            "prev_header_hash": self.header.prev_header_hash.to_hex(),
            "prev_full_hash": self.header.prev_full_hash.to_hex(),
            "height": self.header.height,
            "expansion_area": hex::encode(&self.header.expansion_area),
            "object_count": self.header.object_count,
            "body_size": self.header.body_size,
            "objects": self.body.objects.iter().map(|(minute, objects)| {
                (minute.to_string(), json!(objects.iter().map(EcObject::to_json).collect::<Vec<_>>()))
            }).collect::<serde_json::Map<_, _>>(),
        })
    }
}

impl PartialEq for EntryCreditBlock {
    fn eq(&self, other: &Self) -> bool {
        self.header == other.header && self.body == other.body
    }
}

impl Eq for EntryCreditBlock {}

#[cfg(test)]
mod tests {
    use super::*;
    use factom_types::primitives::hash::sha256 as h;

    fn sample_commit() -> EntryCommit {
        EntryCommit {
            timestamp: 1_562_073_615_742,
            entry_hash: h(b"committed entry"),
            ec_spent: 2,
            ec_public_key: [0x31; 32],
            signature: [0x32; 64],
        }
    }

    fn sealed_body() -> EntryCreditBlockBody {
        let mut body = EntryCreditBlockBody::default();
        body.objects
            .entry(1)
            .or_default()
            .push(EcObject::ServerIndexNumber(0));
        body.objects
            .entry(2)
            .or_default()
            .push(EcObject::EntryCommit(sample_commit()));
        body.objects
            .entry(2)
            .or_default()
            .push(EcObject::ChainCommit(ChainCommit {
                timestamp: 1_562_073_615_742,
                chain_id_hash: h(b"chain id hash"),
                commit_weld: h(b"weld"),
                entry_hash: h(b"first entry"),
                ec_spent: 11,
                ec_public_key: [0x33; 32],
                signature: [0x34; 64],
            }));
        body.objects
            .entry(7)
            .or_default()
            .push(EcObject::BalanceIncrease(BalanceIncrease {
                ec_public_key: [0x35; 32],
                tx_id: h(b"purchase"),
                index: 0,
                quantity: 1000,
            }));
        body.pad_minutes();
        body
    }

    fn sealed_block() -> EntryCreditBlock {
        let body = sealed_body();
        let header = body.construct_header(h(b"prev header hash"), h(b"prev full hash"), 12);
        EntryCreditBlock::new(header, body)
    }

    #[test]
    fn test_round_trip() {
        let block = sealed_block();
        let raw = block.marshal();
        let decoded = EntryCreditBlock::unmarshal(&raw).unwrap();
        assert_eq!(decoded, block);
        assert_eq!(decoded.marshal(), raw);
    }

    #[test]
    fn test_object_count_includes_minute_markers() {
        let block = sealed_block();
        // 4 records + 10 markers.
        assert_eq!(block.header.object_count, 14);
    }

    #[test]
    fn test_sealed_body_has_ten_ascending_markers() {
        let raw = sealed_body().marshal();
        let mut minutes = Vec::new();
        let mut data = raw.as_slice();
        while !data.is_empty() {
            let (tag, rest) = codec::take_u8(data).unwrap();
            data = match tag {
                0x00 => &rest[1..],
                0x01 => {
                    minutes.push(rest[0]);
                    &rest[1..]
                }
                0x02 => &rest[ChainCommit::LENGTH..],
                0x03 => &rest[EntryCommit::LENGTH..],
                0x04 => BalanceIncrease::unmarshal_with_remainder(rest).unwrap().1,
                _ => panic!("unexpected tag"),
            };
        }
        assert_eq!(minutes, (1..=10).collect::<Vec<_>>());
    }

    #[test]
    fn test_body_hash_is_sha256_of_body() {
        let block = sealed_block();
        assert_eq!(block.header.body_hash, sha256(&block.body.marshal()));
        assert_eq!(block.header_hash(), sha256(&block.header.marshal()));
        assert_eq!(block.full_hash(), sha256(&block.marshal()));
    }

    #[test]
    fn test_unknown_ecid_rejected() {
        let mut body = EntryCreditBlockBody::default();
        body.pad_minutes();
        let mut raw = body.marshal();
        raw.insert(0, 0x05);
        raw.insert(1, 0x00);
        assert!(matches!(
            EntryCreditBlockBody::unmarshal_with_remainder(&raw, body.object_count() + 1),
            Err(DecodeError::UnknownTag { tag: 0x05, .. })
        ));
    }
}
