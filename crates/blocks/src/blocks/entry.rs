//! The per-chain entry block: one chain's entry hashes at one height.

use crate::{FIRST_MINUTE, LAST_MINUTE};
use factom_types::codec;
use factom_types::error::DecodeError;
use factom_types::primitives::hash::{sha256, ChainId, Hash32};
use factom_types::primitives::merkle;
use once_cell::sync::OnceCell;
use serde_json::{json, Value};
use std::collections::BTreeMap;

use super::DirectoryBlock;

/// Fixed-width entry-block header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EntryBlockHeader {
    /// The chain this block extends.
    pub chain_id: ChainId,
    /// Merkle root of the body items.
    pub body_mr: Hash32,
    /// Key-MR of this chain's previous entry block (zero for the first).
    pub prev_keymr: Hash32,
    /// Full hash of this chain's previous entry block (zero for the first).
    pub prev_full_hash: Hash32,
    /// Position of this block within its chain, starting at 0.
    pub sequence: u32,
    /// Directory-block height this block was sealed at.
    pub height: u32,
    /// Number of 32-byte body items, minute markers included.
    pub entry_count: u32,
}

impl EntryBlockHeader {
    /// Exact header width in bytes.
    pub const LENGTH: usize = 140;

    /// Marshals the header.
    pub fn marshal(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(Self::LENGTH);
        buf.extend_from_slice(&self.chain_id.0);
        buf.extend_from_slice(&self.body_mr.0);
        buf.extend_from_slice(&self.prev_keymr.0);
        buf.extend_from_slice(&self.prev_full_hash.0);
        buf.extend_from_slice(&self.sequence.to_be_bytes());
        buf.extend_from_slice(&self.height.to_be_bytes());
        buf.extend_from_slice(&self.entry_count.to_be_bytes());
        buf
    }

    /// Unmarshals an exactly [`Self::LENGTH`]-byte header.
    pub fn unmarshal(raw: &[u8]) -> Result<Self, DecodeError> {
        if raw.len() != Self::LENGTH {
            return Err(DecodeError::BadLength {
                context: "entry block header",
                expected: Self::LENGTH,
                actual: raw.len(),
            });
        }
        let (chain_id, data) = codec::take_array::<32>(raw)?;
        let (body_mr, data) = codec::take_array::<32>(data)?;
        let (prev_keymr, data) = codec::take_array::<32>(data)?;
        let (prev_full_hash, data) = codec::take_array::<32>(data)?;
        let (sequence, data) = codec::take_u32_be(data)?;
        let (height, data) = codec::take_u32_be(data)?;
        let (entry_count, data) = codec::take_u32_be(data)?;
        codec::expect_empty(data)?;
        Ok(EntryBlockHeader {
            chain_id: Hash32(chain_id),
            body_mr: Hash32(body_mr),
            prev_keymr: Hash32(prev_keymr),
            prev_full_hash: Hash32(prev_full_hash),
            sequence,
            height,
            entry_count,
        })
    }
}

/// Entry-block body: entry hashes partitioned by minute.
///
/// On the wire every minute boundary is a 32-byte pseudo-hash of 31 zero
/// bytes followed by the minute number. Valid entry hashes are effectively
/// random 256-bit values, so the discriminator cannot collide in practice.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct EntryBlockBody {
    /// Entry hashes keyed by minute (1..=10), insertion-ordered within a
    /// minute.
    pub entry_hashes: BTreeMap<u8, Vec<Hash32>>,
}

fn minute_marker(minute: u8) -> Hash32 {
    let mut bytes = [0u8; 32];
    bytes[31] = minute;
    Hash32(bytes)
}

fn as_minute_marker(hash: &Hash32) -> Option<u8> {
    let minute = hash.0[31];
    if (FIRST_MINUTE..=LAST_MINUTE).contains(&minute) && hash.0[..31].iter().all(|&b| b == 0) {
        Some(minute)
    } else {
        None
    }
}

impl EntryBlockBody {
    fn items(&self) -> Vec<Hash32> {
        let mut items = Vec::new();
        for (&minute, hashes) in &self.entry_hashes {
            items.extend_from_slice(hashes);
            items.push(minute_marker(minute));
        }
        items
    }

    /// Merkle root over entry hashes and minute markers, in body order.
    pub fn merkle_root(&self) -> Hash32 {
        merkle::merkle_root(&self.items())
    }

    /// Number of 32-byte body items, markers included.
    pub fn entry_count(&self) -> u32 {
        self.items().len() as u32
    }

    /// Ensures every minute 1..=10 is present, so a sealed body always
    /// carries exactly ten markers.
    pub fn pad_minutes(&mut self) {
        for minute in FIRST_MINUTE..=LAST_MINUTE {
            self.entry_hashes.entry(minute).or_default();
        }
    }

    /// Marshals the body.
    pub fn marshal(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        for item in self.items() {
            buf.extend_from_slice(&item.0);
        }
        buf
    }

    /// Unmarshals a body of `entry_count` items, returning the remainder.
    pub fn unmarshal_with_remainder(
        raw: &[u8],
        entry_count: u32,
    ) -> Result<(Self, &[u8]), DecodeError> {
        let mut data = raw;
        let mut entry_hashes = BTreeMap::new();
        let mut current_minute = Vec::new();
        for _ in 0..entry_count {
            let (item, rest) = codec::take_array::<32>(data)?;
            data = rest;
            let item = Hash32(item);
            match as_minute_marker(&item) {
                Some(minute) => {
                    entry_hashes.insert(minute, std::mem::take(&mut current_minute));
                }
                None => current_minute.push(item),
            }
        }
        if !current_minute.is_empty() {
            return Err(DecodeError::CountMismatch {
                context: "entry block body (trailing entries without a minute marker)",
                expected: u64::from(entry_count),
                actual: u64::from(entry_count) + current_minute.len() as u64,
            });
        }
        Ok((EntryBlockBody { entry_hashes }, data))
    }

    /// Derives the header for this body.
    pub fn construct_header(
        &self,
        chain_id: ChainId,
        prev_keymr: Hash32,
        prev_full_hash: Hash32,
        sequence: u32,
        height: u32,
    ) -> EntryBlockHeader {
        EntryBlockHeader {
            chain_id,
            body_mr: self.merkle_root(),
            prev_keymr,
            prev_full_hash,
            sequence,
            height,
            entry_count: self.entry_count(),
        }
    }

    /// The minute a given entry hash landed in, if present.
    pub fn minute_of(&self, entry_hash: &Hash32) -> Option<u8> {
        for (&minute, hashes) in &self.entry_hashes {
            if hashes.contains(entry_hash) {
                return Some(minute);
            }
        }
        None
    }
}

/// A sealed entry block.
#[derive(Debug, Clone)]
pub struct EntryBlock {
    /// The derived header.
    pub header: EntryBlockHeader,
    /// The minute-partitioned body.
    pub body: EntryBlockBody,
    /// Key-MR of the directory block above, derived via [`Self::add_context`].
    pub directory_block_keymr: Option<Hash32>,
    /// Directory-block timestamp in minutes, derived via [`Self::add_context`].
    pub timestamp: Option<u32>,
    cached_keymr: OnceCell<Hash32>,
    cached_full_hash: OnceCell<Hash32>,
}

impl EntryBlock {
    /// Assembles a block from a header and its body.
    pub fn new(header: EntryBlockHeader, body: EntryBlockBody) -> Self {
        EntryBlock {
            header,
            body,
            directory_block_keymr: None,
            timestamp: None,
            cached_keymr: OnceCell::new(),
            cached_full_hash: OnceCell::new(),
        }
    }

    /// The canonical identifier: `SHA256(SHA256(header) ‖ body_mr)`.
    pub fn keymr(&self) -> Hash32 {
        *self
            .cached_keymr
            .get_or_init(|| merkle::compute_keymr(&self.header.marshal(), &self.body.merkle_root()))
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
        let (header_bytes, data) = codec::take(raw, EntryBlockHeader::LENGTH)?;
        let header = EntryBlockHeader::unmarshal(header_bytes)?;
        let (body, data) = EntryBlockBody::unmarshal_with_remainder(data, header.entry_count)?;
        Ok((EntryBlock::new(header, body), data))
    }

    /// Unmarshals exactly one block; trailing bytes are an error.
    pub fn unmarshal(raw: &[u8]) -> Result<Self, DecodeError> {
        let (block, rest) = Self::unmarshal_with_remainder(raw)?;
        codec::expect_empty(rest)?;
        Ok(block)
    }

    /// Fills the derived context from the containing directory block.
    pub fn add_context(&mut self, directory_block: &DirectoryBlock) {
        self.directory_block_keymr = Some(directory_block.keymr());
        self.timestamp = Some(directory_block.header.timestamp);
    }

    /// JSON projection for the RPC facade.
    pub fn to_json(&self) -> Value {
        json!({
            "keymr": self.keymr().to_hex(),
            "chain_id": self.header.chain_id.to_hex(),
            "prev_keymr": self.header.prev_keymr.to_hex(),
            "prev_full_hash": self.header.prev_full_hash.to_hex(),
            "sequence": self.header.sequence,
            "height": self.header.height,
            "entry_hashes": self.body.entry_hashes.iter().map(|(minute, hashes)| {
                (minute.to_string(), json!(hashes.iter().map(|h| h.to_hex()).collect::<Vec<_>>()))
            }).collect::<serde_json::Map<_, _>>(),
            "directory_block_keymr": self.directory_block_keymr.map(|h| h.to_hex()),
            "timestamp": self.timestamp,
        })
    }
}

impl PartialEq for EntryBlock {
    fn eq(&self, other: &Self) -> bool {
        self.header == other.header && self.body == other.body
    }
}

impl Eq for EntryBlock {}
