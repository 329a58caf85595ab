//! The admin block: authority-set bookkeeping at one height.

use crate::block_elements::AdminMessage;
use factom_types::codec;
use factom_types::error::DecodeError;
use factom_types::primitives::hash::{sha256, sha512_truncated, ChainId, Hash32, ADMIN_BLOCK_CHAIN_ID};
use factom_types::primitives::varint;
use once_cell::sync::OnceCell;
use serde_json::{json, Value};

/// Variable-width admin-block header (the expansion area is
/// varint-length-prefixed).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdminBlockHeader {
    /// Back-reference hash of the previous admin block (zero at genesis).
    pub back_reference_hash: Hash32,
    /// Block height.
    pub height: u32,
    /// Reserved forward-compatibility area, empty today.
    pub expansion_area: Vec<u8>,
    /// Number of messages in the body.
    pub message_count: u32,
    /// Marshalled body size in bytes.
    pub body_size: u32,
}

impl AdminBlockHeader {
    /// Reserved chain id (`…0a`).
    pub const CHAIN_ID: ChainId = ADMIN_BLOCK_CHAIN_ID;

    /// Marshals the header.
    pub fn marshal(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        buf.extend_from_slice(&Self::CHAIN_ID.0);
        buf.extend_from_slice(&self.back_reference_hash.0);
        buf.extend_from_slice(&self.height.to_be_bytes());
        buf.extend_from_slice(&varint::encode(self.expansion_area.len() as u64));
        buf.extend_from_slice(&self.expansion_area);
        buf.extend_from_slice(&self.message_count.to_be_bytes());
        buf.extend_from_slice(&self.body_size.to_be_bytes());
        buf
    }

    /// Unmarshals a header, returning the remainder.
    pub fn unmarshal_with_remainder(raw: &[u8]) -> Result<(Self, &[u8]), DecodeError> {
        let (chain_id, data) = codec::take_array::<32>(raw)?;
        if Hash32(chain_id) != Self::CHAIN_ID {
            return Err(DecodeError::BadChainId("admin block header"));
        }
        let (back_reference_hash, data) = codec::take_array::<32>(data)?;
        let (height, data) = codec::take_u32_be(data)?;
        let (expansion_size, data) = varint::decode(data)?;
        let (expansion_area, data) = codec::take(data, expansion_size as usize)?;
        let (message_count, data) = codec::take_u32_be(data)?;
        let (body_size, data) = codec::take_u32_be(data)?;
        Ok((
            AdminBlockHeader {
                back_reference_hash: Hash32(back_reference_hash),
                height,
                expansion_area: expansion_area.to_vec(),
                message_count,
                body_size,
            },
            data,
        ))
    }
}

/// Admin-block body: a tagged message sequence.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct AdminBlockBody {
    /// Messages in insertion order.
    pub messages: Vec<AdminMessage>,
}

impl AdminBlockBody {
    /// Marshals every message in order.
    pub fn marshal(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        for message in &self.messages {
            buf.extend_from_slice(&message.marshal());
        }
        buf
    }

    /// Unmarshals `message_count` messages, returning the remainder.
    pub fn unmarshal_with_remainder(
        raw: &[u8],
        message_count: u32,
    ) -> Result<(Self, &[u8]), DecodeError> {
        let mut data = raw;
        let mut messages = Vec::with_capacity(message_count as usize);
        for _ in 0..message_count {
            let (message, rest) = AdminMessage::unmarshal_with_remainder(data)?;
            messages.push(message);
            data = rest;
        }
        Ok((AdminBlockBody { messages }, data))
    }

    /// Derives the header for this body.
    pub fn construct_header(&self, back_reference_hash: Hash32, height: u32) -> AdminBlockHeader {
        AdminBlockHeader {
            back_reference_hash,
            height,
            expansion_area: Vec::new(),
            message_count: self.messages.len() as u32,
            body_size: self.marshal().len() as u32,
        }
    }
}

/// A sealed admin block.
#[derive(Debug, Clone)]
pub struct AdminBlock {
    /// The derived header.
    pub header: AdminBlockHeader,
    /// The message body.
    pub body: AdminBlockBody,
    cached_lookup_hash: OnceCell<Hash32>,
    cached_back_reference_hash: OnceCell<Hash32>,
}

impl AdminBlock {
    /// Assembles a block from a header and its body.
    pub fn new(header: AdminBlockHeader, body: AdminBlockBody) -> Self {
        AdminBlock {
            header,
            body,
            cached_lookup_hash: OnceCell::new(),
            cached_back_reference_hash: OnceCell::new(),
        }
    }

    /// The store lookup key: `SHA256(marshalled)`.
    pub fn lookup_hash(&self) -> Hash32 {
        *self
            .cached_lookup_hash
            .get_or_init(|| sha256(&self.marshal()))
    }

    /// The value the *next* admin block's header binds to:
    /// `SHA512(marshalled)` truncated to 32 bytes.
    pub fn back_reference_hash(&self) -> Hash32 {
        *self
            .cached_back_reference_hash
            .get_or_init(|| sha512_truncated(&self.marshal()))
    }

    /// Marshals header then body.
    pub fn marshal(&self) -> Vec<u8> {
        let mut buf = self.header.marshal();
        buf.extend_from_slice(&self.body.marshal());
        buf
    }

    /// Unmarshals a block, returning the remainder.
    pub fn unmarshal_with_remainder(raw: &[u8]) -> Result<(Self, &[u8]), DecodeError> {
        let (header, data) = AdminBlockHeader::unmarshal_with_remainder(raw)?;
        let before = data.len();
        let (body, data) = AdminBlockBody::unmarshal_with_remainder(data, header.message_count)?;
        let consumed = (before - data.len()) as u64;
        if consumed != u64::from(header.body_size) {
            return Err(DecodeError::BodySizeMismatch {
                expected: u64::from(header.body_size),
                actual: consumed,
            });
        }
        Ok((AdminBlock::new(header, body), data))
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
            "lookup_hash": self.lookup_hash().to_hex(),
            "back_reference_hash": self.header.back_reference_hash.to_hex(),
            "height": self.header.height,
            "expansion_area": hex::encode(&self.header.expansion_area),
            "message_count": self.header.message_count,
            "body_size": self.header.body_size,
            "messages": self.body.messages.iter().map(AdminMessage::to_json).collect::<Vec<_>>(),
        })
    }
}

impl PartialEq for AdminBlock {
    fn eq(&self, other: &Self) -> bool {
        self.header == other.header && self.body == other.body
    }
}

impl Eq for AdminBlock {}

#[cfg(test)]
mod tests {
    use super::*;
    use factom_types::FullSignature;

    fn sample_body() -> AdminBlockBody {
        let mut identity = [0u8; 32];
        identity[..3].copy_from_slice(&[0x88, 0x88, 0x88]);
        AdminBlockBody {
            messages: vec![
                AdminMessage::DirectoryBlockSignature {
                    identity_chain_id: Hash32(identity),
                    signature: FullSignature {
                        public_key: [0x10; 32],
                        signature: [0x20; 64],
                    },
                },
                AdminMessage::ServerFaultHandoff,
                AdminMessage::AddAuthorityEfficiency {
                    identity_chain_id: Hash32(identity),
                    efficiency: 5000,
                },
            ],
        }
    }

    fn sample_block() -> AdminBlock {
        let body = sample_body();
        let header = body.construct_header(sha256(b"previous admin block"), 77);
        AdminBlock::new(header, body)
    }

    #[test]
    fn test_round_trip() {
        let block = sample_block();
        let raw = block.marshal();
        let decoded = AdminBlock::unmarshal(&raw).unwrap();
        assert_eq!(decoded, block);
        assert_eq!(decoded.marshal(), raw);
    }

    #[test]
    fn test_header_counts_match_body() {
        let block = sample_block();
        assert_eq!(block.header.message_count, 3);
        assert_eq!(block.header.body_size as usize, block.body.marshal().len());
    }

    #[test]
    fn test_identifiers_use_different_hash_families() {
        let block = sample_block();
        assert_eq!(block.lookup_hash(), sha256(&block.marshal()));
        assert_eq!(block.back_reference_hash(), sha512_truncated(&block.marshal()));
        assert_ne!(block.lookup_hash(), block.back_reference_hash());
    }

    #[test]
    fn test_body_size_mismatch_rejected() {
        let block = sample_block();
        let mut raw = block.marshal();
        // Grow the claimed body size without adding bytes.
        let size_offset = raw.len() - block.header.body_size as usize - 4;
        raw[size_offset..size_offset + 4]
            .copy_from_slice(&(block.header.body_size + 1).to_be_bytes());
        assert!(matches!(
            AdminBlock::unmarshal(&raw),
            Err(DecodeError::BodySizeMismatch { .. })
        ));
    }

    #[test]
    fn test_wrong_chain_id_rejected() {
        let mut raw = sample_block().marshal();
        raw[31] = 0x0b;
        assert!(matches!(
            AdminBlock::unmarshal(&raw),
            Err(DecodeError::BadChainId(_))
        ));
    }

    #[test]
    fn test_empty_body_round_trips() {
        let body = AdminBlockBody::default();
        let header = body.construct_header(Hash32::ZERO, 0);
        let block = AdminBlock::new(header, body);
        let decoded = AdminBlock::unmarshal(&block.marshal()).unwrap();
        assert_eq!(decoded, block);
        assert_eq!(decoded.header.message_count, 0);
        assert_eq!(decoded.header.body_size, 0);
    }
}
