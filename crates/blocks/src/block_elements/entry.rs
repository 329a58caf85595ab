//! The user-data entry, the leaf of the whole hierarchy.

use crate::block_set::ValidationError;
use crate::blocks::EntryBlock;
use factom_types::codec;
use factom_types::error::DecodeError;
use factom_types::primitives::hash::{self, ChainId, Hash32};
use once_cell::sync::OnceCell;
use serde_json::{json, Value};

/// Where an entry sits in its propagation lifecycle. Derived, never
/// marshalled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EntryStage {
    /// Seen locally, not yet replicated by the authority set.
    Pending,
    /// Replicated into a sealed entry block.
    #[default]
    Replicated,
    /// The containing directory block has been anchored externally.
    Anchored,
}

impl EntryStage {
    fn as_str(self) -> &'static str {
        match self {
            EntryStage::Pending => "pending",
            EntryStage::Replicated => "replicated",
            EntryStage::Anchored => "anchored",
        }
    }
}

/// Contextual metadata derived from the blocks containing an entry.
///
/// Filled by [`Entry::add_context`], re-derivable on load, and never part
/// of the marshalled representation.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct EntryContext {
    /// Key-MR of the entry block carrying this entry.
    pub entry_block_keymr: Option<Hash32>,
    /// Key-MR of the directory block above that entry block.
    pub directory_block_keymr: Option<Hash32>,
    /// Height the entry was sealed at.
    pub height: Option<u32>,
    /// Seconds since the Unix epoch of the minute the entry landed in.
    pub timestamp: Option<u64>,
    /// Propagation stage.
    pub stage: EntryStage,
}

/// A single entry: version byte, chain id, external ids, and content.
#[derive(Debug, Clone, Default)]
pub struct Entry {
    /// The chain this entry extends.
    pub chain_id: ChainId,
    /// The external-id section, each id length-prefixed on the wire.
    pub external_ids: Vec<Vec<u8>>,
    /// Free-form content bytes.
    pub content: Vec<u8>,
    /// Derived metadata, absent on a freshly decoded entry.
    pub context: EntryContext,
    cached_hash: OnceCell<Hash32>,
}

impl Entry {
    /// Current (and only) wire version.
    pub const VERSION: u8 = 0x00;

    /// Builds an entry with empty context.
    pub fn new(chain_id: ChainId, external_ids: Vec<Vec<u8>>, content: Vec<u8>) -> Self {
        Entry {
            chain_id,
            external_ids,
            content,
            context: EntryContext::default(),
            cached_hash: OnceCell::new(),
        }
    }

    /// The identity commitment: `SHA256(SHA512(marshalled) ‖ marshalled)`.
    pub fn entry_hash(&self) -> Hash32 {
        *self
            .cached_hash
            .get_or_init(|| hash::entry_hash(&self.marshal()))
    }

    /// Marshals the entry. Contextual metadata is not included.
    pub fn marshal(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        buf.push(Self::VERSION);
        buf.extend_from_slice(&self.chain_id.0);
        let external_ids_size: usize = self.external_ids.iter().map(|id| id.len() + 2).sum();
        buf.extend_from_slice(&(external_ids_size as u16).to_be_bytes());
        for external_id in &self.external_ids {
            buf.extend_from_slice(&(external_id.len() as u16).to_be_bytes());
            buf.extend_from_slice(external_id);
        }
        buf.extend_from_slice(&self.content);
        buf
    }

    /// Unmarshals one entry; the remainder bytes are the content, so an
    /// entry always consumes its entire input.
    pub fn unmarshal(raw: &[u8]) -> Result<Self, DecodeError> {
        let (version, data) = codec::take_u8(raw)?;
        if version != Self::VERSION {
            return Err(DecodeError::UnknownTag {
                context: "entry version",
                tag: version,
            });
        }
        let (chain_id, data) = codec::take_array::<32>(data)?;
        let (section_size, data) = codec::take_u16_be(data)?;
        let (mut section, content) = codec::take(data, section_size as usize)?;
        let mut external_ids = Vec::new();
        while !section.is_empty() {
            let (id_size, rest) = codec::take_u16_be(section)?;
            let (external_id, rest) = codec::take(rest, id_size as usize)?;
            external_ids.push(external_id.to_vec());
            section = rest;
        }
        Ok(Entry::new(
            Hash32(chain_id),
            external_ids,
            content.to_vec(),
        ))
    }

    /// Fills the derived context from the entry block that sealed this
    /// entry, locating the minute the entry landed in.
    pub fn add_context(&mut self, entry_block: &EntryBlock) -> Result<(), ValidationError> {
        let own_hash = self.entry_hash();
        let minute = entry_block
            .body
            .minute_of(&own_hash)
            .ok_or(ValidationError::EntryNotInBlock {
                entry_hash: own_hash,
            })?;
        self.context.entry_block_keymr = Some(entry_block.keymr());
        self.context.directory_block_keymr = entry_block.directory_block_keymr;
        self.context.height = Some(entry_block.header.height);
        self.context.timestamp = entry_block
            .timestamp
            .map(|minutes| (u64::from(minutes) + u64::from(minute)) * 60);
        Ok(())
    }

    /// JSON projection for the RPC facade.
    pub fn to_json(&self) -> Value {
        json!({
            "chain_id": self.chain_id.to_hex(),
            "entry_hash": self.entry_hash().to_hex(),
            "external_ids": self.external_ids.iter().map(hex::encode).collect::<Vec<_>>(),
            "content": hex::encode(&self.content),
            "entry_block_keymr": self.context.entry_block_keymr.map(|h| h.to_hex()),
            "directory_block_keymr": self.context.directory_block_keymr.map(|h| h.to_hex()),
            "height": self.context.height,
            "timestamp": self.context.timestamp,
            "stage": self.context.stage.as_str(),
        })
    }
}

impl PartialEq for Entry {
    fn eq(&self, other: &Self) -> bool {
        self.chain_id == other.chain_id
            && self.external_ids == other.external_ids
            && self.content == other.content
    }
}

impl Eq for Entry {}
