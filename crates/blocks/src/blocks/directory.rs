//! The directory block: the top-level commitment at each height.

use factom_types::codec;
use factom_types::error::DecodeError;
use factom_types::primitives::hash::{
    sha256, ChainId, Hash32, NetworkId, ADMIN_BLOCK_CHAIN_ID, DIRECTORY_BLOCK_CHAIN_ID,
    ENTRY_CREDIT_BLOCK_CHAIN_ID, FACTOID_BLOCK_CHAIN_ID,
};
use factom_types::primitives::merkle;
use once_cell::sync::OnceCell;
use serde_json::{json, Value};

/// Fixed-width directory-block header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DirectoryBlockHeader {
    /// The 4-byte network this block belongs to.
    pub network_id: NetworkId,
    /// Merkle root of the body descriptors.
    pub body_mr: Hash32,
    /// Key-MR of the previous directory block (zero at genesis).
    pub prev_keymr: Hash32,
    /// Full hash of the previous directory block (zero at genesis).
    pub prev_full_hash: Hash32,
    /// Whole minutes since the Unix epoch.
    pub timestamp: u32,
    /// Block height.
    pub height: u32,
    /// Number of body descriptors: three system blocks plus the user
    /// entry blocks.
    pub block_count: u32,
}

impl DirectoryBlockHeader {
    /// Reserved chain id (`…0d`).
    pub const CHAIN_ID: ChainId = DIRECTORY_BLOCK_CHAIN_ID;
    /// Exact header width in bytes.
    pub const LENGTH: usize = 113;
    /// Wire version byte.
    pub const VERSION: u8 = 0x00;

    /// Marshals the header.
    pub fn marshal(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(Self::LENGTH);
        buf.push(Self::VERSION);
        buf.extend_from_slice(&self.network_id.0);
        buf.extend_from_slice(&self.body_mr.0);
        buf.extend_from_slice(&self.prev_keymr.0);
        buf.extend_from_slice(&self.prev_full_hash.0);
        buf.extend_from_slice(&self.timestamp.to_be_bytes());
        buf.extend_from_slice(&self.height.to_be_bytes());
        buf.extend_from_slice(&self.block_count.to_be_bytes());
        buf
    }

    /// Unmarshals an exactly [`Self::LENGTH`]-byte header.
    pub fn unmarshal(raw: &[u8]) -> Result<Self, DecodeError> {
        if raw.len() != Self::LENGTH {
            return Err(DecodeError::BadLength {
                context: "directory block header",
                expected: Self::LENGTH,
                actual: raw.len(),
            });
        }
        let (version, data) = codec::take_u8(raw)?;
        if version != Self::VERSION {
            return Err(DecodeError::UnknownTag {
                context: "directory block version",
                tag: version,
            });
        }
        let (network_id, data) = codec::take_array::<4>(data)?;
        let (body_mr, data) = codec::take_array::<32>(data)?;
        let (prev_keymr, data) = codec::take_array::<32>(data)?;
        let (prev_full_hash, data) = codec::take_array::<32>(data)?;
        let (timestamp, data) = codec::take_u32_be(data)?;
        let (height, data) = codec::take_u32_be(data)?;
        let (block_count, data) = codec::take_u32_be(data)?;
        codec::expect_empty(data)?;
        Ok(DirectoryBlockHeader {
            network_id: NetworkId(network_id),
            body_mr: Hash32(body_mr),
            prev_keymr: Hash32(prev_keymr),
            prev_full_hash: Hash32(prev_full_hash),
            timestamp,
            height,
            block_count,
        })
    }
}

/// A (chain id, key-MR) descriptor naming one user entry block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EntryBlockDescriptor {
    /// The chain the entry block extends.
    pub chain_id: ChainId,
    /// The entry block's key-MR.
    pub keymr: Hash32,
}

/// Directory-block body: exactly three system descriptors in admin,
/// entry-credit, factoid order, then the user entry-block descriptors.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DirectoryBlockBody {
    /// Lookup hash of the admin block at this height.
    pub admin_block_lookup_hash: Hash32,
    /// Header hash of the entry-credit block at this height.
    pub entry_credit_block_header_hash: Hash32,
    /// Key-MR of the factoid block at this height.
    pub factoid_block_keymr: Hash32,
    /// Descriptors of every user entry block sealed at this height.
    pub entry_blocks: Vec<EntryBlockDescriptor>,
}

impl DirectoryBlockBody {
    fn descriptor_leaves(&self) -> Vec<Hash32> {
        let mut leaves = vec![
            ADMIN_BLOCK_CHAIN_ID,
            self.admin_block_lookup_hash,
            ENTRY_CREDIT_BLOCK_CHAIN_ID,
            self.entry_credit_block_header_hash,
            FACTOID_BLOCK_CHAIN_ID,
            self.factoid_block_keymr,
        ];
        for descriptor in &self.entry_blocks {
            leaves.push(descriptor.chain_id);
            leaves.push(descriptor.keymr);
        }
        leaves
    }

    /// Merkle root over the descriptor pairs, in body order.
    pub fn merkle_root(&self) -> Hash32 {
        merkle::merkle_root(&self.descriptor_leaves())
    }

    /// Marshals the body.
    pub fn marshal(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(64 * (3 + self.entry_blocks.len()));
        for leaf in self.descriptor_leaves() {
            buf.extend_from_slice(&leaf.0);
        }
        buf
    }

    /// Unmarshals a body holding `block_count` descriptors, returning the
    /// remainder.
    pub fn unmarshal_with_remainder(
        raw: &[u8],
        block_count: u32,
    ) -> Result<(Self, &[u8]), DecodeError> {
        if block_count < 3 {
            return Err(DecodeError::FieldOutOfRange {
                field: "directory block_count",
                value: u64::from(block_count),
            });
        }
        let (_, admin_block_lookup_hash, data) =
            take_descriptor(raw, Some(ADMIN_BLOCK_CHAIN_ID))?;
        let (_, entry_credit_block_header_hash, data) =
            take_descriptor(data, Some(ENTRY_CREDIT_BLOCK_CHAIN_ID))?;
        let (_, factoid_block_keymr, mut data) =
            take_descriptor(data, Some(FACTOID_BLOCK_CHAIN_ID))?;
        let mut entry_blocks = Vec::with_capacity(block_count as usize - 3);
        for _ in 0..block_count - 3 {
            let (chain_id, keymr, rest) = take_descriptor(data, None)?;
            entry_blocks.push(EntryBlockDescriptor { chain_id, keymr });
            data = rest;
        }
        Ok((
            DirectoryBlockBody {
                admin_block_lookup_hash,
                entry_credit_block_header_hash,
                factoid_block_keymr,
                entry_blocks,
            },
            data,
        ))
    }

    /// Derives the header for this body: the only path to a valid header.
    pub fn construct_header(
        &self,
        network_id: NetworkId,
        prev_keymr: Hash32,
        prev_full_hash: Hash32,
        timestamp: u32,
        height: u32,
    ) -> DirectoryBlockHeader {
        DirectoryBlockHeader {
            network_id,
            body_mr: self.merkle_root(),
            prev_keymr,
            prev_full_hash,
            timestamp,
            height,
            block_count: self.entry_blocks.len() as u32 + 3,
        }
    }
}

fn take_descriptor(
    data: &[u8],
    expected: Option<ChainId>,
) -> Result<(ChainId, Hash32, &[u8]), DecodeError> {
    let (chain_id, data) = codec::take_array::<32>(data)?;
    let chain_id = Hash32(chain_id);
    if let Some(expected) = expected {
        if chain_id != expected {
            return Err(DecodeError::BadChainId("directory block body"));
        }
    }
    let (identifier, data) = codec::take_array::<32>(data)?;
    Ok((chain_id, Hash32(identifier), data))
}

/// A sealed directory block.
#[derive(Debug, Clone)]
pub struct DirectoryBlock {
    /// The derived header.
    pub header: DirectoryBlockHeader,
    /// The descriptor body.
    pub body: DirectoryBlockBody,
    cached_keymr: OnceCell<Hash32>,
    cached_full_hash: OnceCell<Hash32>,
}

impl DirectoryBlock {
    /// Assembles a block from a header and its body.
    pub fn new(header: DirectoryBlockHeader, body: DirectoryBlockBody) -> Self {
        DirectoryBlock {
            header,
            body,
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

    /// Seconds since the Unix epoch (the header stores whole minutes).
    pub fn timestamp_unix(&self) -> u64 {
        u64::from(self.header.timestamp) * 60
    }

    /// Marshals header then body.
    pub fn marshal(&self) -> Vec<u8> {
        let mut buf = self.header.marshal();
        buf.extend_from_slice(&self.body.marshal());
        buf
    }

    /// Unmarshals a block, returning the remainder.
    pub fn unmarshal_with_remainder(raw: &[u8]) -> Result<(Self, &[u8]), DecodeError> {
        let (header_bytes, data) = codec::take(raw, DirectoryBlockHeader::LENGTH)?;
        let header = DirectoryBlockHeader::unmarshal(header_bytes)?;
        let (body, data) = DirectoryBlockBody::unmarshal_with_remainder(data, header.block_count)?;
        Ok((DirectoryBlock::new(header, body), data))
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
            "network_id": self.header.network_id.to_hex(),
            "body_mr": self.header.body_mr.to_hex(),
            "prev_keymr": self.header.prev_keymr.to_hex(),
            "prev_full_hash": self.header.prev_full_hash.to_hex(),
            "timestamp": self.header.timestamp,
            "height": self.header.height,
            "admin_block_lookup_hash": self.body.admin_block_lookup_hash.to_hex(),
            "entry_credit_block_header_hash": self.body.entry_credit_block_header_hash.to_hex(),
            "factoid_block_keymr": self.body.factoid_block_keymr.to_hex(),
            "entry_blocks": self.body.entry_blocks.iter().map(|descriptor| json!({
                "chain_id": descriptor.chain_id.to_hex(),
                "keymr": descriptor.keymr.to_hex(),
            })).collect::<Vec<_>>(),
        })
    }
}

impl PartialEq for DirectoryBlock {
    fn eq(&self, other: &Self) -> bool {
        self.header == other.header && self.body == other.body
    }
}

impl Eq for DirectoryBlock {}

#[cfg(test)]
mod tests {
    use super::*;

    /// Mainnet directory block 199460: 992 bytes, ten user entry blocks.
    const TEST_DATA: &str = concat!(
        "00fa92e5a268621e0e173b9615f6f154b2a8db4fbe02f8e960bcdf52b380404afa2d2ea96e06a775ece14fb21e14fd3df37c",
        "5e51c039789206d9c8402ed9ff9d9ca903ac246c3390e0d8e4238a431499056bba94cffb56ddad0a3a6c3a559e28bd5671ad",
        "bf018d3e9100030b240000000d000000000000000000000000000000000000000000000000000000000000000af493fe8bcf",
        "b9625c59387f1542e04ed06fd7beaf436daceb79de8651c62d19940000000000000000000000000000000000000000000000",
        "00000000000000000c95dcfe56875b826336c09059d1259401082042cdc99e9b7f41b2b6deadb5e26b000000000000000000",
        "000000000000000000000000000000000000000000000fff57136cc4967ac4e626bc7ab588cb8212863c61f91d3a594fa0cf",
        "dbab4e84d70f47c100669876d0c4692de4d1a4b6f69634da4abce161827d21af79dcddcd6b5f8ef24d68f2480580c5b99be8",
        "8f8bd4c858c7f4bc494cf2bd61dcfa868d189516dada470ad7b7755892cba35202f6e0b353ae57bed88282c95527ff295b08",
        "9ccc4b5eb4255b8cc130e4d8ea68181b6bef719df4f1e6426ea61d0c94f3fb5564187158d359a646dda403efb7ac94828245",
        "85cb8e351a9cf3fd05c4f083308d625bace4ac53e46f7a4ea373ed79b6b32b6d6d95447c72e48e9682bf444031fe0d2828d2",
        "c5f58d869ee142b6bdb1a1d868712e3fa471e3b378cd8622a915ab46a4e39d579398bc7e1c5be3b47a479049671c6006435e",
        "d6c8f808fef99e3ebbbcf94a35522c834022a4153c4ac92f61f22fad640647f91a21a65cf632f73871796651a38541e56c3b",
        "c10f957c88cbc55f2097c600d39a078b1636e589e503632d185f23f3f40383497f3d7a7c86ba067c4f14e792950ed748fce5",
        "9be27991bfc954fcdc22ee23a0bc05820479da7df89562cabb71ec61e2d5aa7b48af0da6e97a606e4540d08d5ac6a1a394e9",
        "82fb6a2ab8b516ee751c37420055141b94fe070bfe40f99b78c9f92c20262afa5671a021be07846388dbdef1251daa1d1089",
        "c98f499b5c6dbec96faef4f855182fa8d1475427eed27fc18f4c8deec588d1c252b7f8b805d0521d0e99686dd471f472d52b",
        "8fcba06f675413f5664c376ebb527cc54cb312a0401879366b3d72a1844b3ca0da1009545ffa8e4038f80da1528cb572ab09",
        "df02abdb74f44ddf1762bf578790219ff012b5786813b51229770a343724d8c9facbecd7f5b2aaea4c6040d0d312b0c663f8",
        "ffbd34e82056cf285abfabfbef230928d8a86de42c768fd1b312302a56a4a5e4329826f7eec7ce8e445e479553",
    );

    fn golden_block() -> DirectoryBlock {
        DirectoryBlock::unmarshal(&hex::decode(TEST_DATA).unwrap()).unwrap()
    }

    #[test]
    fn test_unmarshal_known_block() {
        let block = golden_block();
        assert_eq!(block.header.network_id.to_hex(), "fa92e5a2");
        assert_eq!(
            block.header.body_mr.to_hex(),
            "68621e0e173b9615f6f154b2a8db4fbe02f8e960bcdf52b380404afa2d2ea96e"
        );
        assert_eq!(
            block.header.prev_keymr.to_hex(),
            "06a775ece14fb21e14fd3df37c5e51c039789206d9c8402ed9ff9d9ca903ac24"
        );
        assert_eq!(
            block.header.prev_full_hash.to_hex(),
            "6c3390e0d8e4238a431499056bba94cffb56ddad0a3a6c3a559e28bd5671adbf"
        );
        assert_eq!(block.header.timestamp, 26_033_809);
        assert_eq!(block.header.height, 199_460);
        assert_eq!(block.header.block_count, 13);
        assert_eq!(
            block.body.admin_block_lookup_hash.to_hex(),
            "f493fe8bcfb9625c59387f1542e04ed06fd7beaf436daceb79de8651c62d1994"
        );
        assert_eq!(
            block.body.entry_credit_block_header_hash.to_hex(),
            "95dcfe56875b826336c09059d1259401082042cdc99e9b7f41b2b6deadb5e26b"
        );
        assert_eq!(
            block.body.factoid_block_keymr.to_hex(),
            "ff57136cc4967ac4e626bc7ab588cb8212863c61f91d3a594fa0cfdbab4e84d7"
        );
        assert_eq!(block.body.entry_blocks.len(), 10);
        assert_eq!(
            block.body.entry_blocks[0].chain_id.to_hex(),
            "0f47c100669876d0c4692de4d1a4b6f69634da4abce161827d21af79dcddcd6b"
        );
        assert_eq!(
            block.body.entry_blocks[9].keymr.to_hex(),
            "230928d8a86de42c768fd1b312302a56a4a5e4329826f7eec7ce8e445e479553"
        );
    }

    #[test]
    fn test_marshal_is_byte_exact() {
        let raw = hex::decode(TEST_DATA).unwrap();
        assert_eq!(golden_block().marshal(), raw);
    }

    #[test]
    fn test_keymr_and_body_mr() {
        let block = golden_block();
        assert_eq!(
            block.keymr().to_hex(),
            "aed3e8a8a3e9515a60eee86e176dc07e503f5a5481a4aad52d344d6f6c8e9613"
        );
        assert_eq!(block.body.merkle_root(), block.header.body_mr);
        // Identifier stays stable across accesses.
        assert_eq!(block.keymr(), block.keymr());
    }

    #[test]
    fn test_block_count_arity() {
        let block = golden_block();
        assert_eq!(
            block.header.block_count as usize,
            3 + block.body.entry_blocks.len()
        );
        let rebuilt = block.body.construct_header(
            block.header.network_id,
            block.header.prev_keymr,
            block.header.prev_full_hash,
            block.header.timestamp,
            block.header.height,
        );
        assert_eq!(rebuilt, block.header);
    }

    #[test]
    fn test_rejects_trailing_bytes() {
        let mut raw = hex::decode(TEST_DATA).unwrap();
        raw.push(0x00);
        assert!(matches!(
            DirectoryBlock::unmarshal(&raw),
            Err(DecodeError::TrailingBytes(1))
        ));
    }

    #[test]
    fn test_rejects_wrong_system_chain_id() {
        let mut raw = hex::decode(TEST_DATA).unwrap();
        // Corrupt the admin descriptor's reserved chain id.
        raw[DirectoryBlockHeader::LENGTH + 31] = 0x0b;
        assert!(matches!(
            DirectoryBlock::unmarshal(&raw),
            Err(DecodeError::BadChainId(_))
        ));
    }

    #[test]
    fn test_remainder_decoding_for_concatenated_blocks() {
        let raw = hex::decode(TEST_DATA).unwrap();
        let mut doubled = raw.clone();
        doubled.extend_from_slice(&raw);
        let (first, rest) = DirectoryBlock::unmarshal_with_remainder(&doubled).unwrap();
        let (second, rest) = DirectoryBlock::unmarshal_with_remainder(rest).unwrap();
        assert!(rest.is_empty());
        assert_eq!(first, second);
    }
}
