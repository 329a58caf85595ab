//! Fixed-width hash and network-id newtypes.
//!
//! All block identifiers in the system are 32-byte SHA-2 digests; the
//! newtype keeps hex rendering in one place and prevents identifiers of
//! different widths from being confused at compile time.

use crate::error::DecodeError;
use sha2::{Digest, Sha256, Sha512};

/// A 32-byte digest, chain id, or address.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Hash32(pub [u8; 32]);

/// A 32-byte chain identifier. Structurally identical to any other digest.
pub type ChainId = Hash32;

impl Hash32 {
    /// The distinguished all-zero digest, used for absent back-references
    /// and as the Merkle root of an empty leaf sequence.
    pub const ZERO: Hash32 = Hash32([0u8; 32]);

    /// Wraps an exactly-32-byte slice.
    pub fn from_slice(raw: &[u8]) -> Result<Self, DecodeError> {
        let bytes: [u8; 32] = raw.try_into().map_err(|_| DecodeError::BadLength {
            context: "hash",
            expected: 32,
            actual: raw.len(),
        })?;
        Ok(Hash32(bytes))
    }

    /// Parses a 64-character hex string.
    pub fn from_hex(s: &str) -> Result<Self, DecodeError> {
        let raw = hex::decode(s).map_err(|_| DecodeError::BadLength {
            context: "hash hex",
            expected: 64,
            actual: s.len(),
        })?;
        Self::from_slice(&raw)
    }

    /// Borrows the raw bytes.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Renders the digest as lowercase hex.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// True if every byte is zero.
    pub fn is_zero(&self) -> bool {
        *self == Self::ZERO
    }
}

impl std::fmt::Debug for Hash32 {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Hash32({})", hex::encode(self.0))
    }
}

impl std::fmt::Display for Hash32 {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}

impl AsRef<[u8]> for Hash32 {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

/// SHA-256 of `data`.
pub fn sha256(data: &[u8]) -> Hash32 {
    Hash32(Sha256::digest(data).into())
}

/// SHA-512 of `data`, truncated to its first 32 bytes.
///
/// Used for the admin-block back-reference hash, which deliberately lives
/// in a different hash family than the SHA-256 lookup hash.
pub fn sha512_truncated(data: &[u8]) -> Hash32 {
    let digest = Sha512::digest(data);
    let mut out = [0u8; 32];
    out.copy_from_slice(&digest[..32]);
    Hash32(out)
}

/// The entry-hash commitment: `SHA256(SHA512(data) ‖ data)`.
///
/// Committing through both primitives frustrates collision attacks against
/// either hash function alone.
pub fn entry_hash(data: &[u8]) -> Hash32 {
    let mut hasher = Sha256::new();
    hasher.update(Sha512::digest(data));
    hasher.update(data);
    Hash32(hasher.finalize().into())
}

const fn system_chain_id(tail: u8) -> Hash32 {
    let mut bytes = [0u8; 32];
    bytes[31] = tail;
    Hash32(bytes)
}

/// Reserved chain id of the admin block (`…0a`).
pub const ADMIN_BLOCK_CHAIN_ID: ChainId = system_chain_id(0x0a);
/// Reserved chain id of the entry-credit block (`…0c`).
pub const ENTRY_CREDIT_BLOCK_CHAIN_ID: ChainId = system_chain_id(0x0c);
/// Reserved chain id of the directory block (`…0d`).
pub const DIRECTORY_BLOCK_CHAIN_ID: ChainId = system_chain_id(0x0d);
/// Reserved chain id of the factoid block (`…0f`).
pub const FACTOID_BLOCK_CHAIN_ID: ChainId = system_chain_id(0x0f);

/// A 4-byte network discriminator carried in every directory-block header.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct NetworkId(pub [u8; 4]);

impl NetworkId {
    /// The production network.
    pub const MAINNET: NetworkId = NetworkId([0xfe, 0xed, 0xbe, 0xef]);
    /// The community test network.
    pub const TESTNET: NetworkId = NetworkId([0x88, 0x3e, 0x09, 0x3b]);
    /// A single-machine development network.
    pub const LOCAL: NetworkId = NetworkId([0xfa, 0x92, 0xe5, 0xa2]);

    /// Derives a custom network id from a human-readable network name:
    /// the first four bytes of `SHA256(name)`.
    pub fn from_network_name(name: &str) -> NetworkId {
        let digest = Sha256::digest(name.as_bytes());
        NetworkId([digest[0], digest[1], digest[2], digest[3]])
    }

    /// Wraps an exactly-4-byte slice.
    pub fn from_slice(raw: &[u8]) -> Result<Self, DecodeError> {
        let bytes: [u8; 4] = raw.try_into().map_err(|_| DecodeError::BadLength {
            context: "network id",
            expected: 4,
            actual: raw.len(),
        })?;
        Ok(NetworkId(bytes))
    }

    /// Borrows the raw bytes.
    pub fn as_bytes(&self) -> &[u8; 4] {
        &self.0
    }

    /// Renders the id as lowercase hex.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl std::fmt::Debug for NetworkId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "NetworkId({})", hex::encode(self.0))
    }
}

impl std::fmt::Display for NetworkId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_system_chain_ids_have_single_trailing_byte() {
        for (chain_id, tail) in [
            (ADMIN_BLOCK_CHAIN_ID, 0x0a),
            (ENTRY_CREDIT_BLOCK_CHAIN_ID, 0x0c),
            (DIRECTORY_BLOCK_CHAIN_ID, 0x0d),
            (FACTOID_BLOCK_CHAIN_ID, 0x0f),
        ] {
            assert_eq!(chain_id.0[31], tail);
            assert!(chain_id.0[..31].iter().all(|&b| b == 0));
        }
    }

    #[test]
    fn test_hex_round_trip() {
        let h = sha256(b"factom");
        let parsed = Hash32::from_hex(&h.to_hex()).unwrap();
        assert_eq!(h, parsed);
    }

    #[test]
    fn test_entry_hash_differs_from_plain_sha256() {
        let data = b"some entry payload";
        assert_ne!(entry_hash(data), sha256(data));
    }

    #[test]
    fn test_custom_network_id_is_deterministic() {
        let a = NetworkId::from_network_name("devnet-7");
        let b = NetworkId::from_network_name("devnet-7");
        assert_eq!(a, b);
        assert_ne!(a, NetworkId::from_network_name("devnet-8"));
    }
}
