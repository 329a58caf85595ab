//! The sealed block set and its cross-block sanity checks.

use crate::blocks::{AdminBlock, DirectoryBlock, EntryBlock, EntryCreditBlock, FactoidBlock};
use factom_types::error::ErrorCode;
use factom_types::primitives::hash::{Hash32, NetworkId};
use thiserror::Error;

/// Rejection reasons for an externally supplied block set. The offending
/// set is discarded without side effects.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// The directory block belongs to a different network.
    #[error("network id mismatch: expected {expected}, found {found}")]
    NetworkIdMismatch {
        /// This node's network.
        expected: NetworkId,
        /// The network id carried by the block.
        found: NetworkId,
    },
    /// The set does not extend the pinned previous block.
    #[error("checkpoint mismatch at height {height}: expected previous key-MR {expected}, found {found}")]
    CheckpointMismatch {
        /// Height of the incoming directory block.
        height: u32,
        /// The required previous key-MR.
        expected: Hash32,
        /// The previous key-MR the block claims.
        found: Hash32,
    },
    /// A parent block's reference disagrees with the child's identifier.
    #[error("hash mismatch for {link}: directory block carries {expected}, block hashes to {found}")]
    LinkMismatch {
        /// Which cross-block link failed.
        link: &'static str,
        /// The identifier recorded in the directory-block body.
        expected: Hash32,
        /// The identifier recomputed from the child block.
        found: Hash32,
    },
    /// A child block was sealed at a different height than the directory
    /// block.
    #[error("height mismatch for {block}: directory block at {expected}, block at {found}")]
    HeightMismatch {
        /// Which child block disagreed.
        block: &'static str,
        /// The directory block's height.
        expected: u32,
        /// The child block's height.
        found: u32,
    },
    /// The directory body's descriptor count disagrees with the entry
    /// blocks supplied.
    #[error("entry block count mismatch: {expected} descriptors, {found} blocks")]
    EntryBlockCountMismatch {
        /// Descriptors in the directory body.
        expected: usize,
        /// Entry blocks supplied alongside it.
        found: usize,
    },
    /// An entry was claimed to belong to an entry block that does not
    /// contain it.
    #[error("entry {entry_hash} is not present in the provided entry block")]
    EntryNotInBlock {
        /// The missing entry's hash.
        entry_hash: Hash32,
    },
}

impl ErrorCode for ValidationError {
    fn code(&self) -> &'static str {
        match self {
            Self::NetworkIdMismatch { .. } => "VALIDATE_NETWORK_ID_MISMATCH",
            Self::CheckpointMismatch { .. } => "VALIDATE_CHECKPOINT_MISMATCH",
            Self::LinkMismatch { .. } => "VALIDATE_LINK_MISMATCH",
            Self::HeightMismatch { .. } => "VALIDATE_HEIGHT_MISMATCH",
            Self::EntryBlockCountMismatch { .. } => "VALIDATE_ENTRY_BLOCK_COUNT_MISMATCH",
            Self::EntryNotInBlock { .. } => "VALIDATE_ENTRY_NOT_IN_BLOCK",
        }
    }
}

/// Everything sealed at one height: the directory block plus the blocks it
/// commits to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FullBlockSet {
    /// The top-level directory block.
    pub directory: DirectoryBlock,
    /// The admin block it commits to.
    pub admin: AdminBlock,
    /// The entry-credit block it commits to.
    pub entry_credit: EntryCreditBlock,
    /// The factoid block it commits to.
    pub factoid: FactoidBlock,
    /// The user entry blocks, in descriptor order.
    pub entry_blocks: Vec<EntryBlock>,
}

impl FullBlockSet {
    /// Height the set was sealed at.
    pub fn height(&self) -> u32 {
        self.directory.header.height
    }

    /// Sanity-checks the set: network binding, an optional checkpoint pin
    /// on the previous directory block, height agreement, and every
    /// cross-block hash link. No side effects either way.
    pub fn validate(
        &self,
        network_id: NetworkId,
        checkpoint: Option<(u32, Hash32)>,
    ) -> Result<(), ValidationError> {
        let directory = &self.directory;
        if directory.header.network_id != network_id {
            return Err(ValidationError::NetworkIdMismatch {
                expected: network_id,
                found: directory.header.network_id,
            });
        }
        if let Some((height, prev_keymr)) = checkpoint {
            if directory.header.height != height || directory.header.prev_keymr != prev_keymr {
                return Err(ValidationError::CheckpointMismatch {
                    height: directory.header.height,
                    expected: prev_keymr,
                    found: directory.header.prev_keymr,
                });
            }
        }

        for (block, height) in [
            ("admin", self.admin.header.height),
            ("entry credit", self.entry_credit.header.height),
            ("factoid", self.factoid.header.height),
        ] {
            if height != directory.header.height {
                return Err(ValidationError::HeightMismatch {
                    block,
                    expected: directory.header.height,
                    found: height,
                });
            }
        }

        let links = [
            (
                "admin block lookup hash",
                directory.body.admin_block_lookup_hash,
                self.admin.lookup_hash(),
            ),
            (
                "entry credit block header hash",
                directory.body.entry_credit_block_header_hash,
                self.entry_credit.header_hash(),
            ),
            (
                "factoid block key-MR",
                directory.body.factoid_block_keymr,
                self.factoid.keymr(),
            ),
        ];
        for (link, expected, found) in links {
            if expected != found {
                return Err(ValidationError::LinkMismatch {
                    link,
                    expected,
                    found,
                });
            }
        }

        if directory.body.entry_blocks.len() != self.entry_blocks.len() {
            return Err(ValidationError::EntryBlockCountMismatch {
                expected: directory.body.entry_blocks.len(),
                found: self.entry_blocks.len(),
            });
        }
        for (descriptor, entry_block) in
            directory.body.entry_blocks.iter().zip(&self.entry_blocks)
        {
            if entry_block.header.height != directory.header.height {
                return Err(ValidationError::HeightMismatch {
                    block: "entry",
                    expected: directory.header.height,
                    found: entry_block.header.height,
                });
            }
            if descriptor.chain_id != entry_block.header.chain_id
                || descriptor.keymr != entry_block.keymr()
            {
                return Err(ValidationError::LinkMismatch {
                    link: "entry block descriptor",
                    expected: descriptor.keymr,
                    found: entry_block.keymr(),
                });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blocks::{
        AdminBlockBody, DirectoryBlockBody, EntryBlockBody, EntryBlockDescriptor,
        EntryCreditBlockBody, FactoidBlockBody,
    };
    use factom_types::primitives::hash::sha256;

    fn sealed_set(network_id: NetworkId) -> FullBlockSet {
        let height = 42;

        let admin_body = AdminBlockBody::default();
        let admin = AdminBlock::new(
            admin_body.construct_header(Hash32::ZERO, height),
            admin_body,
        );

        let mut ec_body = EntryCreditBlockBody::default();
        ec_body.pad_minutes();
        let entry_credit = EntryCreditBlock::new(
            ec_body.construct_header(Hash32::ZERO, Hash32::ZERO, height),
            ec_body,
        );

        let mut factoid_body = FactoidBlockBody::default();
        factoid_body.pad_minutes();
        let factoid = FactoidBlock::new(
            factoid_body.construct_header(Hash32::ZERO, Hash32::ZERO, 1000, height),
            factoid_body,
        );

        let mut entry_body = EntryBlockBody::default();
        entry_body
            .entry_hashes
            .insert(1, vec![sha256(b"lone entry")]);
        entry_body.pad_minutes();
        let chain_id = sha256(b"user chain");
        let entry_block = EntryBlock::new(
            entry_body.construct_header(chain_id, Hash32::ZERO, Hash32::ZERO, 0, height),
            entry_body,
        );

        let body = DirectoryBlockBody {
            admin_block_lookup_hash: admin.lookup_hash(),
            entry_credit_block_header_hash: entry_credit.header_hash(),
            factoid_block_keymr: factoid.keymr(),
            entry_blocks: vec![EntryBlockDescriptor {
                chain_id,
                keymr: entry_block.keymr(),
            }],
        };
        let header = body.construct_header(network_id, Hash32::ZERO, Hash32::ZERO, 26_000_000, height);
        FullBlockSet {
            directory: DirectoryBlock::new(header, body),
            admin,
            entry_credit,
            factoid,
            entry_blocks: vec![entry_block],
        }
    }

    #[test]
    fn test_consistent_set_validates() {
        let set = sealed_set(NetworkId::LOCAL);
        assert!(set.validate(NetworkId::LOCAL, None).is_ok());
    }

    #[test]
    fn test_network_id_mismatch() {
        let set = sealed_set(NetworkId::LOCAL);
        assert!(matches!(
            set.validate(NetworkId::MAINNET, None),
            Err(ValidationError::NetworkIdMismatch { .. })
        ));
    }

    #[test]
    fn test_checkpoint_mismatch() {
        let set = sealed_set(NetworkId::LOCAL);
        let pin = (set.height(), sha256(b"some other block"));
        assert!(matches!(
            set.validate(NetworkId::LOCAL, Some(pin)),
            Err(ValidationError::CheckpointMismatch { .. })
        ));
    }

    #[test]
    fn test_tampered_admin_link_detected() {
        let mut set = sealed_set(NetworkId::LOCAL);
        set.directory.body.admin_block_lookup_hash = sha256(b"tampered");
        assert!(matches!(
            set.validate(NetworkId::LOCAL, None),
            Err(ValidationError::LinkMismatch {
                link: "admin block lookup hash",
                ..
            })
        ));
    }

    #[test]
    fn test_missing_entry_block_detected() {
        let mut set = sealed_set(NetworkId::LOCAL);
        set.entry_blocks.clear();
        assert!(matches!(
            set.validate(NetworkId::LOCAL, None),
            Err(ValidationError::EntryBlockCountMismatch { .. })
        ));
    }
}
