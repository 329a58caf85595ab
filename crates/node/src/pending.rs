//! The pending block: minute-partitioned staging between two sealed
//! directory blocks.

use crate::error::ChainError;
use factom_blocks::block_elements::{AdminMessage, Entry, FactoidTransaction};
use factom_blocks::blocks::{
    AdminBlock, AdminBlockBody, DirectoryBlock, DirectoryBlockBody, EcObject, EntryBlock,
    EntryBlockBody, EntryBlockDescriptor, EntryCreditBlock, EntryCreditBlockBody, FactoidBlock,
    FactoidBlockBody,
};
use factom_blocks::{FullBlockSet, FIRST_MINUTE, LAST_MINUTE};
use factom_storage::BlockStore;
use factom_types::primitives::hash::{ChainId, Hash32};
use std::collections::BTreeMap;

/// In-flight transactions, commits, and entries accumulated for the next
/// block, partitioned by minute.
///
/// The pending block is mutated only by its owning [`Blockchain`]
/// (single-threaded cooperative); minute boundaries are monotonic — once a
/// minute is sealed nothing can be added to it again.
///
/// [`Blockchain`]: crate::chain::Blockchain
#[derive(Debug, Clone)]
pub struct PendingBlock {
    /// Admin messages staged for the next admin block.
    pub admin_body: AdminBlockBody,
    /// Factoid transactions staged per minute.
    pub factoid_body: FactoidBlockBody,
    /// Commits and balance increases staged per minute.
    pub entry_credit_body: EntryCreditBlockBody,
    /// Per-chain entry bodies staged per minute.
    pub entry_bodies: BTreeMap<ChainId, EntryBlockBody>,
    /// The directory block this one will extend.
    pub previous: DirectoryBlock,
    /// The minute currently accepting work, 1..=10.
    pub current_minute: u8,
    /// Height of the block being staged: `previous.height + 1`.
    pub height: u32,
    /// Minutes since the Unix epoch, recorded at construction.
    pub timestamp: u32,
}

impl PendingBlock {
    /// Opens a fresh pending block on top of `previous`.
    pub fn new(previous: DirectoryBlock, timestamp: u32) -> Self {
        let height = previous.header.height + 1;
        PendingBlock {
            admin_body: AdminBlockBody::default(),
            factoid_body: FactoidBlockBody::default(),
            entry_credit_body: EntryCreditBlockBody::default(),
            entry_bodies: BTreeMap::new(),
            previous,
            current_minute: FIRST_MINUTE,
            height,
            timestamp,
        }
    }

    /// True once minute 10 is the active minute; the next seal call
    /// finalizes the block.
    pub fn at_block_boundary(&self) -> bool {
        self.current_minute == LAST_MINUTE
    }

    /// Advances to the next minute. Callers check
    /// [`Self::at_block_boundary`] first and seal the block instead of
    /// advancing past minute 10.
    pub fn advance_minute(&mut self) {
        debug_assert!(self.current_minute < LAST_MINUTE);
        self.current_minute += 1;
    }

    /// Stages a factoid transaction into the current minute.
    pub fn add_factoid_transaction(&mut self, tx: FactoidTransaction) {
        self.factoid_body
            .transactions
            .entry(self.current_minute)
            .or_default()
            .push(tx);
    }

    /// Stages a commit or balance increase into the current minute.
    pub fn add_commit(&mut self, commit: EcObject) {
        self.entry_credit_body
            .objects
            .entry(self.current_minute)
            .or_default()
            .push(commit);
    }

    /// Stages an entry's hash into its chain's entry body for the current
    /// minute, creating the per-chain body on first sight of the chain.
    pub fn add_entry(&mut self, entry: &Entry) {
        self.entry_bodies
            .entry(entry.chain_id)
            .or_default()
            .entry_hashes
            .entry(self.current_minute)
            .or_default()
            .push(entry.entry_hash());
    }

    /// Stages an admin message for the next admin block.
    pub fn add_admin_message(&mut self, message: AdminMessage) {
        self.admin_body.messages.push(message);
    }

    /// Finalizes the accumulated bodies into a signed-off block set.
    ///
    /// Previous-block back-references come from the store; every header is
    /// constructed through its body. The pipeline is failure-atomic: on
    /// any error nothing has been persisted and the pending block is left
    /// untouched.
    pub fn seal(
        &self,
        store: &BlockStore,
        ec_exchange_rate: u64,
    ) -> Result<FullBlockSet, ChainError> {
        let height = self.height;
        let prev_height = self.previous.header.height;

        // Per-chain entry blocks: sequence continues from each chain's
        // current head, or starts at zero for a new chain.
        let mut entry_blocks = Vec::with_capacity(self.entry_bodies.len());
        for (&chain_id, body) in &self.entry_bodies {
            let mut body = body.clone();
            body.pad_minutes();
            let header = match store.get_entry_block_head(&chain_id)? {
                Some(prev) => body.construct_header(
                    chain_id,
                    prev.keymr(),
                    prev.full_hash(),
                    prev.header.sequence + 1,
                    height,
                ),
                None => {
                    body.construct_header(chain_id, Hash32::ZERO, Hash32::ZERO, 0, height)
                }
            };
            entry_blocks.push(EntryBlock::new(header, body));
        }

        let prev = store
            .get_entry_credit_block_by_height(prev_height)?
            .ok_or(ChainError::MissingPrevious {
                block: "entry credit",
                height,
            })?;
        let mut ec_body = self.entry_credit_body.clone();
        ec_body.pad_minutes();
        let header = ec_body.construct_header(prev.header_hash(), prev.full_hash(), height);
        let entry_credit_block = EntryCreditBlock::new(header, ec_body);

        let prev = store
            .get_factoid_block_by_height(prev_height)?
            .ok_or(ChainError::MissingPrevious {
                block: "factoid",
                height,
            })?;
        let mut factoid_body = self.factoid_body.clone();
        factoid_body.pad_minutes();
        let header = factoid_body.construct_header(
            prev.keymr(),
            prev.ledger_keymr(),
            ec_exchange_rate,
            height,
        );
        let factoid_block = FactoidBlock::new(header, factoid_body);

        let prev = store
            .get_admin_block_by_height(prev_height)?
            .ok_or(ChainError::MissingPrevious {
                block: "admin",
                height,
            })?;
        let header = self
            .admin_body
            .construct_header(prev.back_reference_hash(), height);
        let admin_block = AdminBlock::new(header, self.admin_body.clone());

        // The directory body commits to everything sealed above.
        let directory_body = DirectoryBlockBody {
            admin_block_lookup_hash: admin_block.lookup_hash(),
            entry_credit_block_header_hash: entry_credit_block.header_hash(),
            factoid_block_keymr: factoid_block.keymr(),
            entry_blocks: entry_blocks
                .iter()
                .map(|entry_block| EntryBlockDescriptor {
                    chain_id: entry_block.header.chain_id,
                    keymr: entry_block.keymr(),
                })
                .collect(),
        };
        let directory_header = directory_body.construct_header(
            self.previous.header.network_id,
            self.previous.keymr(),
            self.previous.full_hash(),
            self.timestamp,
            height,
        );
        let directory = DirectoryBlock::new(directory_header, directory_body);

        Ok(FullBlockSet {
            directory,
            admin: admin_block,
            entry_credit: entry_credit_block,
            factoid: factoid_block,
            entry_blocks,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::genesis;
    use factom_blocks::block_elements::EntryCommit;
    use factom_types::primitives::hash::{sha256, NetworkId};
    use tempfile::tempdir;

    fn seeded_store() -> (tempfile::TempDir, BlockStore, DirectoryBlock) {
        let dir = tempdir().unwrap();
        let store = BlockStore::open(dir.path().join("blocks.redb")).unwrap();
        let set = genesis::local_genesis(NetworkId::LOCAL, 1000).unwrap();
        store.put_admin_block_head(&set.admin).unwrap();
        store.put_entry_credit_block_head(&set.entry_credit).unwrap();
        store.put_factoid_block_head(&set.factoid).unwrap();
        store.put_directory_block_head(&set.directory).unwrap();
        (dir, store, set.directory)
    }

    fn sample_entry() -> Entry {
        Entry::new(
            sha256(b"fresh chain"),
            vec![b"ids".to_vec()],
            b"first entry".to_vec(),
        )
    }

    #[test]
    fn test_seal_links_all_sub_blocks() {
        let (_dir, store, genesis_block) = seeded_store();
        let mut pending = PendingBlock::new(genesis_block.clone(), 26_000_001);

        // Minute 1: one factoid transaction.
        pending.add_factoid_transaction(FactoidTransaction::new(
            1_500_000_000_000,
            Vec::new(),
            Vec::new(),
            Vec::new(),
            Vec::new(),
        ));
        pending.advance_minute();
        // Minute 2: one entry commit.
        pending.add_commit(EcObject::EntryCommit(EntryCommit {
            timestamp: 1_500_000_060_000,
            entry_hash: sample_entry().entry_hash(),
            ec_spent: 1,
            ec_public_key: [0x11; 32],
            signature: [0x22; 64],
        }));
        pending.advance_minute();
        // Minute 3: one entry on a brand-new chain.
        pending.add_entry(&sample_entry());

        let set = pending.seal(&store, 1000).unwrap();

        assert_eq!(set.directory.header.height, genesis_block.header.height + 1);
        // Three system descriptors plus one user chain.
        assert_eq!(set.directory.header.block_count, 4);
        assert_eq!(
            set.directory.body.admin_block_lookup_hash,
            set.admin.lookup_hash()
        );
        assert_eq!(
            set.directory.body.entry_credit_block_header_hash,
            set.entry_credit.header_hash()
        );
        assert_eq!(set.directory.body.factoid_block_keymr, set.factoid.keymr());
        assert_eq!(set.entry_blocks.len(), 1);
        assert_eq!(
            set.directory.body.entry_blocks[0].keymr,
            set.entry_blocks[0].keymr()
        );
        // New chain starts at sequence zero with zero back-references.
        assert_eq!(set.entry_blocks[0].header.sequence, 0);
        assert_eq!(set.entry_blocks[0].header.prev_keymr, Hash32::ZERO);
        // The set it produces passes its own sanity checks.
        set.validate(
            NetworkId::LOCAL,
            Some((set.height(), genesis_block.keymr())),
        )
        .unwrap();
    }

    #[test]
    fn test_seal_places_elements_in_their_minutes() {
        let (_dir, store, genesis_block) = seeded_store();
        let mut pending = PendingBlock::new(genesis_block, 26_000_001);

        let entry = sample_entry();
        pending.advance_minute();
        pending.advance_minute();
        pending.add_entry(&entry);

        let set = pending.seal(&store, 1000).unwrap();
        assert_eq!(
            set.entry_blocks[0].body.minute_of(&entry.entry_hash()),
            Some(3)
        );
        // Sealed bodies carry all ten minutes.
        assert_eq!(set.entry_blocks[0].body.entry_hashes.len(), 10);
        assert_eq!(set.entry_credit.body.objects.len(), 10);
        assert_eq!(set.factoid.body.transactions.len(), 10);
    }

    #[test]
    fn test_seal_continues_existing_chain_sequence() {
        let (_dir, store, genesis_block) = seeded_store();
        let entry = sample_entry();

        let mut pending = PendingBlock::new(genesis_block, 26_000_001);
        pending.add_entry(&entry);
        let first = pending.seal(&store, 1000).unwrap();
        for entry_block in &first.entry_blocks {
            store.put_entry_block_head(entry_block).unwrap();
        }
        store.put_admin_block_head(&first.admin).unwrap();
        store.put_entry_credit_block_head(&first.entry_credit).unwrap();
        store.put_factoid_block_head(&first.factoid).unwrap();
        store.put_directory_block_head(&first.directory).unwrap();

        let mut pending = PendingBlock::new(first.directory.clone(), 26_000_011);
        pending.add_entry(&entry);
        let second = pending.seal(&store, 1000).unwrap();

        let second_entry_block = &second.entry_blocks[0];
        assert_eq!(second_entry_block.header.sequence, 1);
        assert_eq!(
            second_entry_block.header.prev_keymr,
            first.entry_blocks[0].keymr()
        );
        assert_eq!(
            second_entry_block.header.prev_full_hash,
            first.entry_blocks[0].full_hash()
        );
        assert_eq!(second.directory.header.prev_keymr, first.directory.keymr());
    }

    #[test]
    fn test_seal_without_previous_system_block_fails_cleanly() {
        let dir = tempdir().unwrap();
        let store = BlockStore::open(dir.path().join("blocks.redb")).unwrap();
        // A previous directory block exists, but no system blocks do.
        let set = genesis::local_genesis(NetworkId::LOCAL, 1000).unwrap();
        let pending = PendingBlock::new(set.directory, 26_000_001);
        assert!(matches!(
            pending.seal(&store, 1000),
            Err(ChainError::MissingPrevious { .. })
        ));
    }
}
