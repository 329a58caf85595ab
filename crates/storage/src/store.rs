//! The redb-backed block store.

use factom_blocks::block_elements::Entry;
use factom_blocks::blocks::{
    AdminBlock, AdminBlockHeader, DirectoryBlock, DirectoryBlockHeader, EntryBlock,
    EntryCreditBlock, EntryCreditBlockHeader, FactoidBlock, FactoidBlockHeader,
};
use factom_types::error::{DecodeError, ErrorCode};
use factom_types::primitives::hash::{ChainId, Hash32};
use redb::{Database, ReadableTable, TableDefinition};
use std::path::Path;
use thiserror::Error;

// ---- Table definitions, one per keyspace ----
// Table names carry the legacy `Namespace;` spelling so an on-disk dump
// reads the same as the reference database layout.

const DIRECTORY_BLOCK: TableDefinition<&[u8; 32], &[u8]> = TableDefinition::new("DirectoryBlock;");
const DIRECTORY_BLOCK_NUMBER: TableDefinition<&[u8; 4], &[u8; 32]> =
    TableDefinition::new("DirectoryBlockNumber;");
const ADMIN_BLOCK: TableDefinition<&[u8; 32], &[u8]> = TableDefinition::new("AdminBlock;");
const ADMIN_BLOCK_NUMBER: TableDefinition<&[u8; 4], &[u8; 32]> =
    TableDefinition::new("AdminBlockNumber;");
const FACTOID_BLOCK: TableDefinition<&[u8; 32], &[u8]> = TableDefinition::new("FactoidBlock;");
const FACTOID_BLOCK_NUMBER: TableDefinition<&[u8; 4], &[u8; 32]> =
    TableDefinition::new("FactoidBlockNumber;");
const ENTRY_CREDIT_BLOCK: TableDefinition<&[u8; 32], &[u8]> =
    TableDefinition::new("EntryCreditBlock;");
const ENTRY_CREDIT_BLOCK_NUMBER: TableDefinition<&[u8; 4], &[u8; 32]> =
    TableDefinition::new("EntryCreditBlockNumber;");
const ENTRY_BLOCK: TableDefinition<&[u8; 32], &[u8]> = TableDefinition::new("EntryBlock;");
// entry hash -> owning chain id (the first hop of the two-step pointer)
const ENTRY: TableDefinition<&[u8; 32], &[u8; 32]> = TableDefinition::new("Entry;");
// chain_id ‖ ";" ‖ entry_hash -> marshalled entry (the `<chain_id>;` keyspaces)
const CHAIN_ENTRIES: TableDefinition<&[u8], &[u8]> = TableDefinition::new("ChainEntries;");
const CHAIN_HEAD: TableDefinition<&[u8; 32], &[u8; 32]> = TableDefinition::new("ChainHead;");

fn height_key(height: u32) -> [u8; 4] {
    height.to_be_bytes()
}

fn chain_entry_key(chain_id: &ChainId, entry_hash: &Hash32) -> Vec<u8> {
    let mut key = Vec::with_capacity(65);
    key.extend_from_slice(&chain_id.0);
    key.push(b';');
    key.extend_from_slice(&entry_hash.0);
    key
}

/// Failures of the persistent store. A missing value is a normal
/// `Ok(None)` return, never an error.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The underlying engine failed.
    #[error("storage backend error: {0}")]
    Backend(String),
    /// A stored value failed to decode.
    #[error("corrupt value in {namespace} under key {key}: {source}")]
    Corrupt {
        /// The keyspace holding the bad value.
        namespace: &'static str,
        /// Hex of the offending key.
        key: String,
        /// The decoder's complaint.
        source: DecodeError,
    },
    /// A height index points at a block that is not stored.
    #[error("{namespace} height index {height} points at missing block {id}")]
    DanglingIndex {
        /// The block keyspace.
        namespace: &'static str,
        /// The height that was looked up.
        height: u32,
        /// The identifier the index pointed at.
        id: Hash32,
    },
}

impl ErrorCode for StoreError {
    fn code(&self) -> &'static str {
        match self {
            Self::Backend(_) => "STORE_BACKEND_ERROR",
            Self::Corrupt { .. } => "STORE_CORRUPT_VALUE",
            Self::DanglingIndex { .. } => "STORE_DANGLING_INDEX",
        }
    }
}

fn backend<E: std::fmt::Display>(error: E) -> StoreError {
    StoreError::Backend(error.to_string())
}

/// The keyspace-namespaced block store.
pub struct BlockStore {
    db: Database,
}

macro_rules! block_accessors {
    (
        $block:ty,
        $namespace:expr,
        $table:ident,
        $number_table:ident,
        $id_method:ident,
        $chain_id:expr,
        get = $get:ident,
        get_by_height = $get_by_height:ident,
        get_head = $get_head:ident,
        put = $put:ident,
        put_head = $put_head:ident
    ) => {
        /// Fetches a block by its identifier.
        pub fn $get(&self, id: &Hash32) -> Result<Option<$block>, StoreError> {
            let Some(raw) = self.get_raw($table, id)? else {
                return Ok(None);
            };
            let block = <$block>::unmarshal(&raw).map_err(|source| StoreError::Corrupt {
                namespace: $namespace,
                key: id.to_hex(),
                source,
            })?;
            Ok(Some(block))
        }

        /// Fetches a block through the height index.
        pub fn $get_by_height(&self, height: u32) -> Result<Option<$block>, StoreError> {
            let Some(id) = self.get_indexed_id($number_table, height)? else {
                return Ok(None);
            };
            match self.$get(&id)? {
                Some(block) => Ok(Some(block)),
                None => Err(StoreError::DanglingIndex {
                    namespace: $namespace,
                    height,
                    id,
                }),
            }
        }

        /// Fetches the current chain head, if one has been set.
        pub fn $get_head(&self) -> Result<Option<$block>, StoreError> {
            let Some(id) = self.get_chain_head(&$chain_id)? else {
                return Ok(None);
            };
            self.$get(&id)
        }

        /// Writes the block and its height index.
        pub fn $put(&self, block: &$block) -> Result<(), StoreError> {
            let txn = self.db.begin_write().map_err(backend)?;
            Self::insert_block_rows(
                &txn,
                $table,
                $number_table,
                &block.$id_method(),
                block.header.height,
                &block.marshal(),
            )?;
            txn.commit().map_err(backend)
        }

        /// Atomically writes the block, its height index, and the chain
        /// head in one transaction.
        pub fn $put_head(&self, block: &$block) -> Result<(), StoreError> {
            let id = block.$id_method();
            let txn = self.db.begin_write().map_err(backend)?;
            Self::insert_block_rows(
                &txn,
                $table,
                $number_table,
                &id,
                block.header.height,
                &block.marshal(),
            )?;
            Self::insert_chain_head(&txn, &$chain_id, &id)?;
            txn.commit().map_err(backend)?;
            tracing::debug!(
                target: "storage",
                namespace = $namespace,
                height = block.header.height,
                id = %id,
                "chain head advanced"
            );
            Ok(())
        }
    };
}

impl BlockStore {
    /// Opens (or creates) the store at `path`, creating every table up
    /// front so readers never race table creation.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, StoreError> {
        let db = Database::create(path).map_err(backend)?;
        {
            let txn = db.begin_write().map_err(backend)?;
            {
                txn.open_table(DIRECTORY_BLOCK).map_err(backend)?;
                txn.open_table(DIRECTORY_BLOCK_NUMBER).map_err(backend)?;
                txn.open_table(ADMIN_BLOCK).map_err(backend)?;
                txn.open_table(ADMIN_BLOCK_NUMBER).map_err(backend)?;
                txn.open_table(FACTOID_BLOCK).map_err(backend)?;
                txn.open_table(FACTOID_BLOCK_NUMBER).map_err(backend)?;
                txn.open_table(ENTRY_CREDIT_BLOCK).map_err(backend)?;
                txn.open_table(ENTRY_CREDIT_BLOCK_NUMBER).map_err(backend)?;
                txn.open_table(ENTRY_BLOCK).map_err(backend)?;
                txn.open_table(ENTRY).map_err(backend)?;
                txn.open_table(CHAIN_ENTRIES).map_err(backend)?;
                txn.open_table(CHAIN_HEAD).map_err(backend)?;
            }
            txn.commit().map_err(backend)?;
        }
        Ok(BlockStore { db })
    }

    fn insert_block_rows(
        txn: &redb::WriteTransaction,
        table: TableDefinition<&[u8; 32], &[u8]>,
        number_table: TableDefinition<&[u8; 4], &[u8; 32]>,
        id: &Hash32,
        height: u32,
        raw: &[u8],
    ) -> Result<(), StoreError> {
        let mut blocks = txn.open_table(table).map_err(backend)?;
        blocks.insert(&id.0, raw).map_err(backend)?;
        let mut numbers = txn.open_table(number_table).map_err(backend)?;
        numbers
            .insert(&height_key(height), &id.0)
            .map_err(backend)?;
        Ok(())
    }

    fn insert_chain_head(
        txn: &redb::WriteTransaction,
        chain_id: &ChainId,
        id: &Hash32,
    ) -> Result<(), StoreError> {
        let mut heads = txn.open_table(CHAIN_HEAD).map_err(backend)?;
        heads.insert(&chain_id.0, &id.0).map_err(backend)?;
        Ok(())
    }

    fn get_raw(
        &self,
        table: TableDefinition<&[u8; 32], &[u8]>,
        id: &Hash32,
    ) -> Result<Option<Vec<u8>>, StoreError> {
        let txn = self.db.begin_read().map_err(backend)?;
        let table = txn.open_table(table).map_err(backend)?;
        let value = table.get(&id.0).map_err(backend)?;
        Ok(value.map(|guard| guard.value().to_vec()))
    }

    fn get_indexed_id(
        &self,
        number_table: TableDefinition<&[u8; 4], &[u8; 32]>,
        height: u32,
    ) -> Result<Option<Hash32>, StoreError> {
        let txn = self.db.begin_read().map_err(backend)?;
        let table = txn.open_table(number_table).map_err(backend)?;
        let value = table.get(&height_key(height)).map_err(backend)?;
        Ok(value.map(|guard| Hash32(*guard.value())))
    }

    /// The raw chain-head pointer for any chain id, system or user.
    pub fn get_chain_head(&self, chain_id: &ChainId) -> Result<Option<Hash32>, StoreError> {
        let txn = self.db.begin_read().map_err(backend)?;
        let table = txn.open_table(CHAIN_HEAD).map_err(backend)?;
        let value = table.get(&chain_id.0).map_err(backend)?;
        Ok(value.map(|guard| Hash32(*guard.value())))
    }

    /// Sets the raw chain-head pointer for a chain id.
    pub fn put_chain_head(&self, chain_id: &ChainId, head: &Hash32) -> Result<(), StoreError> {
        let txn = self.db.begin_write().map_err(backend)?;
        Self::insert_chain_head(&txn, chain_id, head)?;
        txn.commit().map_err(backend)
    }

    block_accessors!(
        DirectoryBlock,
        "DirectoryBlock;",
        DIRECTORY_BLOCK,
        DIRECTORY_BLOCK_NUMBER,
        keymr,
        DirectoryBlockHeader::CHAIN_ID,
        get = get_directory_block,
        get_by_height = get_directory_block_by_height,
        get_head = get_directory_block_head,
        put = put_directory_block,
        put_head = put_directory_block_head
    );

    block_accessors!(
        AdminBlock,
        "AdminBlock;",
        ADMIN_BLOCK,
        ADMIN_BLOCK_NUMBER,
        lookup_hash,
        AdminBlockHeader::CHAIN_ID,
        get = get_admin_block,
        get_by_height = get_admin_block_by_height,
        get_head = get_admin_block_head,
        put = put_admin_block,
        put_head = put_admin_block_head
    );

    block_accessors!(
        FactoidBlock,
        "FactoidBlock;",
        FACTOID_BLOCK,
        FACTOID_BLOCK_NUMBER,
        keymr,
        FactoidBlockHeader::CHAIN_ID,
        get = get_factoid_block,
        get_by_height = get_factoid_block_by_height,
        get_head = get_factoid_block_head,
        put = put_factoid_block,
        put_head = put_factoid_block_head
    );

    block_accessors!(
        EntryCreditBlock,
        "EntryCreditBlock;",
        ENTRY_CREDIT_BLOCK,
        ENTRY_CREDIT_BLOCK_NUMBER,
        header_hash,
        EntryCreditBlockHeader::CHAIN_ID,
        get = get_entry_credit_block,
        get_by_height = get_entry_credit_block_by_height,
        get_head = get_entry_credit_block_head,
        put = put_entry_credit_block,
        put_head = put_entry_credit_block_head
    );

    /// Fetches an entry block by key-MR. Entry blocks have no height
    /// index; they are reached through their chain head or a directory
    /// block descriptor.
    pub fn get_entry_block(&self, keymr: &Hash32) -> Result<Option<EntryBlock>, StoreError> {
        let Some(raw) = self.get_raw(ENTRY_BLOCK, keymr)? else {
            return Ok(None);
        };
        let block = EntryBlock::unmarshal(&raw).map_err(|source| StoreError::Corrupt {
            namespace: "EntryBlock;",
            key: keymr.to_hex(),
            source,
        })?;
        Ok(Some(block))
    }

    /// Fetches the head entry block of one chain.
    pub fn get_entry_block_head(
        &self,
        chain_id: &ChainId,
    ) -> Result<Option<EntryBlock>, StoreError> {
        let Some(keymr) = self.get_chain_head(chain_id)? else {
            return Ok(None);
        };
        self.get_entry_block(&keymr)
    }

    /// Writes an entry block.
    pub fn put_entry_block(&self, block: &EntryBlock) -> Result<(), StoreError> {
        let txn = self.db.begin_write().map_err(backend)?;
        {
            let mut blocks = txn.open_table(ENTRY_BLOCK).map_err(backend)?;
            blocks
                .insert(&block.keymr().0, block.marshal().as_slice())
                .map_err(backend)?;
        }
        txn.commit().map_err(backend)
    }

    /// Atomically writes an entry block and advances its chain head.
    pub fn put_entry_block_head(&self, block: &EntryBlock) -> Result<(), StoreError> {
        let keymr = block.keymr();
        let txn = self.db.begin_write().map_err(backend)?;
        {
            let mut blocks = txn.open_table(ENTRY_BLOCK).map_err(backend)?;
            blocks
                .insert(&keymr.0, block.marshal().as_slice())
                .map_err(backend)?;
        }
        Self::insert_chain_head(&txn, &block.header.chain_id, &keymr)?;
        txn.commit().map_err(backend)?;
        tracing::debug!(
            target: "storage",
            chain_id = %block.header.chain_id,
            height = block.header.height,
            keymr = %keymr,
            "entry chain head advanced"
        );
        Ok(())
    }

    /// Fetches an entry by hash through the two-step pointer:
    /// entry hash → chain id → marshalled entry.
    pub fn get_entry(&self, entry_hash: &Hash32) -> Result<Option<Entry>, StoreError> {
        let txn = self.db.begin_read().map_err(backend)?;
        let pointers = txn.open_table(ENTRY).map_err(backend)?;
        let Some(chain_id) = pointers.get(&entry_hash.0).map_err(backend)? else {
            return Ok(None);
        };
        let chain_id: ChainId = Hash32(*chain_id.value());
        let entries = txn.open_table(CHAIN_ENTRIES).map_err(backend)?;
        let key = chain_entry_key(&chain_id, entry_hash);
        let Some(raw) = entries.get(key.as_slice()).map_err(backend)? else {
            return Ok(None);
        };
        let entry = Entry::unmarshal(raw.value()).map_err(|source| StoreError::Corrupt {
            namespace: "ChainEntries;",
            key: hex::encode(&key),
            source,
        })?;
        Ok(Some(entry))
    }

    /// Writes an entry under both halves of the two-step pointer in one
    /// transaction.
    pub fn put_entry(&self, entry: &Entry) -> Result<(), StoreError> {
        let entry_hash = entry.entry_hash();
        let txn = self.db.begin_write().map_err(backend)?;
        {
            let mut pointers = txn.open_table(ENTRY).map_err(backend)?;
            pointers
                .insert(&entry_hash.0, &entry.chain_id.0)
                .map_err(backend)?;
            let mut entries = txn.open_table(CHAIN_ENTRIES).map_err(backend)?;
            let key = chain_entry_key(&entry.chain_id, &entry_hash);
            entries
                .insert(key.as_slice(), entry.marshal().as_slice())
                .map_err(backend)?;
        }
        txn.commit().map_err(backend)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use factom_blocks::blocks::{
        AdminBlockBody, DirectoryBlockBody, EntryBlockBody, EntryCreditBlockBody,
        FactoidBlockBody,
    };
    use factom_types::primitives::hash::{sha256, NetworkId};
    use tempfile::tempdir;

    fn directory_block(height: u32, prev_keymr: Hash32) -> DirectoryBlock {
        let body = DirectoryBlockBody {
            admin_block_lookup_hash: sha256(&height.to_be_bytes()),
            entry_credit_block_header_hash: sha256(b"ec"),
            factoid_block_keymr: sha256(b"fct"),
            entry_blocks: Vec::new(),
        };
        let header = body.construct_header(
            NetworkId::LOCAL,
            prev_keymr,
            Hash32::ZERO,
            26_000_000 + height,
            height,
        );
        DirectoryBlock::new(header, body)
    }

    #[test]
    fn test_directory_head_consistency() {
        let dir = tempdir().unwrap();
        let store = BlockStore::open(dir.path().join("blocks.redb")).unwrap();

        let block = directory_block(7, sha256(b"prev"));
        store.put_directory_block_head(&block).unwrap();

        assert_eq!(
            store.get_directory_block(&block.keymr()).unwrap().unwrap(),
            block
        );
        assert_eq!(
            store.get_directory_block_by_height(7).unwrap().unwrap(),
            block
        );
        assert_eq!(store.get_directory_block_head().unwrap().unwrap(), block);
    }

    #[test]
    fn test_missing_is_none_not_error() {
        let dir = tempdir().unwrap();
        let store = BlockStore::open(dir.path().join("blocks.redb")).unwrap();
        assert!(store.get_directory_block_head().unwrap().is_none());
        assert!(store
            .get_directory_block(&sha256(b"nowhere"))
            .unwrap()
            .is_none());
        assert!(store.get_admin_block_by_height(3).unwrap().is_none());
        assert!(store.get_entry(&sha256(b"no entry")).unwrap().is_none());
    }

    #[test]
    fn test_head_survives_reopen_fully_or_not_at_all() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("blocks.redb");
        let block = directory_block(3, Hash32::ZERO);
        {
            let store = BlockStore::open(&path).unwrap();
            store.put_directory_block_head(&block).unwrap();
        }
        let store = BlockStore::open(&path).unwrap();
        // All three rows of the head write are visible after reopen.
        assert_eq!(store.get_directory_block_head().unwrap().unwrap(), block);
        assert_eq!(
            store.get_directory_block_by_height(3).unwrap().unwrap(),
            block
        );
        assert_eq!(
            store.get_directory_block(&block.keymr()).unwrap().unwrap(),
            block
        );
    }

    #[test]
    fn test_all_system_block_heads() {
        let dir = tempdir().unwrap();
        let store = BlockStore::open(dir.path().join("blocks.redb")).unwrap();

        let admin_body = AdminBlockBody::default();
        let admin = AdminBlock::new(admin_body.construct_header(Hash32::ZERO, 1), admin_body);
        store.put_admin_block_head(&admin).unwrap();
        assert_eq!(store.get_admin_block_head().unwrap().unwrap(), admin);
        assert_eq!(store.get_admin_block_by_height(1).unwrap().unwrap(), admin);

        let mut ec_body = EntryCreditBlockBody::default();
        ec_body.pad_minutes();
        let ec = EntryCreditBlock::new(
            ec_body.construct_header(Hash32::ZERO, Hash32::ZERO, 1),
            ec_body,
        );
        store.put_entry_credit_block_head(&ec).unwrap();
        assert_eq!(store.get_entry_credit_block_head().unwrap().unwrap(), ec);

        let mut factoid_body = FactoidBlockBody::default();
        factoid_body.pad_minutes();
        let factoid = FactoidBlock::new(
            factoid_body.construct_header(Hash32::ZERO, Hash32::ZERO, 1000, 1),
            factoid_body,
        );
        store.put_factoid_block_head(&factoid).unwrap();
        assert_eq!(store.get_factoid_block_head().unwrap().unwrap(), factoid);
        assert_eq!(
            store.get_factoid_block(&factoid.keymr()).unwrap().unwrap(),
            factoid
        );
    }

    #[test]
    fn test_entry_block_head_per_chain() {
        let dir = tempdir().unwrap();
        let store = BlockStore::open(dir.path().join("blocks.redb")).unwrap();

        let chain_id = sha256(b"chain A");
        let mut body = EntryBlockBody::default();
        body.entry_hashes.insert(1, vec![sha256(b"e1")]);
        body.pad_minutes();
        let block = EntryBlock::new(
            body.construct_header(chain_id, Hash32::ZERO, Hash32::ZERO, 0, 1),
            body,
        );
        store.put_entry_block_head(&block).unwrap();

        assert_eq!(
            store.get_entry_block_head(&chain_id).unwrap().unwrap(),
            block
        );
        assert!(store
            .get_entry_block_head(&sha256(b"chain B"))
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_entry_two_step_pointer() {
        let dir = tempdir().unwrap();
        let store = BlockStore::open(dir.path().join("blocks.redb")).unwrap();

        let entry = Entry::new(
            sha256(b"chain A"),
            vec![b"ext".to_vec()],
            b"payload".to_vec(),
        );
        store.put_entry(&entry).unwrap();
        let fetched = store.get_entry(&entry.entry_hash()).unwrap().unwrap();
        assert_eq!(fetched, entry);
        assert_eq!(fetched.chain_id, entry.chain_id);
    }

    #[test]
    fn test_dangling_height_index_is_typed() {
        let dir = tempdir().unwrap();
        let store = BlockStore::open(dir.path().join("blocks.redb")).unwrap();

        // Plant an index row pointing at a block that was never written.
        let txn = store.db.begin_write().unwrap();
        {
            let mut numbers = txn.open_table(DIRECTORY_BLOCK_NUMBER).unwrap();
            numbers
                .insert(&height_key(9), &sha256(b"ghost").0)
                .unwrap();
        }
        txn.commit().unwrap();

        assert!(matches!(
            store.get_directory_block_by_height(9),
            Err(StoreError::DanglingIndex { height: 9, .. })
        ));
    }

    #[test]
    fn test_corrupt_value_is_typed() {
        let dir = tempdir().unwrap();
        let store = BlockStore::open(dir.path().join("blocks.redb")).unwrap();

        let key = sha256(b"bad block");
        let txn = store.db.begin_write().unwrap();
        {
            let mut blocks = txn.open_table(DIRECTORY_BLOCK).unwrap();
            blocks.insert(&key.0, [0xFFu8; 10].as_slice()).unwrap();
        }
        txn.commit().unwrap();

        assert!(matches!(
            store.get_directory_block(&key),
            Err(StoreError::Corrupt { .. })
        ));
    }
}
