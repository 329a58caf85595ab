//! The blockchain facade.

use crate::config::NodeConfig;
use crate::error::ChainError;
use crate::genesis;
use crate::inbox::{MessageSource, NodeMessage};
use crate::oracle::ExchangeRateOracle;
use crate::pending::PendingBlock;
use crate::vm::Vm;
use factom_blocks::block_elements::{AdminMessage, Entry, FactoidTransaction};
use factom_blocks::blocks::{DirectoryBlock, EcObject};
use factom_blocks::FullBlockSet;
use factom_storage::BlockStore;
use factom_types::error::ErrorCode;
use factom_types::primitives::hash::{Hash32, NetworkId};
use factom_types::primitives::timestamp;
use std::path::Path;

/// Which network a node participates in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Network {
    /// The production network.
    Mainnet,
    /// The community test network.
    Testnet,
    /// A single-machine development network.
    Local,
    /// A named custom network; its id is derived from the name.
    Custom(String),
}

impl Network {
    /// The 4-byte network id this network stamps into directory blocks.
    pub fn id(&self) -> NetworkId {
        match self {
            Network::Mainnet => NetworkId::MAINNET,
            Network::Testnet => NetworkId::TESTNET,
            Network::Local => NetworkId::LOCAL,
            Network::Custom(name) => NetworkId::from_network_name(name),
        }
    }

    /// Parses a configured network name; anything unrecognized names a
    /// custom network.
    pub fn from_name(name: &str) -> Network {
        match name {
            "mainnet" => Network::Mainnet,
            "testnet" => Network::Testnet,
            "local" => Network::Local,
            custom => Network::Custom(custom.to_string()),
        }
    }
}

/// A blockchain instance: one network, one store, one pending block.
///
/// All mutation happens on the owning thread; the store is the only
/// resource shared with concurrent readers.
pub struct Blockchain {
    network: Network,
    network_id: NetworkId,
    store: BlockStore,
    vms: Vec<Vm>,
    pending: Option<PendingBlock>,
    oracle: Box<dyn ExchangeRateOracle>,
}

impl Blockchain {
    /// Opens a blockchain on the store at `data_path`.
    pub fn open<P: AsRef<Path>>(
        network: Network,
        data_path: P,
        oracle: Box<dyn ExchangeRateOracle>,
    ) -> Result<Self, ChainError> {
        let network_id = network.id();
        let store = BlockStore::open(data_path)?;
        Ok(Blockchain {
            network,
            network_id,
            store,
            vms: Vec::new(),
            pending: None,
            oracle,
        })
    }

    /// Opens a blockchain from a [`NodeConfig`].
    pub fn from_config(
        config: &NodeConfig,
        oracle: Box<dyn ExchangeRateOracle>,
    ) -> Result<Self, ChainError> {
        Self::open(config.network(), &config.data_path, oracle)
    }

    /// The network id this instance is bound to.
    pub fn network_id(&self) -> NetworkId {
        self.network_id
    }

    /// The underlying block store, for read-side collaborators.
    pub fn store(&self) -> &BlockStore {
        &self.store
    }

    /// The currently open pending block, if any.
    pub fn pending(&self) -> Option<&PendingBlock> {
        self.pending.as_ref()
    }

    fn pending_mut(&mut self) -> Result<&mut PendingBlock, ChainError> {
        self.pending.as_mut().ok_or(ChainError::NoPendingBlock)
    }

    /// Loads this network's genesis block set, persists it, and opens the
    /// pending block for height 1. Returns the genesis directory block.
    pub fn load_genesis_block(&mut self) -> Result<DirectoryBlock, ChainError> {
        let rate = self.oracle.ec_exchange_rate(0);
        let set = match &self.network {
            Network::Mainnet => genesis::mainnet_genesis(self.network_id, rate)?,
            Network::Testnet => genesis::testnet_genesis(self.network_id, rate)?,
            Network::Local | Network::Custom(_) => {
                genesis::local_genesis(self.network_id, rate)?
            }
        };
        self.persist_block_set(&set)?;
        if self.vms.is_empty() {
            self.vms.push(Vm::new(set.directory.header));
        }
        self.pending = Some(PendingBlock::new(
            set.directory.clone(),
            timestamp::now_minutes(),
        ));
        tracing::info!(
            target: "chain",
            network_id = %self.network_id,
            keymr = %set.directory.keymr(),
            "genesis block loaded"
        );
        Ok(set.directory)
    }

    /// Re-opens the pending block on top of the stored directory head,
    /// e.g. after a restart.
    pub fn open_pending_block(&mut self) -> Result<(), ChainError> {
        let head = self
            .store
            .get_directory_block_head()?
            .ok_or(ChainError::NoChainHead)?;
        self.pending = Some(PendingBlock::new(head, timestamp::now_minutes()));
        Ok(())
    }

    /// The VM slot responsible for a hash: byte-sum modulo the slot
    /// count, zero when no slots exist. This is the sole ownership
    /// tie-break.
    pub fn vm_for_hash(&self, hash: &Hash32) -> usize {
        if self.vms.is_empty() {
            return 0;
        }
        let sum: usize = hash.0.iter().map(|&byte| usize::from(byte)).sum();
        sum % self.vms.len()
    }

    /// Adds a VM slot.
    pub fn add_vm(&mut self, vm: Vm) {
        self.vms.push(vm);
    }

    /// Left-rotates the VM slot list by one; a no-op with fewer than two
    /// slots.
    pub fn rotate_vms(&mut self) {
        if self.vms.len() > 1 {
            self.vms.rotate_left(1);
        }
    }

    /// Seals the current minute: rotates VMs, then either advances the
    /// pending minute or finalizes the block when minute 10 closes.
    pub fn seal_minute(&mut self) -> Result<Option<FullBlockSet>, ChainError> {
        self.rotate_vms();
        let pending = self.pending_mut()?;
        if pending.at_block_boundary() {
            return self.seal_block().map(Some);
        }
        pending.advance_minute();
        tracing::debug!(
            target: "chain",
            minute = self.pending.as_ref().map(|p| p.current_minute),
            "minute sealed"
        );
        Ok(None)
    }

    /// Finalizes the pending block into a full block set, persists every
    /// head, and opens the next pending block. Failure-atomic: on error
    /// the pending block is left as it was and nothing reaches the store.
    pub fn seal_block(&mut self) -> Result<FullBlockSet, ChainError> {
        let pending = self.pending.as_ref().ok_or(ChainError::NoPendingBlock)?;
        let rate = self.oracle.ec_exchange_rate(pending.height);
        let set = pending.seal(&self.store, rate)?;
        self.persist_block_set(&set)?;
        self.pending = Some(PendingBlock::new(
            set.directory.clone(),
            timestamp::now_minutes(),
        ));
        tracing::info!(
            target: "chain",
            height = set.height(),
            keymr = %set.directory.keymr(),
            entry_blocks = set.entry_blocks.len(),
            "block sealed"
        );
        Ok(set)
    }

    // Heads are written in dependency order, the directory block last: a
    // crash leaves the directory head lagging rather than dangling.
    fn persist_block_set(&self, set: &FullBlockSet) -> Result<(), ChainError> {
        for entry_block in &set.entry_blocks {
            self.store.put_entry_block_head(entry_block)?;
        }
        self.store.put_admin_block_head(&set.admin)?;
        self.store.put_entry_credit_block_head(&set.entry_credit)?;
        self.store.put_factoid_block_head(&set.factoid)?;
        self.store.put_directory_block_head(&set.directory)?;
        Ok(())
    }

    /// Routes a factoid transaction into the pending block.
    pub fn submit_factoid_transaction(
        &mut self,
        tx: FactoidTransaction,
    ) -> Result<(), ChainError> {
        let vm = self.vm_for_hash(&tx.tx_id());
        tracing::trace!(target: "chain", tx_id = %tx.tx_id(), vm, "factoid transaction accepted");
        self.pending_mut()?.add_factoid_transaction(tx);
        Ok(())
    }

    /// Routes a commit or balance increase into the pending block.
    pub fn submit_commit(&mut self, commit: EcObject) -> Result<(), ChainError> {
        self.pending_mut()?.add_commit(commit);
        Ok(())
    }

    /// Persists a revealed entry and routes its hash into the pending
    /// block.
    pub fn submit_entry(&mut self, entry: Entry) -> Result<(), ChainError> {
        let vm = self.vm_for_hash(&entry.chain_id);
        tracing::trace!(target: "chain", entry_hash = %entry.entry_hash(), vm, "entry accepted");
        self.store.put_entry(&entry)?;
        self.pending_mut()?.add_entry(&entry);
        Ok(())
    }

    /// Routes an admin message into the pending block.
    pub fn submit_admin_message(&mut self, message: AdminMessage) -> Result<(), ChainError> {
        self.pending_mut()?.add_admin_message(message);
        Ok(())
    }

    /// Validates and persists an externally synced block set, then follows
    /// it as the new head. Rejected sets leave no side effects.
    pub fn ingest_block_set(&mut self, set: FullBlockSet) -> Result<(), ChainError> {
        let checkpoint = self
            .store
            .get_directory_block_head()?
            .map(|head| (head.header.height + 1, head.keymr()));
        set.validate(self.network_id, checkpoint)?;
        self.persist_block_set(&set)?;
        self.pending = Some(PendingBlock::new(
            set.directory.clone(),
            timestamp::now_minutes(),
        ));
        tracing::info!(target: "chain", height = set.height(), "synced block set ingested");
        Ok(())
    }

    /// Executes one inbox message to completion.
    pub fn execute(&mut self, message: NodeMessage) -> Result<(), ChainError> {
        match message {
            NodeMessage::FactoidTransaction(tx) => self.submit_factoid_transaction(tx),
            NodeMessage::Commit(commit) => self.submit_commit(commit),
            NodeMessage::Entry(entry) => self.submit_entry(entry),
            NodeMessage::AdminMessage(message) => self.submit_admin_message(message),
            NodeMessage::SealMinute => self.seal_minute().map(|_| ()),
            NodeMessage::BlockSet(set) => self.ingest_block_set(*set),
        }
    }

    /// Drains the message source to exhaustion. Errors are logged and the
    /// offending message dropped; the source may re-enqueue.
    pub fn run(&mut self, source: &mut dyn MessageSource) {
        while let Some(message) = source.next() {
            if let Err(error) = self.execute(message) {
                tracing::warn!(
                    target: "inbox",
                    code = error.code(),
                    %error,
                    "message dropped"
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inbox::bounded_inbox;
    use crate::oracle::FixedRateOracle;
    use factom_types::primitives::hash::sha256;
    use tempfile::tempdir;

    fn mainnet(dir: &tempfile::TempDir) -> Blockchain {
        Blockchain::open(
            Network::Mainnet,
            dir.path().join("blocks.redb"),
            Box::new(FixedRateOracle(1000)),
        )
        .unwrap()
    }

    #[test]
    fn test_mainnet_genesis_is_retrievable() {
        let dir = tempdir().unwrap();
        let mut chain = mainnet(&dir);
        let genesis_block = chain.load_genesis_block().unwrap();

        assert_eq!(genesis_block.header.height, 0);
        assert_eq!(genesis_block.header.network_id.to_hex(), "feedbeef");
        assert!(!genesis_block.body.admin_block_lookup_hash.is_zero());
        assert!(!genesis_block.body.entry_credit_block_header_hash.is_zero());
        assert!(!genesis_block.body.factoid_block_keymr.is_zero());

        let store = chain.store();
        assert_eq!(
            store.get_directory_block_by_height(0).unwrap().unwrap(),
            genesis_block
        );
        assert_eq!(
            store.get_directory_block_head().unwrap().unwrap(),
            genesis_block
        );
    }

    #[test]
    fn test_ten_sealed_minutes_seal_a_block() {
        let dir = tempdir().unwrap();
        let mut chain = mainnet(&dir);
        chain.load_genesis_block().unwrap();

        // Nine advances reach minute 10; the tenth seal finalizes.
        for _ in 0..9 {
            assert!(chain.seal_minute().unwrap().is_none());
        }
        let set = chain.seal_minute().unwrap().unwrap();
        assert_eq!(set.height(), 1);
        assert_eq!(
            chain.store().get_directory_block_head().unwrap().unwrap(),
            set.directory
        );
        // A fresh pending block is already open on top.
        assert_eq!(chain.pending().unwrap().height, 2);
        assert_eq!(chain.pending().unwrap().current_minute, 1);
    }

    #[test]
    fn test_submit_before_genesis_is_rejected() {
        let dir = tempdir().unwrap();
        let mut chain = mainnet(&dir);
        let result = chain.submit_admin_message(AdminMessage::ServerFaultHandoff);
        assert!(matches!(result, Err(ChainError::NoPendingBlock)));
    }

    #[test]
    fn test_vm_assignment_and_rotation() {
        let dir = tempdir().unwrap();
        let mut chain = mainnet(&dir);
        // With no slots every hash maps to zero.
        assert_eq!(chain.vm_for_hash(&sha256(b"x")), 0);

        let genesis_block = chain.load_genesis_block().unwrap();
        chain.add_vm(Vm::new(genesis_block.header));
        chain.add_vm(Vm::new(genesis_block.header));
        chain.add_vm(Vm::new(genesis_block.header));

        let hash = sha256(b"assign me");
        let expected = hash.0.iter().map(|&b| usize::from(b)).sum::<usize>() % 3;
        assert_eq!(chain.vm_for_hash(&hash), expected);

        // Rotation keeps the slot count stable.
        chain.rotate_vms();
        assert_eq!(chain.vm_for_hash(&hash), expected);
    }

    #[test]
    fn test_run_drains_inbox() {
        let dir = tempdir().unwrap();
        let mut chain = mainnet(&dir);
        chain.load_genesis_block().unwrap();

        let (sender, mut source) = bounded_inbox(16);
        let entry = Entry::new(sha256(b"chain"), vec![b"ids".to_vec()], b"hello".to_vec());
        sender
            .send(NodeMessage::Entry(entry.clone()))
            .unwrap();
        sender.send(NodeMessage::SealMinute).unwrap();
        drop(sender);

        chain.run(&mut source);

        // The entry is durably stored and staged in minute 1.
        assert_eq!(
            chain.store().get_entry(&entry.entry_hash()).unwrap().unwrap(),
            entry
        );
        let pending = chain.pending().unwrap();
        assert_eq!(pending.current_minute, 2);
        assert_eq!(
            pending.entry_bodies[&entry.chain_id].entry_hashes[&1],
            vec![entry.entry_hash()]
        );
    }

    #[test]
    fn test_custom_network_id_derivation() {
        let network = Network::from_name("acceptance-net");
        assert_eq!(
            network.id(),
            NetworkId::from_network_name("acceptance-net")
        );
        assert_eq!(Network::from_name("mainnet"), Network::Mainnet);
    }
}
