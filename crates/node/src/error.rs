//! Node-level error taxonomy.
//!
//! Everything bubbles to the message-loop boundary, where the offending
//! message is dropped and logged; the core never retries.

use factom_blocks::ValidationError;
use factom_storage::StoreError;
use factom_types::error::{DecodeError, ErrorCode};
use thiserror::Error;

/// Errors surfaced by the blockchain facade.
#[derive(Debug, Error)]
pub enum ChainError {
    /// The persistent store failed.
    #[error("store error: {0}")]
    Store(#[from] StoreError),
    /// An embedded genesis constant failed to decode.
    #[error("genesis data decode error: {0}")]
    Decode(#[from] DecodeError),
    /// An incoming block set failed its sanity checks.
    #[error("block set rejected: {0}")]
    Validation(#[from] ValidationError),
    /// Sealing requires a previous block that is not in the store.
    #[error("previous {block} block missing below height {height}")]
    MissingPrevious {
        /// Which block type was being linked.
        block: &'static str,
        /// The height being sealed.
        height: u32,
    },
    /// An operation needed an open pending block and none exists.
    #[error("no pending block is open")]
    NoPendingBlock,
    /// A pending block cannot be opened because the chain has no head yet.
    #[error("no directory chain head; load a genesis block first")]
    NoChainHead,
}

impl ErrorCode for ChainError {
    fn code(&self) -> &'static str {
        match self {
            Self::Store(_) => "CHAIN_STORE_ERROR",
            Self::Decode(_) => "CHAIN_GENESIS_DECODE_ERROR",
            Self::Validation(_) => "CHAIN_BLOCK_SET_REJECTED",
            Self::MissingPrevious { .. } => "CHAIN_MISSING_PREVIOUS",
            Self::NoPendingBlock => "CHAIN_NO_PENDING_BLOCK",
            Self::NoChainHead => "CHAIN_NO_CHAIN_HEAD",
        }
    }
}
