#![cfg_attr(
    not(test),
    deny(
        clippy::unwrap_used,
        clippy::expect_used,
        clippy::panic,
        clippy::unimplemented,
        clippy::todo
    )
)]

//! # Factom Kernel Blocks
//!
//! The block data model and its binary codec: the transaction, commit, and
//! entry elements; the five block types (directory, admin, entry-credit,
//! factoid, entry) with their header/body split; and the sealed
//! [`FullBlockSet`] with its cross-block sanity checks.
//!
//! Every type marshals to the exact reference wire format and back. Headers
//! are only ever produced by a body's `construct_header(..)`, which computes
//! the body's content digest and packs the remaining contextual fields;
//! blocks are immutable afterwards and memoize their identifiers.

/// Constituent elements carried inside block bodies.
pub mod block_elements;
/// A sealed set of cross-linked blocks plus its sanity validation.
pub mod block_set;
/// The five block types.
pub mod blocks;

pub use block_elements::{
    AdminMessage, AmountAddress, BalanceIncrease, Chain, ChainCommit, Entry, EntryCommit,
    EntryStage, FactoidTransaction, RcdSignature,
};
pub use block_set::{FullBlockSet, ValidationError};
pub use blocks::{
    AdminBlock, AdminBlockBody, AdminBlockHeader, DirectoryBlock, DirectoryBlockBody,
    DirectoryBlockHeader, EcObject, EntryBlock, EntryBlockBody, EntryBlockDescriptor,
    EntryBlockHeader, EntryCreditBlock, EntryCreditBlockBody, EntryCreditBlockHeader,
    FactoidBlock, FactoidBlockBody, FactoidBlockHeader,
};

/// Minutes partition every block body; markers run 1 through 10.
pub const FIRST_MINUTE: u8 = 1;
/// Sealing minute 10 finalizes the block.
pub const LAST_MINUTE: u8 = 10;
