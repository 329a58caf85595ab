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

//! # Factom Kernel Storage
//!
//! The embedded persistent block store: a redb database with one table per
//! keyspace, typed block and entry accessors, height indexes, and chain
//! heads. Head updates touch the block table, the height index, and the
//! chain head inside a single write transaction, so concurrent readers see
//! either the full prior state or the full new state.
//!
//! The store never validates block content beyond decoding it; content
//! validity is the caller's responsibility.

mod store;

pub use store::{BlockStore, StoreError};
