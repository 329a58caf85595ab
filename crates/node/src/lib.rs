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

//! # Factom Kernel Node
//!
//! The blockchain facade that ties the workspace together: a
//! [`Blockchain`] bound to one network id owns the block store, the VM
//! slots, and the current [`PendingBlock`]; external collaborators feed it
//! through a bounded [`inbox`](crate::inbox) and it seals minutes and
//! blocks on command.

/// The blockchain facade.
pub mod chain;
/// TOML-backed node configuration.
pub mod config;
/// Node-level error taxonomy.
pub mod error;
/// Per-network genesis block sets.
pub mod genesis;
/// The typed message inbox and run loop.
pub mod inbox;
/// The exchange-rate oracle collaborator interface.
pub mod oracle;
/// The minute-partitioned staging block.
pub mod pending;
/// Structured-logging initialization.
pub mod telemetry;
/// VM slots and their hash assignment.
pub mod vm;

pub use chain::{Blockchain, Network};
pub use config::NodeConfig;
pub use error::ChainError;
pub use inbox::{bounded_inbox, ChannelSource, MessageSource, NodeMessage};
pub use oracle::{ExchangeRateOracle, FixedRateOracle};
pub use pending::PendingBlock;
