//! Constituent elements carried inside block bodies.
//!
//! Each element exposes `marshal`, `unmarshal`, and — for variable-length
//! elements — `unmarshal_with_remainder`, so streaming decoders never need
//! a length up front. The binary round-trip is the authoritative contract;
//! `to_json` projections exist for the RPC facade only.

mod admin_messages;
mod balance_increase;
mod chain;
mod chain_commit;
mod entry;
mod entry_commit;
mod factoid_transaction;

pub use admin_messages::{AdminMessage, MAX_ADMIN_ID};
pub use balance_increase::BalanceIncrease;
pub use chain::Chain;
pub use chain_commit::ChainCommit;
pub use entry::{Entry, EntryContext, EntryStage};
pub use entry_commit::EntryCommit;
pub use factoid_transaction::{AmountAddress, FactoidTransaction, RcdSignature};
