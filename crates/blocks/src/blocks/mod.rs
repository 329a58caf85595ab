//! The five block types: header + body pairs with memoized identifiers.
//!
//! Bodies are assembled first (by the pending-block accumulator or a
//! decoder); `construct_header` then derives the header from the body's
//! content digest plus contextual fields. Headers are never mutated after
//! that.

mod admin;
mod directory;
mod entry;
mod entry_credit;
mod factoid;

pub use admin::{AdminBlock, AdminBlockBody, AdminBlockHeader};
pub use directory::{
    DirectoryBlock, DirectoryBlockBody, DirectoryBlockHeader, EntryBlockDescriptor,
};
pub use entry::{EntryBlock, EntryBlockBody, EntryBlockHeader};
pub use entry_credit::{EcObject, EntryCreditBlock, EntryCreditBlockBody, EntryCreditBlockHeader};
pub use factoid::{FactoidBlock, FactoidBlockBody, FactoidBlockHeader};
