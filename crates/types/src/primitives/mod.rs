//! Primitive values shared by the whole block hierarchy.

/// Chain predicates for the block-syncing fast path.
pub mod filters;
/// Fixed-width hash and network-id newtypes plus the system chain ids.
pub mod hash;
/// Merkle summarization and the key-MR formula.
pub mod merkle;
/// Ed25519 signature pairs and the collaborator `Signer` trait.
pub mod signatures;
/// Millisecond and minute wall-clock helpers.
pub mod timestamp;
/// The canonical big-endian base-128 varint.
pub mod varint;
