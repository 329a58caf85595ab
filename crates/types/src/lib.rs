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

//! # Factom Kernel Types
//!
//! Primitive building blocks shared by every other crate in the workspace:
//! fixed-width hash and network-id newtypes, the canonical varint, Merkle
//! summarization, signature pairs, wall-clock helpers, the byte-cursor codec
//! utilities, and the shared decode-error taxonomy.

/// Byte-cursor helpers used by every binary decoder in the workspace.
pub mod codec;
/// The shared error taxonomy and the stable `ErrorCode` trait.
pub mod error;
/// Hashes, network ids, varints, Merkle trees, signatures, and clocks.
pub mod primitives;

pub use error::{DecodeError, ErrorCode};
pub use primitives::hash::{ChainId, Hash32, NetworkId};
pub use primitives::signatures::{FullSignature, FullSignatureList, Signer};
