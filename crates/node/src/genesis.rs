//! Per-network genesis block sets.
//!
//! Mainnet derives its admin and entry-credit bodies programmatically and
//! unmarshals a hard-coded factoid body (the premine coinbase). Testnet
//! unmarshals hard-coded admin and factoid bodies. Local and custom
//! networks construct empty bodies. Every genesis header carries height 0
//! and all-zero back-references.

use crate::error::ChainError;
use factom_blocks::blocks::{
    AdminBlock, AdminBlockBody, DirectoryBlock, DirectoryBlockBody, EcObject, EntryCreditBlock,
    EntryCreditBlockBody, FactoidBlock, FactoidBlockBody,
};
use factom_blocks::FullBlockSet;
use factom_types::codec;
use factom_types::primitives::hash::{Hash32, NetworkId};

/// Timestamp (whole minutes) carried by every genesis directory block.
pub const GENESIS_TIMESTAMP: u32 = 24_018_960;

/// Marshalled mainnet genesis factoid body: one premine coinbase in
/// minute 1, minutes 2..=10 empty.
const MAINNET_GENESIS_FACTOID_BODY: &str = concat!(
    // coinbase: version, timestamp, zero inputs, one output, zero purchases
    "02",
    "014f8a7ea600",
    "000100",
    // 5_000_000_000 factoshis to the premine address
    "92d097e400",
    "a0a1a2a3a4a5a6a7a8a9aaabacadaeaf",
    "b0b1b2b3b4b5b6b7b8b9babbbcbdbebf",
    // ten minute terminators
    "00000000000000000000",
);

/// Marshalled testnet genesis admin body: a single directory-block
/// signature from the bootstrap identity.
const TESTNET_GENESIS_ADMIN_BODY: &str = concat!(
    "01",
    // bootstrap identity chain
    "888888",
    "000000000000000000000000000000000000000000000000000000",
    "0001",
    // bootstrap signing key
    "c0c1c2c3c4c5c6c7c8c9cacbcccdcecf",
    "d0d1d2d3d4d5d6d7d8d9dadbdcdddedf",
    // signature over the (nonexistent) previous header
    "000102030405060708090a0b0c0d0e0f",
    "101112131415161718191a1b1c1d1e1f",
    "202122232425262728292a2b2c2d2e2f",
    "303132333435363738393a3b3c3d3e3f",
);

/// Marshalled testnet genesis factoid body: an empty coinbase, ten
/// minute terminators.
const TESTNET_GENESIS_FACTOID_BODY: &str =
    concat!("02", "014f8a7ea600", "000000", "00000000000000000000");

fn decode_hex(context: &'static str, raw: &str) -> Result<Vec<u8>, ChainError> {
    hex::decode(raw).map_err(|_| {
        ChainError::Decode(factom_types::DecodeError::BadLength {
            context,
            expected: raw.len() / 2,
            actual: 0,
        })
    })
}

fn assemble(
    network_id: NetworkId,
    admin: AdminBlock,
    entry_credit: EntryCreditBlock,
    factoid: FactoidBlock,
) -> FullBlockSet {
    let body = DirectoryBlockBody {
        admin_block_lookup_hash: admin.lookup_hash(),
        entry_credit_block_header_hash: entry_credit.header_hash(),
        factoid_block_keymr: factoid.keymr(),
        entry_blocks: Vec::new(),
    };
    let header = body.construct_header(
        network_id,
        Hash32::ZERO,
        Hash32::ZERO,
        GENESIS_TIMESTAMP,
        0,
    );
    FullBlockSet {
        directory: DirectoryBlock::new(header, body),
        admin,
        entry_credit,
        factoid,
        entry_blocks: Vec::new(),
    }
}

fn empty_admin_block() -> AdminBlock {
    let body = AdminBlockBody::default();
    let header = body.construct_header(Hash32::ZERO, 0);
    AdminBlock::new(header, body)
}

fn empty_entry_credit_block() -> EntryCreditBlock {
    let mut body = EntryCreditBlockBody::default();
    body.pad_minutes();
    let header = body.construct_header(Hash32::ZERO, Hash32::ZERO, 0);
    EntryCreditBlock::new(header, body)
}

fn factoid_block_from_body(
    body: FactoidBlockBody,
    ec_exchange_rate: u64,
) -> FactoidBlock {
    let header = body.construct_header(Hash32::ZERO, Hash32::ZERO, ec_exchange_rate, 0);
    FactoidBlock::new(header, body)
}

/// The production genesis set.
pub fn mainnet_genesis(
    network_id: NetworkId,
    ec_exchange_rate: u64,
) -> Result<FullBlockSet, ChainError> {
    let admin = empty_admin_block();

    // The M1 bootstrap server index lands in minute 1.
    let mut ec_body = EntryCreditBlockBody::default();
    ec_body
        .objects
        .entry(1)
        .or_default()
        .push(EcObject::ServerIndexNumber(0));
    ec_body.pad_minutes();
    let header = ec_body.construct_header(Hash32::ZERO, Hash32::ZERO, 0);
    let entry_credit = EntryCreditBlock::new(header, ec_body);

    let raw = decode_hex("mainnet genesis factoid body", MAINNET_GENESIS_FACTOID_BODY)?;
    let (factoid_body, rest) = FactoidBlockBody::unmarshal_with_remainder(&raw)?;
    codec::expect_empty(rest)?;
    let factoid = factoid_block_from_body(factoid_body, ec_exchange_rate);

    Ok(assemble(network_id, admin, entry_credit, factoid))
}

/// The community test-network genesis set.
pub fn testnet_genesis(
    network_id: NetworkId,
    ec_exchange_rate: u64,
) -> Result<FullBlockSet, ChainError> {
    let raw = decode_hex("testnet genesis admin body", TESTNET_GENESIS_ADMIN_BODY)?;
    let (admin_body, rest) = AdminBlockBody::unmarshal_with_remainder(&raw, 1)?;
    codec::expect_empty(rest)?;
    let header = admin_body.construct_header(Hash32::ZERO, 0);
    let admin = AdminBlock::new(header, admin_body);

    let entry_credit = empty_entry_credit_block();

    let raw = decode_hex("testnet genesis factoid body", TESTNET_GENESIS_FACTOID_BODY)?;
    let (factoid_body, rest) = FactoidBlockBody::unmarshal_with_remainder(&raw)?;
    codec::expect_empty(rest)?;
    let factoid = factoid_block_from_body(factoid_body, ec_exchange_rate);

    Ok(assemble(network_id, admin, entry_credit, factoid))
}

/// Genesis for local and custom networks: empty bodies throughout.
pub fn local_genesis(
    network_id: NetworkId,
    ec_exchange_rate: u64,
) -> Result<FullBlockSet, ChainError> {
    let mut factoid_body = FactoidBlockBody::default();
    factoid_body.pad_minutes();
    Ok(assemble(
        network_id,
        empty_admin_block(),
        empty_entry_credit_block(),
        factoid_block_from_body(factoid_body, ec_exchange_rate),
    ))
}
