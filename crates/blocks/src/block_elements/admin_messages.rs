//! Admin-block messages: the authority-set bookkeeping records.
//!
//! Each message is tagged by a single admin-id byte, `0x00` through
//! [`MAX_ADMIN_ID`]. Most payloads are fixed-width; the coinbase and
//! authority-address records carry a varint length prefix. An id inside
//! the known range whose structure this node does not model decodes as
//! [`AdminMessage::Opaque`], preserving the raw byte so the containing
//! block's message count and body size stay self-consistent; an id above
//! the range is a decode error.

use crate::block_elements::factoid_transaction::AmountAddress;
use factom_types::codec;
use factom_types::error::DecodeError;
use factom_types::primitives::hash::{ChainId, Hash32};
use factom_types::primitives::varint;
use factom_types::FullSignature;
use serde_json::{json, Value};

/// Highest assigned admin-id.
pub const MAX_ADMIN_ID: u8 = 0x0E;

/// Efficiency is expressed in basis points of a percent.
const MAX_EFFICIENCY: u16 = 10_000;

/// One admin-block message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AdminMessage {
    /// `0x00` — minute marker, deprecated in M2 but decoded passively.
    MinuteNumber {
        /// The minute, 1 through 10.
        minute: u8,
    },
    /// `0x01` — a federated server's signature of the previous
    /// directory-block header.
    DirectoryBlockSignature {
        /// The signing server's identity chain.
        identity_chain_id: ChainId,
        /// Signature over the previous directory-block header.
        signature: FullSignature,
    },
    /// `0x02` — the latest matryoshka-hash reveal, ranking servers for
    /// block priority.
    MatryoshkaHashReveal {
        /// The revealing server's identity chain.
        identity_chain_id: ChainId,
        /// The revealed M-hash.
        matryoshka_hash: Hash32,
    },
    /// `0x03` — replaces the current M-hash for an identity.
    MatryoshkaHashAddOrReplace {
        /// The server's identity chain.
        identity_chain_id: ChainId,
        /// The new M-hash.
        matryoshka_hash: Hash32,
    },
    /// `0x04` — increases the federated server count.
    ServerCountIncrease {
        /// Amount to increase by.
        amount: u8,
    },
    /// `0x05` — admits an identity to the federated server pool.
    AddFederatedServer {
        /// The server's identity chain.
        identity_chain_id: ChainId,
        /// Directory-block height at which it takes effect.
        activation_height: u32,
    },
    /// `0x06` — admits an identity to the audit server pool.
    AddAuditServer {
        /// The server's identity chain.
        identity_chain_id: ChainId,
        /// Directory-block height at which it takes effect.
        activation_height: u32,
    },
    /// `0x07` — removes an identity (and all its keys) from the
    /// authority set.
    RemoveFederatedServer {
        /// The server's identity chain.
        identity_chain_id: ChainId,
        /// Directory-block height at which it takes effect.
        activation_height: u32,
    },
    /// `0x08` — adds or replaces an Ed25519 signing key for an identity.
    AddFederatedServerSigningKey {
        /// The server's identity chain.
        identity_chain_id: ChainId,
        /// Key priority level.
        priority: u8,
        /// The new public key.
        public_key: [u8; 32],
        /// Directory-block height at which it takes effect.
        activation_height: u32,
    },
    /// `0x09` — adds a Bitcoin anchor key hash for an identity.
    AddFederatedServerBitcoinAnchorKey {
        /// The server's identity chain.
        identity_chain_id: ChainId,
        /// Key priority level.
        priority: u8,
        /// 0 = P2PKH, 1 = P2SH.
        hash_type: u8,
        /// HASH160 of the ECDSA public key.
        public_key_hash: [u8; 20],
    },
    /// `0x0A` — server fault handoff rollup; carries no on-chain payload.
    ServerFaultHandoff,
    /// `0x0B` — coinbase outputs to be minted 1000 blocks later.
    CoinbaseDescriptor {
        /// Outputs of the future coinbase transaction.
        outputs: Vec<AmountAddress>,
    },
    /// `0x0C` — cancels one output of an earlier coinbase descriptor.
    CoinbaseDescriptorCancel {
        /// Height of the descriptor being targeted.
        descriptor_height: u64,
        /// Output index inside that descriptor that will not be created.
        descriptor_index: u64,
    },
    /// `0x0D` — sets the factoid address an identity's coinbase rewards
    /// are paid to.
    AddAuthorityFactoidAddress {
        /// The server's identity chain.
        identity_chain_id: ChainId,
        /// The reward address (RCD hash).
        factoid_address: Hash32,
    },
    /// `0x0E` — sets what share of rewards an identity yields to the
    /// grant pool, in basis points of a percent (0..=10000).
    AddAuthorityEfficiency {
        /// The server's identity chain.
        identity_chain_id: ChainId,
        /// Basis points of a percent.
        efficiency: u16,
    },
    /// An admin-id within the known range decoded as a bare passthrough.
    Opaque(u8),
}

impl AdminMessage {
    /// The message's admin-id tag byte.
    pub fn admin_id(&self) -> u8 {
        match self {
            AdminMessage::MinuteNumber { .. } => 0x00,
            AdminMessage::DirectoryBlockSignature { .. } => 0x01,
            AdminMessage::MatryoshkaHashReveal { .. } => 0x02,
            AdminMessage::MatryoshkaHashAddOrReplace { .. } => 0x03,
            AdminMessage::ServerCountIncrease { .. } => 0x04,
            AdminMessage::AddFederatedServer { .. } => 0x05,
            AdminMessage::AddAuditServer { .. } => 0x06,
            AdminMessage::RemoveFederatedServer { .. } => 0x07,
            AdminMessage::AddFederatedServerSigningKey { .. } => 0x08,
            AdminMessage::AddFederatedServerBitcoinAnchorKey { .. } => 0x09,
            AdminMessage::ServerFaultHandoff => 0x0A,
            AdminMessage::CoinbaseDescriptor { .. } => 0x0B,
            AdminMessage::CoinbaseDescriptorCancel { .. } => 0x0C,
            AdminMessage::AddAuthorityFactoidAddress { .. } => 0x0D,
            AdminMessage::AddAuthorityEfficiency { .. } => 0x0E,
            AdminMessage::Opaque(id) => *id,
        }
    }

    /// Marshals the admin-id byte followed by the payload.
    pub fn marshal(&self) -> Vec<u8> {
        let mut buf = vec![self.admin_id()];
        match self {
            AdminMessage::MinuteNumber { minute } => buf.push(*minute),
            AdminMessage::DirectoryBlockSignature {
                identity_chain_id,
                signature,
            } => {
                buf.extend_from_slice(&identity_chain_id.0);
                buf.extend_from_slice(&signature.marshal());
            }
            AdminMessage::MatryoshkaHashReveal {
                identity_chain_id,
                matryoshka_hash,
            }
            | AdminMessage::MatryoshkaHashAddOrReplace {
                identity_chain_id,
                matryoshka_hash,
            } => {
                buf.extend_from_slice(&identity_chain_id.0);
                buf.extend_from_slice(&matryoshka_hash.0);
            }
            AdminMessage::ServerCountIncrease { amount } => buf.push(*amount),
            AdminMessage::AddFederatedServer {
                identity_chain_id,
                activation_height,
            }
            | AdminMessage::AddAuditServer {
                identity_chain_id,
                activation_height,
            }
            | AdminMessage::RemoveFederatedServer {
                identity_chain_id,
                activation_height,
            } => {
                buf.extend_from_slice(&identity_chain_id.0);
                buf.extend_from_slice(&activation_height.to_be_bytes());
            }
            AdminMessage::AddFederatedServerSigningKey {
                identity_chain_id,
                priority,
                public_key,
                activation_height,
            } => {
                buf.extend_from_slice(&identity_chain_id.0);
                buf.push(*priority);
                buf.extend_from_slice(public_key);
                buf.extend_from_slice(&activation_height.to_be_bytes());
            }
            AdminMessage::AddFederatedServerBitcoinAnchorKey {
                identity_chain_id,
                priority,
                hash_type,
                public_key_hash,
            } => {
                buf.extend_from_slice(&identity_chain_id.0);
                buf.push(*priority);
                buf.push(*hash_type);
                buf.extend_from_slice(public_key_hash);
            }
            AdminMessage::ServerFaultHandoff | AdminMessage::Opaque(_) => {}
            AdminMessage::CoinbaseDescriptor { outputs } => {
                let mut body = Vec::new();
                for output in outputs {
                    body.extend_from_slice(&varint::encode(output.value));
                    body.extend_from_slice(&output.address.0);
                }
                buf.extend_from_slice(&varint::encode(body.len() as u64));
                buf.extend_from_slice(&body);
            }
            AdminMessage::CoinbaseDescriptorCancel {
                descriptor_height,
                descriptor_index,
            } => {
                let mut body = Vec::new();
                body.extend_from_slice(&varint::encode(*descriptor_height));
                body.extend_from_slice(&varint::encode(*descriptor_index));
                buf.extend_from_slice(&varint::encode(body.len() as u64));
                buf.extend_from_slice(&body);
            }
            AdminMessage::AddAuthorityFactoidAddress {
                identity_chain_id,
                factoid_address,
            } => {
                buf.extend_from_slice(&varint::encode(64));
                buf.extend_from_slice(&identity_chain_id.0);
                buf.extend_from_slice(&factoid_address.0);
            }
            AdminMessage::AddAuthorityEfficiency {
                identity_chain_id,
                efficiency,
            } => {
                buf.extend_from_slice(&varint::encode(34));
                buf.extend_from_slice(&identity_chain_id.0);
                buf.extend_from_slice(&efficiency.to_be_bytes());
            }
        }
        buf
    }

    /// Unmarshals one tagged message, returning the remainder. Every
    /// admin-id dispatches to its own decoder.
    pub fn unmarshal_with_remainder(raw: &[u8]) -> Result<(Self, &[u8]), DecodeError> {
        let (admin_id, data) = codec::take_u8(raw)?;
        match admin_id {
            0x00 => {
                let (minute, data) = codec::take_u8(data)?;
                if !(1..=10).contains(&minute) {
                    return Err(DecodeError::FieldOutOfRange {
                        field: "minute number",
                        value: u64::from(minute),
                    });
                }
                Ok((AdminMessage::MinuteNumber { minute }, data))
            }
            0x01 => {
                let (identity_chain_id, data) = codec::take_array::<32>(data)?;
                let (signature, data) = FullSignature::unmarshal_with_remainder(data)?;
                Ok((
                    AdminMessage::DirectoryBlockSignature {
                        identity_chain_id: Hash32(identity_chain_id),
                        signature,
                    },
                    data,
                ))
            }
            0x02 | 0x03 => {
                let (identity_chain_id, data) = codec::take_array::<32>(data)?;
                let (matryoshka_hash, data) = codec::take_array::<32>(data)?;
                let identity_chain_id = Hash32(identity_chain_id);
                let matryoshka_hash = Hash32(matryoshka_hash);
                let message = if admin_id == 0x02 {
                    AdminMessage::MatryoshkaHashReveal {
                        identity_chain_id,
                        matryoshka_hash,
                    }
                } else {
                    AdminMessage::MatryoshkaHashAddOrReplace {
                        identity_chain_id,
                        matryoshka_hash,
                    }
                };
                Ok((message, data))
            }
            0x04 => {
                let (amount, data) = codec::take_u8(data)?;
                Ok((AdminMessage::ServerCountIncrease { amount }, data))
            }
            0x05 | 0x06 | 0x07 => {
                let (identity_chain_id, data) = codec::take_array::<32>(data)?;
                let (activation_height, data) = codec::take_u32_be(data)?;
                let identity_chain_id = Hash32(identity_chain_id);
                let message = match admin_id {
                    0x05 => AdminMessage::AddFederatedServer {
                        identity_chain_id,
                        activation_height,
                    },
                    0x06 => AdminMessage::AddAuditServer {
                        identity_chain_id,
                        activation_height,
                    },
                    _ => AdminMessage::RemoveFederatedServer {
                        identity_chain_id,
                        activation_height,
                    },
                };
                Ok((message, data))
            }
            0x08 => {
                let (identity_chain_id, data) = codec::take_array::<32>(data)?;
                let (priority, data) = codec::take_u8(data)?;
                let (public_key, data) = codec::take_array::<32>(data)?;
                let (activation_height, data) = codec::take_u32_be(data)?;
                Ok((
                    AdminMessage::AddFederatedServerSigningKey {
                        identity_chain_id: Hash32(identity_chain_id),
                        priority,
                        public_key,
                        activation_height,
                    },
                    data,
                ))
            }
            0x09 => {
                let (identity_chain_id, data) = codec::take_array::<32>(data)?;
                let (priority, data) = codec::take_u8(data)?;
                let (hash_type, data) = codec::take_u8(data)?;
                if hash_type > 1 {
                    return Err(DecodeError::FieldOutOfRange {
                        field: "bitcoin key hash_type",
                        value: u64::from(hash_type),
                    });
                }
                let (public_key_hash, data) = codec::take_array::<20>(data)?;
                Ok((
                    AdminMessage::AddFederatedServerBitcoinAnchorKey {
                        identity_chain_id: Hash32(identity_chain_id),
                        priority,
                        hash_type,
                        public_key_hash,
                    },
                    data,
                ))
            }
            0x0A => Ok((AdminMessage::ServerFaultHandoff, data)),
            0x0B => {
                let (size, data) = varint::decode(data)?;
                let (mut body, data) = codec::take(data, size as usize)?;
                let mut outputs = Vec::new();
                while !body.is_empty() {
                    let (value, rest) = varint::decode(body)?;
                    let (address, rest) = codec::take_array::<32>(rest)?;
                    outputs.push(AmountAddress {
                        value,
                        address: Hash32(address),
                    });
                    body = rest;
                }
                Ok((AdminMessage::CoinbaseDescriptor { outputs }, data))
            }
            0x0C => {
                let (size, data) = varint::decode(data)?;
                let (body, data) = codec::take(data, size as usize)?;
                let (descriptor_height, body) = varint::decode(body)?;
                let (descriptor_index, body) = varint::decode(body)?;
                codec::expect_empty(body)?;
                Ok((
                    AdminMessage::CoinbaseDescriptorCancel {
                        descriptor_height,
                        descriptor_index,
                    },
                    data,
                ))
            }
            0x0D => {
                let (size, data) = varint::decode(data)?;
                if size != 64 {
                    return Err(DecodeError::BadLength {
                        context: "authority factoid address",
                        expected: 64,
                        actual: size as usize,
                    });
                }
                let (identity_chain_id, data) = codec::take_array::<32>(data)?;
                let (factoid_address, data) = codec::take_array::<32>(data)?;
                Ok((
                    AdminMessage::AddAuthorityFactoidAddress {
                        identity_chain_id: Hash32(identity_chain_id),
                        factoid_address: Hash32(factoid_address),
                    },
                    data,
                ))
            }
            0x0E => {
                let (size, data) = varint::decode(data)?;
                if size != 34 {
                    return Err(DecodeError::BadLength {
                        context: "authority efficiency",
                        expected: 34,
                        actual: size as usize,
                    });
                }
                let (identity_chain_id, data) = codec::take_array::<32>(data)?;
                let (efficiency, data) = codec::take_u16_be(data)?;
                if efficiency > MAX_EFFICIENCY {
                    return Err(DecodeError::FieldOutOfRange {
                        field: "authority efficiency",
                        value: u64::from(efficiency),
                    });
                }
                Ok((
                    AdminMessage::AddAuthorityEfficiency {
                        identity_chain_id: Hash32(identity_chain_id),
                        efficiency,
                    },
                    data,
                ))
            }
            id if id <= MAX_ADMIN_ID => Ok((AdminMessage::Opaque(id), data)),
            id => Err(DecodeError::UnknownTag {
                context: "admin message",
                tag: id,
            }),
        }
    }

    /// Unmarshals exactly one message; trailing bytes are an error.
    pub fn unmarshal(raw: &[u8]) -> Result<Self, DecodeError> {
        let (message, rest) = Self::unmarshal_with_remainder(raw)?;
        codec::expect_empty(rest)?;
        Ok(message)
    }

    /// JSON projection for the RPC facade.
    pub fn to_json(&self) -> Value {
        let mut value = match self {
            AdminMessage::MinuteNumber { minute } => json!({ "minute": minute }),
            AdminMessage::DirectoryBlockSignature {
                identity_chain_id,
                signature,
            } => json!({
                "chain_id": identity_chain_id.to_hex(),
                "signature": signature.to_json(),
            }),
            AdminMessage::MatryoshkaHashReveal {
                identity_chain_id,
                matryoshka_hash,
            }
            | AdminMessage::MatryoshkaHashAddOrReplace {
                identity_chain_id,
                matryoshka_hash,
            } => json!({
                "chain_id": identity_chain_id.to_hex(),
                "matryoshka_hash": matryoshka_hash.to_hex(),
            }),
            AdminMessage::ServerCountIncrease { amount } => json!({ "amount": amount }),
            AdminMessage::AddFederatedServer {
                identity_chain_id,
                activation_height,
            }
            | AdminMessage::AddAuditServer {
                identity_chain_id,
                activation_height,
            }
            | AdminMessage::RemoveFederatedServer {
                identity_chain_id,
                activation_height,
            } => json!({
                "chain_id": identity_chain_id.to_hex(),
                "activation_height": activation_height,
            }),
            AdminMessage::AddFederatedServerSigningKey {
                identity_chain_id,
                priority,
                public_key,
                activation_height,
            } => json!({
                "chain_id": identity_chain_id.to_hex(),
                "priority": priority,
                "public_key": hex::encode(public_key),
                "activation_height": activation_height,
            }),
            AdminMessage::AddFederatedServerBitcoinAnchorKey {
                identity_chain_id,
                priority,
                hash_type,
                public_key_hash,
            } => json!({
                "chain_id": identity_chain_id.to_hex(),
                "priority": priority,
                "hash_type": hash_type,
                "public_key_hash": hex::encode(public_key_hash),
            }),
            AdminMessage::ServerFaultHandoff | AdminMessage::Opaque(_) => json!({}),
            AdminMessage::CoinbaseDescriptor { outputs } => json!({
                "outputs": outputs.iter().map(|o| json!({
                    "value": o.value,
                    "fct_address": o.address.to_hex(),
                })).collect::<Vec<_>>(),
            }),
            AdminMessage::CoinbaseDescriptorCancel {
                descriptor_height,
                descriptor_index,
            } => json!({
                "descriptor_height": descriptor_height,
                "descriptor_index": descriptor_index,
            }),
            AdminMessage::AddAuthorityFactoidAddress {
                identity_chain_id,
                factoid_address,
            } => json!({
                "chain_id": identity_chain_id.to_hex(),
                "fct_address": factoid_address.to_hex(),
            }),
            AdminMessage::AddAuthorityEfficiency {
                identity_chain_id,
                efficiency,
            } => json!({
                "chain_id": identity_chain_id.to_hex(),
                "efficiency": efficiency,
            }),
        };
        if let Some(object) = value.as_object_mut() {
            object.insert("type".into(), json!(self.admin_id()));
        }
        value
    }
}
