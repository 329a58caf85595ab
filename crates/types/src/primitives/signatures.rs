//! Ed25519 signature pairs as they appear on the wire.

use crate::codec;
use crate::error::DecodeError;
use ed25519_dalek::{Signature, VerifyingKey};
use serde_json::{json, Value};

/// Width of an Ed25519 public key.
pub const PUBLIC_KEY_LENGTH: usize = 32;
/// Width of an Ed25519 signature.
pub const SIGNATURE_LENGTH: usize = 64;
/// Width of a marshalled pair.
pub const PAIR_LENGTH: usize = PUBLIC_KEY_LENGTH + SIGNATURE_LENGTH;

/// A (public key, signature) pair covering some externally defined message.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct FullSignature {
    /// The signer's Ed25519 public key.
    pub public_key: [u8; PUBLIC_KEY_LENGTH],
    /// The Ed25519 signature bytes.
    pub signature: [u8; SIGNATURE_LENGTH],
}

impl FullSignature {
    /// Marshals the pair as pubkey ‖ signature.
    pub fn marshal(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(PAIR_LENGTH);
        buf.extend_from_slice(&self.public_key);
        buf.extend_from_slice(&self.signature);
        buf
    }

    /// Unmarshals a pair, returning the remainder.
    pub fn unmarshal_with_remainder(raw: &[u8]) -> Result<(Self, &[u8]), DecodeError> {
        let (public_key, data) = codec::take_array::<PUBLIC_KEY_LENGTH>(raw)?;
        let (signature, data) = codec::take_array::<SIGNATURE_LENGTH>(data)?;
        Ok((
            FullSignature {
                public_key,
                signature,
            },
            data,
        ))
    }

    /// Unmarshals exactly one pair; trailing bytes are an error.
    pub fn unmarshal(raw: &[u8]) -> Result<Self, DecodeError> {
        let (pair, rest) = Self::unmarshal_with_remainder(raw)?;
        codec::expect_empty(rest)?;
        Ok(pair)
    }

    /// Verifies the signature over `message` with the embedded public key.
    ///
    /// A key that fails to parse verifies as false rather than erroring:
    /// on-chain data may carry arbitrary 32-byte strings in the key slot.
    pub fn verify(&self, message: &[u8]) -> bool {
        let Ok(key) = VerifyingKey::from_bytes(&self.public_key) else {
            return false;
        };
        let signature = Signature::from_bytes(&self.signature);
        key.verify_strict(message, &signature).is_ok()
    }

    /// JSON projection for the RPC facade.
    pub fn to_json(&self) -> Value {
        json!({
            "public_key": hex::encode(self.public_key),
            "signature": hex::encode(self.signature),
        })
    }
}

impl std::fmt::Debug for FullSignature {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "FullSignature(pub={}, sig={})",
            hex::encode(self.public_key),
            hex::encode(self.signature)
        )
    }
}

/// A length-prefixed list of signature pairs (32-bit big-endian count).
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct FullSignatureList(pub Vec<FullSignature>);

impl FullSignatureList {
    /// Marshals the count followed by each pair.
    pub fn marshal(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(4 + self.0.len() * PAIR_LENGTH);
        buf.extend_from_slice(&(self.0.len() as u32).to_be_bytes());
        for signature in &self.0 {
            buf.extend_from_slice(&signature.marshal());
        }
        buf
    }

    /// Unmarshals a list, returning the remainder.
    pub fn unmarshal_with_remainder(raw: &[u8]) -> Result<(Self, &[u8]), DecodeError> {
        let (count, mut data) = codec::take_u32_be(raw)?;
        let mut signatures = Vec::with_capacity(count as usize);
        for _ in 0..count {
            let (signature, rest) = FullSignature::unmarshal_with_remainder(data)?;
            signatures.push(signature);
            data = rest;
        }
        Ok((FullSignatureList(signatures), data))
    }

    /// Unmarshals exactly one list; trailing bytes are an error.
    pub fn unmarshal(raw: &[u8]) -> Result<Self, DecodeError> {
        let (list, rest) = Self::unmarshal_with_remainder(raw)?;
        codec::expect_empty(rest)?;
        Ok(list)
    }
}

impl std::ops::Deref for FullSignatureList {
    type Target = Vec<FullSignature>;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl std::ops::DerefMut for FullSignatureList {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.0
    }
}

/// The signing collaborator consumed by the core.
///
/// Key custody lives entirely outside the core; implementations hold the
/// private key and hand back finished pairs.
pub trait Signer {
    /// Signs `message`, returning the pair.
    fn sign(&self, message: &[u8]) -> FullSignature;

    /// Verifies a pair over `message`.
    fn verify(&self, message: &[u8], signature: &FullSignature) -> bool {
        signature.verify(message)
    }
}
