//! The canonical variable-width integer.
//!
//! Big-endian 7-bit groups: MSB set means another group follows, MSB clear
//! terminates. Canonical form forbids leading all-zero continuation bytes,
//! so zero itself is the single byte `0x00` and no encoding ever starts
//! with `0x80`.

use crate::error::DecodeError;

/// Largest number of bytes a u64 can occupy: ⌈64 / 7⌉.
const MAX_ENCODED_LEN: usize = 10;

/// Encodes `value` into its canonical varint form.
pub fn encode(value: u64) -> Vec<u8> {
    if value == 0 {
        return vec![0x00];
    }
    let mut groups = [0u8; MAX_ENCODED_LEN];
    let mut n = 0;
    let mut v = value;
    while v > 0 {
        groups[n] = (v & 0x7f) as u8;
        v >>= 7;
        n += 1;
    }
    let mut out = Vec::with_capacity(n);
    for i in (0..n).rev() {
        let terminal = i == 0;
        out.push(if terminal { groups[i] } else { groups[i] | 0x80 });
    }
    out
}

/// Decodes a varint from the front of `raw`, returning the remainder.
///
/// Rejects truncated input, non-canonical zero padding, and values that
/// overflow 64 bits.
pub fn decode(raw: &[u8]) -> Result<(u64, &[u8]), DecodeError> {
    let first = *raw.first().ok_or(DecodeError::BadVarint("empty input"))?;
    if first == 0x80 {
        return Err(DecodeError::BadVarint("non-canonical leading zero"));
    }
    let mut value: u64 = 0;
    for (i, &byte) in raw.iter().enumerate() {
        if i == MAX_ENCODED_LEN || value >> 57 != 0 {
            return Err(DecodeError::BadVarint("overflows 64 bits"));
        }
        value = (value << 7) | u64::from(byte & 0x7f);
        if byte & 0x80 == 0 {
            return Ok((value, &raw[i + 1..]));
        }
    }
    Err(DecodeError::BadVarint("truncated"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vectors() -> Vec<(u64, Vec<u8>)> {
        vec![
            (0, hex::decode("00").unwrap()),
            (3, hex::decode("03").unwrap()),
            (127, hex::decode("7F").unwrap()),
            (128, hex::decode("8100").unwrap()),
            (130, hex::decode("8102").unwrap()),
            (u64::from(u16::MAX), hex::decode("83FF7F").unwrap()),
            (1 << 16, hex::decode("848000").unwrap()),
            (u64::from(u32::MAX), hex::decode("8FFFFFFF7F").unwrap()),
            (1 << 32, hex::decode("9080808000").unwrap()),
            ((1 << 63) - 1, hex::decode("FFFFFFFFFFFFFFFF7F").unwrap()),
            (u64::MAX, hex::decode("81FFFFFFFFFFFFFFFF7F").unwrap()),
        ]
    }

    #[test]
    fn test_encode_known_vectors() {
        for (value, expected) in vectors() {
            assert_eq!(encode(value), expected, "encode({value})");
        }
    }

    #[test]
    fn test_decode_known_vectors() {
        for (expected, bytes) in vectors() {
            let (value, rest) = decode(&bytes).unwrap();
            assert_eq!(value, expected);
            assert!(rest.is_empty());
        }
    }

    #[test]
    fn test_decode_returns_remainder() {
        let mut bytes = encode(300);
        bytes.extend_from_slice(&[0xDE, 0xAD]);
        let (value, rest) = decode(&bytes).unwrap();
        assert_eq!(value, 300);
        assert_eq!(rest, &[0xDE, 0xAD]);
    }

    #[test]
    fn test_decode_rejects_non_canonical() {
        // 0x80 0x01 would also decode to 1, but the leading group is zero.
        assert_eq!(
            decode(&[0x80, 0x01]).unwrap_err(),
            DecodeError::BadVarint("non-canonical leading zero")
        );
    }

    #[test]
    fn test_decode_rejects_truncation_and_overflow() {
        assert!(matches!(decode(&[]), Err(DecodeError::BadVarint(_))));
        assert!(matches!(decode(&[0x81]), Err(DecodeError::BadVarint(_))));
        // Ten groups with a leading group of 3 carry 65 significant bits.
        let too_long = [0x83, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0x7F];
        assert!(matches!(
            decode(&too_long),
            Err(DecodeError::BadVarint("overflows 64 bits"))
        ));
    }

    #[test]
    fn test_round_trip_sweep() {
        for shift in 0..64 {
            for delta in [-1i128, 0, 1] {
                let candidate = (1i128 << shift) + delta;
                if candidate < 0 || candidate > i128::from(u64::MAX) {
                    continue;
                }
                let value = candidate as u64;
                let encoded = encode(value);
                let (decoded, rest) = decode(&encoded).unwrap();
                assert_eq!(decoded, value);
                assert!(rest.is_empty());
            }
        }
    }
}
