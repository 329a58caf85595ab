//! Wall-clock helpers for the two timestamp resolutions on the wire:
//! 6-byte big-endian milliseconds on elements, whole minutes on
//! directory-block headers.

use crate::error::DecodeError;
use std::time::{SystemTime, UNIX_EPOCH};

/// Width of an element timestamp.
pub const MILLIS_LENGTH: usize = 6;

fn unix_millis() -> u64 {
    // A clock before 1970 is not a state this process can make progress in.
    match SystemTime::now().duration_since(UNIX_EPOCH) {
        Ok(elapsed) => elapsed.as_millis() as u64,
        Err(_) => 0,
    }
}

/// Milliseconds since the Unix epoch.
pub fn now_millis() -> u64 {
    unix_millis()
}

/// Whole minutes since the Unix epoch, as carried by directory-block headers.
pub fn now_minutes() -> u32 {
    (unix_millis() / 60_000) as u32
}

/// Encodes a millisecond timestamp into its 6-byte big-endian wire form.
pub fn encode_millis(millis: u64) -> [u8; MILLIS_LENGTH] {
    let bytes = millis.to_be_bytes();
    [bytes[2], bytes[3], bytes[4], bytes[5], bytes[6], bytes[7]]
}

/// Decodes a 6-byte big-endian millisecond timestamp.
pub fn decode_millis(raw: &[u8; MILLIS_LENGTH]) -> u64 {
    let mut bytes = [0u8; 8];
    bytes[2..].copy_from_slice(raw);
    u64::from_be_bytes(bytes)
}

/// Validates that a millisecond value fits the 6-byte wire width.
pub fn check_millis(millis: u64) -> Result<(), DecodeError> {
    if millis >> 48 != 0 {
        return Err(DecodeError::FieldOutOfRange {
            field: "timestamp",
            value: millis,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_millis_round_trip() {
        let millis = 1_562_073_615_742u64;
        assert_eq!(decode_millis(&encode_millis(millis)), millis);
    }

    #[test]
    fn test_six_byte_bound() {
        assert!(check_millis((1 << 48) - 1).is_ok());
        assert!(check_millis(1 << 48).is_err());
    }
}
