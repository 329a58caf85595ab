//! Decode-error taxonomy shared by every binary decoder in the workspace.
//!
//! All decoders fail fast: no partial object is ever returned, and the error
//! carries enough context to identify the offending field without the caller
//! re-parsing anything.

use thiserror::Error;

/// A trait for assigning a stable, machine-readable string code to an error.
pub trait ErrorCode {
    /// Returns the unique, stable string identifier for this error variant.
    fn code(&self) -> &'static str;
}

/// Errors produced while decoding a marshalled block or block element.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DecodeError {
    /// The input ended before the value was complete.
    #[error("unexpected end of input: wanted {wanted} more bytes, had {had}")]
    UnexpectedEnd {
        /// Bytes the decoder still needed.
        wanted: usize,
        /// Bytes that were actually available.
        had: usize,
    },
    /// Bytes were left over after a complete value was decoded.
    #[error("{0} trailing bytes after a complete value")]
    TrailingBytes(usize),
    /// A reserved chain id did not match the expected system chain.
    #[error("bad chain id while decoding {0}")]
    BadChainId(&'static str),
    /// A varint was truncated, non-canonical, or overflowed 64 bits.
    #[error("bad varint: {0}")]
    BadVarint(&'static str),
    /// A fixed-range field carried a value outside its legal range.
    #[error("field {field} out of range: {value}")]
    FieldOutOfRange {
        /// Name of the offending field.
        field: &'static str,
        /// The decoded value.
        value: u64,
    },
    /// An unknown tag or version byte was encountered.
    #[error("unknown tag {tag:#04x} while decoding {context}")]
    UnknownTag {
        /// What was being decoded when the tag appeared.
        context: &'static str,
        /// The offending tag byte.
        tag: u8,
    },
    /// A count claimed by a header disagreed with the decoded body.
    #[error("count mismatch in {context}: header claims {expected}, decoded {actual}")]
    CountMismatch {
        /// What was being decoded.
        context: &'static str,
        /// The count claimed by the header.
        expected: u64,
        /// The count actually decoded.
        actual: u64,
    },
    /// A body-size header field disagreed with the actual body length.
    #[error("body size mismatch: header claims {expected} bytes, body is {actual}")]
    BodySizeMismatch {
        /// The size claimed by the header.
        expected: u64,
        /// The size actually consumed.
        actual: u64,
    },
    /// A fixed-width value had the wrong length.
    #[error("bad length for {context}: expected {expected} bytes, got {actual}")]
    BadLength {
        /// What was being decoded.
        context: &'static str,
        /// The required length.
        expected: usize,
        /// The length supplied.
        actual: usize,
    },
}

impl ErrorCode for DecodeError {
    fn code(&self) -> &'static str {
        match self {
            Self::UnexpectedEnd { .. } => "DECODE_SHORT_INPUT",
            Self::TrailingBytes(_) => "DECODE_TRAILING_BYTES",
            Self::BadChainId(_) => "DECODE_BAD_CHAIN_ID",
            Self::BadVarint(_) => "DECODE_BAD_VARINT",
            Self::FieldOutOfRange { .. } => "DECODE_FIELD_OUT_OF_RANGE",
            Self::UnknownTag { .. } => "DECODE_UNKNOWN_TAG",
            Self::CountMismatch { .. } => "DECODE_COUNT_MISMATCH",
            Self::BodySizeMismatch { .. } => "DECODE_BODY_SIZE_MISMATCH",
            Self::BadLength { .. } => "DECODE_BAD_LENGTH",
        }
    }
}
