//! # Error Types
//!
//! Errors raised while decoding keys from their wire encoding.

use thiserror::Error;

/// Errors from decoding an encoded key.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum KeyEncodingError {
    /// The encoded key was an empty string.
    #[error("Key is empty")]
    Empty,

    /// The encoded key is not valid hex.
    #[error("Key is not valid hex: {0}")]
    InvalidHex(String),

    /// The decoded key has the wrong number of bytes.
    #[error("Invalid key length: expected {expected} bytes, got {actual}")]
    InvalidLength { expected: usize, actual: usize },
}

impl From<hex::FromHexError> for KeyEncodingError {
    fn from(err: hex::FromHexError) -> Self {
        Self::InvalidHex(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_length_message() {
        let err = KeyEncodingError::InvalidLength {
            expected: 32,
            actual: 3,
        };
        assert!(err.to_string().contains("expected 32 bytes, got 3"));
    }

    #[test]
    fn test_from_hex_error() {
        let err: KeyEncodingError = hex::decode("zz").unwrap_err().into();
        assert!(matches!(err, KeyEncodingError::InvalidHex(_)));
    }
}
