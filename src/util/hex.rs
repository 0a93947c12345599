//! # Hex Encoding/Decoding Utilities
//!
//! Hex helpers used for point dumps, RTU frame logging and test frames.
//!
//! ```rust
//! use sunspec_rs::util::hex::{decode_hex, encode_hex, format_hex_compact};
//!
//! let frame = decode_hex("01 03 00 00 00 0a c5 cd").unwrap();
//! assert_eq!(encode_hex(&frame[..2]), "0103");
//! assert_eq!(format_hex_compact(&frame[6..]), "c5 cd");
//! ```

use thiserror::Error;

/// Errors that can occur during hex operations
#[derive(Error, Debug, Clone, PartialEq)]
pub enum HexError {
    #[error("Odd number of hex characters: {0}")]
    OddLength(usize),

    #[error("Empty hex string")]
    EmptyString,

    #[error("Hex decoding error: {0}")]
    DecodeError(String),
}

/// Encode bytes to lowercase hex string
pub fn encode_hex(data: &[u8]) -> String {
    hex::encode(data)
}

/// Decode hex string to bytes
///
/// Accepts both uppercase and lowercase hex characters.
/// Whitespace is stripped.
pub fn decode_hex(hex_str: &str) -> Result<Vec<u8>, HexError> {
    let cleaned: String = hex_str.chars().filter(|c| !c.is_whitespace()).collect();
    if cleaned.is_empty() {
        return Err(HexError::EmptyString);
    }
    if cleaned.len() % 2 != 0 {
        return Err(HexError::OddLength(cleaned.len()));
    }
    hex::decode(&cleaned).map_err(|e| HexError::DecodeError(e.to_string()))
}

/// Format hex data for compact display (useful for logs)
///
/// Formats data as "01 03 00 00" with spaces between bytes.
pub fn format_hex_compact(data: &[u8]) -> String {
    data.iter()
        .map(|b| format!("{:02x}", b))
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode() {
        assert_eq!(encode_hex(&[0xAB, 0xCD, 0xEF]), "abcdef");
    }

    #[test]
    fn test_decode_with_whitespace() {
        assert_eq!(decode_hex("01 83 02").unwrap(), vec![0x01, 0x83, 0x02]);
    }

    #[test]
    fn test_format_compact() {
        assert_eq!(format_hex_compact(&[0x53, 0x75, 0x6E, 0x53]), "53 75 6e 53");
    }

    #[test]
    fn test_errors() {
        assert_eq!(decode_hex(""), Err(HexError::EmptyString));
        assert_eq!(decode_hex("1"), Err(HexError::OddLength(1)));
        assert!(matches!(decode_hex("GG"), Err(HexError::DecodeError(_))));
    }
}
