//! Error types for datagram decoding

use thiserror::Error;

/// Errors that can occur when decoding datagram headers and trailers.
///
/// Structural problems found while walking a file are not errors; they are
/// reported as [`crate::ParseOutcome`] variants. These errors only surface from
/// the slice-level helpers in [`crate::protocol::kongsberg`].
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ParseError {
    /// Buffer is too short to contain the requested structure
    #[error("Datagram too short: expected at least {expected} bytes, got {actual}")]
    TooShort { expected: usize, actual: usize },

    /// A framing marker byte is not the expected value
    #[error("Invalid marker at byte {position}: expected {expected:#04X}, got {actual:#04X}")]
    InvalidMarker {
        position: usize,
        expected: u8,
        actual: u8,
    },

    /// Declared length field is inconsistent with the buffer
    #[error("Length mismatch: header says {header_len} bytes, datagram has {actual_len}")]
    LengthMismatch { header_len: usize, actual_len: usize },

    /// Failed to deserialize a fixed-layout structure
    #[error("Deserialization failed: {0}")]
    DeserializationFailed(String),
}

impl From<bincode::Error> for ParseError {
    fn from(e: bincode::Error) -> Self {
        ParseError::DeserializationFailed(e.to_string())
    }
}
