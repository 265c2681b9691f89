//! Error types for the EDN codec.

use thiserror::Error;

/// Result type for codec operations.
pub type CodecResult<T> = Result<T, CodecError>;

/// Errors that can occur during encoding or decoding.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CodecError {
    /// Failed to encode a value as EDN text.
    #[error("encoding failed: {message}")]
    EncodingFailed {
        /// Description of the encoding error.
        message: String,
    },

    /// Input ended in the middle of a value.
    #[error("unexpected end of input")]
    UnexpectedEof,

    /// A character that cannot start or continue the current form.
    #[error("unexpected character {ch:?} at offset {offset}")]
    UnexpectedChar {
        /// The offending character.
        ch: char,
        /// Byte offset into the input.
        offset: usize,
    },

    /// A numeric literal that does not parse.
    #[error("invalid number literal: {text}")]
    InvalidNumber {
        /// The literal as written.
        text: String,
    },

    /// Unknown string or character escape.
    #[error("invalid escape: {text}")]
    InvalidEscape {
        /// The escape as written.
        text: String,
    },

    /// Structurally invalid EDN (odd map entries, bad tag, ...).
    #[error("invalid EDN structure: {message}")]
    InvalidStructure {
        /// Description of the structural error.
        message: String,
    },

    /// Input continues after a complete top-level value.
    #[error("trailing input at offset {offset}")]
    TrailingInput {
        /// Byte offset of the first unread character.
        offset: usize,
    },
}

impl CodecError {
    /// Create an encoding failed error.
    pub fn encoding_failed(message: impl Into<String>) -> Self {
        Self::EncodingFailed {
            message: message.into(),
        }
    }

    /// Create an invalid structure error.
    pub fn invalid_structure(message: impl Into<String>) -> Self {
        Self::InvalidStructure {
            message: message.into(),
        }
    }

    /// Create an invalid number error.
    pub fn invalid_number(text: impl Into<String>) -> Self {
        Self::InvalidNumber { text: text.into() }
    }

    /// Create an invalid escape error.
    pub fn invalid_escape(text: impl Into<String>) -> Self {
        Self::InvalidEscape { text: text.into() }
    }
}
