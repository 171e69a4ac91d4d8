//! Error types
//!
//! All codec and framing failures surface through [`ProtocolError`]. Decode
//! errors are fatal to the message being decoded, never to shared process
//! state; the caller drops the offending frame and keeps the connection's
//! other traffic intact.

use std::fmt;

/// Convenience alias used throughout the crate
pub type Result<T> = std::result::Result<T, ProtocolError>;

/// Error type for all encode/decode and framing operations
#[derive(Debug)]
pub enum ProtocolError {
    /// Reader needed more bytes than remain in the buffer.
    ///
    /// Also raised by the length guard when a declared container length
    /// exceeds the remaining input (treated identically to truncation).
    UnexpectedEof,

    /// A back-reference index pointed past the end of its table
    InvalidReference { index: usize, table_len: usize },

    /// A type tag byte outside the registered space for this protocol version
    UnknownTag(u8),

    /// An AMF3 type marker outside the defined marker set
    UnknownMarker(u8),

    /// A custom-type code with no entry in the custom type registry
    UnknownCustomType(u8),

    /// A message-type byte outside the defined message-type set
    UnknownMessageType(u8),

    /// The first header byte was not the expected magic byte
    BadMagic(u8),

    /// Operation not supported by this protocol version (e.g. AMF3 encryption)
    Unsupported(&'static str),

    /// A value kind with no mapping in the target codec's tag space
    UnencodableValue(&'static str),

    /// A value too large for its wire representation (e.g. oversized string)
    ValueTooLarge(&'static str),

    /// String bytes were not valid UTF-8
    InvalidUtf8,

    /// Value nesting exceeded the decoder's depth limit
    NestingTooDeep,

    /// Custom type code already registered
    DuplicateCustomType(u8),

    /// The injected encryption provider failed
    Crypto(String),

    /// Transport-level I/O failure
    Io(std::io::Error),
}

impl fmt::Display for ProtocolError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProtocolError::UnexpectedEof => write!(f, "Unexpected end of input"),
            ProtocolError::InvalidReference { index, table_len } => {
                write!(
                    f,
                    "Reference index {} out of range (table has {} entries)",
                    index, table_len
                )
            }
            ProtocolError::UnknownTag(tag) => write!(f, "Unknown type tag: 0x{:02X}", tag),
            ProtocolError::UnknownMarker(marker) => {
                write!(f, "Unknown AMF3 marker: 0x{:02X}", marker)
            }
            ProtocolError::UnknownCustomType(code) => {
                write!(f, "Unregistered custom type code: {}", code)
            }
            ProtocolError::UnknownMessageType(byte) => {
                write!(f, "Unknown message type: 0x{:02X}", byte)
            }
            ProtocolError::BadMagic(byte) => write!(f, "Bad magic byte: 0x{:02X}", byte),
            ProtocolError::Unsupported(what) => write!(f, "Not supported: {}", what),
            ProtocolError::UnencodableValue(kind) => {
                write!(f, "Value kind has no wire mapping in this codec: {}", kind)
            }
            ProtocolError::ValueTooLarge(what) => write!(f, "Value too large: {}", what),
            ProtocolError::InvalidUtf8 => write!(f, "Invalid UTF-8 in string"),
            ProtocolError::NestingTooDeep => write!(f, "Value nesting too deep"),
            ProtocolError::DuplicateCustomType(code) => {
                write!(f, "Custom type code already registered: {}", code)
            }
            ProtocolError::Crypto(msg) => write!(f, "Encryption provider error: {}", msg),
            ProtocolError::Io(e) => write!(f, "I/O error: {}", e),
        }
    }
}

impl std::error::Error for ProtocolError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ProtocolError::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for ProtocolError {
    fn from(e: std::io::Error) -> Self {
        ProtocolError::Io(e)
    }
}
