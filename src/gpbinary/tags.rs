//! GpBinary type tags
//!
//! One byte on the wire identifies the type of the value that follows. The
//! tag space is shared by v1 and v1.6; v1.7 keeps the same letters and adds
//! four compact integer tags plus an array-variant rule (`tag | 0x80` marks
//! an array of the scalar type, so arrays never need their own enumeration —
//! nesting recurses through [`GpTag::Array`]).
//!
//! Lookup is O(1) in both directions and every byte outside the registered
//! set is a typed error, including reserved-but-unused bytes.

use crate::error::{ProtocolError, Result};
use crate::value::{WireKind, WireValue};

/// Type tag byte space shared by the GpBinary codecs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum GpTag {
    Unknown = 0x00,
    Null = 0x2A,
    Dictionary = 0x44,
    StringArray = 0x61,
    Byte = 0x62,
    Custom = 0x63,
    Double = 0x64,
    EventData = 0x65,
    Float = 0x66,
    Hashtable = 0x68,
    Integer = 0x69,
    Short = 0x6B,
    Long = 0x6C,
    Boolean = 0x6F,
    OperationResponse = 0x70,
    OperationRequest = 0x71,
    String = 0x73,
    ByteArray = 0x78,
    Array = 0x79,
    ObjectArray = 0x7A,
}

/// v1.7-only tag: the next byte is the literal integer value
pub const TAG17_INT1: u8 = 0x01;
/// v1.7-only tag: the next two bytes (big-endian) are the literal value
pub const TAG17_INT2: u8 = 0x02;
/// v1.7-only tag: zig-zag varint 32-bit integer
pub const TAG17_COMPRESSED_INT: u8 = 0x03;
/// v1.7-only tag: zig-zag varint 64-bit integer
pub const TAG17_COMPRESSED_LONG: u8 = 0x04;
/// v1.7 high bit: array of the scalar type in the low seven bits
pub const TAG17_ARRAY_FLAG: u8 = 0x80;

impl GpTag {
    /// Decode a tag byte; unknown bytes (reserved or otherwise) fail
    pub fn from_u8(byte: u8) -> Result<Self> {
        match byte {
            0x00 => Ok(GpTag::Unknown),
            0x2A => Ok(GpTag::Null),
            0x44 => Ok(GpTag::Dictionary),
            0x61 => Ok(GpTag::StringArray),
            0x62 => Ok(GpTag::Byte),
            0x63 => Ok(GpTag::Custom),
            0x64 => Ok(GpTag::Double),
            0x65 => Ok(GpTag::EventData),
            0x66 => Ok(GpTag::Float),
            0x68 => Ok(GpTag::Hashtable),
            0x69 => Ok(GpTag::Integer),
            0x6B => Ok(GpTag::Short),
            0x6C => Ok(GpTag::Long),
            0x6F => Ok(GpTag::Boolean),
            0x70 => Ok(GpTag::OperationResponse),
            0x71 => Ok(GpTag::OperationRequest),
            0x73 => Ok(GpTag::String),
            0x78 => Ok(GpTag::ByteArray),
            0x79 => Ok(GpTag::Array),
            0x7A => Ok(GpTag::ObjectArray),
            other => Err(ProtocolError::UnknownTag(other)),
        }
    }

    /// Wire byte for this tag
    pub fn as_u8(self) -> u8 {
        self as u8
    }

    /// Semantic value kind this tag carries, if it carries one
    ///
    /// Message tags (EventData, OperationRequest, OperationResponse) carry
    /// whole messages and have no value kind.
    pub fn kind(self) -> Option<WireKind> {
        match self {
            GpTag::Unknown => Some(WireKind::Unknown),
            GpTag::Null => Some(WireKind::Null),
            GpTag::Dictionary => Some(WireKind::Dictionary),
            GpTag::StringArray => Some(WireKind::StringArray),
            GpTag::Byte => Some(WireKind::Byte),
            GpTag::Custom => Some(WireKind::Custom),
            GpTag::Double => Some(WireKind::Double),
            GpTag::Float => Some(WireKind::Float),
            GpTag::Hashtable => Some(WireKind::Map),
            GpTag::Integer => Some(WireKind::Int),
            GpTag::Short => Some(WireKind::Short),
            GpTag::Long => Some(WireKind::Long),
            GpTag::Boolean => Some(WireKind::Bool),
            GpTag::String => Some(WireKind::String),
            GpTag::ByteArray => Some(WireKind::ByteArray),
            GpTag::Array => Some(WireKind::Array),
            GpTag::ObjectArray => Some(WireKind::ObjectArray),
            GpTag::EventData | GpTag::OperationRequest | GpTag::OperationResponse => None,
        }
    }
}

/// Encode-path mapping: value kind to tag, total over the supported kinds
pub fn tag_for_kind(kind: WireKind) -> Result<GpTag> {
    match kind {
        WireKind::Unknown => Ok(GpTag::Unknown),
        WireKind::Null => Ok(GpTag::Null),
        WireKind::Bool => Ok(GpTag::Boolean),
        WireKind::Byte => Ok(GpTag::Byte),
        WireKind::Short => Ok(GpTag::Short),
        WireKind::Int => Ok(GpTag::Integer),
        WireKind::Long => Ok(GpTag::Long),
        WireKind::Float => Ok(GpTag::Float),
        WireKind::Double => Ok(GpTag::Double),
        WireKind::String => Ok(GpTag::String),
        WireKind::ByteArray => Ok(GpTag::ByteArray),
        WireKind::Array => Ok(GpTag::Array),
        WireKind::ObjectArray => Ok(GpTag::ObjectArray),
        WireKind::StringArray => Ok(GpTag::StringArray),
        WireKind::Map => Ok(GpTag::Hashtable),
        WireKind::Dictionary => Ok(GpTag::Dictionary),
        WireKind::Custom => Ok(GpTag::Custom),
        // AMF3-only kinds have no GpBinary mapping
        WireKind::Date | WireKind::Object => {
            Err(ProtocolError::UnencodableValue(kind.name()))
        }
    }
}

/// Encode-path mapping for a concrete value
pub fn tag_for_value(value: &WireValue) -> Result<GpTag> {
    tag_for_kind(value.kind())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixed_tag_bytes() {
        assert_eq!(GpTag::Boolean.as_u8(), 0x6F);
        assert_eq!(GpTag::Byte.as_u8(), 0x62);
        assert_eq!(GpTag::Short.as_u8(), 0x6B);
        assert_eq!(GpTag::Integer.as_u8(), 0x69);
        assert_eq!(GpTag::Long.as_u8(), 0x6C);
        assert_eq!(GpTag::Float.as_u8(), 0x66);
        assert_eq!(GpTag::Double.as_u8(), 0x64);
        assert_eq!(GpTag::String.as_u8(), 0x73);
        assert_eq!(GpTag::Hashtable.as_u8(), 0x68);
        assert_eq!(GpTag::Dictionary.as_u8(), 0x44);
        assert_eq!(GpTag::ByteArray.as_u8(), 0x78);
        assert_eq!(GpTag::ObjectArray.as_u8(), 0x7A);
        assert_eq!(GpTag::Array.as_u8(), 0x79);
        assert_eq!(GpTag::Custom.as_u8(), 0x63);
        assert_eq!(GpTag::Null.as_u8(), 0x2A);
        assert_eq!(GpTag::EventData.as_u8(), 0x65);
        assert_eq!(GpTag::OperationRequest.as_u8(), 0x71);
        assert_eq!(GpTag::OperationResponse.as_u8(), 0x70);
    }

    #[test]
    fn test_roundtrip_all_tags() {
        for byte in 0u8..=0xFF {
            match GpTag::from_u8(byte) {
                Ok(tag) => assert_eq!(tag.as_u8(), byte),
                Err(ProtocolError::UnknownTag(b)) => assert_eq!(b, byte),
                Err(e) => panic!("unexpected error: {}", e),
            }
        }
    }

    #[test]
    fn test_reserved_bytes_are_unknown() {
        assert!(matches!(
            GpTag::from_u8(0x75),
            Err(ProtocolError::UnknownTag(0x75))
        ));
        assert!(matches!(
            GpTag::from_u8(0xFF),
            Err(ProtocolError::UnknownTag(0xFF))
        ));
    }

    #[test]
    fn test_kind_tag_agreement() {
        // Every kind with a tag maps back to itself through the tag
        for kind in [
            WireKind::Null,
            WireKind::Bool,
            WireKind::Byte,
            WireKind::Short,
            WireKind::Int,
            WireKind::Long,
            WireKind::Float,
            WireKind::Double,
            WireKind::String,
            WireKind::ByteArray,
            WireKind::Array,
            WireKind::ObjectArray,
            WireKind::StringArray,
            WireKind::Map,
            WireKind::Dictionary,
            WireKind::Custom,
        ] {
            let tag = tag_for_kind(kind).unwrap();
            assert_eq!(tag.kind(), Some(kind));
        }
    }

    #[test]
    fn test_amf3_only_kinds_rejected() {
        assert!(tag_for_kind(WireKind::Date).is_err());
        assert!(tag_for_kind(WireKind::Object).is_err());
    }
}
