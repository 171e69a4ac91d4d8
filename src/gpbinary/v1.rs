//! GpBinaryByte v1 codec
//!
//! The oldest of the three GpBinary generations: fixed-width big-endian
//! primitives, one-byte type tags, and self-describing containers. Typed
//! arrays and dictionaries declare their element types once up front; an
//! `Unknown` element tag falls back to fully-generic per-element tagged
//! encoding. Nested dictionaries and arrays recurse through their own
//! payload blocks, which carry their own type headers.
//!
//! Message envelope: 2-byte header `[0xF3][message type]` (`0xF4` as the
//! magic marks an encrypted payload), then
//! `[code: u8][param count: i16 BE][(key: u8, tagged value)*]`; responses
//! insert `[return code: i16 BE][debug: tagged string or null]` before the
//! parameters. Encrypted variants frame the identical plaintext body, then
//! encrypt everything after the header.

use bytes::{Buf, BufMut, Bytes, BytesMut};

use super::tags::{tag_for_value, GpTag};
use crate::crypto::EncryptionProvider;
use crate::custom;
use crate::error::{ProtocolError, Result};
use crate::message::{
    EventData, IncomingMessage, MessageType, OperationRequest, OperationResponse, Parameters,
    RESERVED_KEYS_REQUEST, RESERVED_KEYS_RESPONSE,
};
use crate::value::{WireKind, WireValue};

/// First header byte of a plaintext message
pub(crate) const HEADER_MAGIC: u8 = 0xF3;
/// First header byte of an encrypted message (older-generation encrypted flag)
pub(crate) const HEADER_MAGIC_ENCRYPTED: u8 = 0xF4;

fn need(buf: &Bytes, len: usize) -> Result<()> {
    if buf.remaining() < len {
        return Err(ProtocolError::UnexpectedEof);
    }
    Ok(())
}

/// Read an i16 element count without the remaining-length guard
///
/// Used where elements may be zero-width (`Null`-typed containers); the
/// count itself is still bounded by the i16 range.
fn read_count_raw(buf: &mut Bytes) -> Result<usize> {
    need(buf, 2)?;
    let count = buf.get_i16();
    if count < 0 {
        return Err(ProtocolError::ValueTooLarge("negative element count"));
    }
    Ok(count as usize)
}

/// Read an i16 element count and guard it against the remaining buffer
///
/// Every element takes at least one byte, so a count beyond the remaining
/// length is corrupt input, rejected before any allocation.
fn read_count(buf: &mut Bytes) -> Result<usize> {
    let count = read_count_raw(buf)?;
    if count > buf.remaining() {
        return Err(ProtocolError::UnexpectedEof);
    }
    Ok(count)
}

fn write_count(buf: &mut BytesMut, count: usize, what: &'static str) -> Result<()> {
    if count > i16::MAX as usize {
        return Err(ProtocolError::ValueTooLarge(what));
    }
    buf.put_i16(count as i16);
    Ok(())
}

fn write_string(buf: &mut BytesMut, s: &str) -> Result<()> {
    write_count(buf, s.len(), "string length")?;
    buf.put_slice(s.as_bytes());
    Ok(())
}

fn read_string(buf: &mut Bytes) -> Result<String> {
    need(buf, 2)?;
    let len = buf.get_i16();
    if len < 0 {
        return Err(ProtocolError::ValueTooLarge("negative string length"));
    }
    let len = len as usize;
    need(buf, len)?;
    let bytes = buf.copy_to_bytes(len);
    String::from_utf8(bytes.to_vec()).map_err(|_| ProtocolError::InvalidUtf8)
}

/// Write a tag byte followed by the value's payload
pub(crate) fn write_tagged(buf: &mut BytesMut, value: &WireValue) -> Result<()> {
    let tag = tag_for_value(value)?;
    buf.put_u8(tag.as_u8());
    write_payload(buf, value)
}

/// Write a value's payload without its tag byte
pub(crate) fn write_payload(buf: &mut BytesMut, value: &WireValue) -> Result<()> {
    match value {
        WireValue::Null => Ok(()),
        WireValue::Bool(v) => {
            buf.put_u8(*v as u8);
            Ok(())
        }
        WireValue::Byte(v) => {
            buf.put_u8(*v);
            Ok(())
        }
        WireValue::Short(v) => {
            buf.put_i16(*v);
            Ok(())
        }
        WireValue::Int(v) => {
            buf.put_i32(*v);
            Ok(())
        }
        WireValue::Long(v) => {
            buf.put_i64(*v);
            Ok(())
        }
        WireValue::Float(v) => {
            buf.put_f32(*v);
            Ok(())
        }
        WireValue::Double(v) => {
            buf.put_f64(*v);
            Ok(())
        }
        WireValue::String(s) => write_string(buf, s),
        WireValue::ByteArray(data) => {
            if data.len() > i32::MAX as usize {
                return Err(ProtocolError::ValueTooLarge("byte array length"));
            }
            buf.put_i32(data.len() as i32);
            buf.put_slice(data);
            Ok(())
        }
        WireValue::ObjectArray(items) => {
            write_count(buf, items.len(), "object array length")?;
            for item in items {
                write_tagged(buf, item)?;
            }
            Ok(())
        }
        WireValue::StringArray(items) => {
            write_count(buf, items.len(), "string array length")?;
            for item in items {
                write_string(buf, item)?;
            }
            Ok(())
        }
        WireValue::Array { element, items } => {
            write_count(buf, items.len(), "array length")?;
            let elem_tag = super::tags::tag_for_kind(*element)?;
            buf.put_u8(elem_tag.as_u8());
            if *element == WireKind::Unknown {
                // Generic fallback: every element carries its own tag
                for item in items {
                    write_tagged(buf, item)?;
                }
            } else {
                for item in items {
                    if item.kind() != *element {
                        return Err(ProtocolError::UnencodableValue(item.kind().name()));
                    }
                    write_payload(buf, item)?;
                }
            }
            Ok(())
        }
        WireValue::Map(entries) => {
            write_count(buf, entries.len(), "hashtable length")?;
            for (key, val) in entries {
                write_tagged(buf, key)?;
                write_tagged(buf, val)?;
            }
            Ok(())
        }
        WireValue::Dictionary {
            key,
            value: val_kind,
            entries,
        } => {
            let key_tag = super::tags::tag_for_kind(*key)?;
            let val_tag = super::tags::tag_for_kind(*val_kind)?;
            buf.put_u8(key_tag.as_u8());
            buf.put_u8(val_tag.as_u8());
            write_count(buf, entries.len(), "dictionary length")?;
            for (k, v) in entries {
                if *key == WireKind::Unknown {
                    write_tagged(buf, k)?;
                } else {
                    if k.kind() != *key {
                        return Err(ProtocolError::UnencodableValue(k.kind().name()));
                    }
                    write_payload(buf, k)?;
                }
                if *val_kind == WireKind::Unknown {
                    write_tagged(buf, v)?;
                } else {
                    if v.kind() != *val_kind {
                        return Err(ProtocolError::UnencodableValue(v.kind().name()));
                    }
                    write_payload(buf, v)?;
                }
            }
            Ok(())
        }
        WireValue::Custom { code, data } => {
            let wire = custom::global().serialize(*code, data)?;
            buf.put_u8(*code);
            write_count(buf, wire.len(), "custom type length")?;
            buf.put_slice(&wire);
            Ok(())
        }
        WireValue::Date(_) | WireValue::Object { .. } => {
            Err(ProtocolError::UnencodableValue(value.kind().name()))
        }
    }
}

/// Read a tag byte and the value it announces
pub(crate) fn read_tagged(buf: &mut Bytes) -> Result<WireValue> {
    need(buf, 1)?;
    let tag = GpTag::from_u8(buf.get_u8())?;
    read_payload(tag, buf)
}

/// Read a value's payload for an already-consumed tag
pub(crate) fn read_payload(tag: GpTag, buf: &mut Bytes) -> Result<WireValue> {
    match tag {
        GpTag::Null => Ok(WireValue::Null),
        GpTag::Boolean => {
            need(buf, 1)?;
            Ok(WireValue::Bool(buf.get_u8() != 0))
        }
        GpTag::Byte => {
            need(buf, 1)?;
            Ok(WireValue::Byte(buf.get_u8()))
        }
        GpTag::Short => {
            need(buf, 2)?;
            Ok(WireValue::Short(buf.get_i16()))
        }
        GpTag::Integer => {
            need(buf, 4)?;
            Ok(WireValue::Int(buf.get_i32()))
        }
        GpTag::Long => {
            need(buf, 8)?;
            Ok(WireValue::Long(buf.get_i64()))
        }
        GpTag::Float => {
            need(buf, 4)?;
            Ok(WireValue::Float(buf.get_f32()))
        }
        GpTag::Double => {
            need(buf, 8)?;
            Ok(WireValue::Double(buf.get_f64()))
        }
        GpTag::String => Ok(WireValue::String(read_string(buf)?)),
        GpTag::ByteArray => {
            need(buf, 4)?;
            let len = buf.get_i32();
            if len < 0 {
                return Err(ProtocolError::ValueTooLarge("negative byte array length"));
            }
            let len = len as usize;
            // Guard before allocating: a corrupt length must not cause a
            // huge allocation or an out-of-bounds read
            need(buf, len)?;
            Ok(WireValue::ByteArray(buf.copy_to_bytes(len).to_vec()))
        }
        GpTag::ObjectArray => {
            let count = read_count(buf)?;
            let mut items = Vec::with_capacity(count);
            for _ in 0..count {
                items.push(read_tagged(buf)?);
            }
            Ok(WireValue::ObjectArray(items))
        }
        GpTag::StringArray => {
            let count = read_count(buf)?;
            let mut items = Vec::with_capacity(count);
            for _ in 0..count {
                items.push(read_string(buf)?);
            }
            Ok(WireValue::StringArray(items))
        }
        GpTag::Array => {
            let count = read_count_raw(buf)?;
            need(buf, 1)?;
            let elem_tag = GpTag::from_u8(buf.get_u8())?;
            let element = elem_tag
                .kind()
                .ok_or(ProtocolError::UnknownTag(elem_tag.as_u8()))?;
            // Null elements are zero-width; everything else takes at least
            // one byte per element
            if element != WireKind::Null && count > buf.remaining() {
                return Err(ProtocolError::UnexpectedEof);
            }
            let mut items = Vec::with_capacity(count);
            if element == WireKind::Unknown {
                for _ in 0..count {
                    items.push(read_tagged(buf)?);
                }
            } else {
                for _ in 0..count {
                    items.push(read_payload(elem_tag, buf)?);
                }
            }
            Ok(WireValue::Array { element, items })
        }
        GpTag::Hashtable => {
            let count = read_count(buf)?;
            let mut entries = Vec::with_capacity(count);
            for _ in 0..count {
                let key = read_tagged(buf)?;
                let val = read_tagged(buf)?;
                entries.push((key, val));
            }
            Ok(WireValue::Map(entries))
        }
        GpTag::Dictionary => {
            need(buf, 2)?;
            let key_tag = GpTag::from_u8(buf.get_u8())?;
            let val_tag = GpTag::from_u8(buf.get_u8())?;
            let key_kind = key_tag
                .kind()
                .ok_or(ProtocolError::UnknownTag(key_tag.as_u8()))?;
            let val_kind = val_tag
                .kind()
                .ok_or(ProtocolError::UnknownTag(val_tag.as_u8()))?;
            // An entry is zero-width only when both sides are Null
            let count = if key_kind == WireKind::Null && val_kind == WireKind::Null {
                read_count_raw(buf)?
            } else {
                read_count(buf)?
            };
            let mut entries = Vec::with_capacity(count);
            for _ in 0..count {
                let k = if key_kind == WireKind::Unknown {
                    read_tagged(buf)?
                } else {
                    read_payload(key_tag, buf)?
                };
                let v = if val_kind == WireKind::Unknown {
                    read_tagged(buf)?
                } else {
                    read_payload(val_tag, buf)?
                };
                entries.push((k, v));
            }
            Ok(WireValue::Dictionary {
                key: key_kind,
                value: val_kind,
                entries,
            })
        }
        GpTag::Custom => {
            need(buf, 3)?;
            let code = buf.get_u8();
            let len = buf.get_i16();
            if len < 0 {
                return Err(ProtocolError::ValueTooLarge("negative custom type length"));
            }
            let len = len as usize;
            need(buf, len)?;
            let wire = buf.copy_to_bytes(len);
            let data = custom::global().deserialize(code, &wire)?;
            Ok(WireValue::Custom { code, data })
        }
        // Message tags and Unknown never appear as value tags
        GpTag::Unknown
        | GpTag::EventData
        | GpTag::OperationRequest
        | GpTag::OperationResponse => Err(ProtocolError::UnknownTag(tag.as_u8())),
    }
}

/// Encode one value into a standalone buffer
pub fn encode_value(value: &WireValue) -> Result<Bytes> {
    let mut buf = BytesMut::with_capacity(64);
    write_tagged(&mut buf, value)?;
    Ok(buf.freeze())
}

/// Decode one value from a standalone buffer
pub fn decode_value(buf: &mut Bytes) -> Result<WireValue> {
    read_tagged(buf)
}

// --- Message framing -------------------------------------------------------

pub(crate) fn write_parameters(
    buf: &mut BytesMut,
    params: &Parameters,
    reserved: &[u8],
    coerce_null: bool,
) -> Result<()> {
    let mut params = params.clone();
    params.strip_reserved(reserved);

    write_count(buf, params.len(), "parameter count")?;
    for (key, value) in params.iter() {
        buf.put_u8(key);
        if value.is_null() && !coerce_null {
            return Err(ProtocolError::UnencodableValue("null parameter value"));
        }
        write_tagged(buf, value)?;
    }
    Ok(())
}

pub(crate) fn read_parameters(buf: &mut Bytes) -> Result<Parameters> {
    need(buf, 2)?;
    let count = buf.get_i16();
    if count < 0 {
        return Err(ProtocolError::ValueTooLarge("negative parameter count"));
    }

    let mut params = Parameters::new();
    for _ in 0..count {
        need(buf, 1)?;
        let key = buf.get_u8();
        params.insert(key, read_tagged(buf)?);
    }
    Ok(params)
}

pub(crate) fn write_event_body(
    buf: &mut BytesMut,
    event: &EventData,
    coerce_null: bool,
) -> Result<()> {
    buf.put_u8(event.code);
    write_parameters(buf, &event.parameters, RESERVED_KEYS_REQUEST, coerce_null)
}

pub(crate) fn write_request_body(
    buf: &mut BytesMut,
    request: &OperationRequest,
    coerce_null: bool,
) -> Result<()> {
    buf.put_u8(request.code);
    write_parameters(buf, &request.parameters, RESERVED_KEYS_REQUEST, coerce_null)
}

pub(crate) fn write_response_body(
    buf: &mut BytesMut,
    response: &OperationResponse,
    coerce_null: bool,
) -> Result<()> {
    buf.put_u8(response.code);
    buf.put_i16(response.return_code);
    match &response.debug_message {
        Some(msg) => write_tagged(buf, &WireValue::String(msg.clone()))?,
        None => write_tagged(buf, &WireValue::Null)?,
    }
    write_parameters(buf, &response.parameters, RESERVED_KEYS_RESPONSE, coerce_null)
}

pub(crate) fn read_event_body(buf: &mut Bytes) -> Result<EventData> {
    need(buf, 1)?;
    let code = buf.get_u8();
    let parameters = read_parameters(buf)?;
    Ok(EventData { code, parameters })
}

pub(crate) fn read_request_body(buf: &mut Bytes) -> Result<OperationRequest> {
    need(buf, 1)?;
    let code = buf.get_u8();
    let parameters = read_parameters(buf)?;
    Ok(OperationRequest { code, parameters })
}

pub(crate) fn read_response_body(buf: &mut Bytes) -> Result<OperationResponse> {
    need(buf, 3)?;
    let code = buf.get_u8();
    let return_code = buf.get_i16();
    let debug_message = match read_tagged(buf)? {
        WireValue::Null => None,
        WireValue::String(s) => Some(s),
        other => return Err(ProtocolError::UnencodableValue(other.kind().name())),
    };
    let parameters = read_parameters(buf)?;
    Ok(OperationResponse {
        code,
        return_code,
        debug_message,
        parameters,
    })
}

fn frame(message_type: MessageType, body: BytesMut) -> Bytes {
    let mut buf = BytesMut::with_capacity(2 + body.len());
    buf.put_u8(HEADER_MAGIC);
    buf.put_u8(message_type.as_u8());
    buf.put_slice(&body);
    buf.freeze()
}

fn frame_encrypted(
    message_type: MessageType,
    body: BytesMut,
    provider: &dyn EncryptionProvider,
) -> Result<Bytes> {
    // The header stays plaintext so the receiver can detect the encrypted
    // flag and message type before decrypting
    let cipher = provider.encrypt(&body)?;
    let mut buf = BytesMut::with_capacity(2 + cipher.len());
    buf.put_u8(HEADER_MAGIC_ENCRYPTED);
    buf.put_u8(message_type.as_u8());
    buf.put_slice(&cipher);
    Ok(buf.freeze())
}

/// Serialize an event
pub fn serialize_event(event: &EventData) -> Result<Bytes> {
    let mut body = BytesMut::with_capacity(64);
    write_event_body(&mut body, event, false)?;
    Ok(frame(MessageType::Event, body))
}

/// Serialize an operation request
pub fn serialize_operation_request(request: &OperationRequest) -> Result<Bytes> {
    let mut body = BytesMut::with_capacity(64);
    write_request_body(&mut body, request, false)?;
    Ok(frame(MessageType::Operation, body))
}

/// Serialize an operation response
pub fn serialize_operation_response(response: &OperationResponse) -> Result<Bytes> {
    let mut body = BytesMut::with_capacity(64);
    write_response_body(&mut body, response, false)?;
    Ok(frame(MessageType::OperationResponse, body))
}

/// Serialize an event, encrypting the payload region
pub fn serialize_event_encrypted(
    event: &EventData,
    provider: &dyn EncryptionProvider,
) -> Result<Bytes> {
    let mut body = BytesMut::with_capacity(64);
    write_event_body(&mut body, event, false)?;
    frame_encrypted(MessageType::Event, body, provider)
}

/// Serialize an operation request, encrypting the payload region
pub fn serialize_operation_request_encrypted(
    request: &OperationRequest,
    provider: &dyn EncryptionProvider,
) -> Result<Bytes> {
    let mut body = BytesMut::with_capacity(64);
    write_request_body(&mut body, request, false)?;
    frame_encrypted(MessageType::Operation, body, provider)
}

/// Serialize an operation response, encrypting the payload region
pub fn serialize_operation_response_encrypted(
    response: &OperationResponse,
    provider: &dyn EncryptionProvider,
) -> Result<Bytes> {
    let mut body = BytesMut::with_capacity(64);
    write_response_body(&mut body, response, false)?;
    frame_encrypted(MessageType::OperationResponse, body, provider)
}

/// Parse the 2-byte header, returning the message type and whether the
/// remainder of `buf` is encrypted
pub(crate) fn read_header(buf: &mut Bytes) -> Result<(MessageType, bool)> {
    need(buf, 2)?;
    let magic = buf.get_u8();
    let encrypted = match magic {
        HEADER_MAGIC => false,
        HEADER_MAGIC_ENCRYPTED => true,
        other => return Err(ProtocolError::BadMagic(other)),
    };
    let type_byte = buf.get_u8();
    let message_type = MessageType::from_u8(type_byte)
        .ok_or(ProtocolError::UnknownMessageType(type_byte))?;
    Ok((message_type, encrypted))
}

pub(crate) fn read_message_body(
    message_type: MessageType,
    mut buf: Bytes,
) -> Result<IncomingMessage> {
    match message_type {
        MessageType::Operation => Ok(IncomingMessage::Request(read_request_body(&mut buf)?)),
        MessageType::InternalOperationRequest => {
            Ok(IncomingMessage::InternalRequest(read_request_body(&mut buf)?))
        }
        MessageType::OperationResponse => {
            Ok(IncomingMessage::Response(read_response_body(&mut buf)?))
        }
        MessageType::InternalOperationResponse => {
            Ok(IncomingMessage::InternalResponse(read_response_body(&mut buf)?))
        }
        MessageType::Event => Ok(IncomingMessage::Event(read_event_body(&mut buf)?)),
        MessageType::InitRequest => Ok(IncomingMessage::InitRequest(buf)),
        MessageType::InitResponse => Ok(IncomingMessage::InitResponse(buf)),
        MessageType::Ping | MessageType::PingResponse => {
            Err(ProtocolError::Unsupported("ping inside message framing"))
        }
    }
}

/// Deserialize one complete message, decrypting if the header demands it
pub fn deserialize_message(
    mut buf: Bytes,
    provider: Option<&dyn EncryptionProvider>,
) -> Result<IncomingMessage> {
    let (message_type, encrypted) = read_header(&mut buf)?;
    let body = if encrypted {
        let provider = provider.ok_or(ProtocolError::Unsupported(
            "encrypted message without an encryption provider",
        ))?;
        Bytes::from(provider.decrypt(&buf)?)
    } else {
        buf
    };
    read_message_body(message_type, body)
}


#[cfg(test)]
mod tests {
    use super::test_support::XorProvider;
    use super::*;

    fn roundtrip(value: &WireValue) -> WireValue {
        let mut bytes = encode_value(value).unwrap();
        let decoded = decode_value(&mut bytes).unwrap();
        assert!(bytes.is_empty(), "trailing bytes after decode");
        decoded
    }

    #[test]
    fn test_scalar_roundtrips() {
        for value in [
            WireValue::Null,
            WireValue::Bool(true),
            WireValue::Bool(false),
            WireValue::Byte(0xFE),
            WireValue::Short(-12345),
            WireValue::Int(0x7FFF_FFFF),
            WireValue::Long(-1),
            WireValue::Float(3.5),
            WireValue::Double(-0.25),
            WireValue::String("hello".into()),
            WireValue::ByteArray(vec![0, 255, 128]),
        ] {
            assert_eq!(roundtrip(&value), value);
        }
    }

    #[test]
    fn test_fixed_width_encodings() {
        let bytes = encode_value(&WireValue::Int(1)).unwrap();
        assert_eq!(&bytes[..], &[0x69, 0, 0, 0, 1]);

        let bytes = encode_value(&WireValue::Short(-2)).unwrap();
        assert_eq!(&bytes[..], &[0x6B, 0xFF, 0xFE]);

        let bytes = encode_value(&WireValue::String("hi".into())).unwrap();
        assert_eq!(&bytes[..], &[0x73, 0x00, 0x02, b'h', b'i']);
    }

    #[test]
    fn test_object_array_roundtrip() {
        let arr = WireValue::ObjectArray(vec![
            WireValue::Int(1),
            WireValue::String("two".into()),
            WireValue::Null,
        ]);
        assert_eq!(roundtrip(&arr), arr);
    }

    #[test]
    fn test_typed_array_roundtrip() {
        let arr = WireValue::Array {
            element: WireKind::Int,
            items: vec![WireValue::Int(1), WireValue::Int(2), WireValue::Int(3)],
        };
        assert_eq!(roundtrip(&arr), arr);
        // Element tag appears once, not per element
        let bytes = encode_value(&arr).unwrap();
        assert_eq!(bytes.iter().filter(|&&b| b == 0x69).count(), 1);
    }

    #[test]
    fn test_null_element_array_roundtrip() {
        // Null elements occupy zero payload bytes; the count guard must not
        // reject the encoder's own output
        let arr = WireValue::Array {
            element: WireKind::Null,
            items: vec![WireValue::Null; 4],
        };
        assert_eq!(roundtrip(&arr), arr);

        let dict = WireValue::Dictionary {
            key: WireKind::Null,
            value: WireKind::Null,
            entries: vec![(WireValue::Null, WireValue::Null); 3],
        };
        assert_eq!(roundtrip(&dict), dict);
    }

    #[test]
    fn test_nested_array_roundtrip() {
        let inner1 = WireValue::Array {
            element: WireKind::Byte,
            items: vec![WireValue::Byte(1)],
        };
        let inner2 = WireValue::Array {
            element: WireKind::Byte,
            items: vec![WireValue::Byte(2), WireValue::Byte(3)],
        };
        let nested = WireValue::Array {
            element: WireKind::Array,
            items: vec![inner1, inner2],
        };
        assert_eq!(roundtrip(&nested), nested);
    }

    #[test]
    fn test_unknown_element_tag_generic_fallback() {
        let arr = WireValue::Array {
            element: WireKind::Unknown,
            items: vec![WireValue::Int(1), WireValue::String("mixed".into())],
        };
        assert_eq!(roundtrip(&arr), arr);
    }

    #[test]
    fn test_heterogeneous_typed_array_rejected() {
        let arr = WireValue::Array {
            element: WireKind::Int,
            items: vec![WireValue::Int(1), WireValue::String("oops".into())],
        };
        assert!(matches!(
            encode_value(&arr),
            Err(ProtocolError::UnencodableValue(_))
        ));
    }

    #[test]
    fn test_hashtable_roundtrip() {
        let map = WireValue::Map(vec![
            (WireValue::String("name".into()), WireValue::String("a".into())),
            (WireValue::Byte(2), WireValue::Int(17)),
        ]);
        assert_eq!(roundtrip(&map), map);
    }

    #[test]
    fn test_typed_dictionary_roundtrip() {
        let dict = WireValue::Dictionary {
            key: WireKind::String,
            value: WireKind::Int,
            entries: vec![
                (WireValue::String("a".into()), WireValue::Int(1)),
                (WireValue::String("b".into()), WireValue::Int(2)),
            ],
        };
        assert_eq!(roundtrip(&dict), dict);
    }

    #[test]
    fn test_dictionary_with_untyped_values_roundtrip() {
        let dict = WireValue::Dictionary {
            key: WireKind::Byte,
            value: WireKind::Unknown,
            entries: vec![
                (WireValue::Byte(1), WireValue::String("x".into())),
                (WireValue::Byte(2), WireValue::Long(99)),
            ],
        };
        assert_eq!(roundtrip(&dict), dict);
    }

    #[test]
    fn test_nested_dictionary_roundtrip() {
        let inner = WireValue::Dictionary {
            key: WireKind::Byte,
            value: WireKind::Int,
            entries: vec![(WireValue::Byte(1), WireValue::Int(10))],
        };
        let outer = WireValue::Dictionary {
            key: WireKind::String,
            value: WireKind::Dictionary,
            entries: vec![(WireValue::String("in".into()), inner)],
        };
        assert_eq!(roundtrip(&outer), outer);
    }

    #[test]
    fn test_byte_array_length_guard() {
        // Declared length 0x7FFFFFFF with 4 bytes remaining
        let mut buf = BytesMut::new();
        buf.put_u8(GpTag::ByteArray.as_u8());
        buf.put_i32(0x7FFF_FFFF);
        buf.put_slice(&[1, 2, 3, 4]);
        let mut bytes = buf.freeze();
        assert!(matches!(
            decode_value(&mut bytes),
            Err(ProtocolError::UnexpectedEof)
        ));
    }

    #[test]
    fn test_container_count_guard() {
        // Object array claiming 30000 elements with 2 bytes remaining
        let mut buf = BytesMut::new();
        buf.put_u8(GpTag::ObjectArray.as_u8());
        buf.put_i16(30000);
        buf.put_slice(&[0x2A, 0x2A]);
        let mut bytes = buf.freeze();
        assert!(matches!(
            decode_value(&mut bytes),
            Err(ProtocolError::UnexpectedEof)
        ));
    }

    #[test]
    fn test_unknown_tag_fails() {
        let mut bytes = Bytes::from_static(&[0x21, 0x00]);
        assert!(matches!(
            decode_value(&mut bytes),
            Err(ProtocolError::UnknownTag(0x21))
        ));
    }

    #[test]
    fn test_truncated_primitive_fails() {
        let mut bytes = Bytes::from_static(&[0x69, 0x00, 0x01]);
        assert!(matches!(
            decode_value(&mut bytes),
            Err(ProtocolError::UnexpectedEof)
        ));
    }

    #[test]
    fn test_request_message_roundtrip() {
        let mut request = OperationRequest::new(11);
        request.parameters.insert(1, "join");
        request.parameters.insert(2, 7i32);

        let bytes = serialize_operation_request(&request).unwrap();
        assert_eq!(&bytes[..2], &[0xF3, MessageType::Operation.as_u8()]);

        match deserialize_message(bytes, None).unwrap() {
            IncomingMessage::Request(decoded) => assert_eq!(decoded, request),
            other => panic!("unexpected message: {:?}", other),
        }
    }

    #[test]
    fn test_response_message_roundtrip() {
        let mut response = OperationResponse::error(11, 32767, "room full");
        response.parameters.insert(4, WireValue::Short(12));

        let bytes = serialize_operation_response(&response).unwrap();
        match deserialize_message(bytes, None).unwrap() {
            IncomingMessage::Response(decoded) => assert_eq!(decoded, response),
            other => panic!("unexpected message: {:?}", other),
        }
    }

    #[test]
    fn test_reserved_keys_stripped_from_response() {
        let mut response = OperationResponse::new(1);
        response
            .parameters
            .insert(crate::message::PARAM_KEY_RETURN_CODE, 5i32);
        response.parameters.insert(9, true);

        let bytes = serialize_operation_response(&response).unwrap();
        match deserialize_message(bytes, None).unwrap() {
            IncomingMessage::Response(decoded) => {
                assert!(decoded
                    .parameters
                    .get(crate::message::PARAM_KEY_RETURN_CODE)
                    .is_none());
                assert!(decoded.parameters.get(9).is_some());
            }
            other => panic!("unexpected message: {:?}", other),
        }
    }

    #[test]
    fn test_null_parameter_rejected() {
        let mut event = EventData::new(1);
        event.parameters.insert(1, WireValue::Null);
        assert!(matches!(
            serialize_event(&event),
            Err(ProtocolError::UnencodableValue("null parameter value"))
        ));
    }

    #[test]
    fn test_encrypted_roundtrip() {
        let provider = XorProvider(0x5A);
        let mut event = EventData::new(3);
        event.parameters.insert(1, "secret");

        let bytes = serialize_event_encrypted(&event, &provider).unwrap();
        // Header stays plaintext with the encrypted magic
        assert_eq!(&bytes[..2], &[0xF4, MessageType::Event.as_u8()]);

        match deserialize_message(bytes.clone(), Some(&provider)).unwrap() {
            IncomingMessage::Event(decoded) => assert_eq!(decoded, event),
            other => panic!("unexpected message: {:?}", other),
        }

        // Without a provider the encrypted frame is rejected
        assert!(matches!(
            deserialize_message(bytes, None),
            Err(ProtocolError::Unsupported(_))
        ));
    }

    #[test]
    fn test_custom_type_roundtrip() {
        fn identity(data: &[u8]) -> Result<Vec<u8>> {
            Ok(data.to_vec())
        }
        // Other tests share the process-wide registry; ignore a duplicate
        let _ = custom::register_custom_type(custom::CustomTypeEntry {
            code: 200,
            name: "vector2",
            serialize: identity,
            deserialize: identity,
        });

        let value = WireValue::Custom {
            code: 200,
            data: vec![0, 0, 128, 63, 0, 0, 0, 64],
        };
        assert_eq!(roundtrip(&value), value);
    }

    #[test]
    fn test_unregistered_custom_type_fails() {
        let value = WireValue::Custom {
            code: 201,
            data: vec![1],
        };
        assert!(matches!(
            encode_value(&value),
            Err(ProtocolError::UnknownCustomType(201))
        ));

        let mut bytes = Bytes::from_static(&[0x63, 201, 0x00, 0x01, 0xAB]);
        assert!(matches!(
            decode_value(&mut bytes),
            Err(ProtocolError::UnknownCustomType(201))
        ));
    }

    #[test]
    fn test_bad_magic_fails() {
        let bytes = Bytes::from_static(&[0xAA, 0x02, 0x01, 0x00, 0x00]);
        assert!(matches!(
            deserialize_message(bytes, None),
            Err(ProtocolError::BadMagic(0xAA))
        ));
    }
}
