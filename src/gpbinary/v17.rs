//! GpBinary v1.7 codec
//!
//! The compact generation: the v1 tag letters survive, but 32/64-bit
//! integers ride zig-zag varints under their scalar tags, every container
//! and string length is an unsigned varint, and message-body counts shrink
//! to single bytes. The 2-byte header is fixed: first byte always `0xF3`,
//! second byte the message type with the encrypted flag in bit 7.
//!
//! Decoding additionally accepts four compact integer tags (`Int1`, `Int2`,
//! `CompressedInt`, `CompressedLong`) and the `tag | 0x80` array-of-scalar
//! forms emitted by some producers. Dispatch is a 256-slot table built from
//! the checked tag enum; any unregistered byte is a typed error, never a
//! missing-function dereference.

use std::sync::OnceLock;

use bytes::{Buf, BufMut, Bytes, BytesMut};

use super::tags::{
    tag_for_kind, tag_for_value, GpTag, TAG17_ARRAY_FLAG, TAG17_COMPRESSED_INT,
    TAG17_COMPRESSED_LONG, TAG17_INT1, TAG17_INT2,
};
use crate::crypto::EncryptionProvider;
use crate::custom;
use crate::error::{ProtocolError, Result};
use crate::message::{
    EventData, IncomingMessage, MessageType, OperationRequest, OperationResponse, Parameters,
    RESERVED_KEYS_REQUEST, RESERVED_KEYS_RESPONSE,
};
use crate::value::{WireKind, WireValue};
use crate::varint::{
    read_varuint32, read_varuint64, unzigzag32, unzigzag64, write_varuint32, write_varuint64,
    zigzag32, zigzag64,
};

/// First header byte, fixed for every v1.7 message
const HEADER_MAGIC: u8 = 0xF3;
/// Encrypted flag: top bit of the message-type byte
const ENCRYPTED_FLAG: u8 = 0x80;

fn need(buf: &Bytes, len: usize) -> Result<()> {
    if buf.remaining() < len {
        return Err(ProtocolError::UnexpectedEof);
    }
    Ok(())
}

/// Read a varint element count without the remaining-length guard
///
/// Used where elements may be zero-width (`Null`-typed containers).
fn read_count_raw(buf: &mut Bytes) -> Result<usize> {
    Ok(read_varuint32(buf)? as usize)
}

/// Read a varint element count and guard it against the remaining buffer
fn read_count(buf: &mut Bytes) -> Result<usize> {
    let count = read_count_raw(buf)?;
    if count > buf.remaining() {
        return Err(ProtocolError::UnexpectedEof);
    }
    Ok(count)
}

fn write_string(buf: &mut BytesMut, s: &str) {
    write_varuint32(buf, s.len() as u32);
    buf.put_slice(s.as_bytes());
}

fn read_string(buf: &mut Bytes) -> Result<String> {
    let len = read_varuint32(buf)? as usize;
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
            write_varuint32(buf, zigzag32(*v));
            Ok(())
        }
        WireValue::Long(v) => {
            write_varuint64(buf, zigzag64(*v));
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
        WireValue::String(s) => {
            write_string(buf, s);
            Ok(())
        }
        WireValue::ByteArray(data) => {
            write_varuint32(buf, data.len() as u32);
            buf.put_slice(data);
            Ok(())
        }
        WireValue::ObjectArray(items) => {
            write_varuint32(buf, items.len() as u32);
            for item in items {
                write_tagged(buf, item)?;
            }
            Ok(())
        }
        WireValue::StringArray(items) => {
            write_varuint32(buf, items.len() as u32);
            for item in items {
                write_string(buf, item);
            }
            Ok(())
        }
        WireValue::Array { element, items } => {
            write_varuint32(buf, items.len() as u32);
            let elem_tag = tag_for_kind(*element)?;
            buf.put_u8(elem_tag.as_u8());
            if *element == WireKind::Unknown {
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
            write_varuint32(buf, entries.len() as u32);
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
            let key_tag = tag_for_kind(*key)?;
            let val_tag = tag_for_kind(*val_kind)?;
            buf.put_u8(key_tag.as_u8());
            buf.put_u8(val_tag.as_u8());
            write_varuint32(buf, entries.len() as u32);
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
            write_varuint32(buf, wire.len() as u32);
            buf.put_slice(&wire);
            Ok(())
        }
        WireValue::Date(_) | WireValue::Object { .. } => {
            Err(ProtocolError::UnencodableValue(value.kind().name()))
        }
    }
}

// --- Decode dispatch table --------------------------------------------------

type ReadFn = fn(&mut Bytes) -> Result<WireValue>;

fn read_null(_buf: &mut Bytes) -> Result<WireValue> {
    Ok(WireValue::Null)
}

fn read_bool(buf: &mut Bytes) -> Result<WireValue> {
    need(buf, 1)?;
    Ok(WireValue::Bool(buf.get_u8() != 0))
}

fn read_byte(buf: &mut Bytes) -> Result<WireValue> {
    need(buf, 1)?;
    Ok(WireValue::Byte(buf.get_u8()))
}

fn read_short(buf: &mut Bytes) -> Result<WireValue> {
    need(buf, 2)?;
    Ok(WireValue::Short(buf.get_i16()))
}

fn read_int(buf: &mut Bytes) -> Result<WireValue> {
    Ok(WireValue::Int(unzigzag32(read_varuint32(buf)?)))
}

fn read_long(buf: &mut Bytes) -> Result<WireValue> {
    Ok(WireValue::Long(unzigzag64(read_varuint64(buf)?)))
}

fn read_float(buf: &mut Bytes) -> Result<WireValue> {
    need(buf, 4)?;
    Ok(WireValue::Float(buf.get_f32()))
}

fn read_double(buf: &mut Bytes) -> Result<WireValue> {
    need(buf, 8)?;
    Ok(WireValue::Double(buf.get_f64()))
}

fn read_string_value(buf: &mut Bytes) -> Result<WireValue> {
    Ok(WireValue::String(read_string(buf)?))
}

fn read_byte_array(buf: &mut Bytes) -> Result<WireValue> {
    let len = read_varuint32(buf)? as usize;
    // Guard before allocating
    need(buf, len)?;
    Ok(WireValue::ByteArray(buf.copy_to_bytes(len).to_vec()))
}

fn read_object_array(buf: &mut Bytes) -> Result<WireValue> {
    let count = read_count(buf)?;
    let mut items = Vec::with_capacity(count);
    for _ in 0..count {
        items.push(read_tagged(buf)?);
    }
    Ok(WireValue::ObjectArray(items))
}

fn read_string_array(buf: &mut Bytes) -> Result<WireValue> {
    let count = read_count(buf)?;
    let mut items = Vec::with_capacity(count);
    for _ in 0..count {
        items.push(read_string(buf)?);
    }
    Ok(WireValue::StringArray(items))
}

fn read_typed_array(buf: &mut Bytes) -> Result<WireValue> {
    let count = read_count_raw(buf)?;
    need(buf, 1)?;
    let elem_tag = GpTag::from_u8(buf.get_u8())?;
    let element = elem_tag
        .kind()
        .ok_or(ProtocolError::UnknownTag(elem_tag.as_u8()))?;
    // Null elements are zero-width; everything else takes at least one
    // byte per element, so the count is bounded by the remaining input.
    // No preallocation for the Null case: its count is unbounded by the
    // buffer length.
    if element != WireKind::Null && count > buf.remaining() {
        return Err(ProtocolError::UnexpectedEof);
    }
    let mut items = Vec::new();
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

fn read_hashtable(buf: &mut Bytes) -> Result<WireValue> {
    let count = read_count(buf)?;
    let mut entries = Vec::with_capacity(count);
    for _ in 0..count {
        let key = read_tagged(buf)?;
        let val = read_tagged(buf)?;
        entries.push((key, val));
    }
    Ok(WireValue::Map(entries))
}

fn read_dictionary(buf: &mut Bytes) -> Result<WireValue> {
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
    let mut entries = Vec::new();
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

fn read_custom(buf: &mut Bytes) -> Result<WireValue> {
    need(buf, 1)?;
    let code = buf.get_u8();
    let len = read_varuint32(buf)? as usize;
    need(buf, len)?;
    let wire = buf.copy_to_bytes(len);
    let data = custom::global().deserialize(code, &wire)?;
    Ok(WireValue::Custom { code, data })
}

// Compact integer forms some producers emit instead of the scalar tags

fn read_int1(buf: &mut Bytes) -> Result<WireValue> {
    need(buf, 1)?;
    Ok(WireValue::Int(buf.get_u8() as i32))
}

fn read_int2(buf: &mut Bytes) -> Result<WireValue> {
    need(buf, 2)?;
    Ok(WireValue::Int(buf.get_i16() as i32))
}

fn read_compressed_int(buf: &mut Bytes) -> Result<WireValue> {
    read_int(buf)
}

fn read_compressed_long(buf: &mut Bytes) -> Result<WireValue> {
    read_long(buf)
}

/// Array-of-scalar payload behind a `tag | 0x80` byte
fn read_scalar_array(elem_tag: GpTag, buf: &mut Bytes) -> Result<WireValue> {
    let element = elem_tag
        .kind()
        .ok_or(ProtocolError::UnknownTag(elem_tag.as_u8()))?;
    let count = read_count(buf)?;
    let mut items = Vec::with_capacity(count);
    for _ in 0..count {
        items.push(read_payload(elem_tag, buf)?);
    }
    Ok(WireValue::Array { element, items })
}

fn read_bool_array(buf: &mut Bytes) -> Result<WireValue> {
    read_scalar_array(GpTag::Boolean, buf)
}
fn read_byte_scalar_array(buf: &mut Bytes) -> Result<WireValue> {
    read_scalar_array(GpTag::Byte, buf)
}
fn read_short_array(buf: &mut Bytes) -> Result<WireValue> {
    read_scalar_array(GpTag::Short, buf)
}
fn read_int_array(buf: &mut Bytes) -> Result<WireValue> {
    read_scalar_array(GpTag::Integer, buf)
}
fn read_long_array(buf: &mut Bytes) -> Result<WireValue> {
    read_scalar_array(GpTag::Long, buf)
}
fn read_float_array(buf: &mut Bytes) -> Result<WireValue> {
    read_scalar_array(GpTag::Float, buf)
}
fn read_double_array(buf: &mut Bytes) -> Result<WireValue> {
    read_scalar_array(GpTag::Double, buf)
}
fn read_string_scalar_array(buf: &mut Bytes) -> Result<WireValue> {
    read_scalar_array(GpTag::String, buf)
}

fn build_dispatch() -> [Option<ReadFn>; 256] {
    let mut table: [Option<ReadFn>; 256] = [None; 256];

    table[GpTag::Null.as_u8() as usize] = Some(read_null);
    table[GpTag::Boolean.as_u8() as usize] = Some(read_bool);
    table[GpTag::Byte.as_u8() as usize] = Some(read_byte);
    table[GpTag::Short.as_u8() as usize] = Some(read_short);
    table[GpTag::Integer.as_u8() as usize] = Some(read_int);
    table[GpTag::Long.as_u8() as usize] = Some(read_long);
    table[GpTag::Float.as_u8() as usize] = Some(read_float);
    table[GpTag::Double.as_u8() as usize] = Some(read_double);
    table[GpTag::String.as_u8() as usize] = Some(read_string_value);
    table[GpTag::ByteArray.as_u8() as usize] = Some(read_byte_array);
    table[GpTag::ObjectArray.as_u8() as usize] = Some(read_object_array);
    table[GpTag::StringArray.as_u8() as usize] = Some(read_string_array);
    table[GpTag::Array.as_u8() as usize] = Some(read_typed_array);
    table[GpTag::Hashtable.as_u8() as usize] = Some(read_hashtable);
    table[GpTag::Dictionary.as_u8() as usize] = Some(read_dictionary);
    table[GpTag::Custom.as_u8() as usize] = Some(read_custom);

    table[TAG17_INT1 as usize] = Some(read_int1);
    table[TAG17_INT2 as usize] = Some(read_int2);
    table[TAG17_COMPRESSED_INT as usize] = Some(read_compressed_int);
    table[TAG17_COMPRESSED_LONG as usize] = Some(read_compressed_long);

    table[(GpTag::Boolean.as_u8() | TAG17_ARRAY_FLAG) as usize] = Some(read_bool_array);
    table[(GpTag::Byte.as_u8() | TAG17_ARRAY_FLAG) as usize] = Some(read_byte_scalar_array);
    table[(GpTag::Short.as_u8() | TAG17_ARRAY_FLAG) as usize] = Some(read_short_array);
    table[(GpTag::Integer.as_u8() | TAG17_ARRAY_FLAG) as usize] = Some(read_int_array);
    table[(GpTag::Long.as_u8() | TAG17_ARRAY_FLAG) as usize] = Some(read_long_array);
    table[(GpTag::Float.as_u8() | TAG17_ARRAY_FLAG) as usize] = Some(read_float_array);
    table[(GpTag::Double.as_u8() | TAG17_ARRAY_FLAG) as usize] = Some(read_double_array);
    table[(GpTag::String.as_u8() | TAG17_ARRAY_FLAG) as usize] = Some(read_string_scalar_array);

    table
}

fn dispatch(tag_byte: u8) -> Result<ReadFn> {
    static TABLE: OnceLock<[Option<ReadFn>; 256]> = OnceLock::new();
    TABLE.get_or_init(build_dispatch)[tag_byte as usize]
        .ok_or(ProtocolError::UnknownTag(tag_byte))
}

/// Read a tag byte and the value it announces
pub(crate) fn read_tagged(buf: &mut Bytes) -> Result<WireValue> {
    need(buf, 1)?;
    let tag_byte = buf.get_u8();
    dispatch(tag_byte)?(buf)
}

/// Read a value's payload for an already-consumed scalar tag
fn read_payload(tag: GpTag, buf: &mut Bytes) -> Result<WireValue> {
    dispatch(tag.as_u8())?(buf)
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

fn write_parameters(buf: &mut BytesMut, params: &Parameters, reserved: &[u8]) -> Result<()> {
    let mut params = params.clone();
    params.strip_reserved(reserved);

    if params.len() > u8::MAX as usize {
        return Err(ProtocolError::ValueTooLarge("parameter count"));
    }
    buf.put_u8(params.len() as u8);
    for (key, value) in params.iter() {
        buf.put_u8(key);
        write_tagged(buf, value)?;
    }
    Ok(())
}

fn read_parameters(buf: &mut Bytes) -> Result<Parameters> {
    need(buf, 1)?;
    let count = buf.get_u8();

    let mut params = Parameters::new();
    for _ in 0..count {
        need(buf, 1)?;
        let key = buf.get_u8();
        params.insert(key, read_tagged(buf)?);
    }
    Ok(params)
}

fn write_event_body(buf: &mut BytesMut, event: &EventData) -> Result<()> {
    buf.put_u8(event.code);
    write_parameters(buf, &event.parameters, RESERVED_KEYS_REQUEST)
}

fn write_request_body(buf: &mut BytesMut, request: &OperationRequest) -> Result<()> {
    buf.put_u8(request.code);
    write_parameters(buf, &request.parameters, RESERVED_KEYS_REQUEST)
}

fn write_response_body(buf: &mut BytesMut, response: &OperationResponse) -> Result<()> {
    buf.put_u8(response.code);
    write_varuint32(buf, zigzag32(response.return_code as i32));
    match &response.debug_message {
        Some(msg) => write_tagged(buf, &WireValue::String(msg.clone()))?,
        None => write_tagged(buf, &WireValue::Null)?,
    }
    write_parameters(buf, &response.parameters, RESERVED_KEYS_RESPONSE)
}

fn read_event_body(buf: &mut Bytes) -> Result<EventData> {
    need(buf, 1)?;
    let code = buf.get_u8();
    let parameters = read_parameters(buf)?;
    Ok(EventData { code, parameters })
}

fn read_request_body(buf: &mut Bytes) -> Result<OperationRequest> {
    need(buf, 1)?;
    let code = buf.get_u8();
    let parameters = read_parameters(buf)?;
    Ok(OperationRequest { code, parameters })
}

fn read_response_body(buf: &mut Bytes) -> Result<OperationResponse> {
    need(buf, 1)?;
    let code = buf.get_u8();
    let return_code = unzigzag32(read_varuint32(buf)?);
    if return_code < i16::MIN as i32 || return_code > i16::MAX as i32 {
        return Err(ProtocolError::ValueTooLarge("return code"));
    }
    let debug_message = match read_tagged(buf)? {
        WireValue::Null => None,
        WireValue::String(s) => Some(s),
        other => return Err(ProtocolError::UnencodableValue(other.kind().name())),
    };
    let parameters = read_parameters(buf)?;
    Ok(OperationResponse {
        code,
        return_code: return_code as i16,
        debug_message,
        parameters,
    })
}

fn frame(message_type: MessageType, encrypted: bool, body: &[u8]) -> Bytes {
    let mut buf = BytesMut::with_capacity(2 + body.len());
    buf.put_u8(HEADER_MAGIC);
    let mut type_byte = message_type.as_u8();
    if encrypted {
        type_byte |= ENCRYPTED_FLAG;
    }
    buf.put_u8(type_byte);
    buf.put_slice(body);
    buf.freeze()
}

/// Serialize an event
pub fn serialize_event(event: &EventData) -> Result<Bytes> {
    let mut body = BytesMut::with_capacity(64);
    write_event_body(&mut body, event)?;
    Ok(frame(MessageType::Event, false, &body))
}

/// Serialize an operation request
pub fn serialize_operation_request(request: &OperationRequest) -> Result<Bytes> {
    let mut body = BytesMut::with_capacity(64);
    write_request_body(&mut body, request)?;
    Ok(frame(MessageType::Operation, false, &body))
}

/// Serialize an operation response
pub fn serialize_operation_response(response: &OperationResponse) -> Result<Bytes> {
    let mut body = BytesMut::with_capacity(64);
    write_response_body(&mut body, response)?;
    Ok(frame(MessageType::OperationResponse, false, &body))
}

/// Serialize an event, encrypting the payload region
pub fn serialize_event_encrypted(
    event: &EventData,
    provider: &dyn EncryptionProvider,
) -> Result<Bytes> {
    let mut body = BytesMut::with_capacity(64);
    write_event_body(&mut body, event)?;
    Ok(frame(MessageType::Event, true, &provider.encrypt(&body)?))
}

/// Serialize an operation request, encrypting the payload region
pub fn serialize_operation_request_encrypted(
    request: &OperationRequest,
    provider: &dyn EncryptionProvider,
) -> Result<Bytes> {
    let mut body = BytesMut::with_capacity(64);
    write_request_body(&mut body, request)?;
    Ok(frame(
        MessageType::Operation,
        true,
        &provider.encrypt(&body)?,
    ))
}

/// Serialize an operation response, encrypting the payload region
pub fn serialize_operation_response_encrypted(
    response: &OperationResponse,
    provider: &dyn EncryptionProvider,
) -> Result<Bytes> {
    let mut body = BytesMut::with_capacity(64);
    write_response_body(&mut body, response)?;
    Ok(frame(
        MessageType::OperationResponse,
        true,
        &provider.encrypt(&body)?,
    ))
}

/// Deserialize one complete message, decrypting if the header demands it
pub fn deserialize_message(
    mut buf: Bytes,
    provider: Option<&dyn EncryptionProvider>,
) -> Result<IncomingMessage> {
    need(&buf, 2)?;
    let magic = buf.get_u8();
    if magic != HEADER_MAGIC {
        return Err(ProtocolError::BadMagic(magic));
    }
    let type_byte = buf.get_u8();
    let encrypted = type_byte & ENCRYPTED_FLAG != 0;
    let message_type = MessageType::from_u8(type_byte & !ENCRYPTED_FLAG)
        .ok_or(ProtocolError::UnknownMessageType(type_byte & !ENCRYPTED_FLAG))?;

    let mut body = if encrypted {
        let provider = provider.ok_or(ProtocolError::Unsupported(
            "encrypted message without an encryption provider",
        ))?;
        Bytes::from(provider.decrypt(&buf)?)
    } else {
        buf
    };

    match message_type {
        MessageType::Operation => Ok(IncomingMessage::Request(read_request_body(&mut body)?)),
        MessageType::InternalOperationRequest => {
            Ok(IncomingMessage::InternalRequest(read_request_body(&mut body)?))
        }
        MessageType::OperationResponse => {
            Ok(IncomingMessage::Response(read_response_body(&mut body)?))
        }
        MessageType::InternalOperationResponse => {
            Ok(IncomingMessage::InternalResponse(read_response_body(&mut body)?))
        }
        MessageType::Event => Ok(IncomingMessage::Event(read_event_body(&mut body)?)),
        MessageType::InitRequest => Ok(IncomingMessage::InitRequest(body)),
        MessageType::InitResponse => Ok(IncomingMessage::InitResponse(body)),
        MessageType::Ping | MessageType::PingResponse => {
            Err(ProtocolError::Unsupported("ping inside message framing"))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gpbinary::v1::test_support::XorProvider;

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
            WireValue::Byte(0x80),
            WireValue::Short(-2),
            WireValue::Int(0),
            WireValue::Int(-1),
            WireValue::Int(i32::MAX),
            WireValue::Int(i32::MIN),
            WireValue::Long(i64::MIN),
            WireValue::Float(1.25),
            WireValue::Double(-9.5),
            WireValue::String("compressed".into()),
            WireValue::ByteArray(vec![9, 8, 7]),
        ] {
            assert_eq!(roundtrip(&value), value);
        }
    }

    #[test]
    fn test_int_is_zigzag_varint() {
        let bytes = encode_value(&WireValue::Int(42)).unwrap();
        assert_eq!(&bytes[..], &[0x69, 0x54]); // zigzag(42) = 84

        let bytes = encode_value(&WireValue::Int(-1)).unwrap();
        assert_eq!(&bytes[..], &[0x69, 0x01]);
    }

    #[test]
    fn test_golden_operation_request() {
        // OperationRequest{code=1, params={1: "hello", 2: 42}}
        let mut request = OperationRequest::new(1);
        request.parameters.insert(1, "hello");
        request.parameters.insert(2, 42i32);

        let bytes = serialize_operation_request(&request).unwrap();
        assert_eq!(
            &bytes[..],
            &[
                0xF3, 0x02, // header: magic, Operation
                0x01, // opcode
                0x02, // param count
                0x01, 0x73, 0x05, b'h', b'e', b'l', b'l', b'o', // key 1: string
                0x02, 0x69, 0x54, // key 2: zigzag-varint 42
            ]
        );

        match deserialize_message(bytes, None).unwrap() {
            IncomingMessage::Request(decoded) => assert_eq!(decoded, request),
            other => panic!("unexpected message: {:?}", other),
        }
    }

    #[test]
    fn test_compact_integer_tags_accepted() {
        let mut bytes = Bytes::from_static(&[TAG17_INT1, 0xFF]);
        assert_eq!(decode_value(&mut bytes).unwrap(), WireValue::Int(255));

        let mut bytes = Bytes::from_static(&[TAG17_INT2, 0xFF, 0xFE]);
        assert_eq!(decode_value(&mut bytes).unwrap(), WireValue::Int(-2));

        let mut bytes = Bytes::from_static(&[TAG17_COMPRESSED_INT, 0x54]);
        assert_eq!(decode_value(&mut bytes).unwrap(), WireValue::Int(42));

        let mut bytes = Bytes::from_static(&[TAG17_COMPRESSED_LONG, 0x03]);
        assert_eq!(decode_value(&mut bytes).unwrap(), WireValue::Long(-2));
    }

    #[test]
    fn test_high_bit_array_variant_accepted() {
        // 0x69 | 0x80: array of zigzag-varint ints, varint count
        let mut bytes = Bytes::from_static(&[0xE9, 0x03, 0x02, 0x01, 0x54]);
        assert_eq!(
            decode_value(&mut bytes).unwrap(),
            WireValue::Array {
                element: WireKind::Int,
                items: vec![WireValue::Int(1), WireValue::Int(-1), WireValue::Int(42)],
            }
        );
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
    fn test_typed_array_and_dictionary_roundtrip() {
        let arr = WireValue::Array {
            element: WireKind::Long,
            items: vec![WireValue::Long(1), WireValue::Long(-(1 << 40))],
        };
        assert_eq!(roundtrip(&arr), arr);

        let dict = WireValue::Dictionary {
            key: WireKind::Byte,
            value: WireKind::String,
            entries: vec![(WireValue::Byte(1), WireValue::String("one".into()))],
        };
        assert_eq!(roundtrip(&dict), dict);
    }

    #[test]
    fn test_length_guard() {
        // Byte array declaring a huge varint length with 4 bytes remaining
        let mut buf = BytesMut::new();
        buf.put_u8(GpTag::ByteArray.as_u8());
        write_varuint32(&mut buf, 0x7FFF_FFFF);
        buf.put_slice(&[1, 2, 3, 4]);
        let mut bytes = buf.freeze();
        assert!(matches!(
            decode_value(&mut bytes),
            Err(ProtocolError::UnexpectedEof)
        ));
    }

    #[test]
    fn test_unregistered_tag_byte_fails() {
        // 0x2A | 0x80 has no dispatch entry
        let mut bytes = Bytes::from_static(&[0xAA, 0x00]);
        assert!(matches!(
            decode_value(&mut bytes),
            Err(ProtocolError::UnknownTag(0xAA))
        ));

        let mut bytes = Bytes::from_static(&[0x05]);
        assert!(matches!(
            decode_value(&mut bytes),
            Err(ProtocolError::UnknownTag(0x05))
        ));
    }

    #[test]
    fn test_response_roundtrip_with_compressed_return_code() {
        let mut response = OperationResponse::error(7, -300, "bad move");
        response.parameters.insert(1, 123456i32);

        let bytes = serialize_operation_response(&response).unwrap();
        match deserialize_message(bytes, None).unwrap() {
            IncomingMessage::Response(decoded) => assert_eq!(decoded, response),
            other => panic!("unexpected message: {:?}", other),
        }
    }

    #[test]
    fn test_encrypted_flag_in_type_byte() {
        let provider = XorProvider(0x77);
        let mut event = EventData::new(8);
        event.parameters.insert(2, WireValue::Long(1 << 33));

        let bytes = serialize_event_encrypted(&event, &provider).unwrap();
        assert_eq!(bytes[0], 0xF3);
        assert_eq!(bytes[1], MessageType::Event.as_u8() | 0x80);

        match deserialize_message(bytes, Some(&provider)).unwrap() {
            IncomingMessage::Event(decoded) => assert_eq!(decoded, event),
            other => panic!("unexpected message: {:?}", other),
        }
    }

    #[test]
    fn test_reserved_keys_per_message_kind() {
        // Events carry user data under keys 0 and 1; only the code key is
        // the envelope's
        let mut event = EventData::new(1);
        event
            .parameters
            .insert(crate::message::PARAM_KEY_DEBUG_MESSAGE, "user value");
        event.parameters.insert(crate::message::PARAM_KEY_CODE, 99i32);
        event.parameters.insert(3, 1i32);

        let bytes = serialize_event(&event).unwrap();
        match deserialize_message(bytes, None).unwrap() {
            IncomingMessage::Event(decoded) => {
                assert_eq!(decoded.parameters.len(), 2);
                assert!(decoded
                    .parameters
                    .get(crate::message::PARAM_KEY_DEBUG_MESSAGE)
                    .is_some());
                assert!(decoded.parameters.get(crate::message::PARAM_KEY_CODE).is_none());
            }
            other => panic!("unexpected message: {:?}", other),
        }

        // Responses claim the return-code and debug keys as well
        let mut response = OperationResponse::new(1);
        response
            .parameters
            .insert(crate::message::PARAM_KEY_DEBUG_MESSAGE, "spoof");
        response.parameters.insert(3, 1i32);

        let bytes = serialize_operation_response(&response).unwrap();
        match deserialize_message(bytes, None).unwrap() {
            IncomingMessage::Response(decoded) => {
                assert_eq!(decoded.parameters.len(), 1);
                assert!(decoded
                    .parameters
                    .get(crate::message::PARAM_KEY_DEBUG_MESSAGE)
                    .is_none());
            }
            other => panic!("unexpected message: {:?}", other),
        }
    }
}
