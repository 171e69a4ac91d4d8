//! AMF3 encoder and decoder
//!
//! AMF3 is the ActionScript 3.0 serialization format: a self-describing
//! binary object-graph encoding with string, object, and trait (class
//! definition) back-reference tables.
//!
//! Type Markers:
//! ```text
//! 0x00 - Undefined
//! 0x01 - Null
//! 0x02 - Boolean false
//! 0x03 - Boolean true
//! 0x04 - Integer (29-bit signed)
//! 0x05 - Double
//! 0x06 - String
//! 0x07 - XML Document (legacy)
//! 0x08 - Date
//! 0x09 - Array
//! 0x0A - Object
//! 0x0B - XML
//! 0x0C - ByteArray
//! ```
//!
//! Reference tables are per-message scratch state: a fresh [`Amf3Context`] /
//! [`Amf3Writer`] is created per top-level message, so decoding is safely
//! parallelizable across connections. The writer intentionally never emits
//! date or byte-array back-references even though the reader honors them;
//! the asymmetry is wire-compatible with deployed clients and is preserved.

use bytes::{Buf, BufMut, Bytes, BytesMut};
use std::collections::HashMap;

use crate::crypto::EncryptionProvider;
use crate::error::{ProtocolError, Result};
use crate::message::{
    EventData, IncomingMessage, MessageType, OperationRequest, OperationResponse, Parameters,
    RESERVED_KEYS_REQUEST, RESERVED_KEYS_RESPONSE,
};
use crate::value::WireValue;
use crate::varint::{read_u29, sign_extend_u29, write_u29};

// AMF3 type markers
const MARKER_UNDEFINED: u8 = 0x00;
const MARKER_NULL: u8 = 0x01;
const MARKER_FALSE: u8 = 0x02;
const MARKER_TRUE: u8 = 0x03;
const MARKER_INTEGER: u8 = 0x04;
const MARKER_DOUBLE: u8 = 0x05;
const MARKER_STRING: u8 = 0x06;
const MARKER_XML_DOC: u8 = 0x07;
const MARKER_DATE: u8 = 0x08;
const MARKER_ARRAY: u8 = 0x09;
const MARKER_OBJECT: u8 = 0x0A;
const MARKER_XML: u8 = 0x0B;
const MARKER_BYTE_ARRAY: u8 = 0x0C;

/// Maximum nesting depth
const MAX_NESTING_DEPTH: usize = 64;

/// AMF3 29-bit integer bounds
const AMF3_INT_MAX: i64 = 0x0FFF_FFFF;
const AMF3_INT_MIN: i64 = -0x1000_0000;

/// Header magic for AMF3-framed messages
const AMF3_HEADER_MAGIC: u8 = 0xF3;

/// Per-message decode context owning the three reference tables
///
/// Created empty at the start of one message, appended to as inlined
/// instances are first seen, and discarded with the message. Never shared
/// across concurrent decodes.
pub struct Amf3Context {
    string_refs: Vec<String>,
    object_refs: Vec<WireValue>,
    trait_refs: Vec<TraitDef>,
    depth: usize,
    /// Total length of the message being decoded, for offset diagnostics
    message_len: usize,
}

/// Trait definition for typed objects
#[derive(Clone, Debug)]
struct TraitDef {
    class_name: String,
    is_dynamic: bool,
    properties: Vec<String>,
}

impl Amf3Context {
    /// Create a fresh context for one message
    pub fn new() -> Self {
        Self {
            string_refs: Vec::new(),
            object_refs: Vec::new(),
            trait_refs: Vec::new(),
            depth: 0,
            message_len: 0,
        }
    }

    fn with_message_len(message_len: usize) -> Self {
        let mut ctx = Self::new();
        ctx.message_len = message_len;
        ctx
    }

    /// Decode a single AMF3 value
    pub fn decode(&mut self, buf: &mut Bytes) -> Result<WireValue> {
        if buf.is_empty() {
            return Err(ProtocolError::UnexpectedEof);
        }

        self.depth += 1;
        if self.depth > MAX_NESTING_DEPTH {
            return Err(ProtocolError::NestingTooDeep);
        }

        let marker = buf.get_u8();
        let result = self.decode_value(marker, buf);
        self.depth -= 1;

        if result.is_err() && self.message_len > 0 {
            tracing::debug!(
                offset = self.message_len - buf.remaining(),
                marker = marker,
                "AMF3 decode failed"
            );
        }
        result
    }

    fn decode_value(&mut self, marker: u8, buf: &mut Bytes) -> Result<WireValue> {
        match marker {
            MARKER_UNDEFINED | MARKER_NULL => Ok(WireValue::Null),
            MARKER_FALSE => Ok(WireValue::Bool(false)),
            MARKER_TRUE => Ok(WireValue::Bool(true)),
            MARKER_INTEGER => self.decode_integer(buf),
            MARKER_DOUBLE => self.decode_double(buf),
            MARKER_STRING => self.decode_string(buf),
            MARKER_DATE => self.decode_date(buf),
            MARKER_ARRAY => self.decode_array(buf),
            MARKER_OBJECT => self.decode_object(buf),
            MARKER_BYTE_ARRAY => self.decode_byte_array(buf),
            MARKER_XML | MARKER_XML_DOC => {
                Err(ProtocolError::Unsupported("AMF3 XML values"))
            }
            _ => Err(ProtocolError::UnknownMarker(marker)),
        }
    }

    fn decode_integer(&mut self, buf: &mut Bytes) -> Result<WireValue> {
        let value = read_u29(buf)?;
        Ok(WireValue::Int(sign_extend_u29(value)))
    }

    fn decode_double(&mut self, buf: &mut Bytes) -> Result<WireValue> {
        if buf.remaining() < 8 {
            return Err(ProtocolError::UnexpectedEof);
        }
        Ok(WireValue::Double(buf.get_f64()))
    }

    fn decode_string(&mut self, buf: &mut Bytes) -> Result<WireValue> {
        let s = self.read_string(buf)?;
        Ok(WireValue::String(s))
    }

    fn decode_date(&mut self, buf: &mut Bytes) -> Result<WireValue> {
        let header = read_u29(buf)?;

        if header & 1 == 0 {
            return self.object_ref((header >> 1) as usize);
        }

        if buf.remaining() < 8 {
            return Err(ProtocolError::UnexpectedEof);
        }

        let millis = buf.get_f64();
        let value = WireValue::Date(millis);
        self.object_refs.push(value.clone());
        Ok(value)
    }

    fn decode_array(&mut self, buf: &mut Bytes) -> Result<WireValue> {
        let header = read_u29(buf)?;

        if header & 1 == 0 {
            return self.object_ref((header >> 1) as usize);
        }

        let dense_count = (header >> 1) as usize;

        // Register a placeholder before reading elements so self-referential
        // structures resolve
        let arr_idx = self.object_refs.len();
        self.object_refs.push(WireValue::Null);

        // Associative portion: key/value pairs until the empty-string key
        let mut assoc: Vec<(WireValue, WireValue)> = Vec::new();
        loop {
            let key = self.read_string(buf)?;
            if key.is_empty() {
                break;
            }
            let value = self.decode(buf)?;
            assoc.push((WireValue::String(key), value));
        }

        // Dense portion; cap the pre-allocation, the count is attacker-controlled
        let mut dense = Vec::with_capacity(dense_count.min(1024));
        for _ in 0..dense_count {
            dense.push(self.decode(buf)?);
        }

        let value = if assoc.is_empty() {
            WireValue::ObjectArray(dense)
        } else {
            // Mixed array: fold the dense part in under integer keys
            for (i, v) in dense.into_iter().enumerate() {
                assoc.push((WireValue::Int(i as i32), v));
            }
            WireValue::Map(assoc)
        };

        self.object_refs[arr_idx] = value.clone();
        Ok(value)
    }

    fn decode_object(&mut self, buf: &mut Bytes) -> Result<WireValue> {
        let header = read_u29(buf)?;

        if header & 1 == 0 {
            return self.object_ref((header >> 1) as usize);
        }

        let obj_idx = self.object_refs.len();
        self.object_refs.push(WireValue::Null);

        let trait_def = if header & 2 == 0 {
            // Trait reference
            let idx = (header >> 2) as usize;
            if idx >= self.trait_refs.len() {
                return Err(ProtocolError::InvalidReference {
                    index: idx,
                    table_len: self.trait_refs.len(),
                });
            }
            self.trait_refs[idx].clone()
        } else {
            if header & 4 != 0 {
                return Err(ProtocolError::Unsupported("externalizable AMF3 objects"));
            }

            // Inline trait
            let is_dynamic = (header & 8) != 0;
            let sealed_count = (header >> 4) as usize;

            let class_name = self.read_string(buf)?;

            let mut properties = Vec::with_capacity(sealed_count.min(256));
            for _ in 0..sealed_count {
                properties.push(self.read_string(buf)?);
            }

            let trait_def = TraitDef {
                class_name,
                is_dynamic,
                properties,
            };
            self.trait_refs.push(trait_def.clone());
            trait_def
        };

        let mut props: Vec<(String, WireValue)> = Vec::new();

        // Sealed properties are positional
        for prop_name in &trait_def.properties {
            let value = self.decode(buf)?;
            props.push((prop_name.clone(), value));
        }

        // Dynamic properties run until the empty-string key
        if trait_def.is_dynamic {
            loop {
                let key = self.read_string(buf)?;
                if key.is_empty() {
                    break;
                }
                let value = self.decode(buf)?;
                props.push((key, value));
            }
        }

        let value = WireValue::Object {
            class_name: trait_def.class_name,
            properties: props,
        };

        self.object_refs[obj_idx] = value.clone();
        Ok(value)
    }

    fn decode_byte_array(&mut self, buf: &mut Bytes) -> Result<WireValue> {
        let header = read_u29(buf)?;

        if header & 1 == 0 {
            let referenced = self.object_ref((header >> 1) as usize)?;
            if !matches!(referenced, WireValue::ByteArray(_)) {
                return Err(ProtocolError::UnencodableValue("byte array reference"));
            }
            return Ok(referenced);
        }

        let len = (header >> 1) as usize;
        if buf.remaining() < len {
            return Err(ProtocolError::UnexpectedEof);
        }

        let data = buf.copy_to_bytes(len).to_vec();
        let value = WireValue::ByteArray(data);
        self.object_refs.push(value.clone());
        Ok(value)
    }

    fn object_ref(&self, idx: usize) -> Result<WireValue> {
        if idx >= self.object_refs.len() {
            return Err(ProtocolError::InvalidReference {
                index: idx,
                table_len: self.object_refs.len(),
            });
        }
        Ok(self.object_refs[idx].clone())
    }

    /// Read an AMF3 string (with reference handling)
    fn read_string(&mut self, buf: &mut Bytes) -> Result<String> {
        let header = read_u29(buf)?;

        if header & 1 == 0 {
            let idx = (header >> 1) as usize;
            if idx >= self.string_refs.len() {
                return Err(ProtocolError::InvalidReference {
                    index: idx,
                    table_len: self.string_refs.len(),
                });
            }
            return Ok(self.string_refs[idx].clone());
        }

        let len = (header >> 1) as usize;
        if len == 0 {
            return Ok(String::new());
        }

        if buf.remaining() < len {
            return Err(ProtocolError::UnexpectedEof);
        }

        let bytes = buf.copy_to_bytes(len);
        let s = String::from_utf8(bytes.to_vec()).map_err(|_| ProtocolError::InvalidUtf8)?;

        // Only non-empty strings go into the reference table
        self.string_refs.push(s.clone());
        Ok(s)
    }
}

impl Default for Amf3Context {
    fn default() -> Self {
        Self::new()
    }
}

/// AMF3 writer with a per-message string reference table
pub struct Amf3Writer {
    buf: BytesMut,
    string_refs: HashMap<String, usize>,
}

impl Amf3Writer {
    /// Create a fresh writer for one message
    pub fn new() -> Self {
        Self {
            buf: BytesMut::with_capacity(256),
            string_refs: HashMap::new(),
        }
    }

    /// Get the encoded bytes and reset
    pub fn finish(&mut self) -> Bytes {
        self.string_refs.clear();
        self.buf.split().freeze()
    }

    /// Encode a single value
    ///
    /// Kinds with no AMF3 mapping (custom types, typed dictionaries keyed by
    /// non-stringifiable values) fail with a hard error naming the kind.
    pub fn encode(&mut self, value: &WireValue) -> Result<()> {
        match value {
            WireValue::Null => self.buf.put_u8(MARKER_NULL),
            WireValue::Bool(false) => self.buf.put_u8(MARKER_FALSE),
            WireValue::Bool(true) => self.buf.put_u8(MARKER_TRUE),
            WireValue::Byte(v) => self.write_integer(*v as i64),
            WireValue::Short(v) => self.write_integer(*v as i64),
            WireValue::Int(v) => self.write_integer(*v as i64),
            WireValue::Long(v) => self.write_integer(*v),
            WireValue::Float(v) => {
                self.buf.put_u8(MARKER_DOUBLE);
                self.buf.put_f64(*v as f64);
            }
            WireValue::Double(v) => {
                self.buf.put_u8(MARKER_DOUBLE);
                self.buf.put_f64(*v);
            }
            WireValue::String(s) => {
                self.buf.put_u8(MARKER_STRING);
                self.write_string(s);
            }
            WireValue::ByteArray(data) => {
                // Always re-inlined; the write path never tables byte arrays
                self.buf.put_u8(MARKER_BYTE_ARRAY);
                let header = ((data.len() as u32) << 1) | 1;
                write_u29(&mut self.buf, header);
                self.buf.put_slice(data);
            }
            WireValue::ObjectArray(items) => self.write_dense_array(items)?,
            WireValue::Array { items, .. } => self.write_dense_array(items)?,
            WireValue::StringArray(items) => {
                self.buf.put_u8(MARKER_ARRAY);
                let header = ((items.len() as u32) << 1) | 1;
                write_u29(&mut self.buf, header);
                write_u29(&mut self.buf, 1); // empty associative part
                for item in items {
                    self.buf.put_u8(MARKER_STRING);
                    self.write_string(item);
                }
            }
            WireValue::Map(entries) => self.write_associative(entries)?,
            WireValue::Dictionary { entries, .. } => {
                // AMF3 has no typed-dictionary shape; degrade to the
                // associative-array form
                self.write_associative(entries)?;
            }
            WireValue::Object {
                class_name,
                properties,
            } => {
                self.buf.put_u8(MARKER_OBJECT);
                // Inline dynamic trait, zero sealed properties
                let header = (1 << 3) | (1 << 1) | 1;
                write_u29(&mut self.buf, header);
                self.write_string(class_name);
                for (key, val) in properties {
                    self.write_string(key);
                    self.encode(val)?;
                }
                self.write_string(""); // terminator
            }
            WireValue::Date(millis) => {
                // Always inline; the write path never tables dates
                self.buf.put_u8(MARKER_DATE);
                write_u29(&mut self.buf, 1);
                self.buf.put_f64(*millis);
            }
            WireValue::Custom { .. } => {
                return Err(ProtocolError::UnencodableValue("custom type"));
            }
        }
        Ok(())
    }

    fn write_integer(&mut self, value: i64) {
        if (AMF3_INT_MIN..=AMF3_INT_MAX).contains(&value) {
            self.buf.put_u8(MARKER_INTEGER);
            write_u29(&mut self.buf, value as u32 & 0x1FFF_FFFF);
        } else {
            self.buf.put_u8(MARKER_DOUBLE);
            self.buf.put_f64(value as f64);
        }
    }

    fn write_dense_array(&mut self, items: &[WireValue]) -> Result<()> {
        self.buf.put_u8(MARKER_ARRAY);
        let header = ((items.len() as u32) << 1) | 1;
        write_u29(&mut self.buf, header);
        write_u29(&mut self.buf, 1); // empty associative part
        for item in items {
            self.encode(item)?;
        }
        Ok(())
    }

    /// Write a map/dictionary as the associative-array shape: flags=1,
    /// dense count 0, key/value pairs until the empty-string key
    fn write_associative(&mut self, entries: &[(WireValue, WireValue)]) -> Result<()> {
        self.buf.put_u8(MARKER_ARRAY);
        write_u29(&mut self.buf, 1); // dense count 0, inline
        for (key, value) in entries {
            let key_str = match key {
                WireValue::String(s) => {
                    if s.is_empty() {
                        // The empty string is the pair terminator
                        return Err(ProtocolError::UnencodableValue("empty map key"));
                    }
                    s.clone()
                }
                WireValue::Byte(v) => v.to_string(),
                WireValue::Short(v) => v.to_string(),
                WireValue::Int(v) => v.to_string(),
                WireValue::Long(v) => v.to_string(),
                other => return Err(ProtocolError::UnencodableValue(other.kind().name())),
            };
            self.write_string(&key_str);
            self.encode(value)?;
        }
        self.write_string(""); // terminator
        Ok(())
    }

    /// Append a raw byte (message framing around AMF3 values)
    fn put_u8(&mut self, value: u8) {
        self.buf.put_u8(value);
    }

    /// Append a raw big-endian i16 (message framing around AMF3 values)
    fn put_i16(&mut self, value: i16) {
        self.buf.put_i16(value);
    }

    /// Write a string with back-reference handling
    fn write_string(&mut self, s: &str) {
        if s.is_empty() {
            write_u29(&mut self.buf, 1); // inline, length 0
            return;
        }

        if let Some(&idx) = self.string_refs.get(s) {
            write_u29(&mut self.buf, (idx as u32) << 1);
        } else {
            let idx = self.string_refs.len();
            self.string_refs.insert(s.to_string(), idx);
            let header = ((s.len() as u32) << 1) | 1;
            write_u29(&mut self.buf, header);
            self.buf.put_slice(s.as_bytes());
        }
    }
}

impl Default for Amf3Writer {
    fn default() -> Self {
        Self::new()
    }
}

/// Decode one value from a standalone buffer with a fresh context
pub fn decode_value(buf: &mut Bytes) -> Result<WireValue> {
    Amf3Context::with_message_len(buf.remaining()).decode(buf)
}

/// Encode one value into a standalone buffer with a fresh writer
pub fn encode_value(value: &WireValue) -> Result<Bytes> {
    let mut writer = Amf3Writer::new();
    writer.encode(value)?;
    Ok(writer.finish())
}

// --- Message framing -------------------------------------------------------
//
// Envelope: [0xF3][message type], then a code byte; responses add a
// big-endian i16 return code and an AMF3 debug value before the parameters.
// Parameters are an i16 count followed by (key byte, AMF3 value) pairs.
// AMF3 framing has no encrypted form; encrypted entry points fail fast.

fn write_parameters(writer: &mut Amf3Writer, params: &Parameters, reserved: &[u8]) -> Result<()> {
    let mut params = params.clone();
    params.strip_reserved(reserved);

    if params.len() > i16::MAX as usize {
        return Err(ProtocolError::ValueTooLarge("parameter count"));
    }
    writer.put_i16(params.len() as i16);
    for (key, value) in params.iter() {
        writer.put_u8(key);
        writer.encode(value)?;
    }
    Ok(())
}

fn read_parameters(ctx: &mut Amf3Context, buf: &mut Bytes) -> Result<Parameters> {
    if buf.remaining() < 2 {
        return Err(ProtocolError::UnexpectedEof);
    }
    let count = buf.get_i16();
    if count < 0 {
        return Err(ProtocolError::ValueTooLarge("negative parameter count"));
    }

    let mut params = Parameters::new();
    for _ in 0..count {
        if buf.is_empty() {
            return Err(ProtocolError::UnexpectedEof);
        }
        let key = buf.get_u8();
        let value = ctx.decode(buf)?;
        params.insert(key, value);
    }
    Ok(params)
}

fn put_header(writer: &mut Amf3Writer, message_type: MessageType) {
    writer.put_u8(AMF3_HEADER_MAGIC);
    writer.put_u8(message_type.as_u8());
}

/// Serialize an event with the AMF3 codec
pub fn serialize_event(event: &EventData) -> Result<Bytes> {
    let mut writer = Amf3Writer::new();
    put_header(&mut writer, MessageType::Event);
    writer.put_u8(event.code);
    write_parameters(&mut writer, &event.parameters, RESERVED_KEYS_REQUEST)?;
    Ok(writer.finish())
}

/// Serialize an operation request with the AMF3 codec
pub fn serialize_operation_request(request: &OperationRequest) -> Result<Bytes> {
    let mut writer = Amf3Writer::new();
    put_header(&mut writer, MessageType::Operation);
    writer.put_u8(request.code);
    write_parameters(&mut writer, &request.parameters, RESERVED_KEYS_REQUEST)?;
    Ok(writer.finish())
}

/// Serialize an operation response with the AMF3 codec
pub fn serialize_operation_response(response: &OperationResponse) -> Result<Bytes> {
    let mut writer = Amf3Writer::new();
    put_header(&mut writer, MessageType::OperationResponse);
    writer.put_u8(response.code);
    writer.put_i16(response.return_code);

    let debug = match &response.debug_message {
        Some(msg) => WireValue::String(msg.clone()),
        None => WireValue::Null,
    };
    writer.encode(&debug)?;

    write_parameters(&mut writer, &response.parameters, RESERVED_KEYS_RESPONSE)?;
    Ok(writer.finish())
}

/// Encrypted serialization is not supported by this protocol
pub fn serialize_event_encrypted(
    _event: &EventData,
    _provider: &dyn EncryptionProvider,
) -> Result<Bytes> {
    Err(ProtocolError::Unsupported("encryption via AMF3"))
}

/// Encrypted serialization is not supported by this protocol
pub fn serialize_operation_request_encrypted(
    _request: &OperationRequest,
    _provider: &dyn EncryptionProvider,
) -> Result<Bytes> {
    Err(ProtocolError::Unsupported("encryption via AMF3"))
}

/// Encrypted serialization is not supported by this protocol
pub fn serialize_operation_response_encrypted(
    _response: &OperationResponse,
    _provider: &dyn EncryptionProvider,
) -> Result<Bytes> {
    Err(ProtocolError::Unsupported("encryption via AMF3"))
}

/// Deserialize one complete AMF3-framed message
pub fn deserialize_message(mut buf: Bytes) -> Result<IncomingMessage> {
    let message_len = buf.remaining();
    if message_len < 2 {
        return Err(ProtocolError::UnexpectedEof);
    }

    let magic = buf.get_u8();
    if magic != AMF3_HEADER_MAGIC {
        return Err(ProtocolError::BadMagic(magic));
    }
    let type_byte = buf.get_u8();
    if type_byte & 0x80 != 0 {
        return Err(ProtocolError::Unsupported("encryption via AMF3"));
    }
    let message_type = MessageType::from_u8(type_byte)
        .ok_or(ProtocolError::UnknownMessageType(type_byte))?;

    let mut ctx = Amf3Context::with_message_len(message_len);

    match message_type {
        MessageType::Operation | MessageType::InternalOperationRequest => {
            if buf.is_empty() {
                return Err(ProtocolError::UnexpectedEof);
            }
            let code = buf.get_u8();
            let parameters = read_parameters(&mut ctx, &mut buf)?;
            let request = OperationRequest { code, parameters };
            Ok(if message_type == MessageType::Operation {
                IncomingMessage::Request(request)
            } else {
                IncomingMessage::InternalRequest(request)
            })
        }
        MessageType::OperationResponse | MessageType::InternalOperationResponse => {
            if buf.remaining() < 3 {
                return Err(ProtocolError::UnexpectedEof);
            }
            let code = buf.get_u8();
            let return_code = buf.get_i16();
            let debug_message = match ctx.decode(&mut buf)? {
                WireValue::Null => None,
                WireValue::String(s) => Some(s),
                other => return Err(ProtocolError::UnencodableValue(other.kind().name())),
            };
            let parameters = read_parameters(&mut ctx, &mut buf)?;
            let response = OperationResponse {
                code,
                return_code,
                debug_message,
                parameters,
            };
            Ok(if message_type == MessageType::OperationResponse {
                IncomingMessage::Response(response)
            } else {
                IncomingMessage::InternalResponse(response)
            })
        }
        MessageType::Event => {
            if buf.is_empty() {
                return Err(ProtocolError::UnexpectedEof);
            }
            let code = buf.get_u8();
            let parameters = read_parameters(&mut ctx, &mut buf)?;
            Ok(IncomingMessage::Event(EventData { code, parameters }))
        }
        MessageType::InitRequest => Ok(IncomingMessage::InitRequest(buf)),
        MessageType::InitResponse => Ok(IncomingMessage::InitResponse(buf)),
        MessageType::Ping | MessageType::PingResponse => {
            Err(ProtocolError::Unsupported("ping via AMF3 framing"))
        }
    }
}
