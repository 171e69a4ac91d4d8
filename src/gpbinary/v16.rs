//! GpBinaryByte v1.6 codec
//!
//! v1.6 keeps the v1 value encoding byte-for-byte and refines the message
//! layer: writers are split per message kind, init frames carry a protocol
//! generation marker, and null parameter values are coerced onto the Null
//! tag instead of being rejected (nullable parameter coercion — v1 treats a
//! null parameter as an encode error).

use bytes::{Buf, BufMut, Bytes, BytesMut};

use super::v1;
use crate::crypto::EncryptionProvider;
use crate::error::{ProtocolError, Result};
use crate::message::{
    EventData, IncomingMessage, MessageType, OperationRequest, OperationResponse,
};

/// Protocol generation bytes carried by v1.6 init frames
const INIT_VERSION: [u8; 2] = [1, 6];

pub use super::v1::{decode_value, encode_value};

fn frame(message_type: MessageType, body: BytesMut) -> Bytes {
    let mut buf = BytesMut::with_capacity(2 + body.len());
    buf.put_u8(v1::HEADER_MAGIC);
    buf.put_u8(message_type.as_u8());
    buf.put_slice(&body);
    buf.freeze()
}

fn frame_encrypted(
    message_type: MessageType,
    body: BytesMut,
    provider: &dyn EncryptionProvider,
) -> Result<Bytes> {
    let cipher = provider.encrypt(&body)?;
    let mut buf = BytesMut::with_capacity(2 + cipher.len());
    buf.put_u8(v1::HEADER_MAGIC_ENCRYPTED);
    buf.put_u8(message_type.as_u8());
    buf.put_slice(&cipher);
    Ok(buf.freeze())
}

/// Serialize an event (null parameter values coerced to the Null tag)
pub fn serialize_event(event: &EventData) -> Result<Bytes> {
    let mut body = BytesMut::with_capacity(64);
    v1::write_event_body(&mut body, event, true)?;
    Ok(frame(MessageType::Event, body))
}

/// Serialize an operation request
pub fn serialize_operation_request(request: &OperationRequest) -> Result<Bytes> {
    let mut body = BytesMut::with_capacity(64);
    v1::write_request_body(&mut body, request, true)?;
    Ok(frame(MessageType::Operation, body))
}

/// Serialize an operation response
pub fn serialize_operation_response(response: &OperationResponse) -> Result<Bytes> {
    let mut body = BytesMut::with_capacity(64);
    v1::write_response_body(&mut body, response, true)?;
    Ok(frame(MessageType::OperationResponse, body))
}

/// Serialize an event, encrypting the payload region
pub fn serialize_event_encrypted(
    event: &EventData,
    provider: &dyn EncryptionProvider,
) -> Result<Bytes> {
    let mut body = BytesMut::with_capacity(64);
    v1::write_event_body(&mut body, event, true)?;
    frame_encrypted(MessageType::Event, body, provider)
}

/// Serialize an operation request, encrypting the payload region
pub fn serialize_operation_request_encrypted(
    request: &OperationRequest,
    provider: &dyn EncryptionProvider,
) -> Result<Bytes> {
    let mut body = BytesMut::with_capacity(64);
    v1::write_request_body(&mut body, request, true)?;
    frame_encrypted(MessageType::Operation, body, provider)
}

/// Serialize an operation response, encrypting the payload region
pub fn serialize_operation_response_encrypted(
    response: &OperationResponse,
    provider: &dyn EncryptionProvider,
) -> Result<Bytes> {
    let mut body = BytesMut::with_capacity(64);
    v1::write_response_body(&mut body, response, true)?;
    frame_encrypted(MessageType::OperationResponse, body, provider)
}

/// Serialize an init request: the v1.6 header variant carries the protocol
/// generation after the message type, then the session layer's opaque body
pub fn serialize_init_request(payload: &[u8]) -> Bytes {
    let mut buf = BytesMut::with_capacity(4 + payload.len());
    buf.put_u8(v1::HEADER_MAGIC);
    buf.put_u8(MessageType::InitRequest.as_u8());
    buf.put_slice(&INIT_VERSION);
    buf.put_slice(payload);
    buf.freeze()
}

/// Serialize an init response (opaque session-layer body)
pub fn serialize_init_response(payload: &[u8]) -> Bytes {
    let mut buf = BytesMut::with_capacity(2 + payload.len());
    buf.put_u8(v1::HEADER_MAGIC);
    buf.put_u8(MessageType::InitResponse.as_u8());
    buf.put_slice(payload);
    buf.freeze()
}

/// Deserialize one complete message, decrypting if the header demands it
pub fn deserialize_message(
    mut buf: Bytes,
    provider: Option<&dyn EncryptionProvider>,
) -> Result<IncomingMessage> {
    let (message_type, encrypted) = v1::read_header(&mut buf)?;
    let mut body = if encrypted {
        let provider = provider.ok_or(ProtocolError::Unsupported(
            "encrypted message without an encryption provider",
        ))?;
        Bytes::from(provider.decrypt(&buf)?)
    } else {
        buf
    };

    if message_type == MessageType::InitRequest {
        // Strip and validate the generation marker
        if body.remaining() < 2 {
            return Err(ProtocolError::UnexpectedEof);
        }
        let major = body.get_u8();
        let minor = body.get_u8();
        if [major, minor] != INIT_VERSION {
            tracing::warn!(major, minor, "Unexpected init protocol generation");
        }
        return Ok(IncomingMessage::InitRequest(body));
    }

    v1::read_message_body(message_type, body)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gpbinary::v1::test_support::XorProvider;
    use crate::value::{WireKind, WireValue};

    #[test]
    fn test_event_roundtrip() {
        let mut event = EventData::new(42);
        event.parameters.insert(1, WireValue::Dictionary {
            key: WireKind::String,
            value: WireKind::Int,
            entries: vec![(WireValue::String("hp".into()), WireValue::Int(100))],
        });

        let bytes = serialize_event(&event).unwrap();
        match deserialize_message(bytes, None).unwrap() {
            IncomingMessage::Event(decoded) => assert_eq!(decoded, event),
            other => panic!("unexpected message: {:?}", other),
        }
    }

    #[test]
    fn test_null_parameter_coerced() {
        // v1 rejects a null parameter; v1.6 writes the Null tag
        let mut request = OperationRequest::new(5);
        request.parameters.insert(1, WireValue::Null);
        request.parameters.insert(2, "kept");

        let bytes = serialize_operation_request(&request).unwrap();
        match deserialize_message(bytes, None).unwrap() {
            IncomingMessage::Request(decoded) => {
                assert_eq!(decoded.parameters.get(1), Some(&WireValue::Null));
                assert_eq!(decoded.parameters.get(2).unwrap().as_str(), Some("kept"));
            }
            other => panic!("unexpected message: {:?}", other),
        }
    }

    #[test]
    fn test_init_request_header_variant() {
        let bytes = serialize_init_request(b"app=lobby");
        assert_eq!(
            &bytes[..4],
            &[0xF3, MessageType::InitRequest.as_u8(), 1, 6]
        );

        match deserialize_message(bytes, None).unwrap() {
            IncomingMessage::InitRequest(body) => assert_eq!(&body[..], b"app=lobby"),
            other => panic!("unexpected message: {:?}", other),
        }
    }

    #[test]
    fn test_encrypted_response_roundtrip() {
        let provider = XorProvider(0x33);
        let response = OperationResponse::error(2, -1, "denied");

        let bytes = serialize_operation_response_encrypted(&response, &provider).unwrap();
        assert_eq!(bytes[0], 0xF4);

        match deserialize_message(bytes, Some(&provider)).unwrap() {
            IncomingMessage::Response(decoded) => assert_eq!(decoded, response),
            other => panic!("unexpected message: {:?}", other),
        }
    }
}
