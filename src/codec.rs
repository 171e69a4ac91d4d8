//! Unified codec interface
//!
//! One trait over the four wire dialects so the transport and session
//! layers can hold a `&dyn WireCodec` chosen at negotiation time instead of
//! branching per message. Each unit struct forwards to its module's free
//! functions.

use bytes::Bytes;

use crate::amf3;
use crate::crypto::EncryptionProvider;
use crate::error::{ProtocolError, Result};
use crate::gpbinary::{v1, v16, v17};
use crate::message::{EventData, IncomingMessage, OperationRequest, OperationResponse};

/// A complete wire dialect: message serializers plus the matching parser
pub trait WireCodec: Send + Sync {
    fn serialize_event(&self, event: &EventData) -> Result<Bytes>;
    fn serialize_operation_request(&self, request: &OperationRequest) -> Result<Bytes>;
    fn serialize_operation_response(&self, response: &OperationResponse) -> Result<Bytes>;

    fn serialize_event_encrypted(
        &self,
        event: &EventData,
        provider: &dyn EncryptionProvider,
    ) -> Result<Bytes>;
    fn serialize_operation_request_encrypted(
        &self,
        request: &OperationRequest,
        provider: &dyn EncryptionProvider,
    ) -> Result<Bytes>;
    fn serialize_operation_response_encrypted(
        &self,
        response: &OperationResponse,
        provider: &dyn EncryptionProvider,
    ) -> Result<Bytes>;

    /// Parse one complete message, decrypting with `provider` when the
    /// header marks the payload as encrypted
    fn deserialize_message(
        &self,
        buf: Bytes,
        provider: Option<&dyn EncryptionProvider>,
    ) -> Result<IncomingMessage>;
}

/// AMF3 dialect (no encrypted framing)
#[derive(Debug, Clone, Copy, Default)]
pub struct Amf3Codec;

/// GpBinaryByte v1 dialect
#[derive(Debug, Clone, Copy, Default)]
pub struct GpBinaryV1;

/// GpBinaryByte v1.6 dialect
#[derive(Debug, Clone, Copy, Default)]
pub struct GpBinaryV16;

/// GpBinaryByte v1.7 dialect
#[derive(Debug, Clone, Copy, Default)]
pub struct GpBinaryV17;

impl WireCodec for Amf3Codec {
    fn serialize_event(&self, event: &EventData) -> Result<Bytes> {
        amf3::serialize_event(event)
    }

    fn serialize_operation_request(&self, request: &OperationRequest) -> Result<Bytes> {
        amf3::serialize_operation_request(request)
    }

    fn serialize_operation_response(&self, response: &OperationResponse) -> Result<Bytes> {
        amf3::serialize_operation_response(response)
    }

    fn serialize_event_encrypted(
        &self,
        event: &EventData,
        provider: &dyn EncryptionProvider,
    ) -> Result<Bytes> {
        amf3::serialize_event_encrypted(event, provider)
    }

    fn serialize_operation_request_encrypted(
        &self,
        request: &OperationRequest,
        provider: &dyn EncryptionProvider,
    ) -> Result<Bytes> {
        amf3::serialize_operation_request_encrypted(request, provider)
    }

    fn serialize_operation_response_encrypted(
        &self,
        response: &OperationResponse,
        provider: &dyn EncryptionProvider,
    ) -> Result<Bytes> {
        amf3::serialize_operation_response_encrypted(response, provider)
    }

    fn deserialize_message(
        &self,
        buf: Bytes,
        provider: Option<&dyn EncryptionProvider>,
    ) -> Result<IncomingMessage> {
        // AMF3 framing has no encrypted form; a provider cannot be honored
        if provider.is_some() {
            return Err(ProtocolError::Unsupported("encryption via AMF3"));
        }
        amf3::deserialize_message(buf)
    }
}

impl WireCodec for GpBinaryV1 {
    fn serialize_event(&self, event: &EventData) -> Result<Bytes> {
        v1::serialize_event(event)
    }

    fn serialize_operation_request(&self, request: &OperationRequest) -> Result<Bytes> {
        v1::serialize_operation_request(request)
    }

    fn serialize_operation_response(&self, response: &OperationResponse) -> Result<Bytes> {
        v1::serialize_operation_response(response)
    }

    fn serialize_event_encrypted(
        &self,
        event: &EventData,
        provider: &dyn EncryptionProvider,
    ) -> Result<Bytes> {
        v1::serialize_event_encrypted(event, provider)
    }

    fn serialize_operation_request_encrypted(
        &self,
        request: &OperationRequest,
        provider: &dyn EncryptionProvider,
    ) -> Result<Bytes> {
        v1::serialize_operation_request_encrypted(request, provider)
    }

    fn serialize_operation_response_encrypted(
        &self,
        response: &OperationResponse,
        provider: &dyn EncryptionProvider,
    ) -> Result<Bytes> {
        v1::serialize_operation_response_encrypted(response, provider)
    }

    fn deserialize_message(
        &self,
        buf: Bytes,
        provider: Option<&dyn EncryptionProvider>,
    ) -> Result<IncomingMessage> {
        v1::deserialize_message(buf, provider)
    }
}

impl WireCodec for GpBinaryV16 {
    fn serialize_event(&self, event: &EventData) -> Result<Bytes> {
        v16::serialize_event(event)
    }

    fn serialize_operation_request(&self, request: &OperationRequest) -> Result<Bytes> {
        v16::serialize_operation_request(request)
    }

    fn serialize_operation_response(&self, response: &OperationResponse) -> Result<Bytes> {
        v16::serialize_operation_response(response)
    }

    fn serialize_event_encrypted(
        &self,
        event: &EventData,
        provider: &dyn EncryptionProvider,
    ) -> Result<Bytes> {
        v16::serialize_event_encrypted(event, provider)
    }

    fn serialize_operation_request_encrypted(
        &self,
        request: &OperationRequest,
        provider: &dyn EncryptionProvider,
    ) -> Result<Bytes> {
        v16::serialize_operation_request_encrypted(request, provider)
    }

    fn serialize_operation_response_encrypted(
        &self,
        response: &OperationResponse,
        provider: &dyn EncryptionProvider,
    ) -> Result<Bytes> {
        v16::serialize_operation_response_encrypted(response, provider)
    }

    fn deserialize_message(
        &self,
        buf: Bytes,
        provider: Option<&dyn EncryptionProvider>,
    ) -> Result<IncomingMessage> {
        v16::deserialize_message(buf, provider)
    }
}

impl WireCodec for GpBinaryV17 {
    fn serialize_event(&self, event: &EventData) -> Result<Bytes> {
        v17::serialize_event(event)
    }

    fn serialize_operation_request(&self, request: &OperationRequest) -> Result<Bytes> {
        v17::serialize_operation_request(request)
    }

    fn serialize_operation_response(&self, response: &OperationResponse) -> Result<Bytes> {
        v17::serialize_operation_response(response)
    }

    fn serialize_event_encrypted(
        &self,
        event: &EventData,
        provider: &dyn EncryptionProvider,
    ) -> Result<Bytes> {
        v17::serialize_event_encrypted(event, provider)
    }

    fn serialize_operation_request_encrypted(
        &self,
        request: &OperationRequest,
        provider: &dyn EncryptionProvider,
    ) -> Result<Bytes> {
        v17::serialize_operation_request_encrypted(request, provider)
    }

    fn serialize_operation_response_encrypted(
        &self,
        response: &OperationResponse,
        provider: &dyn EncryptionProvider,
    ) -> Result<Bytes> {
        v17::serialize_operation_response_encrypted(response, provider)
    }

    fn deserialize_message(
        &self,
        buf: Bytes,
        provider: Option<&dyn EncryptionProvider>,
    ) -> Result<IncomingMessage> {
        v17::deserialize_message(buf, provider)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::WireValue;

    fn codecs() -> Vec<Box<dyn WireCodec>> {
        vec![
            Box::new(Amf3Codec),
            Box::new(GpBinaryV1),
            Box::new(GpBinaryV16),
            Box::new(GpBinaryV17),
        ]
    }

    #[test]
    fn test_request_roundtrip_through_every_dialect() {
        let mut request = OperationRequest::new(9);
        request.parameters.insert(1, "state");
        request.parameters.insert(2, WireValue::Double(0.5));

        for codec in codecs() {
            let bytes = codec.serialize_operation_request(&request).unwrap();
            match codec.deserialize_message(bytes, None).unwrap() {
                IncomingMessage::Request(decoded) => {
                    assert_eq!(decoded.code, 9);
                    assert_eq!(decoded.parameters.get(1).unwrap().as_str(), Some("state"));
                }
                other => panic!("unexpected message: {:?}", other),
            }
        }
    }

    #[test]
    fn test_amf3_encrypted_fails_fast() {
        struct NoopProvider;
        impl EncryptionProvider for NoopProvider {
            fn encrypt(&self, data: &[u8]) -> Result<Vec<u8>> {
                Ok(data.to_vec())
            }
            fn decrypt(&self, data: &[u8]) -> Result<Vec<u8>> {
                Ok(data.to_vec())
            }
        }

        let event = EventData::new(1);
        assert!(matches!(
            Amf3Codec.serialize_event_encrypted(&event, &NoopProvider),
            Err(ProtocolError::Unsupported(_))
        ));
    }
}
