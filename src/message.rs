//! RPC message types
//!
//! Operation requests, operation responses, and events are the three message
//! shapes carried by every codec. Each holds a parameter map keyed by a
//! single byte. A key is reserved only where the envelope actually carries
//! the field: every envelope carries the code (`0xF4`), response envelopes
//! additionally carry the return code (`0x00`) and debug message (`0x01`).
//! Reserved keys are stripped (with a warning) from user-supplied maps
//! before serialization; they must never be silently overwritten. Requests
//! and events keep user data under keys `0x00` and `0x01`.

use bytes::Bytes;

use crate::value::WireValue;

/// Reserved parameter key carrying the operation/event code
pub const PARAM_KEY_CODE: u8 = 0xF4;
/// Reserved parameter key carrying a response's return code
pub const PARAM_KEY_RETURN_CODE: u8 = 0x00;
/// Reserved parameter key carrying a response's debug message
pub const PARAM_KEY_DEBUG_MESSAGE: u8 = 0x01;

/// Keys a request or event envelope claims for itself
pub const RESERVED_KEYS_REQUEST: &[u8] = &[PARAM_KEY_CODE];
/// Keys a response envelope claims for itself
pub const RESERVED_KEYS_RESPONSE: &[u8] =
    &[PARAM_KEY_CODE, PARAM_KEY_RETURN_CODE, PARAM_KEY_DEBUG_MESSAGE];

/// Message type discriminator carried in every frame header
///
/// `Operation` is fixed at 2 by the wire format; the transport-level ping
/// packet uses its own magic byte but still surfaces here for dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum MessageType {
    InitRequest = 0,
    InitResponse = 1,
    Operation = 2,
    OperationResponse = 3,
    Event = 4,
    Ping = 5,
    InternalOperationRequest = 6,
    InternalOperationResponse = 7,
    PingResponse = 8,
}

impl MessageType {
    /// Decode a message-type byte (without the encrypted flag bit)
    pub fn from_u8(byte: u8) -> Option<Self> {
        match byte {
            0 => Some(MessageType::InitRequest),
            1 => Some(MessageType::InitResponse),
            2 => Some(MessageType::Operation),
            3 => Some(MessageType::OperationResponse),
            4 => Some(MessageType::Event),
            5 => Some(MessageType::Ping),
            6 => Some(MessageType::InternalOperationRequest),
            7 => Some(MessageType::InternalOperationResponse),
            8 => Some(MessageType::PingResponse),
            _ => None,
        }
    }

    /// Wire byte for this message type
    pub fn as_u8(self) -> u8 {
        self as u8
    }
}

/// Ordered parameter map keyed by a single byte
///
/// Insertion order is preserved so encoding is deterministic. Lookup is
/// linear; parameter maps are small (a handful of entries) in practice.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Parameters {
    entries: Vec<(u8, WireValue)>,
}

impl Parameters {
    /// Create an empty parameter map
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Insert a parameter, replacing any existing value under the same key
    pub fn insert(&mut self, key: u8, value: impl Into<WireValue>) {
        let value = value.into();
        if let Some(entry) = self.entries.iter_mut().find(|(k, _)| *k == key) {
            entry.1 = value;
        } else {
            self.entries.push((key, value));
        }
    }

    /// Look up a parameter by key
    pub fn get(&self, key: u8) -> Option<&WireValue> {
        self.entries.iter().find(|(k, _)| *k == key).map(|(_, v)| v)
    }

    /// Remove a parameter by key, returning its value if present
    pub fn remove(&mut self, key: u8) -> Option<WireValue> {
        let idx = self.entries.iter().position(|(k, _)| *k == key)?;
        Some(self.entries.remove(idx).1)
    }

    /// Number of parameters
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the map is empty
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate parameters in insertion order
    pub fn iter(&self) -> impl Iterator<Item = (u8, &WireValue)> {
        self.entries.iter().map(|(k, v)| (*k, v))
    }

    /// Remove the envelope's reserved keys, logging a warning per removed key
    ///
    /// `reserved` is the key set the target envelope claims
    /// ([`RESERVED_KEYS_REQUEST`] or [`RESERVED_KEYS_RESPONSE`]). Returns the
    /// number of entries removed. Called by every codec's message writers
    /// before parameters hit the wire.
    pub fn strip_reserved(&mut self, reserved: &[u8]) -> usize {
        let mut removed = 0;
        for &key in reserved {
            if self.remove(key).is_some() {
                tracing::warn!(key = key, "Dropped reserved parameter key from user map");
                removed += 1;
            }
        }
        removed
    }
}

impl FromIterator<(u8, WireValue)> for Parameters {
    fn from_iter<I: IntoIterator<Item = (u8, WireValue)>>(iter: I) -> Self {
        let mut params = Parameters::new();
        for (k, v) in iter {
            params.insert(k, v);
        }
        params
    }
}

/// An event pushed from one peer to another
#[derive(Debug, Clone, PartialEq)]
pub struct EventData {
    pub code: u8,
    pub parameters: Parameters,
}

impl EventData {
    /// Create an event with an empty parameter map
    pub fn new(code: u8) -> Self {
        Self {
            code,
            parameters: Parameters::new(),
        }
    }
}

/// An operation invocation sent to a peer
#[derive(Debug, Clone, PartialEq)]
pub struct OperationRequest {
    pub code: u8,
    pub parameters: Parameters,
}

impl OperationRequest {
    /// Create a request with an empty parameter map
    pub fn new(code: u8) -> Self {
        Self {
            code,
            parameters: Parameters::new(),
        }
    }
}

/// The result of an operation invocation
#[derive(Debug, Clone, PartialEq)]
pub struct OperationResponse {
    pub code: u8,
    pub return_code: i16,
    pub debug_message: Option<String>,
    pub parameters: Parameters,
}

impl OperationResponse {
    /// Create a successful (return code 0) response
    pub fn new(code: u8) -> Self {
        Self {
            code,
            return_code: 0,
            debug_message: None,
            parameters: Parameters::new(),
        }
    }

    /// Create an error response with a debug message
    pub fn error(code: u8, return_code: i16, debug_message: impl Into<String>) -> Self {
        Self {
            code,
            return_code,
            debug_message: Some(debug_message.into()),
            parameters: Parameters::new(),
        }
    }
}

/// A decoded inbound message, tagged with its frame-level kind
///
/// Init bodies are carried opaquely; their contents belong to the session
/// layer, not the codec.
#[derive(Debug, Clone, PartialEq)]
pub enum IncomingMessage {
    InitRequest(Bytes),
    InitResponse(Bytes),
    Request(OperationRequest),
    Response(OperationResponse),
    Event(EventData),
    InternalRequest(OperationRequest),
    InternalResponse(OperationResponse),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_type_roundtrip() {
        for byte in 0u8..=8 {
            let mt = MessageType::from_u8(byte).unwrap();
            assert_eq!(mt.as_u8(), byte);
        }
        assert!(MessageType::from_u8(9).is_none());
        assert!(MessageType::from_u8(0xFF).is_none());
        assert_eq!(MessageType::Operation.as_u8(), 2);
    }

    #[test]
    fn test_parameters_insert_order() {
        let mut params = Parameters::new();
        params.insert(3, 30i32);
        params.insert(1, 10i32);
        params.insert(2, 20i32);
        let keys: Vec<u8> = params.iter().map(|(k, _)| k).collect();
        assert_eq!(keys, vec![3, 1, 2]);
    }

    #[test]
    fn test_parameters_replace() {
        let mut params = Parameters::new();
        params.insert(1, "a");
        params.insert(1, "b");
        assert_eq!(params.len(), 1);
        assert_eq!(params.get(1).unwrap().as_str(), Some("b"));
    }

    #[test]
    fn test_strip_reserved_response_keys() {
        let mut params = Parameters::new();
        params.insert(PARAM_KEY_RETURN_CODE, 1i32);
        params.insert(5, "user data");
        params.insert(PARAM_KEY_CODE, 2i32);
        params.insert(PARAM_KEY_DEBUG_MESSAGE, "oops");

        assert_eq!(params.strip_reserved(RESERVED_KEYS_RESPONSE), 3);
        assert_eq!(params.len(), 1);
        assert!(params.get(5).is_some());
        assert!(params.get(PARAM_KEY_RETURN_CODE).is_none());
    }

    #[test]
    fn test_strip_reserved_request_keeps_low_keys() {
        // Keys 0 and 1 are only envelope fields in responses; requests and
        // events carry user data under them
        let mut params = Parameters::new();
        params.insert(PARAM_KEY_RETURN_CODE, 1i32);
        params.insert(PARAM_KEY_DEBUG_MESSAGE, "user value");
        params.insert(PARAM_KEY_CODE, 2i32);

        assert_eq!(params.strip_reserved(RESERVED_KEYS_REQUEST), 1);
        assert_eq!(params.len(), 2);
        assert!(params.get(PARAM_KEY_RETURN_CODE).is_some());
        assert!(params.get(PARAM_KEY_DEBUG_MESSAGE).is_some());
        assert!(params.get(PARAM_KEY_CODE).is_none());
    }

    #[test]
    fn test_response_constructors() {
        let ok = OperationResponse::new(10);
        assert_eq!(ok.return_code, 0);
        assert!(ok.debug_message.is_none());

        let err = OperationResponse::error(10, -3, "bad argument");
        assert_eq!(err.return_code, -3);
        assert_eq!(err.debug_message.as_deref(), Some("bad argument"));
    }
}
