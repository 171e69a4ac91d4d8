//! Wire protocol core for realtime multiplayer networking
//!
//! Four binary dialects share one value model ([`value::WireValue`]) and one
//! message model ([`message`]): AMF3 and three generations of the
//! GpBinaryByte format (v1, v1.6, v1.7). On top of the codecs sit a TCP
//! frame envelope with a streaming reassembly parser ([`frame`]) and a
//! tokio-based peer transport ([`transport`]).
//!
//! # Architecture
//!
//! ```text
//!    [transport]  PeerListener / PeerConnection (tokio)
//!         │
//!         ▼
//!    [frame]      StreamFrameParser ──► FrameHandler::on_frame(Bytes)
//!         │
//!         ▼
//!    [codec]      &dyn WireCodec (Amf3 | GpBinary v1 / v1.6 / v1.7)
//!         │
//!         ▼
//!    [message]    EventData / OperationRequest / OperationResponse
//!                 over Parameters (u8 → WireValue)
//! ```
//!
//! Codecs are stateless free functions per dialect; the only per-call state
//! is the AMF3 reference-table context, created fresh for every top-level
//! decode. Payload encryption is delegated to a caller-supplied
//! [`crypto::EncryptionProvider`]; headers always stay plaintext.

pub mod amf3;
pub mod codec;
pub mod crypto;
pub mod custom;
pub mod error;
pub mod frame;
pub mod gpbinary;
pub mod message;
pub mod transport;
pub mod value;
pub mod varint;

pub use codec::{Amf3Codec, GpBinaryV1, GpBinaryV16, GpBinaryV17, WireCodec};
pub use crypto::EncryptionProvider;
pub use custom::{register_custom_type, CustomTypeEntry};
pub use error::{ProtocolError, Result};
pub use frame::{FrameHandler, PingPayload, SendParameters, StreamFrameParser};
pub use message::{
    EventData, IncomingMessage, MessageType, OperationRequest, OperationResponse, Parameters,
};
pub use transport::{PeerConnection, PeerListener, TransportConfig};
pub use value::{WireKind, WireValue};
