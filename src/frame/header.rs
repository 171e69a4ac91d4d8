//! Frame envelopes
//!
//! A message frame is `[0xFB][reserved][length: u32 BE][channel]
//! [reliability]` followed by the serialized message; `length` counts the
//! 7 header bytes after the magic plus the payload. A ping frame is
//! `[0xF0][local time: i32 BE][remote time: i32 BE]`, fixed size, no header.

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::error::{ProtocolError, Result};

/// First byte of a message frame
pub const FRAME_MAGIC: u8 = 0xFB;
/// First byte of a ping frame
pub const PING_MAGIC: u8 = 0xF0;

/// Header bytes following the magic
pub const HEADER_LEN: usize = 7;
/// Ping payload bytes following the magic
pub const PING_LEN: usize = 8;

/// Per-frame delivery options carried in the envelope
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SendParameters {
    pub channel_id: u8,
    pub unreliable: bool,
}

/// Ping frame body: the sender's clock and the echoed peer clock
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PingPayload {
    pub local_time: i32,
    pub remote_time: i32,
}

/// Wrap a serialized message in a frame envelope
pub fn write_frame(payload: &[u8], params: SendParameters) -> Result<Bytes> {
    let length = HEADER_LEN + payload.len();
    if length > u32::MAX as usize {
        return Err(ProtocolError::ValueTooLarge("frame length"));
    }
    let mut buf = BytesMut::with_capacity(1 + length);
    buf.put_u8(FRAME_MAGIC);
    buf.put_u8(0); // reserved
    buf.put_u32(length as u32);
    buf.put_u8(params.channel_id);
    buf.put_u8(params.unreliable as u8);
    buf.put_slice(payload);
    Ok(buf.freeze())
}

/// Encode a ping frame
pub fn write_ping(ping: PingPayload) -> Bytes {
    let mut buf = BytesMut::with_capacity(1 + PING_LEN);
    buf.put_u8(PING_MAGIC);
    buf.put_i32(ping.local_time);
    buf.put_i32(ping.remote_time);
    buf.freeze()
}

/// Decode the 7 header bytes after a message magic.
///
/// Returns the payload length and the delivery parameters.
pub(crate) fn read_header(buf: &mut Bytes) -> Result<(usize, SendParameters)> {
    if buf.remaining() < HEADER_LEN {
        return Err(ProtocolError::UnexpectedEof);
    }
    let _reserved = buf.get_u8();
    let length = buf.get_u32() as usize;
    let channel_id = buf.get_u8();
    let unreliable = buf.get_u8() != 0;
    if length < HEADER_LEN {
        return Err(ProtocolError::ValueTooLarge("frame length below header size"));
    }
    Ok((
        length - HEADER_LEN,
        SendParameters {
            channel_id,
            unreliable,
        },
    ))
}

/// Decode the 8 ping bytes after a ping magic
pub(crate) fn read_ping(buf: &mut Bytes) -> Result<PingPayload> {
    if buf.remaining() < PING_LEN {
        return Err(ProtocolError::UnexpectedEof);
    }
    Ok(PingPayload {
        local_time: buf.get_i32(),
        remote_time: buf.get_i32(),
    })
}
