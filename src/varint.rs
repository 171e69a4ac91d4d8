//! Variable-length integer encodings
//!
//! Two families live here:
//!
//! - The AMF3 U29 encoding: 1-4 bytes, big-endian groups of 7 bits with a
//!   continuation flag in the high bit, except the fourth byte which carries
//!   a full 8 bits. Covers 29 bits total.
//! - The GpBinary v1.7 base-128 encoding: little-endian 7-bit groups with a
//!   continuation flag, unbounded (practically 5 bytes for 32-bit values and
//!   10 for 64-bit), with zig-zag mapping for signed values.
//!
//! All readers fail with `UnexpectedEof` when the buffer runs out
//! mid-sequence; none of them panic on malformed input.

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::error::{ProtocolError, Result};

/// Write an AMF3 U29 variable-length integer
///
/// Only the low 29 bits of `value` are encoded.
pub fn write_u29(buf: &mut BytesMut, value: u32) {
    let value = value & 0x1FFF_FFFF;

    if value < 0x80 {
        buf.put_u8(value as u8);
    } else if value < 0x4000 {
        buf.put_u8(((value >> 7) | 0x80) as u8);
        buf.put_u8((value & 0x7F) as u8);
    } else if value < 0x20_0000 {
        buf.put_u8(((value >> 14) | 0x80) as u8);
        buf.put_u8(((value >> 7) | 0x80) as u8);
        buf.put_u8((value & 0x7F) as u8);
    } else {
        buf.put_u8(((value >> 22) | 0x80) as u8);
        buf.put_u8(((value >> 15) | 0x80) as u8);
        buf.put_u8(((value >> 8) | 0x80) as u8);
        buf.put_u8((value & 0xFF) as u8);
    }
}

/// Read an AMF3 U29 variable-length integer
pub fn read_u29(buf: &mut Bytes) -> Result<u32> {
    let mut value: u32 = 0;

    for i in 0..4 {
        if buf.is_empty() {
            return Err(ProtocolError::UnexpectedEof);
        }

        let byte = buf.get_u8();

        if i < 3 {
            value = (value << 7) | ((byte & 0x7F) as u32);
            if byte & 0x80 == 0 {
                return Ok(value);
            }
        } else {
            // Fourth byte uses all 8 bits
            value = (value << 8) | (byte as u32);
        }
    }

    Ok(value)
}

/// Reinterpret a U29 value as a signed 29-bit two's-complement integer
pub fn sign_extend_u29(raw: u32) -> i32 {
    if raw & 0x1000_0000 != 0 {
        (raw as i32) | !0x1FFF_FFFF
    } else {
        raw as i32
    }
}

/// Write a base-128 little-endian varint (GpBinary v1.7)
pub fn write_varuint32(buf: &mut BytesMut, mut value: u32) {
    while value >= 0x80 {
        buf.put_u8((value as u8 & 0x7F) | 0x80);
        value >>= 7;
    }
    buf.put_u8(value as u8);
}

/// Read a base-128 little-endian varint (GpBinary v1.7)
pub fn read_varuint32(buf: &mut Bytes) -> Result<u32> {
    let mut value: u32 = 0;
    let mut shift = 0;

    loop {
        if buf.is_empty() {
            return Err(ProtocolError::UnexpectedEof);
        }
        let byte = buf.get_u8();
        value |= ((byte & 0x7F) as u32) << shift;
        if byte & 0x80 == 0 {
            return Ok(value);
        }
        shift += 7;
        if shift >= 35 {
            return Err(ProtocolError::ValueTooLarge("varint exceeds 32 bits"));
        }
    }
}

/// Write a 64-bit base-128 little-endian varint
pub fn write_varuint64(buf: &mut BytesMut, mut value: u64) {
    while value >= 0x80 {
        buf.put_u8((value as u8 & 0x7F) | 0x80);
        value >>= 7;
    }
    buf.put_u8(value as u8);
}

/// Read a 64-bit base-128 little-endian varint
pub fn read_varuint64(buf: &mut Bytes) -> Result<u64> {
    let mut value: u64 = 0;
    let mut shift = 0;

    loop {
        if buf.is_empty() {
            return Err(ProtocolError::UnexpectedEof);
        }
        let byte = buf.get_u8();
        value |= ((byte & 0x7F) as u64) << shift;
        if byte & 0x80 == 0 {
            return Ok(value);
        }
        shift += 7;
        if shift >= 70 {
            return Err(ProtocolError::ValueTooLarge("varint exceeds 64 bits"));
        }
    }
}

/// Zig-zag map a signed 32-bit value to unsigned
pub fn zigzag32(value: i32) -> u32 {
    ((value << 1) ^ (value >> 31)) as u32
}

/// Inverse of [`zigzag32`]
pub fn unzigzag32(value: u32) -> i32 {
    ((value >> 1) as i32) ^ -((value & 1) as i32)
}

/// Zig-zag map a signed 64-bit value to unsigned
pub fn zigzag64(value: i64) -> u64 {
    ((value << 1) ^ (value >> 63)) as u64
}

/// Inverse of [`zigzag64`]
pub fn unzigzag64(value: u64) -> i64 {
    ((value >> 1) as i64) ^ -((value & 1) as i64)
}
