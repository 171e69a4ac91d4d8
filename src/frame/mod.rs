//! TCP framing layer
//!
//! The byte stream carries two frame shapes distinguished by their first
//! byte: message frames (`0xFB` + 7-byte header + serialized message) and
//! fixed-size ping frames (`0xF0` + two timestamps). [`header`] writes and
//! reads the envelopes; [`parser`] reassembles them from arbitrarily-split
//! reads.

pub mod header;
pub mod parser;

pub use header::{PingPayload, SendParameters, FRAME_MAGIC, PING_MAGIC};
pub use parser::{FrameHandler, StreamFrameParser};
