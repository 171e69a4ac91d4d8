//! Streaming frame reassembly
//!
//! [`StreamFrameParser`] consumes raw TCP reads split at arbitrary points
//! and surfaces complete frames through a [`FrameHandler`]. It holds at most
//! one partially-received frame; completed frames are handed off
//! synchronously during [`StreamFrameParser::parse`] and never buffered.
//! A byte that is not a known magic in the gap between frames is logged and
//! skipped, so the parser resynchronizes on the next frame boundary.

use bytes::{BufMut, Bytes, BytesMut};

use super::header::{self, PingPayload, SendParameters, FRAME_MAGIC, PING_MAGIC};

/// Receives completed frames from the parser
pub trait FrameHandler {
    /// A complete message frame: the serialized message and its envelope
    fn on_frame(&mut self, payload: Bytes, params: SendParameters);

    /// A complete ping frame
    fn on_ping(&mut self, ping: PingPayload);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ParserState {
    AwaitMagicByte,
    AwaitHeader,
    AwaitPingPayload,
    AwaitMessagePayload {
        payload_len: usize,
        params: SendParameters,
    },
}

/// Incremental frame parser over a TCP byte stream
#[derive(Debug)]
pub struct StreamFrameParser {
    state: ParserState,
    pending: BytesMut,
}

impl Default for StreamFrameParser {
    fn default() -> Self {
        Self::new()
    }
}

impl StreamFrameParser {
    pub fn new() -> Self {
        Self {
            state: ParserState::AwaitMagicByte,
            pending: BytesMut::new(),
        }
    }

    /// Consume a chunk of the byte stream, invoking the handler for every
    /// frame completed by it. Returns the number of bytes consumed, which is
    /// always the full chunk: partial frames are buffered internally.
    pub fn parse<H: FrameHandler>(&mut self, handler: &mut H, input: &[u8]) -> usize {
        let mut pos = 0;
        while pos < input.len() {
            match self.state {
                ParserState::AwaitMagicByte => {
                    let byte = input[pos];
                    pos += 1;
                    match byte {
                        FRAME_MAGIC => self.state = ParserState::AwaitHeader,
                        PING_MAGIC => self.state = ParserState::AwaitPingPayload,
                        other => {
                            tracing::warn!(byte = other, "Skipping unknown magic byte");
                        }
                    }
                }
                ParserState::AwaitHeader => {
                    pos += self.fill(input, pos, header::HEADER_LEN);
                    if self.pending.len() == header::HEADER_LEN {
                        let mut head = self.pending.split().freeze();
                        match header::read_header(&mut head) {
                            Ok((payload_len, params)) if payload_len == 0 => {
                                self.state = ParserState::AwaitMagicByte;
                                handler.on_frame(Bytes::new(), params);
                            }
                            Ok((payload_len, params)) => {
                                self.state = ParserState::AwaitMessagePayload {
                                    payload_len,
                                    params,
                                };
                            }
                            Err(err) => {
                                tracing::warn!(%err, "Dropping frame with corrupt header");
                                self.state = ParserState::AwaitMagicByte;
                            }
                        }
                    }
                }
                ParserState::AwaitPingPayload => {
                    pos += self.fill(input, pos, header::PING_LEN);
                    if self.pending.len() == header::PING_LEN {
                        let mut body = self.pending.split().freeze();
                        self.state = ParserState::AwaitMagicByte;
                        // Length is checked above; read cannot fail
                        if let Ok(ping) = header::read_ping(&mut body) {
                            handler.on_ping(ping);
                        }
                    }
                }
                ParserState::AwaitMessagePayload {
                    payload_len,
                    params,
                } => {
                    pos += self.fill(input, pos, payload_len);
                    if self.pending.len() == payload_len {
                        let payload = self.pending.split().freeze();
                        self.state = ParserState::AwaitMagicByte;
                        handler.on_frame(payload, params);
                    }
                }
            }
        }
        pos
    }

    /// Append up to `target - pending.len()` bytes from `input[pos..]`,
    /// returning how many were taken
    fn fill(&mut self, input: &[u8], pos: usize, target: usize) -> usize {
        let take = (target - self.pending.len()).min(input.len() - pos);
        self.pending.put_slice(&input[pos..pos + take]);
        take
    }
}
