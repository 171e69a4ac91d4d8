//! Outbound peer connection
//!
//! One TCP connection to a remote peer. Connecting retries with capped
//! exponential backoff; once established, the connection owns a single
//! [`StreamFrameParser`] and all frame reassembly happens synchronously
//! inside [`PeerConnection::run`], so per-connection parse order matches
//! arrival order by construction.

use std::net::SocketAddr;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::timeout;

use crate::error::{ProtocolError, Result};
use crate::frame::header::{self, PingPayload, SendParameters};
use crate::frame::parser::{FrameHandler, StreamFrameParser};
use crate::transport::config::TransportConfig;

/// An established outbound connection
pub struct PeerConnection {
    peer_addr: SocketAddr,
    config: TransportConfig,
    stream: TcpStream,
    parser: StreamFrameParser,
    read_buf: Vec<u8>,
}

impl PeerConnection {
    /// Connect to a peer, retrying with exponential backoff until a
    /// connection is established or the attempt limit is exhausted
    pub async fn connect(peer_addr: SocketAddr, config: TransportConfig) -> Result<Self> {
        let mut delay = config.reconnect_base_delay;
        let mut attempt: u32 = 0;

        loop {
            attempt += 1;
            match timeout(config.connect_timeout, TcpStream::connect(peer_addr)).await {
                Ok(Ok(stream)) => {
                    if config.tcp_nodelay {
                        stream.set_nodelay(true)?;
                    }
                    tracing::debug!(peer = %peer_addr, attempt, "Connected");
                    return Ok(Self {
                        peer_addr,
                        read_buf: vec![0u8; config.read_buffer_size],
                        config,
                        stream,
                        parser: StreamFrameParser::new(),
                    });
                }
                Ok(Err(e)) => {
                    if config.max_connect_attempts > 0 && attempt >= config.max_connect_attempts {
                        return Err(ProtocolError::Io(e));
                    }
                    tracing::warn!(peer = %peer_addr, attempt, error = %e, "Connect failed, retrying");
                }
                Err(_) => {
                    if config.max_connect_attempts > 0 && attempt >= config.max_connect_attempts {
                        return Err(ProtocolError::Io(std::io::Error::new(
                            std::io::ErrorKind::TimedOut,
                            "connect timed out",
                        )));
                    }
                    tracing::warn!(peer = %peer_addr, attempt, "Connect timed out, retrying");
                }
            }

            tokio::time::sleep(delay).await;
            delay = (delay * 2).min(config.reconnect_max_delay);
        }
    }

    /// Remote peer address
    pub fn peer_addr(&self) -> SocketAddr {
        self.peer_addr
    }

    /// Send a serialized message wrapped in a frame envelope
    pub async fn send_frame(&mut self, payload: &[u8], params: SendParameters) -> Result<()> {
        let frame = header::write_frame(payload, params)?;
        self.stream.write_all(&frame).await?;
        Ok(())
    }

    /// Send a ping frame
    pub async fn send_ping(&mut self, ping: PingPayload) -> Result<()> {
        let frame = header::write_ping(ping);
        self.stream.write_all(&frame).await?;
        Ok(())
    }

    /// Read one chunk from the socket into the parser.
    ///
    /// Returns `false` when the peer closed the connection. Times out with
    /// an error after the configured idle period.
    pub async fn read_some<H: FrameHandler>(&mut self, handler: &mut H) -> Result<bool> {
        let n = match timeout(self.config.idle_timeout, self.stream.read(&mut self.read_buf)).await
        {
            Ok(result) => result?,
            Err(_) => {
                return Err(ProtocolError::Io(std::io::Error::new(
                    std::io::ErrorKind::TimedOut,
                    "idle timeout",
                )))
            }
        };
        if n == 0 {
            return Ok(false);
        }
        self.parser.parse(handler, &self.read_buf[..n]);
        Ok(true)
    }

    /// Drive the read loop until the peer disconnects or an error occurs
    pub async fn run<H: FrameHandler>(&mut self, handler: &mut H) -> Result<()> {
        while self.read_some(handler).await? {}
        tracing::debug!(peer = %self.peer_addr, "Peer closed connection");
        Ok(())
    }
}
