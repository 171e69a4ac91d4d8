//! Accepting side of the TCP peer layer
//!
//! Accept loop that spawns one task per inbound connection. Each task owns
//! its socket, its [`StreamFrameParser`] and the handler produced by the
//! factory, so frames from one peer are always parsed in arrival order.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::io::AsyncReadExt;
use tokio::net::{TcpListener, TcpStream};
use tokio::time::timeout;

use crate::error::Result;
use crate::frame::parser::{FrameHandler, StreamFrameParser};
use crate::transport::config::TransportConfig;

/// Builds one frame handler per accepted connection
pub trait HandlerFactory: Send + Sync {
    type Handler: FrameHandler + Send + 'static;

    fn make_handler(&self, session_id: u64, peer_addr: SocketAddr) -> Self::Handler;
}

impl<F, H> HandlerFactory for F
where
    F: Fn(u64, SocketAddr) -> H + Send + Sync,
    H: FrameHandler + Send + 'static,
{
    type Handler = H;

    fn make_handler(&self, session_id: u64, peer_addr: SocketAddr) -> H {
        self(session_id, peer_addr)
    }
}

/// Frame-level TCP listener
pub struct PeerListener<F> {
    listener: TcpListener,
    config: TransportConfig,
    factory: F,
    next_session_id: AtomicU64,
}

impl<F: HandlerFactory> PeerListener<F> {
    /// Bind to the configured address
    pub async fn bind(config: TransportConfig, factory: F) -> Result<Self> {
        let listener = TcpListener::bind(config.bind_addr).await?;
        tracing::info!(addr = %config.bind_addr, "Peer listener bound");
        Ok(Self {
            listener,
            config,
            factory,
            next_session_id: AtomicU64::new(1),
        })
    }

    /// The actual bound address (useful when binding port 0)
    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Run the accept loop
    ///
    /// This method blocks until the listener is shut down.
    pub async fn run(&self) -> Result<()> {
        loop {
            match self.listener.accept().await {
                Ok((socket, peer_addr)) => {
                    self.handle_connection(socket, peer_addr);
                }
                Err(e) => {
                    tracing::error!(error = %e, "Failed to accept connection");
                }
            }
        }
    }

    /// Run the accept loop with graceful shutdown
    pub async fn run_until<Fut>(&self, shutdown: Fut) -> Result<()>
    where
        Fut: std::future::Future<Output = ()>,
    {
        tokio::select! {
            _ = shutdown => {
                tracing::info!("Shutdown signal received");
                Ok(())
            }
            result = self.run() => result,
        }
    }

    fn handle_connection(&self, socket: TcpStream, peer_addr: SocketAddr) {
        let session_id = self.next_session_id.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(session_id, peer = %peer_addr, "New connection");

        if self.config.tcp_nodelay {
            if let Err(e) = socket.set_nodelay(true) {
                tracing::error!(error = %e, "Failed to configure socket");
                return;
            }
        }

        let mut handler = self.factory.make_handler(session_id, peer_addr);
        let idle_timeout = self.config.idle_timeout;
        let read_buffer_size = self.config.read_buffer_size;

        tokio::spawn(async move {
            if let Err(e) = read_loop(socket, &mut handler, idle_timeout, read_buffer_size).await {
                tracing::debug!(session_id, error = %e, "Connection error");
            }
            tracing::debug!(session_id, "Connection closed");
        });
    }
}

async fn read_loop<H: FrameHandler>(
    mut socket: TcpStream,
    handler: &mut H,
    idle_timeout: std::time::Duration,
    read_buffer_size: usize,
) -> Result<()> {
    let mut parser = StreamFrameParser::new();
    let mut buf = vec![0u8; read_buffer_size];

    loop {
        let n = match timeout(idle_timeout, socket.read(&mut buf)).await {
            Ok(result) => result?,
            Err(_) => {
                return Err(crate::error::ProtocolError::Io(std::io::Error::new(
                    std::io::ErrorKind::TimedOut,
                    "idle timeout",
                )))
            }
        };
        if n == 0 {
            return Ok(());
        }
        parser.parse(handler, &buf[..n]);
    }
}

#[cfg(test)]
mod tests {
    use bytes::Bytes;
    use tokio::sync::mpsc;

    use super::*;
    use crate::frame::header::{PingPayload, SendParameters};
    use crate::transport::connection::PeerConnection;

    struct ChannelHandler {
        tx: mpsc::UnboundedSender<(u64, Bytes)>,
        session_id: u64,
    }

    impl FrameHandler for ChannelHandler {
        fn on_frame(&mut self, payload: Bytes, _params: SendParameters) {
            let _ = self.tx.send((self.session_id, payload));
        }

        fn on_ping(&mut self, _ping: PingPayload) {}
    }

    #[tokio::test]
    async fn test_accept_and_deliver_frames() {
        let (tx, mut rx) = mpsc::unbounded_channel();

        let config = TransportConfig::with_addr("127.0.0.1:0".parse().unwrap());
        let factory = move |session_id: u64, _peer_addr: SocketAddr| ChannelHandler {
            tx: tx.clone(),
            session_id,
        };
        let listener = PeerListener::bind(config.clone(), factory).await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let _ = listener.run().await;
        });

        let mut conn = PeerConnection::connect(addr, config.max_connect_attempts(1))
            .await
            .unwrap();
        conn.send_frame(b"hello peer", SendParameters::default())
            .await
            .unwrap();

        let (session_id, payload) = rx.recv().await.unwrap();
        assert_eq!(session_id, 1);
        assert_eq!(&payload[..], b"hello peer");
    }
}
