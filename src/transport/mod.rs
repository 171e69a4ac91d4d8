//! Async TCP peer layer
//!
//! Frame-level transport on top of tokio: an accepting listener, an
//! outbound connection with backoff reconnection, and shared configuration.
//! Message parsing stays above this layer; the transport only delivers
//! complete frames through [`crate::frame::FrameHandler`].

pub mod config;
pub mod connection;
pub mod listener;

pub use config::TransportConfig;
pub use connection::PeerConnection;
pub use listener::{HandlerFactory, PeerListener};
