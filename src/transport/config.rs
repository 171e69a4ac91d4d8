//! Transport configuration

use std::net::SocketAddr;
use std::time::Duration;

/// TCP peer layer configuration options
#[derive(Debug, Clone)]
pub struct TransportConfig {
    /// Address to bind to (listener side)
    pub bind_addr: SocketAddr,

    /// Enable TCP_NODELAY (disable Nagle's algorithm)
    pub tcp_nodelay: bool,

    /// Application-level read buffer size
    pub read_buffer_size: usize,

    /// Per-attempt connect timeout (outbound side)
    pub connect_timeout: Duration,

    /// Idle timeout (disconnect if no data received)
    pub idle_timeout: Duration,

    /// First reconnect delay; doubles per failed attempt
    pub reconnect_base_delay: Duration,

    /// Reconnect delay ceiling
    pub reconnect_max_delay: Duration,

    /// Maximum connect attempts before giving up (0 = unlimited)
    pub max_connect_attempts: u32,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:5055".parse().unwrap(),
            tcp_nodelay: true, // Important for low latency
            read_buffer_size: 64 * 1024, // 64KB
            connect_timeout: Duration::from_secs(10),
            idle_timeout: Duration::from_secs(60),
            reconnect_base_delay: Duration::from_millis(250),
            reconnect_max_delay: Duration::from_secs(30),
            max_connect_attempts: 0, // Unlimited
        }
    }
}

impl TransportConfig {
    /// Create a new config with custom bind address
    pub fn with_addr(addr: SocketAddr) -> Self {
        Self {
            bind_addr: addr,
            ..Default::default()
        }
    }

    /// Set the bind address
    pub fn bind(mut self, addr: SocketAddr) -> Self {
        self.bind_addr = addr;
        self
    }

    /// Set the connect timeout
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Set the idle timeout
    pub fn idle_timeout(mut self, timeout: Duration) -> Self {
        self.idle_timeout = timeout;
        self
    }

    /// Set the reconnect backoff bounds
    pub fn reconnect_delays(mut self, base: Duration, max: Duration) -> Self {
        self.reconnect_base_delay = base;
        self.reconnect_max_delay = max;
        self
    }

    /// Set the maximum connect attempts (0 = unlimited)
    pub fn max_connect_attempts(mut self, attempts: u32) -> Self {
        self.max_connect_attempts = attempts;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = TransportConfig::default();

        assert_eq!(config.bind_addr.port(), 5055);
        assert!(config.tcp_nodelay);
        assert_eq!(config.read_buffer_size, 64 * 1024);
        assert_eq!(config.max_connect_attempts, 0);
        assert!(config.reconnect_base_delay < config.reconnect_max_delay);
    }

    #[test]
    fn test_with_addr() {
        let addr: SocketAddr = "127.0.0.1:9000".parse().unwrap();
        let config = TransportConfig::with_addr(addr);

        assert_eq!(config.bind_addr, addr);
    }

    #[test]
    fn test_builder_chaining() {
        let addr: SocketAddr = "0.0.0.0:8080".parse().unwrap();
        let config = TransportConfig::default()
            .bind(addr)
            .connect_timeout(Duration::from_secs(5))
            .idle_timeout(Duration::from_secs(120))
            .reconnect_delays(Duration::from_millis(100), Duration::from_secs(10))
            .max_connect_attempts(3);

        assert_eq!(config.bind_addr, addr);
        assert_eq!(config.connect_timeout, Duration::from_secs(5));
        assert_eq!(config.idle_timeout, Duration::from_secs(120));
        assert_eq!(config.reconnect_base_delay, Duration::from_millis(100));
        assert_eq!(config.reconnect_max_delay, Duration::from_secs(10));
        assert_eq!(config.max_connect_attempts, 3);
    }
}
