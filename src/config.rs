//! Configuration for boltstub
//!
//! Centralized configuration with sensible defaults.

use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

use crate::error::{Result, StubError};
use crate::protocol::{MAX_CHUNK_SIZE, MAX_MESSAGE_SIZE};

/// Host used when a listen address names only a port
pub const DEFAULT_HOST: &str = "127.0.0.1";

/// Port used when a listen address names only a host
pub const DEFAULT_PORT: u16 = 17687;

/// Main configuration for a stub server run
#[derive(Debug, Clone)]
pub struct Config {
    // -------------------------------------------------------------------------
    // Network Configuration
    // -------------------------------------------------------------------------
    /// TCP listen address (host:port)
    pub listen_addr: String,

    /// Inactivity timeout for accept, reads and writes. `None` waits forever.
    pub timeout: Option<Duration>,

    // -------------------------------------------------------------------------
    // Framing Configuration
    // -------------------------------------------------------------------------
    /// Largest chunk written to the client (at most 65 535)
    pub max_chunk_size: usize,

    /// Largest assembled message accepted from the client
    pub max_message_size: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            listen_addr: format!("{}:{}", DEFAULT_HOST, DEFAULT_PORT),
            timeout: None,
            max_chunk_size: MAX_CHUNK_SIZE,
            max_message_size: MAX_MESSAGE_SIZE,
        }
    }
}

impl Config {
    /// Create a new config builder
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }

    /// Normalize a listen address
    ///
    /// Accepts `host:port`, `:port`, a bare `port` or a bare `host`. IPv6
    /// hosts may be bracketed (`[::1]:7687`) or bare (`::1`).
    pub fn parse_listen_addr(addr: &str) -> Result<String> {
        let addr = addr.trim();
        if addr.is_empty() {
            return Err(StubError::Config("empty listen address".to_string()));
        }

        if addr.chars().all(|c| c.is_ascii_digit()) {
            let port = parse_port(addr)?;
            return Ok(format!("{}:{}", DEFAULT_HOST, port));
        }

        if let Ok(socket) = addr.parse::<SocketAddr>() {
            return Ok(socket.to_string());
        }

        // Bare IP, with or without IPv6 brackets
        let unbracketed = addr
            .strip_prefix('[')
            .and_then(|rest| rest.strip_suffix(']'))
            .unwrap_or(addr);
        if let Ok(ip) = unbracketed.parse::<IpAddr>() {
            return Ok(SocketAddr::new(ip, DEFAULT_PORT).to_string());
        }

        if let Some(port) = addr.strip_prefix(':') {
            let port = parse_port(port)?;
            return Ok(format!("{}:{}", DEFAULT_HOST, port));
        }

        match addr.rsplit_once(':') {
            Some((host, _)) if host.contains(':') || host.contains(&['[', ']'][..]) => Err(
                StubError::Config(format!("invalid listen address {:?}", addr)),
            ),
            Some((host, port)) if !host.is_empty() => {
                let port = parse_port(port)?;
                Ok(format!("{}:{}", host, port))
            }
            _ if addr.contains(&['[', ']'][..]) => Err(StubError::Config(format!(
                "invalid listen address {:?}",
                addr
            ))),
            _ => Ok(format!("{}:{}", addr, DEFAULT_PORT)),
        }
    }
}

fn parse_port(port: &str) -> Result<u16> {
    port.parse::<u16>()
        .map_err(|_| StubError::Config(format!("invalid port {:?}", port)))
}

/// Builder for Config
#[derive(Default)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Set the TCP listen address
    pub fn listen_addr(mut self, addr: impl Into<String>) -> Self {
        self.config.listen_addr = addr.into();
        self
    }

    /// Set the inactivity timeout
    pub fn timeout(mut self, timeout: Option<Duration>) -> Self {
        self.config.timeout = timeout;
        self
    }

    /// Set the largest chunk written to the client
    pub fn max_chunk_size(mut self, size: usize) -> Self {
        self.config.max_chunk_size = size.clamp(1, MAX_CHUNK_SIZE);
        self
    }

    /// Set the largest message accepted from the client
    pub fn max_message_size(mut self, size: usize) -> Self {
        self.config.max_message_size = size;
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}
