//! TCP Server
//!
//! Binds the listening socket, accepts exactly one client and plays the
//! script against it.

use std::io::ErrorKind;
use std::net::{SocketAddr, TcpListener, TcpStream, ToSocketAddrs};
use std::time::{Duration, Instant};

use crate::config::Config;
use crate::engine::{Failure, State};
use crate::error::{Result, StubError};
use crate::script::Script;
use super::Connection;

/// How often a bounded accept checks for a pending client
const ACCEPT_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// One-shot stub server
pub struct StubServer {
    config: Config,
    listener: TcpListener,
    local_addr: SocketAddr,
}

impl StubServer {
    /// Bind the listening socket
    pub fn bind(config: Config) -> Result<Self> {
        let addr = config
            .listen_addr
            .to_socket_addrs()
            .map_err(|e| {
                StubError::Config(format!("cannot resolve {}: {}", config.listen_addr, e))
            })?
            .next()
            .ok_or_else(|| {
                StubError::Config(format!("{} resolved to no address", config.listen_addr))
            })?;

        let listener = TcpListener::bind(addr)?;
        let local_addr = listener.local_addr()?;
        tracing::info!("Listening for incoming connections on {}", local_addr);

        Ok(Self {
            config,
            listener,
            local_addr,
        })
    }

    /// Address actually bound (useful with port 0)
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Accept one client and run the conversation to a terminal state
    ///
    /// Consumes the server: the listening socket is closed as soon as the
    /// client is accepted, so further connection attempts are refused.
    /// `Err` is reserved for listener failures; conversation failures,
    /// including an accept timeout, come back as `State::Failed`.
    pub fn run(self, script: &Script) -> Result<State> {
        let accepted = self.accept();
        let Self {
            config, listener, ..
        } = self;
        drop(listener);

        let (stream, peer) = match accepted {
            Ok(pair) => pair,
            Err(e) if e.is_timeout() => {
                let timeout = config.timeout.unwrap_or(Duration::ZERO);
                tracing::error!(
                    "Timed out after waiting {:?} for an incoming connection",
                    timeout
                );
                return Ok(State::Failed(Failure::Timeout(timeout)));
            }
            Err(e) => return Err(e),
        };
        tracing::info!("Accepted incoming connection from {}", peer);

        let mut connection = Connection::from_tcp(stream, &config)?;
        let state = connection.run(script);
        connection.shutdown();

        Ok(state)
    }

    /// Accept one connection, bounded by the inactivity timeout if set
    fn accept(&self) -> Result<(TcpStream, SocketAddr)> {
        let timeout = match self.config.timeout {
            Some(timeout) => timeout,
            None => return Ok(self.listener.accept()?),
        };

        let deadline = Instant::now() + timeout;
        self.listener.set_nonblocking(true)?;
        loop {
            match self.listener.accept() {
                Ok((stream, peer)) => {
                    // Some platforms hand out sockets inheriting the flag
                    stream.set_nonblocking(false)?;
                    return Ok((stream, peer));
                }
                Err(e) if e.kind() == ErrorKind::WouldBlock => {
                    if Instant::now() >= deadline {
                        return Err(StubError::Timeout(timeout));
                    }
                    std::thread::sleep(ACCEPT_POLL_INTERVAL);
                }
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            }
        }
    }
}
