//! Connection Handler
//!
//! Plays one scripted conversation over an accepted client stream.

use std::io::{Read, Write};
use std::net::TcpStream;
use std::time::Duration;

use bytes::BytesMut;

use crate::config::Config;
use crate::engine::{Conversation, Failure, State};
use crate::error::{Result, StubError};
use crate::protocol::codec::{hex, write_handshake_reply};
use crate::protocol::{
    encode_message, negotiate, read_handshake, read_message, BoltVersion, Role, MAGIC,
};
use crate::script::{Action, Script};

/// Handles a single client connection
///
/// Generic over the stream so a conversation can be replayed against an
/// in-memory byte stream as well as a socket.
pub struct Connection<S> {
    /// Client stream, read and written directly (one message at a time)
    stream: S,

    /// Reassembly buffer for the message being read
    buf: BytesMut,

    /// Framing limits and timeout
    config: Config,

    /// Peer address for logging
    peer_addr: String,
}

impl Connection<TcpStream> {
    /// Wrap an accepted socket
    ///
    /// Disables Nagle and applies the inactivity timeout to reads and writes.
    pub fn from_tcp(stream: TcpStream, config: &Config) -> Result<Self> {
        let peer_addr = stream
            .peer_addr()
            .map(|a| a.to_string())
            .unwrap_or_else(|_| "unknown".to_string());

        stream.set_nodelay(true)?;
        stream.set_read_timeout(config.timeout)?;
        stream.set_write_timeout(config.timeout)?;

        Ok(Self::new(stream, peer_addr, config))
    }

    /// Close both directions of the socket
    pub fn shutdown(self) {
        tracing::info!("Closed connection to {}", self.peer_addr);
        let _ = self.stream.shutdown(std::net::Shutdown::Both);
    }
}

impl<S: Read + Write> Connection<S> {
    pub fn new(stream: S, peer_addr: impl Into<String>, config: &Config) -> Self {
        Self {
            stream,
            buf: BytesMut::with_capacity(8 * 1024),
            config: config.clone(),
            peer_addr: peer_addr.into(),
        }
    }

    /// Get the peer address string
    pub fn peer_addr(&self) -> &str {
        &self.peer_addr
    }

    /// Give back the underlying stream
    pub fn into_inner(self) -> S {
        self.stream
    }

    /// Run the handshake and the whole conversation
    ///
    /// Always returns a terminal state; failures are states, not errors.
    pub fn run(&mut self, script: &Script) -> State {
        let mut conversation = Conversation::new(script);

        let version = match self.handshake(script) {
            Ok(version) => version,
            Err(e) => {
                tracing::error!("Handshake with {} failed: {}", self.peer_addr, e);
                conversation.fail(self.failure(e, Failure::Handshake));
                return conversation.into_state();
            }
        };

        while !conversation.is_terminal() {
            if conversation.is_sending_server() {
                self.play(&mut conversation, version);
            } else if conversation.is_awaiting_client() {
                self.receive(&mut conversation, version);
            } else {
                break;
            }
        }

        conversation.into_state()
    }

    /// Negotiate the protocol version
    fn handshake(&mut self, script: &Script) -> Result<BoltVersion> {
        let proposals = read_handshake(&mut self.stream)?;
        tracing::debug!("C: <MAGIC> {}", hex(&MAGIC));
        tracing::debug!(
            "C: <HANDSHAKE> {}",
            proposals
                .iter()
                .map(|w| format!("0x{:08X}", w))
                .collect::<Vec<_>>()
                .join(" ")
        );

        let version = match negotiate(&proposals, script.bolt_version()) {
            Ok(version) => version,
            Err(e) => {
                // Tell the client nothing fits before hanging up
                let _ = write_handshake_reply(&mut self.stream, &[0, 0, 0, 0]);
                return Err(e);
            }
        };

        let word = version.to_word().to_be_bytes();
        let reply = script.handshake_override().unwrap_or(&word);
        write_handshake_reply(&mut self.stream, reply)?;
        tracing::debug!("S: <HANDSHAKE> {}", hex(reply));
        tracing::info!("Negotiated protocol version {} with {}", version, self.peer_addr);

        Ok(version)
    }

    /// Read one client message and hand it to the engine
    fn receive(&mut self, conversation: &mut Conversation<'_>, version: BoltVersion) {
        let max = self.config.max_message_size;
        match read_message(&mut self.stream, &mut self.buf, version, Role::Client, max) {
            Ok(Some(message)) => {
                if let State::Failed(failure) = conversation.receive(message) {
                    tracing::error!("{}", failure);
                }
            }
            Ok(None) => self.disconnected(conversation),
            Err(e) if e.is_disconnect() => self.disconnected(conversation),
            Err(e) => {
                let failure = self.failure(e, Failure::Protocol);
                tracing::error!("{}", failure);
                conversation.fail(failure);
            }
        }
    }

    fn disconnected(&self, conversation: &mut Conversation<'_>) {
        tracing::debug!("C: <CLOSE> {}", self.peer_addr);
        if let State::Failed(failure) = conversation.disconnected() {
            tracing::error!("{}", failure);
        }
    }

    /// Perform every action of the current server block
    fn play(&mut self, conversation: &mut Conversation<'_>, version: BoltVersion) {
        let replies = conversation.replies().unwrap_or(&[]);

        for reply in replies {
            let outcome = match &reply.action {
                Action::Send(message) => {
                    match encode_message(version, Role::Server, message, self.config.max_chunk_size) {
                        Ok(bytes) => self.write(&bytes),
                        Err(e) => {
                            let failure = Failure::Protocol(format!(
                                "script line {}: {}",
                                reply.line_no, e
                            ));
                            tracing::error!("{}", failure);
                            conversation.fail(failure);
                            return;
                        }
                    }
                }
                Action::Raw(bytes) => self.write(bytes),
                Action::Noop => self.write(&[0, 0]),
                Action::Sleep(delay) => {
                    std::thread::sleep(*delay);
                    Ok(())
                }
                Action::Exit => {
                    tracing::debug!("S: <EXIT>");
                    conversation.exit();
                    return;
                }
            };

            if let Err(e) = outcome {
                tracing::error!("S: <GONE> {}", e);
                conversation.fail(Failure::WriteError(e.to_string()));
                return;
            }
            tracing::debug!("S: {}", reply);
        }

        conversation.replies_sent();
    }

    fn write(&mut self, bytes: &[u8]) -> Result<()> {
        self.stream.write_all(bytes)?;
        self.stream.flush()?;
        Ok(())
    }

    /// Turn a wire error into a conversation failure
    ///
    /// Expired deadlines become `Timeout`; everything else goes through
    /// `otherwise`.
    fn failure(&self, e: StubError, otherwise: fn(String) -> Failure) -> Failure {
        if e.is_timeout() {
            return Failure::Timeout(self.config.timeout.unwrap_or(Duration::ZERO));
        }
        match e {
            StubError::Handshake(reason) | StubError::Protocol(reason) => otherwise(reason),
            other => otherwise(other.to_string()),
        }
    }
}
