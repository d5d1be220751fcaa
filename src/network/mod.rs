//! Network Module
//!
//! TCP listener and client connection handling.
//!
//! ## Architecture
//! - One listening socket, one accepted client, no worker threads
//! - Blocking I/O with the inactivity timeout as the only deadline
//! - Messages routed through the conversation engine

mod server;
mod connection;

pub use server::StubServer;
pub use connection::Connection;
