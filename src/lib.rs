//! # boltstub
//!
//! A scriptable stub Bolt server for testing database client drivers:
//! - Handshake and version negotiation (Bolt 1 to 4.1)
//! - Chunked PackStream message framing
//! - A small script language describing the expected conversation
//! - A matching engine that plays the server side of the script
//! - Exit status as the pass/fail signal
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    Script (parsed once)                     │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │
//! ┌─────────────────────▼───────────────────────────────────────┐
//! │                StubServer (one accept)                      │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │
//! ┌─────────────────────▼───────────────────────────────────────┐
//! │          Connection ◄──────► Conversation (engine)          │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │
//!          ┌────────────┴────────────┐
//!          ▼                         ▼
//!   ┌─────────────┐          ┌─────────────┐
//!   │    Codec    │          │ PackStream  │
//!   │ (handshake, │          │  (values)   │
//!   │   chunks)   │          └─────────────┘
//!   └─────────────┘
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod config;

pub mod protocol;
pub mod script;
pub mod engine;
pub mod network;
pub mod exit;

// =============================================================================
// Public API Re-exports
// =============================================================================

pub use error::{Result, StubError};
pub use config::Config;
pub use engine::{Conversation, Failure, State};
pub use exit::ExitStatus;
pub use network::StubServer;
pub use script::Script;

// =============================================================================
// Version Info
// =============================================================================

/// Current version of boltstub
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Bind, accept one client and play `script` against it
pub fn serve(config: Config, script: &Script) -> Result<State> {
    StubServer::bind(config)?.run(script)
}
