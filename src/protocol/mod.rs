//! Protocol Module
//!
//! The Bolt wire protocol as seen from the server side.
//!
//! ## Layers
//! - `value`:      the PackStream value model
//! - `packstream`: value ↔ bytes
//! - `message`:    versions and message name ↔ tag tables
//! - `codec`:      handshake and chunked message framing
//!
//! ## Message Tags (client → server)
//! - 0x01: INIT (v1, v2) / HELLO (v3+)
//! - 0x02: GOODBYE (v3+)
//! - 0x0E: ACK_FAILURE (v1, v2)
//! - 0x0F: RESET
//! - 0x10: RUN
//! - 0x11..0x13: BEGIN, COMMIT, ROLLBACK (v3+)
//! - 0x2F: DISCARD_ALL / DISCARD (v4+)
//! - 0x3F: PULL_ALL / PULL (v4+)
//!
//! ## Message Tags (server → client)
//! - 0x70: SUCCESS
//! - 0x71: RECORD
//! - 0x7E: IGNORED
//! - 0x7F: FAILURE

mod value;
mod message;
pub mod packstream;
pub mod codec;

pub use value::Value;
pub use message::{is_known_name, BoltVersion, Message, Role};
pub use codec::{
    decode_message, encode_message, negotiate, read_handshake, read_message, write_message,
    MAGIC, MAX_CHUNK_SIZE, MAX_MESSAGE_SIZE,
};
