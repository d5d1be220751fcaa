//! Protocol codec
//!
//! Handshake, chunked framing and message encoding/decoding.
//!
//! ## Handshake
//! ```text
//! client: ┌────────────────┬──────────┬──────────┬──────────┬──────────┐
//!         │ 60 60 B0 17    │ proposal │ proposal │ proposal │ proposal │
//!         └────────────────┴──────────┴──────────┴──────────┴──────────┘
//! server: ┌──────────┐
//!         │ chosen   │   (00 00 00 00 if nothing fits)
//!         └──────────┘
//! ```
//!
//! ## Chunked Message Format
//! ```text
//! ┌─────────┬───────────────┬─────────┬───────────────┬───────┐
//! │ Len (2) │    Chunk      │ Len (2) │    Chunk      │ 00 00 │
//! └─────────┴───────────────┴─────────┴───────────────┴───────┘
//! ```
//! The chunk payloads concatenate to one PackStream structure.

use std::io::{ErrorKind, Read, Write};

use bytes::{BufMut, BytesMut};

use crate::error::{Result, StubError};
use super::message::{BoltVersion, Message, Role};
use super::packstream::{decode_value, encode_structure};
use super::Value;

/// Preamble every client sends before its version proposals
pub const MAGIC: [u8; 4] = [0x60, 0x60, 0xB0, 0x17];

/// Largest payload a single chunk can carry
pub const MAX_CHUNK_SIZE: usize = 0xFFFF;

/// Maximum assembled message size (16 MB)
pub const MAX_MESSAGE_SIZE: usize = 16 * 1024 * 1024;

// =============================================================================
// Handshake
// =============================================================================

/// Read the magic preamble and the four version proposals
pub fn read_handshake<R: Read>(reader: &mut R) -> Result<[u32; 4]> {
    let mut magic = [0u8; 4];
    reader.read_exact(&mut magic).map_err(handshake_eof)?;
    if magic != MAGIC {
        return Err(StubError::Handshake(format!(
            "Bad magic preamble: {}",
            hex(&magic)
        )));
    }

    let mut raw = [0u8; 16];
    reader.read_exact(&mut raw).map_err(handshake_eof)?;

    let mut proposals = [0u32; 4];
    for (i, word) in proposals.iter_mut().enumerate() {
        *word = u32::from_be_bytes([raw[i * 4], raw[i * 4 + 1], raw[i * 4 + 2], raw[i * 4 + 3]]);
    }
    Ok(proposals)
}

/// Choose the version to speak
///
/// With `fixed` set, that version must be among the proposals. Otherwise the
/// highest supported proposal wins.
pub fn negotiate(proposals: &[u32; 4], fixed: Option<BoltVersion>) -> Result<BoltVersion> {
    let offered: Vec<BoltVersion> = proposals
        .iter()
        .filter_map(|w| BoltVersion::from_word(*w))
        .collect();

    match fixed {
        Some(version) if offered.contains(&version) => Ok(version),
        Some(version) => Err(StubError::Handshake(format!(
            "Script protocol version {} not offered by client (offered {})",
            version,
            describe(&offered)
        ))),
        None => offered
            .iter()
            .copied()
            .filter(|v| v.is_supported())
            .max()
            .ok_or_else(|| {
                StubError::Handshake(format!(
                    "No supported protocol version offered (offered {})",
                    describe(&offered)
                ))
            }),
    }
}

/// Write the handshake reply bytes
pub fn write_handshake_reply<W: Write>(writer: &mut W, reply: &[u8]) -> Result<()> {
    writer.write_all(reply)?;
    writer.flush()?;
    Ok(())
}

fn describe(versions: &[BoltVersion]) -> String {
    if versions.is_empty() {
        return "nothing".to_string();
    }
    versions
        .iter()
        .map(|v| v.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

fn handshake_eof(e: std::io::Error) -> StubError {
    if e.kind() == ErrorKind::UnexpectedEof {
        StubError::Handshake("Connection closed during handshake".to_string())
    } else {
        StubError::Io(e)
    }
}

// =============================================================================
// Message Encoding/Decoding
// =============================================================================

/// Encode a message as a chunked byte sequence ready for the wire
pub fn encode_message(
    version: BoltVersion,
    role: Role,
    message: &Message,
    max_chunk_size: usize,
) -> Result<BytesMut> {
    let tag = version.tag_for(role, &message.name).ok_or_else(|| {
        StubError::Protocol(format!(
            "Message {} not available in protocol version {}",
            message.name, version
        ))
    })?;

    let mut payload = BytesMut::new();
    encode_structure(tag, &message.fields, &mut payload)?;

    let mut out = BytesMut::with_capacity(payload.len() + 4);
    encode_chunks(&payload, max_chunk_size, &mut out);
    Ok(out)
}

/// Split `payload` into chunks of at most `max_chunk_size` and terminate
pub fn encode_chunks(payload: &[u8], max_chunk_size: usize, out: &mut BytesMut) {
    let max = max_chunk_size.clamp(1, MAX_CHUNK_SIZE);
    for chunk in payload.chunks(max) {
        out.put_u16(chunk.len() as u16);
        out.put_slice(chunk);
    }
    out.put_u16(0);
}

/// Decode an assembled payload into a named message
pub fn decode_message(version: BoltVersion, role: Role, payload: &[u8]) -> Result<Message> {
    match decode_value(payload)? {
        Value::Structure { tag, fields } => {
            let name = version.name_for(role, tag).ok_or_else(|| {
                StubError::Protocol(format!(
                    "Unknown message tag 0x{:02X} for protocol version {}",
                    tag, version
                ))
            })?;
            Ok(Message::new(name, fields))
        }
        other => Err(StubError::Protocol(format!(
            "Expected a message structure, got {}",
            other.type_name()
        ))),
    }
}

// =============================================================================
// Stream-based I/O helpers
// =============================================================================

/// Read one chunked message payload into `buf`
///
/// Returns `Ok(false)` if the peer closed cleanly before the first byte of a
/// message. Zero-length chunks ahead of a message are keep-alives and are
/// skipped. A close in the middle of a message is a protocol error.
pub fn read_chunked<R: Read>(
    reader: &mut R,
    buf: &mut BytesMut,
    max_message_size: usize,
) -> Result<bool> {
    buf.clear();
    let mut header = [0u8; 2];

    loop {
        if buf.is_empty() {
            if !read_first_byte(reader, &mut header[..1])? {
                return Ok(false);
            }
            reader.read_exact(&mut header[1..]).map_err(truncated)?;
        } else {
            reader.read_exact(&mut header).map_err(truncated)?;
        }

        let chunk_size = u16::from_be_bytes(header) as usize;
        if chunk_size == 0 {
            if buf.is_empty() {
                tracing::trace!("C: <NOOP>");
                continue;
            }
            return Ok(true);
        }

        if buf.len() + chunk_size > max_message_size {
            return Err(StubError::Protocol(format!(
                "Message too large: more than {} bytes",
                max_message_size
            )));
        }

        let start = buf.len();
        buf.resize(start + chunk_size, 0);
        reader.read_exact(&mut buf[start..]).map_err(truncated)?;
    }
}

/// Read and decode one message sent by `role`
///
/// Returns `Ok(None)` on a clean close at a message boundary.
pub fn read_message<R: Read>(
    reader: &mut R,
    buf: &mut BytesMut,
    version: BoltVersion,
    role: Role,
    max_message_size: usize,
) -> Result<Option<Message>> {
    if !read_chunked(reader, buf, max_message_size)? {
        return Ok(None);
    }
    decode_message(version, role, &buf[..]).map(Some)
}

/// Encode and write one message
pub fn write_message<W: Write>(
    writer: &mut W,
    version: BoltVersion,
    role: Role,
    message: &Message,
    max_chunk_size: usize,
) -> Result<()> {
    let bytes = encode_message(version, role, message, max_chunk_size)?;
    writer.write_all(&bytes)?;
    writer.flush()?;
    Ok(())
}

fn read_first_byte<R: Read>(reader: &mut R, byte: &mut [u8]) -> Result<bool> {
    loop {
        match reader.read(byte) {
            Ok(0) => return Ok(false),
            Ok(_) => return Ok(true),
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(e.into()),
        }
    }
}

fn truncated(e: std::io::Error) -> StubError {
    if e.kind() == ErrorKind::UnexpectedEof {
        StubError::Protocol("Truncated chunk: connection closed mid-message".to_string())
    } else {
        StubError::Io(e)
    }
}

/// Render bytes as space-separated hex for logs
pub fn hex(bytes: &[u8]) -> String {
    bytes
        .iter()
        .map(|b| format!("{:02X}", b))
        .collect::<Vec<_>>()
        .join(" ")
}
