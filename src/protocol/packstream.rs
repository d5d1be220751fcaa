//! PackStream serialization
//!
//! Every value starts with a marker byte carrying its type and, for small
//! values, its size:
//!
//! ```text
//! C0          null
//! C2 / C3     false / true
//! 00..7F      tiny int 0..127         F0..FF  tiny int -16..-1
//! C8 C9 CA CB int8 / int16 / int32 / int64
//! C1          float64
//! 80..8F      string (size in nibble) D0 D1 D2  string (u8/u16/u32 size)
//! 90..9F      list                    D4 D5 D6  list
//! A0..AF      map                     D8 D9 DA  map
//! B0..BF      structure + tag byte    DC DD     structure (u8/u16 size)
//! ```
//!
//! All multi-byte numbers are big-endian.

use std::collections::btree_map::Entry;
use std::collections::BTreeMap;

use bytes::{Buf, BufMut, BytesMut};

use crate::error::{Result, StubError};
use super::Value;

/// Deepest nesting accepted on decode
pub const MAX_DEPTH: usize = 64;

// =============================================================================
// Encoding
// =============================================================================

/// Pack a single value into `buf`
pub fn encode_value(value: &Value, buf: &mut BytesMut) -> Result<()> {
    match value {
        Value::Null => buf.put_u8(0xC0),
        Value::Boolean(false) => buf.put_u8(0xC2),
        Value::Boolean(true) => buf.put_u8(0xC3),
        Value::Integer(i) => encode_integer(*i, buf),
        Value::Float(f) => {
            buf.put_u8(0xC1);
            buf.put_f64(*f);
        }
        Value::String(s) => {
            encode_size(s.len(), 0x80, [0xD0, 0xD1, 0xD2], buf, "string")?;
            buf.put_slice(s.as_bytes());
        }
        Value::List(items) => {
            encode_size(items.len(), 0x90, [0xD4, 0xD5, 0xD6], buf, "list")?;
            for item in items {
                encode_value(item, buf)?;
            }
        }
        Value::Map(entries) => {
            encode_size(entries.len(), 0xA0, [0xD8, 0xD9, 0xDA], buf, "map")?;
            for (key, item) in entries {
                encode_size(key.len(), 0x80, [0xD0, 0xD1, 0xD2], buf, "string")?;
                buf.put_slice(key.as_bytes());
                encode_value(item, buf)?;
            }
        }
        Value::Structure { tag, fields } => encode_structure(*tag, fields, buf)?,
    }
    Ok(())
}

/// Pack a structure header, tag byte and fields into `buf`
pub fn encode_structure(tag: u8, fields: &[Value], buf: &mut BytesMut) -> Result<()> {
    let size = fields.len();
    if size < 0x10 {
        buf.put_u8(0xB0 + size as u8);
    } else if size < 0x100 {
        buf.put_u8(0xDC);
        buf.put_u8(size as u8);
    } else if size < 0x10000 {
        buf.put_u8(0xDD);
        buf.put_u16(size as u16);
    } else {
        return Err(StubError::Protocol(format!(
            "Structure too large: {} fields",
            size
        )));
    }
    buf.put_u8(tag);
    for field in fields {
        encode_value(field, buf)?;
    }
    Ok(())
}

fn encode_integer(i: i64, buf: &mut BytesMut) {
    if (-0x10..0x80).contains(&i) {
        buf.put_i8(i as i8);
    } else if (-0x80..0x80).contains(&i) {
        buf.put_u8(0xC8);
        buf.put_i8(i as i8);
    } else if (-0x8000..0x8000).contains(&i) {
        buf.put_u8(0xC9);
        buf.put_i16(i as i16);
    } else if (-0x8000_0000..0x8000_0000).contains(&i) {
        buf.put_u8(0xCA);
        buf.put_i32(i as i32);
    } else {
        buf.put_u8(0xCB);
        buf.put_i64(i);
    }
}

/// Write a size header using the tiny marker or one of the u8/u16/u32 markers
fn encode_size(
    size: usize,
    tiny: u8,
    markers: [u8; 3],
    buf: &mut BytesMut,
    kind: &str,
) -> Result<()> {
    if size < 0x10 {
        buf.put_u8(tiny + size as u8);
    } else if size < 0x100 {
        buf.put_u8(markers[0]);
        buf.put_u8(size as u8);
    } else if size < 0x10000 {
        buf.put_u8(markers[1]);
        buf.put_u16(size as u16);
    } else if size <= u32::MAX as usize {
        buf.put_u8(markers[2]);
        buf.put_u32(size as u32);
    } else {
        return Err(StubError::Protocol(format!("{} too large: {}", kind, size)));
    }
    Ok(())
}

// =============================================================================
// Decoding
// =============================================================================

/// Unpack exactly one value from `bytes`
///
/// Trailing bytes after the value are a protocol error.
pub fn decode_value(bytes: &[u8]) -> Result<Value> {
    let mut buf = bytes;
    let value = decode_next(&mut buf, 0)?;
    if buf.has_remaining() {
        return Err(StubError::Protocol(format!(
            "{} trailing bytes after value",
            buf.remaining()
        )));
    }
    Ok(value)
}

/// Unpack the next value, advancing `buf` past it
pub fn decode_next(buf: &mut &[u8], depth: usize) -> Result<Value> {
    if depth > MAX_DEPTH {
        return Err(StubError::Protocol(format!(
            "Value nested deeper than {} levels",
            MAX_DEPTH
        )));
    }

    need(buf, 1)?;
    let marker = buf.get_u8();

    match marker {
        0xC0 => Ok(Value::Null),
        0xC2 => Ok(Value::Boolean(false)),
        0xC3 => Ok(Value::Boolean(true)),
        0x00..=0x7F => Ok(Value::Integer(marker as i64)),
        0xF0..=0xFF => Ok(Value::Integer(marker as i8 as i64)),
        0xC8 => {
            need(buf, 1)?;
            Ok(Value::Integer(buf.get_i8() as i64))
        }
        0xC9 => {
            need(buf, 2)?;
            Ok(Value::Integer(buf.get_i16() as i64))
        }
        0xCA => {
            need(buf, 4)?;
            Ok(Value::Integer(buf.get_i32() as i64))
        }
        0xCB => {
            need(buf, 8)?;
            Ok(Value::Integer(buf.get_i64()))
        }
        0xC1 => {
            need(buf, 8)?;
            Ok(Value::Float(buf.get_f64()))
        }
        0x80..=0x8F => decode_string(buf, (marker & 0x0F) as usize).map(Value::String),
        0xD0 | 0xD1 | 0xD2 => {
            let size = decode_size(buf, marker - 0xD0)?;
            decode_string(buf, size).map(Value::String)
        }
        0x90..=0x9F => decode_list(buf, (marker & 0x0F) as usize, depth),
        0xD4 | 0xD5 | 0xD6 => {
            let size = decode_size(buf, marker - 0xD4)?;
            decode_list(buf, size, depth)
        }
        0xA0..=0xAF => decode_map(buf, (marker & 0x0F) as usize, depth),
        0xD8 | 0xD9 | 0xDA => {
            let size = decode_size(buf, marker - 0xD8)?;
            decode_map(buf, size, depth)
        }
        0xB0..=0xBF => decode_structure(buf, (marker & 0x0F) as usize, depth),
        0xDC | 0xDD => {
            let size = decode_size(buf, marker - 0xDC)?;
            decode_structure(buf, size, depth)
        }
        _ => Err(StubError::Protocol(format!(
            "Unknown marker byte 0x{:02X}",
            marker
        ))),
    }
}

fn need(buf: &&[u8], n: usize) -> Result<()> {
    if buf.remaining() < n {
        return Err(StubError::Protocol(format!(
            "Truncated value: needed {} more bytes, got {}",
            n,
            buf.remaining()
        )));
    }
    Ok(())
}

/// Read a u8/u16/u32 size selected by `width` (0, 1, 2)
fn decode_size(buf: &mut &[u8], width: u8) -> Result<usize> {
    match width {
        0 => {
            need(buf, 1)?;
            Ok(buf.get_u8() as usize)
        }
        1 => {
            need(buf, 2)?;
            Ok(buf.get_u16() as usize)
        }
        _ => {
            need(buf, 4)?;
            Ok(buf.get_u32() as usize)
        }
    }
}

fn decode_string(buf: &mut &[u8], size: usize) -> Result<String> {
    need(buf, size)?;
    let text = std::str::from_utf8(&buf[..size])
        .map_err(|e| StubError::Protocol(format!("Invalid UTF-8 in string: {}", e)))?
        .to_string();
    buf.advance(size);
    Ok(text)
}

fn decode_list(buf: &mut &[u8], size: usize, depth: usize) -> Result<Value> {
    // Every item takes at least one byte, so a size beyond the buffer is bogus
    need(buf, size)?;
    let mut items = Vec::with_capacity(size);
    for _ in 0..size {
        items.push(decode_next(buf, depth + 1)?);
    }
    Ok(Value::List(items))
}

fn decode_map(buf: &mut &[u8], size: usize, depth: usize) -> Result<Value> {
    need(buf, size.saturating_mul(2))?;
    let mut entries = BTreeMap::new();
    for _ in 0..size {
        let key = match decode_next(buf, depth + 1)? {
            Value::String(key) => key,
            other => {
                return Err(StubError::Protocol(format!(
                    "Map key must be a string, got {}",
                    other.type_name()
                )))
            }
        };
        let value = decode_next(buf, depth + 1)?;
        match entries.entry(key) {
            Entry::Occupied(slot) => {
                return Err(StubError::Protocol(format!(
                    "Duplicate map key {:?}",
                    slot.key()
                )))
            }
            Entry::Vacant(slot) => {
                slot.insert(value);
            }
        }
    }
    Ok(Value::Map(entries))
}

fn decode_structure(buf: &mut &[u8], size: usize, depth: usize) -> Result<Value> {
    need(buf, 1)?;
    let tag = buf.get_u8();
    need(buf, size)?;
    let mut fields = Vec::with_capacity(size);
    for _ in 0..size {
        fields.push(decode_next(buf, depth + 1)?);
    }
    Ok(Value::Structure { tag, fields })
}
