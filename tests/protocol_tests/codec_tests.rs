//! Codec Tests
//!
//! Tests for the handshake, chunked framing and message encoding/decoding.

use std::io::Cursor;

use bytes::BytesMut;
use boltstub::protocol::codec::{encode_chunks, read_chunked, write_handshake_reply};
use boltstub::protocol::{
    decode_message, encode_message, negotiate, read_handshake, read_message, write_message,
    BoltVersion, Message, Role, Value, MAGIC, MAX_CHUNK_SIZE, MAX_MESSAGE_SIZE,
};
use boltstub::StubError;

// =============================================================================
// Helper Functions
// =============================================================================

fn handshake_bytes(magic: [u8; 4], proposals: [u32; 4]) -> Vec<u8> {
    let mut bytes = magic.to_vec();
    for word in proposals {
        bytes.extend_from_slice(&word.to_be_bytes());
    }
    bytes
}

fn run_message() -> Message {
    Message::new(
        "RUN",
        vec![Value::from("RETURN 1 AS x"), Value::Map(Default::default())],
    )
}

// =============================================================================
// Handshake Tests
// =============================================================================

#[test]
fn test_read_handshake() {
    let bytes = handshake_bytes(MAGIC, [0x0104, 0x0004, 0x0003, 0]);
    let proposals = read_handshake(&mut Cursor::new(bytes)).unwrap();
    assert_eq!(proposals, [0x0104, 0x0004, 0x0003, 0]);
}

#[test]
fn test_read_handshake_bad_magic() {
    let bytes = handshake_bytes([0x47, 0x45, 0x54, 0x20], [1, 0, 0, 0]);
    match read_handshake(&mut Cursor::new(bytes)) {
        Err(StubError::Handshake(msg)) => assert!(msg.contains("magic")),
        other => panic!("Expected handshake error, got {:?}", other),
    }
}

#[test]
fn test_read_handshake_truncated() {
    let mut bytes = handshake_bytes(MAGIC, [3, 0, 0, 0]);
    bytes.truncate(10);
    assert!(matches!(
        read_handshake(&mut Cursor::new(bytes)),
        Err(StubError::Handshake(_))
    ));
}

#[test]
fn test_negotiate_picks_highest_supported() {
    let version = negotiate(&[0x0003, 0x0104, 0x0002, 0], None).unwrap();
    assert_eq!(version, BoltVersion::V4_1);

    // 5.0 is not spoken, so 4.0 wins
    let version = negotiate(&[0x0005, 0x0004, 0, 0], None).unwrap();
    assert_eq!(version, BoltVersion::V4_0);
}

#[test]
fn test_negotiate_nothing_supported() {
    let result = negotiate(&[0x0005, 0x0006, 0, 0], None);
    assert!(matches!(result, Err(StubError::Handshake(_))));

    let result = negotiate(&[0, 0, 0, 0], None);
    assert!(matches!(result, Err(StubError::Handshake(_))));
}

#[test]
fn test_negotiate_fixed_version() {
    let version = negotiate(&[0x0104, 0x0003, 0, 0], Some(BoltVersion::V3)).unwrap();
    assert_eq!(version, BoltVersion::V3);

    let result = negotiate(&[0x0104, 0x0004, 0, 0], Some(BoltVersion::V2));
    assert!(matches!(result, Err(StubError::Handshake(_))));
}

#[test]
fn test_version_words() {
    assert_eq!(BoltVersion::V4_1.to_word(), 0x0000_0104);
    assert_eq!(BoltVersion::from_word(0x0000_0104), Some(BoltVersion::V4_1));
    assert_eq!(BoltVersion::from_word(0), None);
    assert_eq!("4.1".parse::<BoltVersion>().unwrap(), BoltVersion::V4_1);
    assert_eq!("3".parse::<BoltVersion>().unwrap(), BoltVersion::V3);
    assert!("three".parse::<BoltVersion>().is_err());
}

#[test]
fn test_write_handshake_reply() {
    let mut out = Vec::new();
    write_handshake_reply(&mut out, &BoltVersion::V3.to_word().to_be_bytes()).unwrap();
    assert_eq!(out, vec![0, 0, 0, 3]);
}

// =============================================================================
// Chunking Tests
// =============================================================================

#[test]
fn test_encode_chunks_splits_and_terminates() {
    let mut out = BytesMut::new();
    encode_chunks(&[1, 2, 3, 4, 5], 2, &mut out);
    assert_eq!(
        out.to_vec(),
        vec![0, 2, 1, 2, 0, 2, 3, 4, 0, 1, 5, 0, 0]
    );
}

#[test]
fn test_read_chunked_reassembles() {
    let bytes = vec![0, 2, 1, 2, 0, 1, 3, 0, 0];
    let mut buf = BytesMut::new();
    let got = read_chunked(&mut Cursor::new(bytes), &mut buf, MAX_MESSAGE_SIZE).unwrap();
    assert!(got);
    assert_eq!(buf.to_vec(), vec![1, 2, 3]);
}

#[test]
fn test_read_chunked_skips_noop() {
    let bytes = vec![0, 0, 0, 0, 0, 1, 9, 0, 0];
    let mut buf = BytesMut::new();
    assert!(read_chunked(&mut Cursor::new(bytes), &mut buf, MAX_MESSAGE_SIZE).unwrap());
    assert_eq!(buf.to_vec(), vec![9]);
}

#[test]
fn test_read_chunked_clean_close() {
    let mut buf = BytesMut::new();
    let got = read_chunked(&mut Cursor::new(Vec::new()), &mut buf, MAX_MESSAGE_SIZE).unwrap();
    assert!(!got);
}

#[test]
fn test_read_chunked_truncated() {
    let bytes = vec![0, 4, 1, 2];
    let mut buf = BytesMut::new();
    let result = read_chunked(&mut Cursor::new(bytes), &mut buf, MAX_MESSAGE_SIZE);
    assert!(matches!(result, Err(StubError::Protocol(_))));

    // Missing terminator
    let bytes = vec![0, 1, 1];
    let result = read_chunked(&mut Cursor::new(bytes), &mut buf, MAX_MESSAGE_SIZE);
    assert!(matches!(result, Err(StubError::Protocol(_))));
}

#[test]
fn test_read_chunked_oversized() {
    let bytes = vec![0, 8, 1, 2, 3, 4, 5, 6, 7, 8, 0, 0];
    let mut buf = BytesMut::new();
    let result = read_chunked(&mut Cursor::new(bytes), &mut buf, 4);
    assert!(matches!(result, Err(StubError::Protocol(_))));
}

// =============================================================================
// Message Encoding/Decoding Tests
// =============================================================================

#[test]
fn test_encode_message_bytes() {
    let message = Message::new("PULL_ALL", vec![]);
    let bytes = encode_message(BoltVersion::V3, Role::Client, &message, MAX_CHUNK_SIZE).unwrap();
    assert_eq!(bytes.to_vec(), vec![0x00, 0x02, 0xB0, 0x3F, 0x00, 0x00]);
}

#[test]
fn test_encode_message_unknown_for_version() {
    let message = Message::new("HELLO", vec![]);
    let result = encode_message(BoltVersion::V1, Role::Client, &message, MAX_CHUNK_SIZE);
    assert!(matches!(result, Err(StubError::Protocol(_))));
}

#[test]
fn test_message_round_trip_over_stream() {
    let mut wire = Vec::new();
    write_message(&mut wire, BoltVersion::V3, Role::Client, &run_message(), 3).unwrap();
    write_message(
        &mut wire,
        BoltVersion::V3,
        Role::Client,
        &Message::new("PULL_ALL", vec![]),
        MAX_CHUNK_SIZE,
    )
    .unwrap();

    let mut reader = Cursor::new(wire);
    let mut buf = BytesMut::new();
    let first = read_message(&mut reader, &mut buf, BoltVersion::V3, Role::Client, MAX_MESSAGE_SIZE)
        .unwrap()
        .unwrap();
    let second = read_message(&mut reader, &mut buf, BoltVersion::V3, Role::Client, MAX_MESSAGE_SIZE)
        .unwrap()
        .unwrap();
    let end = read_message(&mut reader, &mut buf, BoltVersion::V3, Role::Client, MAX_MESSAGE_SIZE)
        .unwrap();

    assert_eq!(first, run_message());
    assert_eq!(second.name, "PULL_ALL");
    assert!(end.is_none());
}

#[test]
fn test_decode_message_names_depend_on_version() {
    let payload = [0xB1, 0x3F, 0xA0];
    let v4 = decode_message(BoltVersion::V4_0, Role::Client, &payload).unwrap();
    assert_eq!(v4.name, "PULL");

    let payload = [0xB0, 0x3F];
    let v3 = decode_message(BoltVersion::V3, Role::Client, &payload).unwrap();
    assert_eq!(v3.name, "PULL_ALL");

    let payload = [0xB2, 0x01, 0x80, 0xA0];
    let v1 = decode_message(BoltVersion::V1, Role::Client, &payload).unwrap();
    assert_eq!(v1.name, "INIT");
}

#[test]
fn test_decode_message_unknown_tag() {
    let result = decode_message(BoltVersion::V3, Role::Client, &[0xB0, 0x55]);
    assert!(matches!(result, Err(StubError::Protocol(_))));

    // Server tags are not client messages
    let result = decode_message(BoltVersion::V3, Role::Client, &[0xB1, 0x70, 0xA0]);
    assert!(matches!(result, Err(StubError::Protocol(_))));
}

#[test]
fn test_decode_message_not_a_structure() {
    let result = decode_message(BoltVersion::V3, Role::Client, &[0x01]);
    assert!(matches!(result, Err(StubError::Protocol(_))));
}

#[test]
fn test_message_display_matches_script_syntax() {
    assert_eq!(run_message().to_string(), r#"RUN "RETURN 1 AS x" {}"#);
    assert_eq!(Message::new("PULL_ALL", vec![]).to_string(), "PULL_ALL");
}
