//! PackStream Tests
//!
//! These tests verify:
//! - Smallest-representation encoding for each marker family
//! - decode(encode(v)) == v across all value kinds
//! - Equality rules (int vs float, map order)
//! - Rejection of malformed input

use std::collections::BTreeMap;

use bytes::BytesMut;
use boltstub::protocol::packstream::{decode_value, encode_value};
use boltstub::protocol::Value;
use boltstub::StubError;

// =============================================================================
// Helper Functions
// =============================================================================

fn encode(value: &Value) -> Vec<u8> {
    let mut buf = BytesMut::new();
    encode_value(value, &mut buf).unwrap();
    buf.to_vec()
}

fn map(entries: &[(&str, Value)]) -> Value {
    Value::Map(
        entries
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect::<BTreeMap<_, _>>(),
    )
}

fn assert_protocol_error(bytes: &[u8]) {
    match decode_value(bytes) {
        Err(StubError::Protocol(_)) => {}
        other => panic!("Expected protocol error for {:02X?}, got {:?}", bytes, other),
    }
}

// =============================================================================
// Encoding Tests
// =============================================================================

#[test]
fn test_encode_scalars() {
    assert_eq!(encode(&Value::Null), vec![0xC0]);
    assert_eq!(encode(&Value::Boolean(true)), vec![0xC3]);
    assert_eq!(encode(&Value::Boolean(false)), vec![0xC2]);
    assert_eq!(
        encode(&Value::Float(1.1)),
        vec![0xC1, 0x3F, 0xF1, 0x99, 0x99, 0x99, 0x99, 0x99, 0x9A]
    );
}

#[test]
fn test_encode_integers_use_smallest_marker() {
    assert_eq!(encode(&Value::Integer(1)), vec![0x01]);
    assert_eq!(encode(&Value::Integer(127)), vec![0x7F]);
    assert_eq!(encode(&Value::Integer(-16)), vec![0xF0]);
    assert_eq!(encode(&Value::Integer(-17)), vec![0xC8, 0xEF]);
    assert_eq!(encode(&Value::Integer(128)), vec![0xC9, 0x00, 0x80]);
    assert_eq!(encode(&Value::Integer(-129)), vec![0xC9, 0xFF, 0x7F]);
    assert_eq!(
        encode(&Value::Integer(32_768)),
        vec![0xCA, 0x00, 0x00, 0x80, 0x00]
    );
    assert_eq!(
        encode(&Value::Integer(2_147_483_648)),
        vec![0xCB, 0x00, 0x00, 0x00, 0x00, 0x80, 0x00, 0x00, 0x00]
    );
}

#[test]
fn test_encode_strings() {
    assert_eq!(encode(&Value::from("")), vec![0x80]);
    assert_eq!(encode(&Value::from("A")), vec![0x81, 0x41]);

    let sixteen = "a".repeat(16);
    let bytes = encode(&Value::from(sixteen.as_str()));
    assert_eq!(&bytes[..2], &[0xD0, 0x10]);
    assert_eq!(bytes.len(), 18);

    let long = "a".repeat(256);
    let bytes = encode(&Value::from(long.as_str()));
    assert_eq!(&bytes[..3], &[0xD1, 0x01, 0x00]);
}

#[test]
fn test_encode_string_size_counts_utf8_bytes() {
    // "é" is two bytes in UTF-8
    assert_eq!(encode(&Value::from("é")), vec![0x82, 0xC3, 0xA9]);
}

#[test]
fn test_encode_containers() {
    assert_eq!(
        encode(&Value::List(vec![Value::Integer(1), Value::Integer(2), Value::Integer(3)])),
        vec![0x93, 0x01, 0x02, 0x03]
    );
    assert_eq!(
        encode(&map(&[("x", Value::Integer(1))])),
        vec![0xA1, 0x81, 0x78, 0x01]
    );
    assert_eq!(
        encode(&Value::Structure {
            tag: 0x3F,
            fields: vec![]
        }),
        vec![0xB0, 0x3F]
    );
}

#[test]
fn test_encode_large_list_uses_sized_marker() {
    let items = vec![Value::Null; 20];
    let bytes = encode(&Value::List(items));
    assert_eq!(&bytes[..2], &[0xD4, 20]);
    assert_eq!(bytes.len(), 22);
}

// =============================================================================
// Round-Trip Tests
// =============================================================================

#[test]
fn test_round_trip_all_kinds() {
    let values = vec![
        Value::Null,
        Value::Boolean(true),
        Value::Integer(0),
        Value::Integer(-16),
        Value::Integer(-17),
        Value::Integer(i64::MIN),
        Value::Integer(i64::MAX),
        Value::Float(-0.5),
        Value::Float(f64::MAX),
        Value::from("hello, world"),
        Value::from("x".repeat(70_000)),
        Value::List(vec![]),
        Value::List((0..300).map(Value::Integer).collect()),
        map(&[]),
        map(&[
            ("name", Value::from("Alice")),
            ("tags", Value::List(vec![Value::from("a"), Value::Null])),
            ("nested", map(&[("deep", Value::Float(2.5))])),
        ]),
        Value::Structure {
            tag: 0x4E,
            fields: vec![
                Value::Integer(1),
                Value::List(vec![Value::from("Person")]),
                map(&[("age", Value::Integer(33))]),
            ],
        },
    ];

    for value in values {
        let bytes = encode(&value);
        let decoded = decode_value(&bytes).unwrap();
        assert_eq!(decoded, value);
    }
}

// =============================================================================
// Equality Tests
// =============================================================================

#[test]
fn test_integer_never_equals_float() {
    assert_ne!(Value::Integer(1), Value::Float(1.0));
    assert_ne!(decode_value(&[0x01]).unwrap(), Value::Float(1.0));
}

#[test]
fn test_map_equality_ignores_order() {
    let a = map(&[("a", Value::Integer(1)), ("b", Value::Integer(2))]);
    let b = map(&[("b", Value::Integer(2)), ("a", Value::Integer(1))]);
    assert_eq!(a, b);
}

#[test]
fn test_list_equality_is_ordered() {
    let a = Value::List(vec![Value::Integer(1), Value::Integer(2)]);
    let b = Value::List(vec![Value::Integer(2), Value::Integer(1)]);
    assert_ne!(a, b);
}

// =============================================================================
// Error Handling Tests
// =============================================================================

#[test]
fn test_decode_unknown_marker() {
    assert_protocol_error(&[0xE0]);
    assert_protocol_error(&[0xC4]);
}

#[test]
fn test_decode_truncated() {
    assert_protocol_error(&[]);
    assert_protocol_error(&[0xC9, 0x00]);
    assert_protocol_error(&[0x85, b'a', b'b']);
    assert_protocol_error(&[0x92, 0x01]);
    assert_protocol_error(&[0xB1]);
}

#[test]
fn test_decode_invalid_utf8() {
    assert_protocol_error(&[0x82, 0xFF, 0xFE]);
}

#[test]
fn test_decode_non_string_map_key() {
    assert_protocol_error(&[0xA1, 0x01, 0x02]);
}

#[test]
fn test_decode_duplicate_map_key() {
    // {"a": 1, "a": 2}
    assert_protocol_error(&[0xA2, 0x81, b'a', 0x01, 0x81, b'a', 0x02]);

    // Same shape with distinct keys is fine
    let value = decode_value(&[0xA2, 0x81, b'a', 0x01, 0x81, b'b', 0x02]).unwrap();
    assert_eq!(
        value,
        map(&[("a", Value::Integer(1)), ("b", Value::Integer(2))])
    );
}

#[test]
fn test_decode_trailing_bytes() {
    assert_protocol_error(&[0x01, 0x02]);
}

#[test]
fn test_decode_bogus_size_does_not_allocate() {
    // Claims 4 billion items with nothing behind it
    assert_protocol_error(&[0xD6, 0xFF, 0xFF, 0xFF, 0xFF]);
}

// =============================================================================
// Display Tests
// =============================================================================

#[test]
fn test_display_renders_json() {
    let value = Value::List(vec![Value::from("x"), Value::Integer(1), Value::Null]);
    assert_eq!(value.to_string(), r#"["x",1,null]"#);
    assert_eq!(Value::Float(1.5).to_string(), "1.5");
}
