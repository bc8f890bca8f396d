use std::io::Cursor;

use chrono::{FixedOffset, TimeZone, Timelike};

use ajfs::codec::{
    decode_timestamp, encode_timestamp, read_bytes, read_string, read_varint, write_bytes,
    write_string, write_varint, TIMESTAMP_LEN,
};
use ajfs::common::{AjfsError, AjfsResult};

#[test]
fn test_varint_round_trip() -> AjfsResult<()> {
    for value in [0u64, 1, 127, 128, 300, 16_384, u32::MAX as u64, u64::MAX] {
        let mut buffer = Vec::new();
        write_varint(&mut buffer, value)?;
        let decoded = read_varint(&mut Cursor::new(&buffer))?;
        assert_eq!(value, decoded);
    }
    // Single-byte values stay single-byte.
    let mut buffer = Vec::new();
    write_varint(&mut buffer, 127)?;
    assert_eq!(1, buffer.len());
    Ok(())
}

#[test]
fn test_varint_rejects_overlong_encodings() {
    let overlong = [0xffu8; 11];
    match read_varint(&mut Cursor::new(&overlong)) {
        Err(AjfsError::InvalidFormat(_)) => {}
        other => panic!("expected InvalidFormat, got {other:?}"),
    }
}

#[test]
fn test_framed_strings() -> AjfsResult<()> {
    let mut buffer = Vec::new();
    write_string(&mut buffer, "quick/brown 🦊.txt")?;
    write_bytes(&mut buffer, &[1, 2, 3])?;
    let mut cursor = Cursor::new(&buffer);
    assert_eq!("quick/brown 🦊.txt", read_string(&mut cursor, 1024)?);
    assert_eq!(vec![1, 2, 3], read_bytes(&mut cursor, 1024)?);
    Ok(())
}

#[test]
fn test_framed_length_limit() {
    let mut buffer = Vec::new();
    write_bytes(&mut buffer, &[0u8; 100]).unwrap();
    match read_bytes(&mut Cursor::new(&buffer), 10) {
        Err(AjfsError::InvalidFormat(_)) => {}
        other => panic!("expected InvalidFormat, got {other:?}"),
    }
}

#[test]
fn test_timestamp_round_trip() -> AjfsResult<()> {
    let timestamp = FixedOffset::east_opt(2 * 3600 + 1800)
        .unwrap()
        .with_ymd_and_hms(1999, 12, 31, 23, 59, 58)
        .unwrap()
        .with_nanosecond(987_654_321)
        .unwrap();
    let encoded = encode_timestamp(&timestamp);
    assert_eq!(TIMESTAMP_LEN, encoded.len());
    let decoded = decode_timestamp(&encoded)?;
    assert_eq!(timestamp, decoded);
    // The offset survives, not just the instant.
    assert_eq!(timestamp.offset(), decoded.offset());
    Ok(())
}

#[test]
fn test_timestamp_rejects_bad_input() {
    assert!(decode_timestamp(&[0u8; 3]).is_err());
    let mut garbage = [0u8; TIMESTAMP_LEN];
    garbage[2] = 13; // no thirteenth month
    garbage[3] = 1;
    assert!(decode_timestamp(&garbage).is_err());
}
