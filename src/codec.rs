//! # Variable-Data Codec
//!
//! Length-prefixed framing used inside database records. Every variable field
//! is written as `varint(len) || bytes` where the varint is an unsigned
//! LEB128. The module also provides the fixed little-endian integer helpers
//! and the 15-byte portable timestamp encoding shared by all records.

use std::io::{Read, Write};

use chrono::{DateTime, FixedOffset, NaiveDate, Offset, TimeZone, Timelike};

use crate::common::{AjfsError, AjfsResult};

/// Size in bytes of the serialized timestamp.
pub const TIMESTAMP_LEN: usize = 15;

/// Writes an unsigned LEB128 varint.
pub fn write_varint<W: Write>(writer: &mut W, mut value: u64) -> AjfsResult<()> {
    loop {
        let mut byte = (value & 0x7f) as u8;
        value >>= 7;
        if value != 0 {
            byte |= 0x80;
        }
        writer.write_all(&[byte])?;
        if value == 0 {
            return Ok(());
        }
    }
}

/// Reads an unsigned LEB128 varint.
///
/// Fails with `InvalidFormat` if the encoding exceeds 10 bytes (the maximum
/// for a 64-bit value).
pub fn read_varint<R: Read>(reader: &mut R) -> AjfsResult<u64> {
    let mut value: u64 = 0;
    let mut shift = 0u32;
    loop {
        let mut byte = [0u8; 1];
        reader.read_exact(&mut byte)?;
        if shift >= 64 {
            return Err(AjfsError::InvalidFormat("varint too long".into()));
        }
        value |= u64::from(byte[0] & 0x7f) << shift;
        if byte[0] & 0x80 == 0 {
            return Ok(value);
        }
        shift += 7;
    }
}

/// Writes a length-prefixed byte string.
pub fn write_bytes<W: Write>(writer: &mut W, bytes: &[u8]) -> AjfsResult<()> {
    write_varint(writer, bytes.len() as u64)?;
    writer.write_all(bytes)?;
    Ok(())
}

/// Reads a length-prefixed byte string.
///
/// `max_len` guards against decoding a corrupt length prefix as a huge
/// allocation.
pub fn read_bytes<R: Read>(reader: &mut R, max_len: u64) -> AjfsResult<Vec<u8>> {
    let len = read_varint(reader)?;
    if len > max_len {
        return Err(AjfsError::InvalidFormat(format!(
            "field length {len} exceeds limit {max_len}"
        )));
    }
    let mut buffer = vec![0u8; len as usize];
    reader.read_exact(&mut buffer)?;
    Ok(buffer)
}

/// Writes a length-prefixed UTF-8 string.
pub fn write_string<W: Write>(writer: &mut W, value: &str) -> AjfsResult<()> {
    write_bytes(writer, value.as_bytes())
}

/// Reads a length-prefixed UTF-8 string.
pub fn read_string<R: Read>(reader: &mut R, max_len: u64) -> AjfsResult<String> {
    let bytes = read_bytes(reader, max_len)?;
    String::from_utf8(bytes).map_err(|e| AjfsError::InvalidFormat(format!("invalid UTF-8: {e}")))
}

pub fn write_u16<W: Write>(writer: &mut W, value: u16) -> AjfsResult<()> {
    writer.write_all(&value.to_le_bytes())?;
    Ok(())
}

pub fn write_u32<W: Write>(writer: &mut W, value: u32) -> AjfsResult<()> {
    writer.write_all(&value.to_le_bytes())?;
    Ok(())
}

pub fn write_u64<W: Write>(writer: &mut W, value: u64) -> AjfsResult<()> {
    writer.write_all(&value.to_le_bytes())?;
    Ok(())
}

pub fn read_u16<R: Read>(reader: &mut R) -> AjfsResult<u16> {
    let mut buffer = [0u8; 2];
    reader.read_exact(&mut buffer)?;
    Ok(u16::from_le_bytes(buffer))
}

pub fn read_u32<R: Read>(reader: &mut R) -> AjfsResult<u32> {
    let mut buffer = [0u8; 4];
    reader.read_exact(&mut buffer)?;
    Ok(u32::from_le_bytes(buffer))
}

pub fn read_u64<R: Read>(reader: &mut R) -> AjfsResult<u64> {
    let mut buffer = [0u8; 8];
    reader.read_exact(&mut buffer)?;
    Ok(u64::from_le_bytes(buffer))
}

/// Serializes a timezone-aware timestamp into its 15-byte portable form:
/// year (i16 LE), month, day, hour, minute, second (u8 each), nanoseconds
/// (u32 LE) and the UTC offset in seconds (i32 LE).
pub fn encode_timestamp(timestamp: &DateTime<FixedOffset>) -> [u8; TIMESTAMP_LEN] {
    use chrono::Datelike;
    let mut buffer = [0u8; TIMESTAMP_LEN];
    buffer[0..2].copy_from_slice(&(timestamp.year() as i16).to_le_bytes());
    buffer[2] = timestamp.month() as u8;
    buffer[3] = timestamp.day() as u8;
    buffer[4] = timestamp.hour() as u8;
    buffer[5] = timestamp.minute() as u8;
    buffer[6] = timestamp.second() as u8;
    buffer[7..11].copy_from_slice(&timestamp.nanosecond().to_le_bytes());
    buffer[11..15].copy_from_slice(&timestamp.offset().fix().local_minus_utc().to_le_bytes());
    buffer
}

/// Deserializes a 15-byte portable timestamp.
pub fn decode_timestamp(buffer: &[u8]) -> AjfsResult<DateTime<FixedOffset>> {
    if buffer.len() != TIMESTAMP_LEN {
        return Err(AjfsError::InvalidFormat(format!(
            "timestamp record has {} bytes, expected {TIMESTAMP_LEN}",
            buffer.len()
        )));
    }
    let year = i16::from_le_bytes([buffer[0], buffer[1]]) as i32;
    let nanos = u32::from_le_bytes([buffer[7], buffer[8], buffer[9], buffer[10]]);
    let offset_seconds = i32::from_le_bytes([buffer[11], buffer[12], buffer[13], buffer[14]]);
    let offset = FixedOffset::east_opt(offset_seconds)
        .ok_or_else(|| AjfsError::InvalidFormat("timestamp UTC offset out of range".into()))?;
    let naive = NaiveDate::from_ymd_opt(year, buffer[2] as u32, buffer[3] as u32)
        .and_then(|date| {
            date.and_hms_nano_opt(buffer[4] as u32, buffer[5] as u32, buffer[6] as u32, nanos)
        })
        .ok_or_else(|| AjfsError::InvalidFormat("timestamp fields out of range".into()))?;
    match offset.from_local_datetime(&naive) {
        chrono::LocalResult::Single(timestamp) => Ok(timestamp),
        _ => Err(AjfsError::InvalidFormat("ambiguous timestamp".into())),
    }
}

/// Writes a timestamp as a length-prefixed 15-byte record.
pub fn write_timestamp<W: Write>(
    writer: &mut W,
    timestamp: &DateTime<FixedOffset>,
) -> AjfsResult<()> {
    write_bytes(writer, &encode_timestamp(timestamp))
}

/// Reads a length-prefixed 15-byte timestamp record.
pub fn read_timestamp<R: Read>(reader: &mut R) -> AjfsResult<DateTime<FixedOffset>> {
    let bytes = read_bytes(reader, TIMESTAMP_LEN as u64)?;
    decode_timestamp(&bytes)
}
