//! Binary encoding of installed-apps records
//!
//! Payloads use the protocol-buffers wire format of the `UserApps` message:
//!
//! ```text
//! message UserApps {
//!     repeated uint32 apps = 1 [packed=true];
//!     optional double lat = 2;
//!     optional double lon = 3;
//! }
//! ```
//!
//! so that existing readers of the backends can decode what we write.

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::error::{DecodeError, SerializationError};
use crate::record::{parse_line, Record};

/// Longest key accepted by memcached
pub const MAX_KEY_LEN: usize = 250;

/// Default memcached item size limit
pub const MAX_PAYLOAD_LEN: usize = 1024 * 1024;

const WIRE_VARINT: u8 = 0;
const WIRE_FIXED64: u8 = 1;
const WIRE_LEN: u8 = 2;
const WIRE_FIXED32: u8 = 5;

const FIELD_APPS: u64 = 1;
const FIELD_LAT: u64 = 2;
const FIELD_LON: u64 = 3;

/// Lines checked by [`self_test`]
pub const SELF_TEST_SAMPLE: &str = "idfa\t1rfw452y52g2gq4g\t55.55\t42.42\t1423,43,567,3,7,23\ngaid\t7rfw452y52g2gq4g\t55.55\t42.42\t7423,424";

/// Decoded payload of a backend item
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UserApps {
    pub lat: f64,
    pub lon: f64,
    pub apps: Vec<u32>,
}

impl From<&Record> for UserApps {
    fn from(record: &Record) -> Self {
        Self {
            lat: record.lat,
            lon: record.lon,
            apps: record.apps.clone(),
        }
    }
}

impl UserApps {
    /// Append the wire encoding to `buf`
    pub fn encode(&self, buf: &mut BytesMut) {
        if !self.apps.is_empty() {
            let packed_len: usize = self.apps.iter().map(|&a| varint_len(a as u64)).sum();
            put_key(buf, FIELD_APPS, WIRE_LEN);
            put_varint(buf, packed_len as u64);
            for &app in &self.apps {
                put_varint(buf, app as u64);
            }
        }
        put_key(buf, FIELD_LAT, WIRE_FIXED64);
        buf.put_f64_le(self.lat);
        put_key(buf, FIELD_LON, WIRE_FIXED64);
        buf.put_f64_le(self.lon);
    }

    pub fn to_bytes(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(18 + self.apps.len() * 3);
        self.encode(&mut buf);
        buf.freeze()
    }

    /// Decode a payload; unknown fields are skipped
    pub fn decode(mut buf: &[u8]) -> Result<Self, DecodeError> {
        let mut out = UserApps::default();

        while buf.has_remaining() {
            let key = get_varint(&mut buf)?;
            let field = key >> 3;
            let wire_type = (key & 0x7) as u8;

            match (field, wire_type) {
                (FIELD_APPS, WIRE_LEN) => {
                    let len = get_varint(&mut buf)? as usize;
                    if buf.remaining() < len {
                        return Err(DecodeError::Truncated);
                    }
                    let mut packed = &buf[..len];
                    while packed.has_remaining() {
                        out.apps.push(get_varint(&mut packed)? as u32);
                    }
                    buf.advance(len);
                }
                (FIELD_APPS, WIRE_VARINT) => out.apps.push(get_varint(&mut buf)? as u32),
                (FIELD_LAT, WIRE_FIXED64) => out.lat = get_f64(&mut buf)?,
                (FIELD_LON, WIRE_FIXED64) => out.lon = get_f64(&mut buf)?,
                (FIELD_APPS | FIELD_LAT | FIELD_LON, _) => {
                    return Err(DecodeError::UnexpectedWireType { field, wire_type });
                }
                (_, _) => skip_field(&mut buf, field, wire_type)?,
            }
        }

        Ok(out)
    }
}

/// A serialized record ready to be handed to a writer
#[derive(Debug, Clone, PartialEq)]
pub struct WriteItem {
    pub key: String,
    pub payload: Bytes,
}

/// Serialize a record into its backend key and payload
pub fn encode_record(record: &Record) -> Result<WriteItem, SerializationError> {
    let key = record.key();
    validate_key(&key)?;

    let payload = UserApps::from(record).to_bytes();
    if payload.len() > MAX_PAYLOAD_LEN {
        return Err(SerializationError::PayloadTooLarge {
            len: payload.len(),
            max: MAX_PAYLOAD_LEN,
        });
    }

    Ok(WriteItem { key, payload })
}

fn validate_key(key: &str) -> Result<(), SerializationError> {
    if key.len() > MAX_KEY_LEN {
        return Err(SerializationError::KeyTooLong {
            len: key.len(),
            max: MAX_KEY_LEN,
        });
    }
    if key.chars().any(|c| c.is_whitespace() || c.is_control()) {
        return Err(SerializationError::InvalidKey(key.to_string()));
    }
    Ok(())
}

/// Encode and decode the sample lines, checking that nothing is lost
pub fn self_test() -> anyhow::Result<()> {
    for line in SELF_TEST_SAMPLE.lines() {
        let record = parse_line(line)?;
        let item = encode_record(&record)?;
        let unpacked = UserApps::decode(&item.payload)?;
        let expected = UserApps::from(&record);
        if unpacked != expected {
            anyhow::bail!(
                "round trip mismatch for {}: wrote {:?}, read {:?}",
                item.key,
                expected,
                unpacked
            );
        }
        tracing::debug!(key = %item.key, bytes = item.payload.len(), "round trip ok");
    }
    Ok(())
}

fn put_key(buf: &mut BytesMut, field: u64, wire_type: u8) {
    put_varint(buf, (field << 3) | wire_type as u64);
}

fn put_varint(buf: &mut BytesMut, mut value: u64) {
    while value >= 0x80 {
        buf.put_u8((value as u8 & 0x7F) | 0x80);
        value >>= 7;
    }
    buf.put_u8(value as u8);
}

fn varint_len(value: u64) -> usize {
    let bits = 64 - (value | 1).leading_zeros() as usize;
    bits.div_ceil(7)
}

fn get_varint(buf: &mut &[u8]) -> Result<u64, DecodeError> {
    let mut value = 0u64;
    for shift in (0..64).step_by(7) {
        if !buf.has_remaining() {
            return Err(DecodeError::Truncated);
        }
        let byte = buf.get_u8();
        value |= ((byte & 0x7F) as u64) << shift;
        if byte & 0x80 == 0 {
            return Ok(value);
        }
    }
    Err(DecodeError::VarintOverflow)
}

fn get_f64(buf: &mut &[u8]) -> Result<f64, DecodeError> {
    if buf.remaining() < 8 {
        return Err(DecodeError::Truncated);
    }
    Ok(buf.get_f64_le())
}

fn skip_field(buf: &mut &[u8], field: u64, wire_type: u8) -> Result<(), DecodeError> {
    let len = match wire_type {
        WIRE_VARINT => {
            get_varint(buf)?;
            return Ok(());
        }
        WIRE_FIXED64 => 8,
        WIRE_LEN => get_varint(buf)? as usize,
        WIRE_FIXED32 => 4,
        _ => return Err(DecodeError::UnexpectedWireType { field, wire_type }),
    };
    if buf.remaining() < len {
        return Err(DecodeError::Truncated);
    }
    buf.advance(len);
    Ok(())
}
