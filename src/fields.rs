//! Typed key/length/value records that make up section bodies.
//!
//! A field on the wire is `[data_len: u8][code: 1 byte][payload: data_len
//! bytes]`. The code tells us the semantic type, independent of `data_len`
//! (which just happens to match the type's natural width).

use std::io::{Read, Write};

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use chrono::{DateTime, TimeZone, Utc};

use crate::error::Result;

/// One-byte field codes, grouped by wire type.
pub mod code {
    pub const COMPRESSION: u8 = b'C';
    pub const BIT_WIDTH: u8 = b'w';
    pub const PREVIEW_SECS: u8 = b'P';
    pub const FPS: u8 = b'Z';
    pub const BACKGROUND_FRAME: u8 = b'g';

    pub const X_RESOLUTION: u8 = b'X';
    pub const Y_RESOLUTION: u8 = b'Y';
    pub const FRAME_SIZE: u8 = b'f';
    pub const TIME_ON: u8 = b't';
    pub const LAST_FFC_TIME: u8 = b'c';
    pub const DEVICE_ID: u8 = b'I';
    pub const CAMERA_SERIAL: u8 = b'N';

    pub const LATITUDE: u8 = b'L';
    pub const LONGITUDE: u8 = b'O';
    pub const ALTITUDE: u8 = b'A';
    pub const ACCURACY: u8 = b'U';
    pub const TEMP_C: u8 = b'a';
    pub const LAST_FFC_TEMP_C: u8 = b'b';

    pub const TIMESTAMP: u8 = b'T';
    pub const LOC_TIMESTAMP: u8 = b'S';

    pub const DEVICE_NAME: u8 = b'D';
    pub const MOTION_CONFIG: u8 = b'M';
    pub const MODEL: u8 = b'E';
    pub const BRAND: u8 = b'B';
    pub const FIRMWARE: u8 = b'V';
}

/// The decoded value of one field, typed according to its code.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    U8(u8),
    U32(u32),
    F32(f32),
    Timestamp(DateTime<Utc>),
    Bytes(Vec<u8>),
}

/// Reads one `[len][code][payload]` field from `r`.
///
/// Unknown codes are returned as `FieldValue::Bytes` with the raw payload;
/// the caller logs and ignores them, per the format's forward-compatibility
/// rule.
pub fn read_field(r: &mut impl Read) -> Result<(u8, FieldValue)> {
    let data_len = r.read_u8()?;
    let code = r.read_u8()?;
    let value = match code {
        code::COMPRESSION
        | code::BIT_WIDTH
        | code::PREVIEW_SECS
        | code::FPS
        | code::BACKGROUND_FRAME => FieldValue::U8(r.read_u8()?),

        code::X_RESOLUTION
        | code::Y_RESOLUTION
        | code::FRAME_SIZE
        | code::TIME_ON
        | code::LAST_FFC_TIME
        | code::DEVICE_ID
        | code::CAMERA_SERIAL => FieldValue::U32(r.read_u32::<LittleEndian>()?),

        code::LATITUDE
        | code::LONGITUDE
        | code::ALTITUDE
        | code::ACCURACY
        | code::TEMP_C
        | code::LAST_FFC_TEMP_C => FieldValue::F32(r.read_f32::<LittleEndian>()?),

        code::TIMESTAMP | code::LOC_TIMESTAMP => {
            let micros = r.read_u64::<LittleEndian>()?;
            FieldValue::Timestamp(micros_to_instant(micros))
        }

        code::DEVICE_NAME
        | code::MOTION_CONFIG
        | code::MODEL
        | code::BRAND
        | code::FIRMWARE => {
            let mut buf = vec![0u8; data_len as usize];
            r.read_exact(&mut buf)?;
            FieldValue::Bytes(buf)
        }

        _ => {
            let mut buf = vec![0u8; data_len as usize];
            r.read_exact(&mut buf)?;
            log::warn!("skipping unknown CPTV field code {code:#04x} ({data_len} bytes)");
            FieldValue::Bytes(buf)
        }
    };
    Ok((code, value))
}

/// Converts microseconds-since-epoch to a UTC instant, falling back to the
/// Unix epoch (and logging) if the value can't be represented.
pub fn micros_to_instant(micros: u64) -> DateTime<Utc> {
    let seconds = (micros / 1_000_000) as i64;
    let sub_micros = (micros % 1_000_000) as u32;
    match Utc.timestamp_opt(seconds, sub_micros * 1_000) {
        chrono::LocalResult::Single(instant) => instant,
        _ => {
            log::warn!("CPTV timestamp {micros} microseconds overflowed, using Unix epoch");
            Utc.timestamp_opt(0, 0).single().expect("epoch is valid")
        }
    }
}

/// Converts a UTC instant to microseconds-since-epoch, for the wire.
pub fn instant_to_micros(instant: DateTime<Utc>) -> u64 {
    instant.timestamp_micros().max(0) as u64
}

pub struct FieldWriter {
    buf: Vec<u8>,
    count: u8,
}

impl FieldWriter {
    pub fn new() -> Self {
        Self {
            buf: Vec::new(),
            count: 0,
        }
    }

    pub fn field_count(&self) -> u8 {
        self.count
    }

    pub fn write_u8(&mut self, code: u8, val: u8) {
        self.buf.push(1);
        self.buf.push(code);
        self.buf.push(val);
        self.count += 1;
    }

    pub fn write_u32(&mut self, code: u8, val: u32) {
        self.buf.push(4);
        self.buf.push(code);
        self.buf
            .write_u32::<LittleEndian>(val)
            .expect("writing to a Vec cannot fail");
        self.count += 1;
    }

    pub fn write_f32(&mut self, code: u8, val: f32) {
        self.buf.push(4);
        self.buf.push(code);
        self.buf
            .write_f32::<LittleEndian>(val)
            .expect("writing to a Vec cannot fail");
        self.count += 1;
    }

    pub fn write_timestamp(&mut self, code: u8, instant: DateTime<Utc>) {
        self.buf.push(8);
        self.buf.push(code);
        self.buf
            .write_u64::<LittleEndian>(instant_to_micros(instant))
            .expect("writing to a Vec cannot fail");
        self.count += 1;
    }

    pub fn write_bytes(&mut self, code: u8, val: &[u8]) {
        self.buf.push(val.len() as u8);
        self.buf.push(code);
        self.buf.extend_from_slice(val);
        self.count += 1;
    }

    /// Writes the section header (`type`, `field_count`) followed by the
    /// accumulated fields.
    pub fn finish(self, section_type: u8, dest: &mut impl Write) -> Result<()> {
        dest.write_u8(section_type)?;
        dest.write_u8(self.count)?;
        dest.write_all(&self.buf)?;
        Ok(())
    }
}

impl Default for FieldWriter {
    fn default() -> Self {
        Self::new()
    }
}
