//! The outer container framing: magic, version, and a sequence of sections.
//!
//! ```text
//! magic:    4 bytes, literal "CPTV"
//! version:  1 byte, in {1, 2}
//! section*: type:1 byte, field_count:u8, fields..., then (for F) payload
//! ```
//!
//! The byte stream itself is wrapped in gzip by the reader/writer façades;
//! this module only deals with the inner framing.

use std::io::Read;

use byteorder::ReadBytesExt;

use crate::error::{Error, Result};
use crate::fields::{read_field, FieldValue};

pub const MAGIC: &[u8; 4] = b"CPTV";
pub const SECTION_HEADER: u8 = b'H';
pub const SECTION_FRAME: u8 = b'F';

/// One parsed section: its type byte and the fields it carried.
pub struct Section {
    pub section_type: u8,
    pub fields: Vec<(u8, FieldValue)>,
}

impl Section {
    pub fn field(&self, code: u8) -> Option<&FieldValue> {
        self.fields.iter().find(|(c, _)| *c == code).map(|(_, v)| v)
    }
}

/// Reads and validates the magic number and version.
pub fn read_magic_and_version(r: &mut impl Read) -> Result<u8> {
    let mut magic = [0u8; 4];
    r.read_exact(&mut magic)?;
    if &magic != MAGIC {
        return Err(Error::Format(format!(
            "bad magic: expected {:?}, found {:?}",
            MAGIC, magic
        )));
    }
    let version = r.read_u8()?;
    if version != 1 && version != 2 {
        return Err(Error::Format(format!("unsupported version: {version}")));
    }
    Ok(version)
}

/// Reads one section. Returns `Ok(None)` if the stream ends cleanly right at
/// a section boundary; any other short read is a hard format error.
pub fn read_section(r: &mut impl Read) -> Result<Option<Section>> {
    let mut type_buf = [0u8; 1];
    match r.read_exact(&mut type_buf) {
        Ok(()) => {}
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => return Ok(None),
        Err(e) => return Err(e.into()),
    }
    let section_type = type_buf[0];

    let field_count = r
        .read_u8()
        .map_err(|e| Error::Format(format!("truncated section header: {e}")))?;

    let mut fields = Vec::with_capacity(field_count as usize);
    for _ in 0..field_count {
        fields.push(read_field(r)?);
    }

    Ok(Some(Section {
        section_type,
        fields,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fields::FieldWriter;
    use std::io::Cursor;

    #[test]
    fn magic_and_version_round_trip() {
        let mut buf = Vec::new();
        buf.extend_from_slice(MAGIC);
        buf.push(2);
        let mut cursor = Cursor::new(buf);
        assert_eq!(read_magic_and_version(&mut cursor).unwrap(), 2);
    }

    #[test]
    fn bad_magic_is_rejected() {
        let mut cursor = Cursor::new(b"GARB\x02".to_vec());
        assert!(read_magic_and_version(&mut cursor).is_err());
    }

    #[test]
    fn unsupported_version_is_rejected() {
        let mut buf = Vec::new();
        buf.extend_from_slice(MAGIC);
        buf.push(99);
        let mut cursor = Cursor::new(buf);
        assert!(read_magic_and_version(&mut cursor).is_err());
    }

    #[test]
    fn clean_eof_at_section_boundary() {
        let mut cursor = Cursor::new(Vec::<u8>::new());
        assert!(read_section(&mut cursor).unwrap().is_none());
    }

    #[test]
    fn truncated_section_is_an_error() {
        // section type byte present, but field_count byte missing
        let mut cursor = Cursor::new(vec![SECTION_HEADER]);
        assert!(read_section(&mut cursor).is_err());
    }

    #[test]
    fn section_round_trips_fields() {
        let mut fw = FieldWriter::new();
        fw.write_u8(crate::fields::code::COMPRESSION, 1);
        fw.write_u32(crate::fields::code::X_RESOLUTION, 160);
        let mut buf = Vec::new();
        fw.finish(SECTION_HEADER, &mut buf).unwrap();

        let mut cursor = Cursor::new(buf);
        let section = read_section(&mut cursor).unwrap().unwrap();
        assert_eq!(section.section_type, SECTION_HEADER);
        assert_eq!(
            section.field(crate::fields::code::COMPRESSION),
            Some(&FieldValue::U8(1))
        );
        assert_eq!(
            section.field(crate::fields::code::X_RESOLUTION),
            Some(&FieldValue::U32(160))
        );
    }
}
