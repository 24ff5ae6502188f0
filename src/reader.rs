//! The [`Reader`] façade: a forward-only iterator over the frames of a
//! gzip-wrapped CPTV stream.

use std::io::Read;
use std::time::Duration;

use flate2::read::GzDecoder;

use crate::container::{self, Section};
use crate::error::{Error, Result};
use crate::fields::{self, FieldValue};
use crate::frame_codec::FrameDecoder;
use crate::types::{Frame, StreamMetadata};

/// Opens a gzip-wrapped CPTV stream and parses its header.
///
/// On success the stream is positioned right after the header section (and
/// the background frame, if the header declares one), ready for [`Reader`]
/// to be iterated for the remaining frames.
pub fn open_reader<R: Read>(inner: R) -> Result<Reader<R>> {
    Reader::open(inner)
}

/// A forward-only iterator over the frames of a parsed CPTV stream.
pub struct Reader<R: Read> {
    source: GzDecoder<R>,
    metadata: StreamMetadata,
    decoder: FrameDecoder,
    background_frame: Option<Frame>,
    done: bool,
}

impl<R: Read> Reader<R> {
    fn open(inner: R) -> Result<Self> {
        let mut source = GzDecoder::new(inner);
        let version = container::read_magic_and_version(&mut source)?;

        let section = container::read_section(&mut source)?
            .ok_or_else(|| Error::Format("stream ended before header section".into()))?;
        if section.section_type != container::SECTION_HEADER {
            return Err(Error::Format(format!(
                "expected header section, found {:#04x}",
                section.section_type
            )));
        }
        let metadata = metadata_from_section(version, &section)?;
        if metadata.compression != 1 {
            return Err(Error::Format(format!(
                "unsupported compression type: {}",
                metadata.compression
            )));
        }
        let decoder = FrameDecoder::new(metadata.x_resolution as usize, metadata.y_resolution as usize);

        let mut reader = Reader {
            source,
            metadata,
            decoder,
            background_frame: None,
            done: false,
        };
        if reader.metadata.has_background_frame {
            reader.background_frame = Some(
                reader
                    .read_one_frame()?
                    .ok_or_else(|| Error::Format("header declared a background frame, found none".into()))?,
            );
        }
        Ok(reader)
    }

    pub fn metadata(&self) -> &StreamMetadata {
        &self.metadata
    }

    /// The background frame, if the stream's header declared one.
    pub fn background_frame(&self) -> Option<&Frame> {
        self.background_frame.as_ref()
    }

    fn read_one_frame(&mut self) -> Result<Option<Frame>> {
        let section = match container::read_section(&mut self.source)? {
            None => return Ok(None),
            Some(s) => s,
        };
        if section.section_type != container::SECTION_FRAME {
            return Err(Error::Format(format!(
                "expected frame section, found {:#04x}",
                section.section_type
            )));
        }

        let frame_size = match section.field(fields::code::FRAME_SIZE) {
            Some(FieldValue::U32(n)) => *n as usize,
            _ => return Err(Error::Format("frame section missing frame_size field".into())),
        };
        let bit_width = match section.field(fields::code::BIT_WIDTH) {
            Some(FieldValue::U8(w)) => *w as u32,
            _ => return Err(Error::Format("frame section missing bit_width field".into())),
        };

        let mut payload = vec![0u8; frame_size];
        self.source.read_exact(&mut payload)?;
        let pix = self.decoder.decode(bit_width, &payload)?;

        let time_on = section.field(fields::code::TIME_ON).and_then(field_to_duration);
        let last_ffc_time = section
            .field(fields::code::LAST_FFC_TIME)
            .and_then(field_to_duration);
        let temp_c = match section.field(fields::code::TEMP_C) {
            Some(FieldValue::F32(v)) => *v,
            _ => 0.0,
        };
        let last_ffc_temp_c = match section.field(fields::code::LAST_FFC_TEMP_C) {
            Some(FieldValue::F32(v)) => *v,
            _ => 0.0,
        };
        let background_frame = matches!(
            section.field(fields::code::BACKGROUND_FRAME),
            Some(FieldValue::U8(1))
        );

        Ok(Some(Frame {
            pix,
            time_on,
            last_ffc_time,
            temp_c,
            last_ffc_temp_c,
            background_frame,
        }))
    }
}

impl<R: Read> Iterator for Reader<R> {
    type Item = Result<Frame>;

    fn next(&mut self) -> Option<Result<Frame>> {
        if self.done {
            return None;
        }
        match self.read_one_frame() {
            Ok(Some(frame)) => Some(Ok(frame)),
            Ok(None) => {
                self.done = true;
                None
            }
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}

fn field_to_duration(value: &FieldValue) -> Option<Duration> {
    match value {
        FieldValue::U32(millis) => Some(Duration::from_millis(u64::from(*millis))),
        _ => None,
    }
}

fn metadata_from_section(version: u8, section: &Section) -> Result<StreamMetadata> {
    use fields::code;

    let mut meta = StreamMetadata {
        version,
        ..StreamMetadata::default()
    };

    for (code_byte, value) in &section.fields {
        match (*code_byte, value) {
            (c, FieldValue::U8(v)) if c == code::COMPRESSION => meta.compression = *v,
            (c, FieldValue::U8(v)) if c == code::PREVIEW_SECS => meta.preview_secs = *v,
            (c, FieldValue::U8(v)) if c == code::FPS => meta.fps = *v,
            (c, FieldValue::U8(v)) if c == code::BACKGROUND_FRAME => meta.has_background_frame = *v != 0,
            (c, FieldValue::U32(v)) if c == code::X_RESOLUTION => meta.x_resolution = *v,
            (c, FieldValue::U32(v)) if c == code::Y_RESOLUTION => meta.y_resolution = *v,
            (c, FieldValue::U32(v)) if c == code::DEVICE_ID => meta.device_id = *v,
            (c, FieldValue::U32(v)) if c == code::CAMERA_SERIAL => meta.camera_serial = *v,
            (c, FieldValue::F32(v)) if c == code::LATITUDE => meta.latitude = *v,
            (c, FieldValue::F32(v)) if c == code::LONGITUDE => meta.longitude = *v,
            (c, FieldValue::F32(v)) if c == code::ALTITUDE => meta.altitude = *v,
            (c, FieldValue::F32(v)) if c == code::ACCURACY => meta.accuracy = *v,
            (c, FieldValue::Timestamp(t)) if c == code::TIMESTAMP => meta.timestamp = *t,
            (c, FieldValue::Timestamp(t)) if c == code::LOC_TIMESTAMP => meta.loc_timestamp = Some(*t),
            (c, FieldValue::Bytes(b)) if c == code::DEVICE_NAME => meta.device_name = Some(b.clone()),
            (c, FieldValue::Bytes(b)) if c == code::MOTION_CONFIG => meta.motion_config = Some(b.clone()),
            (c, FieldValue::Bytes(b)) if c == code::MODEL => meta.model = Some(b.clone()),
            (c, FieldValue::Bytes(b)) if c == code::BRAND => meta.brand = Some(b.clone()),
            (c, FieldValue::Bytes(b)) if c == code::FIRMWARE => meta.firmware = Some(b.clone()),
            (c, _) => {
                log::debug!("ignoring unexpected header field code {c:#04x}");
            }
        }
    }

    if meta.x_resolution == 0 || meta.y_resolution == 0 {
        return Err(Error::Format("header is missing resolution fields".into()));
    }
    Ok(meta)
}
