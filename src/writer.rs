//! The [`Writer`] façade: assembles a gzip-wrapped CPTV stream one frame at
//! a time.

use std::io::Write;

use flate2::write::GzEncoder;
use flate2::{Compression, GzBuilder};

use crate::container;
use crate::error::{Error, Result};
use crate::fields::{code, FieldWriter};
use crate::frame_codec::FrameEncoder;
use crate::types::{Frame, StreamMetadata};

/// Opens a writer over `inner`. Call [`Writer::set_metadata`] (optional,
/// defaults to [`StreamMetadata::default`]) and then [`Writer::write_header`]
/// before writing any frames.
pub fn open_writer<W: Write>(inner: W) -> Writer<W> {
    Writer {
        raw: Some(inner),
        sink: None,
        metadata: StreamMetadata::default(),
        background_frame: None,
        encoder: None,
    }
}

/// Staged writer for a CPTV stream: configure metadata, call
/// [`Writer::write_header`], then [`Writer::write_frame`] for each frame.
pub struct Writer<W: Write> {
    raw: Option<W>,
    sink: Option<GzEncoder<W>>,
    metadata: StreamMetadata,
    background_frame: Option<Frame>,
    encoder: Option<FrameEncoder>,
}

impl<W: Write> Writer<W> {
    /// Replaces the stream metadata that will be serialised by
    /// [`Writer::write_header`]. Must be called before `write_header`.
    pub fn set_metadata(&mut self, metadata: StreamMetadata) -> Result<()> {
        if self.sink.is_some() {
            return Err(Error::WriterState("set_metadata called after write_header"));
        }
        self.metadata = metadata;
        Ok(())
    }

    /// Sets the frame that will be written immediately after the header, as
    /// the stream's background frame. Must be called before `write_header`.
    pub fn set_background_frame(&mut self, frame: Frame) -> Result<()> {
        if self.sink.is_some() {
            return Err(Error::WriterState(
                "set_background_frame called after write_header",
            ));
        }
        self.background_frame = Some(frame);
        Ok(())
    }

    /// Writes the magic, version, and header section, wrapping the
    /// underlying sink in gzip with its mtime set to the configured
    /// timestamp. Must be called exactly once, before any call to
    /// [`Writer::write_frame`].
    pub fn write_header(&mut self) -> Result<()> {
        if self.sink.is_some() {
            return Err(Error::WriterState("write_header called more than once"));
        }
        let raw = self
            .raw
            .take()
            .expect("raw sink is present until write_header consumes it");

        let mtime = self.metadata.timestamp.timestamp().max(0) as u32;
        let mut sink = GzBuilder::new()
            .mtime(mtime)
            .write(raw, Compression::default());

        sink.write_all(container::MAGIC)?;
        sink.write_all(&[self.metadata.version])?;

        let mut fw = FieldWriter::new();
        fw.write_u8(code::COMPRESSION, self.metadata.compression);
        fw.write_u32(code::X_RESOLUTION, self.metadata.x_resolution);
        fw.write_u32(code::Y_RESOLUTION, self.metadata.y_resolution);
        if let Some(name) = &self.metadata.device_name {
            fw.write_bytes(code::DEVICE_NAME, name);
        }
        if self.metadata.device_id != 0 {
            fw.write_u32(code::DEVICE_ID, self.metadata.device_id);
        }
        fw.write_timestamp(code::TIMESTAMP, self.metadata.timestamp);
        if self.metadata.preview_secs != 0 {
            fw.write_u8(code::PREVIEW_SECS, self.metadata.preview_secs);
        }
        if let Some(cfg) = &self.metadata.motion_config {
            fw.write_bytes(code::MOTION_CONFIG, cfg);
        }
        if self.metadata.latitude != 0.0 {
            fw.write_f32(code::LATITUDE, self.metadata.latitude);
        }
        if self.metadata.longitude != 0.0 {
            fw.write_f32(code::LONGITUDE, self.metadata.longitude);
        }
        if self.metadata.altitude != 0.0 {
            fw.write_f32(code::ALTITUDE, self.metadata.altitude);
        }
        if self.metadata.accuracy != 0.0 {
            fw.write_f32(code::ACCURACY, self.metadata.accuracy);
        }
        if let Some(loc_timestamp) = self.metadata.loc_timestamp {
            fw.write_timestamp(code::LOC_TIMESTAMP, loc_timestamp);
        }
        if self.metadata.fps != 0 {
            fw.write_u8(code::FPS, self.metadata.fps);
        }
        if let Some(model) = &self.metadata.model {
            fw.write_bytes(code::MODEL, model);
        }
        if let Some(brand) = &self.metadata.brand {
            fw.write_bytes(code::BRAND, brand);
        }
        if let Some(firmware) = &self.metadata.firmware {
            fw.write_bytes(code::FIRMWARE, firmware);
        }
        if self.metadata.camera_serial != 0 {
            fw.write_u32(code::CAMERA_SERIAL, self.metadata.camera_serial);
        }
        if self.background_frame.is_some() {
            fw.write_u8(code::BACKGROUND_FRAME, 1);
        }
        fw.finish(container::SECTION_HEADER, &mut sink)?;

        self.encoder = Some(FrameEncoder::new(
            self.metadata.x_resolution as usize,
            self.metadata.y_resolution as usize,
        ));
        self.sink = Some(sink);

        if let Some(mut background) = self.background_frame.take() {
            background.background_frame = true;
            self.write_frame(&background)?;
        }
        Ok(())
    }

    /// Encodes and writes one frame.
    pub fn write_frame(&mut self, frame: &Frame) -> Result<()> {
        let sink = self
            .sink
            .as_mut()
            .ok_or(Error::WriterState("write_frame called before write_header"))?;
        let encoder = self
            .encoder
            .as_mut()
            .expect("encoder is set alongside the gzip sink");
        let encoded = encoder.encode(&frame.pix);

        let mut fw = FieldWriter::new();
        if let Some(time_on) = frame.time_on {
            fw.write_u32(code::TIME_ON, time_on.as_millis() as u32);
        }
        if let Some(last_ffc_time) = frame.last_ffc_time {
            fw.write_u32(code::LAST_FFC_TIME, last_ffc_time.as_millis() as u32);
        }
        fw.write_u8(code::BIT_WIDTH, encoded.bit_width as u8);
        fw.write_f32(code::TEMP_C, frame.temp_c);
        fw.write_f32(code::LAST_FFC_TEMP_C, frame.last_ffc_temp_c);
        if frame.background_frame {
            fw.write_u8(code::BACKGROUND_FRAME, 1);
        }
        fw.write_u32(code::FRAME_SIZE, encoded.payload.len() as u32);
        fw.finish(container::SECTION_FRAME, sink)?;
        sink.write_all(&encoded.payload)?;
        Ok(())
    }

    /// Flushes and finalises the gzip stream, returning the underlying
    /// sink.
    pub fn close(mut self) -> Result<W> {
        let sink = self
            .sink
            .take()
            .ok_or(Error::WriterState("close called before write_header"))?;
        Ok(sink.finish()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reader::open_reader;
    use crate::types::FramePixels;

    #[test]
    fn write_frame_before_header_is_an_error() {
        let mut writer = open_writer(Vec::new());
        let frame = Frame {
            pix: FramePixels::zeroed(1, 1),
            time_on: None,
            last_ffc_time: None,
            temp_c: 0.0,
            last_ffc_temp_c: 0.0,
            background_frame: false,
        };
        assert!(writer.write_frame(&frame).is_err());
    }

    #[test]
    fn write_header_twice_is_an_error() {
        let mut writer = open_writer(Vec::new());
        writer.write_header().unwrap();
        assert!(writer.write_header().is_err());
    }

    #[test]
    fn set_metadata_after_header_is_rejected() {
        let mut writer = open_writer(Vec::new());
        writer.write_header().unwrap();
        assert!(writer.set_metadata(StreamMetadata::default()).is_err());
    }

    #[test]
    fn background_frame_is_written_right_after_header() {
        let width = 4;
        let height = 4;
        let mut metadata = StreamMetadata::default();
        metadata.x_resolution = width as u32;
        metadata.y_resolution = height as u32;

        let mut writer = open_writer(Vec::new());
        writer.set_metadata(metadata).unwrap();
        writer
            .set_background_frame(Frame {
                pix: FramePixels::from_rows(width, height, vec![42; width * height]),
                time_on: None,
                last_ffc_time: None,
                temp_c: 0.0,
                last_ffc_temp_c: 0.0,
                background_frame: false,
            })
            .unwrap();
        writer.write_header().unwrap();
        let bytes = writer.close().unwrap();

        let mut reader = open_reader(std::io::Cursor::new(bytes)).unwrap();
        assert!(reader.metadata().has_background_frame);
        let background = reader.background_frame().unwrap();
        assert!(background.background_frame);
        assert_eq!(background.pix.as_slice(), &[42u16; 16][..]);
        assert!(reader.next().is_none());
    }

    #[test]
    fn full_round_trip_through_reader() {
        let width = 10;
        let height = 8;
        let mut metadata = StreamMetadata::default();
        metadata.x_resolution = width as u32;
        metadata.y_resolution = height as u32;
        metadata.device_name = Some(b"test-cam".to_vec());

        let mut writer = open_writer(Vec::new());
        writer.set_metadata(metadata).unwrap();
        writer.write_header().unwrap();

        let frames: Vec<Frame> = (0..10u16)
            .map(|i| Frame {
                pix: FramePixels::from_rows(width, height, vec![1000 + i; width * height]),
                time_on: Some(std::time::Duration::from_secs(i as u64)),
                last_ffc_time: Some(std::time::Duration::from_secs(0)),
                temp_c: 22.5,
                last_ffc_temp_c: 21.0,
                background_frame: false,
            })
            .collect();
        for frame in &frames {
            writer.write_frame(frame).unwrap();
        }
        let bytes = writer.close().unwrap();

        let mut reader = open_reader(std::io::Cursor::new(bytes)).unwrap();
        assert_eq!(reader.metadata().device_name.as_deref(), Some(&b"test-cam"[..]));
        let decoded: Vec<Frame> = reader.by_ref().map(|r| r.unwrap()).collect();
        assert_eq!(decoded.len(), frames.len());
        for (got, want) in decoded.iter().zip(frames.iter()) {
            assert_eq!(got, want);
        }
    }
}
