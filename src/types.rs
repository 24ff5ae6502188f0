//! The public data types: stream-level metadata and individual frames.

use std::ops::{Index, IndexMut};
use std::time::Duration;

use chrono::{DateTime, Utc};

/// A `height x width` grid of 16-bit thermal pixels.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FramePixels {
    width: usize,
    height: usize,
    data: Box<[u16]>,
}

impl FramePixels {
    pub fn zeroed(width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            data: vec![0u16; width * height].into_boxed_slice(),
        }
    }

    pub fn from_rows(width: usize, height: usize, data: Vec<u16>) -> Self {
        assert_eq!(data.len(), width * height, "pixel data does not match shape");
        Self {
            width,
            height,
            data: data.into_boxed_slice(),
        }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn shape(&self) -> (usize, usize) {
        (self.height, self.width)
    }

    pub fn as_slice(&self) -> &[u16] {
        &self.data
    }

    pub fn as_mut_slice(&mut self) -> &mut [u16] {
        &mut self.data
    }
}

impl Index<usize> for FramePixels {
    type Output = [u16];
    fn index(&self, row: usize) -> &[u16] {
        let start = row * self.width;
        &self.data[start..start + self.width]
    }
}

impl IndexMut<usize> for FramePixels {
    fn index_mut(&mut self, row: usize) -> &mut [u16] {
        let start = row * self.width;
        &mut self.data[start..start + self.width]
    }
}

/// A single decoded/to-be-encoded thermal frame and its per-frame metadata.
#[derive(Debug, Clone)]
pub struct Frame {
    pub pix: FramePixels,
    /// Duration since camera power-on. Only populated for version 2 streams.
    pub time_on: Option<Duration>,
    /// Duration since the last flat-field correction. Version 2 only.
    pub last_ffc_time: Option<Duration>,
    /// Sensor temperature in Celsius. `0.0` for version 1 streams.
    pub temp_c: f32,
    /// Sensor temperature at the last flat-field correction. Version 1: `0.0`.
    pub last_ffc_temp_c: f32,
    /// Whether this frame is the background frame (always the first frame
    /// in a stream, when present).
    pub background_frame: bool,
}

impl PartialEq for Frame {
    fn eq(&self, other: &Self) -> bool {
        self.temp_c == other.temp_c
            && self.last_ffc_temp_c == other.last_ffc_temp_c
            && self.time_on == other.time_on
            && self.last_ffc_time == other.last_ffc_time
            && self.pix == other.pix
    }
}

/// Stream-level metadata, produced by decoding a header and consumed when
/// writing one.
#[derive(Debug, Clone)]
pub struct StreamMetadata {
    pub version: u8,
    pub timestamp: DateTime<Utc>,
    pub x_resolution: u32,
    pub y_resolution: u32,
    pub compression: u8,
    pub device_name: Option<Vec<u8>>,
    pub device_id: u32,
    pub preview_secs: u8,
    pub motion_config: Option<Vec<u8>>,
    pub latitude: f32,
    pub longitude: f32,
    pub loc_timestamp: Option<DateTime<Utc>>,
    pub altitude: f32,
    pub accuracy: f32,
    pub fps: u8,
    pub model: Option<Vec<u8>>,
    pub brand: Option<Vec<u8>>,
    pub firmware: Option<Vec<u8>>,
    pub camera_serial: u32,
    pub has_background_frame: bool,
}

impl Default for StreamMetadata {
    fn default() -> Self {
        Self {
            version: 2,
            timestamp: Utc::now(),
            x_resolution: 160,
            y_resolution: 120,
            compression: 1,
            device_name: None,
            device_id: 0,
            preview_secs: 0,
            motion_config: None,
            latitude: 0.0,
            longitude: 0.0,
            loc_timestamp: None,
            altitude: 0.0,
            accuracy: 0.0,
            fps: 0,
            model: None,
            brand: None,
            firmware: None,
            camera_serial: 0,
            has_background_frame: false,
        }
    }
}
