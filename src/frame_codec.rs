//! Per-frame compression: snake reordering, first-order delta between
//! consecutive frames, second-order delta along the snake scan, adaptive
//! bit-width packing, and a 32-bit seed.
//!
//! Both encoder and decoder keep their delta reference frame in snake scan
//! order, gathering into (or reshaping out of) grid order only once, at the
//! boundary. The snake permutation happens to be its own inverse, so the
//! same lookup table does both jobs.

use std::sync::Arc;

use crate::bitio::{self, BitReader};
use crate::error::{Error, Result};
use crate::snake;
use crate::types::FramePixels;

/// Decodes the frame payload stream, keeping the one-frame delta reference
/// the format requires.
pub struct FrameDecoder {
    width: usize,
    height: usize,
    perm: Arc<[u32]>,
    /// Previously reconstructed frame, in snake scan order. Zero-initialised.
    prev: Vec<u16>,
}

impl FrameDecoder {
    pub fn new(width: usize, height: usize) -> Self {
        let perm = snake::indices(width as u32, height as u32);
        Self {
            width,
            height,
            perm,
            prev: vec![0u16; width * height],
        }
    }

    /// Reconstructs one frame from its bit-width and packed payload
    /// (`seed` followed by the packed delta-of-deltas).
    pub fn decode(&mut self, bit_width: u32, packed: &[u8]) -> Result<FramePixels> {
        if bit_width == 0 || bit_width > 16 {
            return Err(Error::Format(format!(
                "frame bit-width {bit_width} out of range 1..=16"
            )));
        }
        let n = self.width * self.height;
        if packed.len() < 4 {
            return Err(Error::Format("frame payload too short for seed".into()));
        }
        let seed = i32::from_le_bytes(packed[0..4].try_into().expect("checked length above"));

        let mut deltas = vec![0i32; n];
        if n > 0 {
            deltas[0] = seed;
        }
        let rest = &packed[4..];
        if bit_width == 8 {
            if rest.len() < n.saturating_sub(1) {
                return Err(Error::Format("short read in packed frame data".into()));
            }
            for i in 1..n {
                deltas[i] = rest[i - 1] as i8 as i32;
            }
        } else {
            let mut reader = BitReader::new(rest);
            for delta in deltas.iter_mut().skip(1) {
                *delta = reader.read_signed(bit_width)?;
            }
        }

        // Cumulative sum recovers the snake-ordered delta frame.
        let mut acc: i64 = 0;
        let mut result = vec![0u16; n];
        for i in 0..n {
            acc += i64::from(deltas[i]);
            let sum = i64::from(self.prev[i]) + acc;
            result[i] = (sum & 0xffff) as u16;
        }
        self.prev = result.clone();

        let mut out = FramePixels::zeroed(self.width, self.height);
        {
            let slice = out.as_mut_slice();
            for (j, value) in slice.iter_mut().enumerate() {
                *value = result[self.perm[j] as usize];
            }
        }
        Ok(out)
    }
}

/// Encodes frames, keeping the one-frame delta reference the format
/// requires.
pub struct FrameEncoder {
    width: usize,
    height: usize,
    perm: Arc<[u32]>,
    /// Previous frame's snake-ordered linear pixels, reinterpreted signed.
    prev_linear: Option<Vec<i32>>,
}

/// The result of encoding one frame: the chosen bit-width and the
/// `[seed][packed deltas]` payload.
pub struct EncodedFrame {
    pub bit_width: u32,
    pub payload: Vec<u8>,
}

impl FrameEncoder {
    pub fn new(width: usize, height: usize) -> Self {
        let perm = snake::indices(width as u32, height as u32);
        Self {
            width,
            height,
            perm,
            prev_linear: None,
        }
    }

    pub fn encode(&mut self, pix: &FramePixels) -> EncodedFrame {
        let n = self.width * self.height;
        let flat = pix.as_slice();

        let linear: Vec<i32> = (0..n)
            .map(|k| flat[self.perm[k] as usize] as i16 as i32)
            .collect();

        let delta: Vec<i32> = match &self.prev_linear {
            Some(prev) => (0..n).map(|k| linear[k] - prev[k]).collect(),
            None => linear.clone(),
        };
        self.prev_linear = Some(linear);

        let deldel: Vec<i32> = (1..n).map(|k| delta[k] - delta[k - 1]).collect();

        let max_abs = deldel.iter().map(|v| v.unsigned_abs()).max().unwrap_or(0);
        let k = 1 + (32 - max_abs.leading_zeros());
        let bit_width = if k <= 8 {
            8
        } else if k <= 12 {
            12
        } else {
            16
        };

        let seed = if n > 0 { delta[0] } else { 0 };
        let packed_bytes = bitio::pack(bit_width, &deldel);

        let mut payload = Vec::with_capacity(4 + packed_bytes.len());
        payload.extend_from_slice(&seed.to_le_bytes());
        payload.extend_from_slice(&packed_bytes);

        EncodedFrame { bit_width, payload }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn flat_frame(width: usize, height: usize, value: u16) -> FramePixels {
        FramePixels::from_rows(width, height, vec![value; width * height])
    }

    #[test]
    fn identical_frames_produce_zero_deltas_and_8_bit_width() {
        let mut enc = FrameEncoder::new(4, 3);
        let frame = flat_frame(4, 3, 500);
        let encoded = enc.encode(&frame);
        assert_eq!(encoded.bit_width, 8);
        // payload = 4 seed bytes + (n-1) zero bytes
        assert_eq!(encoded.payload.len(), 4 + (4 * 3 - 1));
        assert!(encoded.payload[4..].iter().all(|&b| b == 0));
    }

    #[test]
    fn single_frame_round_trips() {
        let width = 5;
        let height = 4;
        let frame = flat_frame(width, height, 1234);

        let mut enc = FrameEncoder::new(width, height);
        let encoded = enc.encode(&frame);

        let mut dec = FrameDecoder::new(width, height);
        let decoded = dec.decode(encoded.bit_width, &encoded.payload).unwrap();
        assert_eq!(decoded, frame);
    }

    #[test]
    fn two_frames_with_tiny_delta_round_trip() {
        let width = 4;
        let height = 4;
        let mut pix1 = vec![1000u16; width * height];
        let mut pix2 = pix1.clone();
        pix2[5] += 1;
        let frame1 = FramePixels::from_rows(width, height, pix1.drain(..).collect());
        let frame2 = FramePixels::from_rows(width, height, pix2.drain(..).collect());

        let mut enc = FrameEncoder::new(width, height);
        let e1 = enc.encode(&frame1);
        let e2 = enc.encode(&frame2);
        assert_eq!(e1.bit_width, 8);

        let mut dec = FrameDecoder::new(width, height);
        assert_eq!(dec.decode(e1.bit_width, &e1.payload).unwrap(), frame1);
        assert_eq!(dec.decode(e2.bit_width, &e2.payload).unwrap(), frame2);
    }

    #[test]
    fn step_change_every_pixel_plus_one() {
        let width = 8;
        let height = 8;
        let frame1 = flat_frame(width, height, 2000);
        let frame2 = flat_frame(width, height, 2001);

        let mut enc = FrameEncoder::new(width, height);
        let e1 = enc.encode(&frame1);
        let e2 = enc.encode(&frame2);

        let mut dec = FrameDecoder::new(width, height);
        assert_eq!(dec.decode(e1.bit_width, &e1.payload).unwrap(), frame1);
        assert_eq!(dec.decode(e2.bit_width, &e2.payload).unwrap(), frame2);
    }

    #[test]
    fn large_row_delta_forces_16_bit_width() {
        let width = 160;
        let height = 120;
        let frame1 = flat_frame(width, height, 3000);
        let mut row_changed = frame1.as_slice().to_vec();
        for x in 0..width {
            row_changed[x] = row_changed[x].wrapping_add(32767);
        }
        let frame2 = FramePixels::from_rows(width, height, row_changed);

        let mut enc = FrameEncoder::new(width, height);
        let e1 = enc.encode(&frame1);
        let e2 = enc.encode(&frame2);
        assert_eq!(e2.bit_width, 16);

        let mut dec = FrameDecoder::new(width, height);
        assert_eq!(dec.decode(e1.bit_width, &e1.payload).unwrap(), frame1);
        assert_eq!(dec.decode(e2.bit_width, &e2.payload).unwrap(), frame2);
    }

    #[test]
    fn random_frames_round_trip() {
        // A small deterministic LCG keeps this test dependency-free.
        let mut state: u32 = 0x1234_5678;
        let mut next_u16 = move || {
            state = state.wrapping_mul(1_103_515_245).wrapping_add(12_345);
            (state >> 8) as u16
        };

        let width = 160;
        let height = 120;
        let mut enc = FrameEncoder::new(width, height);
        let mut dec = FrameDecoder::new(width, height);

        for _ in 0..10 {
            let pixels: Vec<u16> = (0..width * height).map(|_| next_u16()).collect();
            let frame = FramePixels::from_rows(width, height, pixels);
            let encoded = enc.encode(&frame);
            let decoded = dec.decode(encoded.bit_width, &encoded.payload).unwrap();
            assert_eq!(decoded, frame);
        }
    }

    #[test]
    fn rejects_bit_width_above_16() {
        let mut dec = FrameDecoder::new(2, 2);
        let payload = vec![0u8; 4];
        assert!(dec.decode(17, &payload).is_err());
    }
}
