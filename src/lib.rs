//! Reader and writer for Cacophony Project Thermal Video (CPTV) files: a
//! gzip-wrapped container of per-stream metadata followed by a sequence of
//! delta-compressed thermal frames.
//!
//! ```no_run
//! fn read_all(path: &str) -> cptv::Result<()> {
//!     let file = std::fs::File::open(path)?;
//!     let reader = cptv::open_reader(file)?;
//!     println!("{}x{}", reader.metadata().x_resolution, reader.metadata().y_resolution);
//!     for frame in reader {
//!         let frame = frame?;
//!         let _ = frame.pix;
//!     }
//!     Ok(())
//! }
//! # fn main() {}
//! ```

#![forbid(unsafe_code)]
#![deny(missing_docs)]

mod bitio;
mod container;
mod error;
mod fields;
mod frame_codec;
mod reader;
mod snake;
mod types;
mod writer;

pub use error::{Error, Result};
pub use reader::{open_reader, Reader};
pub use types::{Frame, FramePixels, StreamMetadata};
pub use writer::{open_writer, Writer};
