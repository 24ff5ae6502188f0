use std::fmt;

/// Everything that can go wrong reading or writing a CPTV stream.
#[derive(Debug)]
pub enum Error {
    /// The container or field framing did not match the format: bad magic,
    /// unsupported version/compression, truncated data mid-section, a
    /// section appearing where it isn't allowed, or a bit-width out of range.
    Format(String),
    /// An I/O error from the underlying byte source/sink (or the gzip layer).
    Io(std::io::Error),
    /// A writer method was called out of sequence (`write_frame` before
    /// `write_header`, or `write_header` called twice).
    WriterState(&'static str),
}

/// Result type used throughout this crate.
pub type Result<T> = std::result::Result<T, Error>;

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Format(msg) => write!(f, "cptv format error: {msg}"),
            Error::Io(err) => write!(f, "cptv io error: {err}"),
            Error::WriterState(msg) => write!(f, "cptv writer used out of order: {msg}"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Io(err) => Some(err),
            _ => None,
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        // A short read of the underlying source is reported as a format
        // error everywhere except exactly at a section boundary, which the
        // container framer handles itself before this conversion happens.
        if err.kind() == std::io::ErrorKind::UnexpectedEof {
            Error::Format(format!("short read: {err}"))
        } else {
            Error::Io(err)
        }
    }
}
