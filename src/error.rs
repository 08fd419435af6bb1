//! Error type shared by every backing store and the reader/writer facades.

use std::io;

/// Message carried by every end-of-stream failure.
pub const EOF_ERROR_MSG: &str = "EOF reached";

/// Errors raised by the random-access layer.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The resource does not carry the extension or magic bytes of the
    /// requested compressed format.
    #[error("{id} is not a valid {format} file")]
    FormatMismatch { id: String, format: &'static str },

    /// A fixed-width read could not obtain all of its bytes.
    #[error("EOF reached")]
    EndOfStream,

    /// A position or length cannot be represented by the store.
    #[error("position {0} is out of bounds")]
    OutOfBounds(u64),

    /// The store does not support the operation (writes on compressed stores).
    #[error("{0} is not implemented for this store")]
    Unimplemented(&'static str),

    /// A terminator scan ran past the configured maximum search length.
    #[error("reached maximum search length of {0} bytes")]
    SearchLimit(u64),

    #[error("invalid zip archive: {0}")]
    InvalidZip(String),

    /// The handle was closed and has no origin it can be reopened from.
    #[error("handle is closed")]
    Closed,

    #[error("{0} was opened read-only")]
    ReadOnly(String),

    #[error("invalid modified UTF-8 data")]
    InvalidUtf,

    #[error("HTTP error: {0}")]
    Http(String),

    #[error(transparent)]
    Io(#[from] io::Error),
}

impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        Error::Http(e.to_string())
    }
}

impl From<Error> for io::Error {
    fn from(e: Error) -> Self {
        match e {
            Error::Io(e) => e,
            Error::EndOfStream => io::Error::new(io::ErrorKind::UnexpectedEof, EOF_ERROR_MSG),
            Error::OutOfBounds(_) => io::Error::new(io::ErrorKind::InvalidInput, e),
            Error::Unimplemented(_) | Error::ReadOnly(_) => {
                io::Error::new(io::ErrorKind::Unsupported, e)
            }
            other => io::Error::other(other),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
