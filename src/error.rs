//! Error types for tag decoding, encoding and zone rewriting.
//!
//! Codec-level operations return [`TagError`]. File-level helpers in
//! [`crate::flac`] and [`crate::pipeline`] wrap these in `anyhow` with context.

use thiserror::Error;

/// Errors raised by the codec and the zone rewrite engine.
#[derive(Error, Debug)]
pub enum TagError {
    /// The stream ended before the declared field count was satisfied, or a
    /// length prefix points past the end of the stream.
    #[error("Malformed tag: {0}")]
    MalformedTag(String),

    /// An embedded picture could not be decoded (bad base64, truncated block).
    #[error("Unsupported picture encoding: {0}")]
    UnsupportedPictureEncoding(String),

    /// The source is not a container this crate knows how to walk.
    #[error("Unsupported container: {0}")]
    UnsupportedContainer(String),

    /// A header size descriptor cannot hold the rewritten zone length.
    #[error("Size field for zone '{zone}' cannot hold {size} bytes")]
    SizeOverflow { zone: String, size: u64 },

    /// I/O errors.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, TagError>;

/// Map an unexpected EOF to [`TagError::MalformedTag`], keep other I/O errors.
pub(crate) fn eof_as_malformed(err: std::io::Error, what: &str) -> TagError {
    if err.kind() == std::io::ErrorKind::UnexpectedEof {
        TagError::MalformedTag(format!("stream ended while reading {what}"))
    } else {
        TagError::Io(err)
    }
}
