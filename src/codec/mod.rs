//! Heartbeat stream codec
//!
//! Converts batches of heartbeats to and from the bit-packed upload wire
//! format. Version 1 is the only deployed layout; the version selector
//! exists so future layouts can coexist behind the same entry points.

pub mod bits;
pub mod v1;

pub use bits::BitBuf;
pub use v1::EncodeMode;

use thiserror::Error;

use crate::common::{unix_now, Heartbeat};

/// Codec errors
#[derive(Error, Debug)]
pub enum CodecError {
    /// No codec for the requested stream version.
    #[error("unsupported stream version {0}")]
    UnsupportedVersion(u8),

    /// The stream or an encoder input cannot be interpreted.
    #[error("invalid stream data: {0}")]
    InvalidData(String),

    /// Strict encoding refused a value the wire cannot carry faithfully.
    #[error("value out of wire range: {0}")]
    OutOfRange(String),
}

/// Encode a chronological heartbeat batch for upload.
pub fn to_stream(heartbeats: &[Heartbeat], version: u8) -> Result<Vec<u8>, CodecError> {
    to_stream_at(heartbeats, version, unix_now())
}

/// Encode refusing any lossy wrap or drop (see [`v1::EncodeMode::Strict`]).
pub fn to_stream_strict(heartbeats: &[Heartbeat], version: u8) -> Result<Vec<u8>, CodecError> {
    match version {
        1 => v1::encode_stream(heartbeats, unix_now(), EncodeMode::Strict),
        v => Err(CodecError::UnsupportedVersion(v)),
    }
}

/// Decode an uploaded byte stream.
pub fn from_stream(stream: &[u8], version: u8) -> Result<Vec<Heartbeat>, CodecError> {
    from_stream_at(stream, version, unix_now())
}

/// [`to_stream`] with an explicit send time (tests pin the clock here).
pub fn to_stream_at(
    heartbeats: &[Heartbeat],
    version: u8,
    send_time: f64,
) -> Result<Vec<u8>, CodecError> {
    match version {
        1 => v1::encode_stream(heartbeats, send_time, EncodeMode::Compatible),
        v => Err(CodecError::UnsupportedVersion(v)),
    }
}

/// [`from_stream`] with an explicit receive time.
pub fn from_stream_at(
    stream: &[u8],
    version: u8,
    receive_time: f64,
) -> Result<Vec<Heartbeat>, CodecError> {
    match version {
        1 => v1::decode_stream(stream, receive_time),
        v => Err(CodecError::UnsupportedVersion(v)),
    }
}
