//! Heartbeat stream codec, version 1
//!
//! A v1 stream is a concatenation of fixed-layout 272-bit (34-byte)
//! datagrams, each delimited by the 24-bit ASCII marker `"OHD"` at both
//! ends. Wide fields are quantized with saturation; timestamps travel as
//! 5-second deltas chained across the batch.
//!
//! The delta chain dictates ordering: the batch is chronological (oldest
//! first), the encoder walks it newest-first so every delta against the
//! previous (newer) sample is nonnegative, and the decoder pairs markers
//! from the end of the stream backwards, reconstructing absolute times from
//! its own wall clock.
//!
//! The delta is computed over a 7-bit domain (clamped to 127) but only its
//! low 4 bits reach the wire. Deltas of 16..127 therefore wrap silently.
//! This matches deployed encoders and must not be "fixed" here; strict mode
//! refuses such batches instead of wrapping.

use uuid::Uuid;

use super::bits::BitBuf;
use super::CodecError;
use crate::common::Heartbeat;

/// Datagram layout. Offsets are bit positions from the datagram start.
mod layout {
    /// `"OHD"` packed as three bytes.
    pub const MARKER: u32 = 0x4F4844;
    pub const MARKER_BITS: usize = 24;

    pub const DATAGRAM_BITS: usize = 272;
    pub const DATAGRAM_BYTES: usize = 34;
    /// Distance from a start marker to the matching end marker.
    pub const INNER_BITS: usize = 248;

    pub const CLIENT_ID: usize = 24;
    pub const CLIENT_ID_BITS: usize = 128;
    pub const TIMESTAMP_DELTA: usize = 152;
    pub const TIMESTAMP_DELTA_BITS: usize = 4;
    pub const TUNER_VENDOR: usize = 156;
    pub const TUNER_MODEL: usize = 172;
    pub const TUNER_ID_BITS: usize = 16;
    pub const TUNER_PRESET: usize = 188;
    pub const TUNER_PRESET_BITS: usize = 5;
    pub const SIGNAL_LOCK: usize = 193;
    pub const SERVICE_LOCK: usize = 194;
    pub const SIGNAL_STRENGTH: usize = 195;
    pub const SIGNAL_STRENGTH_BITS: usize = 4;
    pub const SNR: usize = 199;
    pub const SNR_BITS: usize = 5;
    pub const BITRATE: usize = 204;
    pub const BITRATE_BITS: usize = 6;
    pub const CAROUSEL_COUNT: usize = 210;
    pub const CAROUSEL_COUNT_BITS: usize = 5;
    pub const CAROUSEL_STATUS: usize = 215;
    pub const CAROUSEL_STATUS_BITS: usize = 31;
    pub const END_MARKER: usize = 248;
}

/// Quantization constants.
mod quant {
    /// Timestamp delta resolution, seconds.
    pub const DELTA_STEP: f64 = 5.0;
    /// Delta clamp ceiling (7-bit domain; only 4 bits reach the wire).
    pub const DELTA_MAX: i64 = 127;
    /// Largest delta that survives the 4-bit field unwrapped.
    pub const DELTA_WIRE_MAX: i64 = 15;

    /// Signal strength is stored in tenths of percent, ceiling 10.
    pub const STRENGTH_STEP: u8 = 10;
    pub const STRENGTH_MAX: u8 = 10;

    /// SNR is stored in tenths, ceiling 31.
    pub const SNR_SCALE: f64 = 10.0;
    pub const SNR_MAX: u64 = 31;

    /// Bitrate is stored in 10 kbps increments, ceiling 63.
    pub const BITRATE_STEP: u64 = 10_000;
    pub const BITRATE_MAX: u64 = 63;
}

pub use layout::{DATAGRAM_BYTES, MARKER};

/// Encoder behavior for values the wire cannot carry faithfully.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EncodeMode {
    /// Wrap oversized timestamp deltas into the 4-bit field and drop
    /// carousel entries beyond 31, exactly like deployed encoders.
    #[default]
    Compatible,
    /// Refuse to encode batches that would wrap or drop data.
    Strict,
}

/// Encode a chronological batch into a v1 byte stream.
///
/// `send_time` is the encoder's wall clock (seconds); the newest sample's
/// delta is computed against it.
pub fn encode_stream(
    heartbeats: &[Heartbeat],
    send_time: f64,
    mode: EncodeMode,
) -> Result<Vec<u8>, CodecError> {
    let mut datagrams = Vec::with_capacity(heartbeats.len());
    let mut base = send_time;
    // Newest-first walk keeps every delta nonnegative.
    for hb in heartbeats.iter().rev() {
        datagrams.push(encode_datagram(hb, base, mode)?);
        base = hb.timestamp;
    }
    datagrams.reverse();

    let mut stream = Vec::with_capacity(heartbeats.len() * layout::DATAGRAM_BYTES);
    for datagram in &datagrams {
        stream.extend_from_slice(datagram.as_bytes());
    }
    Ok(stream)
}

/// Decode a v1 byte stream.
///
/// `receive_time` is the decoder's wall clock; reconstructed timestamps are
/// accurate to the 5-second delta resolution plus clock skew. Fewer than
/// two markers means no complete datagram: the batch is empty, not an
/// error.
pub fn decode_stream(stream: &[u8], receive_time: f64) -> Result<Vec<Heartbeat>, CodecError> {
    let bits = BitBuf::from_bytes(stream);
    let mut markers = bits.find_marker(layout::MARKER);
    if markers.len() < 2 {
        return Ok(Vec::new());
    }

    // Pair markers from the end of the stream backwards: the last datagram
    // is the newest and anchors the delta chain to the wall clock. An
    // unpaired leftover marker is discarded.
    markers.reverse();
    let mut heartbeats = Vec::with_capacity(markers.len() / 2);
    let mut base = receive_time;
    let mut i = 0;
    while i + 1 < markers.len() {
        let end = markers[i];
        let start = markers[i + 1];
        i += 2;
        if end - start != layout::INNER_BITS {
            return Err(CodecError::InvalidData(format!(
                "datagram length mismatch: markers at bits {} and {}",
                start, end
            )));
        }
        if start + layout::DATAGRAM_BITS > bits.len() {
            return Err(CodecError::InvalidData(format!(
                "truncated datagram at bit {}",
                start
            )));
        }
        let hb = decode_datagram(&bits, start, base);
        base = hb.timestamp;
        heartbeats.push(hb);
    }
    heartbeats.reverse();
    Ok(heartbeats)
}

fn encode_datagram(hb: &Heartbeat, base: f64, mode: EncodeMode) -> Result<BitBuf, CodecError> {
    let delta = quantize_delta(base, hb.timestamp);
    if mode == EncodeMode::Strict && delta > quant::DELTA_WIRE_MAX {
        return Err(CodecError::OutOfRange(format!(
            "timestamp delta {} exceeds the 4-bit wire field",
            delta
        )));
    }

    let vendor = parse_hex_id(&hb.tuner_vendor)?;
    let model = parse_hex_id(&hb.tuner_model)?;

    if hb.carousel_status.len() != hb.carousel_count as usize {
        return Err(CodecError::InvalidData(format!(
            "carousel status length {} does not match count {}",
            hb.carousel_status.len(),
            hb.carousel_count
        )));
    }
    if mode == EncodeMode::Strict && hb.carousel_status.len() > layout::CAROUSEL_STATUS_BITS {
        return Err(CodecError::OutOfRange(format!(
            "{} carousels exceed the 31-entry wire field",
            hb.carousel_status.len()
        )));
    }
    let carousel_count = (hb.carousel_count as usize).min(layout::CAROUSEL_STATUS_BITS);
    let carousels = &hb.carousel_status[..carousel_count];

    let strength = (hb.signal_strength / quant::STRENGTH_STEP).min(quant::STRENGTH_MAX);
    let snr = ((hb.snr.max(0.0) * quant::SNR_SCALE) as u64).min(quant::SNR_MAX);
    let bitrate = (hb.bitrate / quant::BITRATE_STEP).min(quant::BITRATE_MAX);

    let mut d = BitBuf::zeroed(layout::DATAGRAM_BITS);
    d.put_uint(0, layout::MARKER_BITS, layout::MARKER as u128);
    d.put_uint(layout::CLIENT_ID, layout::CLIENT_ID_BITS, hb.client_id.as_u128());
    // Known truncation: only the low 4 bits of the 7-bit delta domain.
    d.put_uint(
        layout::TIMESTAMP_DELTA,
        layout::TIMESTAMP_DELTA_BITS,
        (delta & 0x0F) as u128,
    );
    d.put_uint(layout::TUNER_VENDOR, layout::TUNER_ID_BITS, vendor as u128);
    d.put_uint(layout::TUNER_MODEL, layout::TUNER_ID_BITS, model as u128);
    d.put_uint(
        layout::TUNER_PRESET,
        layout::TUNER_PRESET_BITS,
        (hb.tuner_preset & 0x1F) as u128,
    );
    d.put_bit(layout::SIGNAL_LOCK, hb.signal_lock);
    d.put_bit(layout::SERVICE_LOCK, hb.service_lock);
    d.put_uint(
        layout::SIGNAL_STRENGTH,
        layout::SIGNAL_STRENGTH_BITS,
        strength as u128,
    );
    d.put_uint(layout::SNR, layout::SNR_BITS, snr as u128);
    d.put_uint(layout::BITRATE, layout::BITRATE_BITS, bitrate as u128);
    d.put_uint(
        layout::CAROUSEL_COUNT,
        layout::CAROUSEL_COUNT_BITS,
        carousel_count as u128,
    );
    d.put_bools(layout::CAROUSEL_STATUS, carousels);
    // Bits 246..248 reserved zero.
    d.put_uint(layout::END_MARKER, layout::MARKER_BITS, layout::MARKER as u128);
    Ok(d)
}

fn decode_datagram(bits: &BitBuf, start: usize, base: f64) -> Heartbeat {
    let at = |offset: usize, width: usize| bits.get_uint(start + offset, width);

    let client_id = Uuid::from_u128(at(layout::CLIENT_ID, layout::CLIENT_ID_BITS));
    let delta = at(layout::TIMESTAMP_DELTA, layout::TIMESTAMP_DELTA_BITS) as f64;
    let timestamp = base - delta * quant::DELTA_STEP;

    let carousel_count = at(layout::CAROUSEL_COUNT, layout::CAROUSEL_COUNT_BITS) as usize;
    let carousel_status: Vec<bool> = (0..carousel_count)
        .map(|i| bits.get_bit(start + layout::CAROUSEL_STATUS + i))
        .collect();

    Heartbeat {
        client_id,
        timestamp,
        tuner_vendor: format_hex_id(at(layout::TUNER_VENDOR, layout::TUNER_ID_BITS) as u16),
        tuner_model: format_hex_id(at(layout::TUNER_MODEL, layout::TUNER_ID_BITS) as u16),
        tuner_preset: at(layout::TUNER_PRESET, layout::TUNER_PRESET_BITS) as u8,
        signal_lock: bits.get_bit(start + layout::SIGNAL_LOCK),
        service_lock: bits.get_bit(start + layout::SERVICE_LOCK),
        signal_strength: at(layout::SIGNAL_STRENGTH, layout::SIGNAL_STRENGTH_BITS) as u8
            * quant::STRENGTH_STEP,
        snr: at(layout::SNR, layout::SNR_BITS) as f64 / quant::SNR_SCALE,
        bitrate: at(layout::BITRATE, layout::BITRATE_BITS) as u64 * quant::BITRATE_STEP,
        carousel_count: carousel_count as u8,
        carousel_status,
    }
}

/// Delta from `base` back to `timestamp` in 5-second steps, truncated
/// toward zero and clamped to the 7-bit domain.
fn quantize_delta(base: f64, timestamp: f64) -> i64 {
    (((base - timestamp) / quant::DELTA_STEP) as i64).clamp(0, quant::DELTA_MAX)
}

fn parse_hex_id(id: &str) -> Result<u16, CodecError> {
    u16::from_str_radix(id, 16)
        .map_err(|_| CodecError::InvalidData(format!("bad hex id {:?}", id)))
}

fn format_hex_id(id: u16) -> String {
    format!("{:04x}", id)
}
