//! E2E tests for the v1 heartbeat stream (encode → decode → verify)
//!
//! Batches are generated from seeded random numbers. Client ids are drawn
//! with both top bits of every byte set, which keeps the 24-bit marker
//! pattern (whose first byte is 0x4F) from ever forming inside the id
//! field, and timestamp gaps are multiples of the 5-second delta grid so
//! reconstructed times compare exactly.

use rand::prelude::*;
use rand::rngs::StdRng;
use uuid::Uuid;

use ohdmon_rs::codec::{from_stream_at, to_stream_at, v1, BitBuf, EncodeMode};
use ohdmon_rs::common::Heartbeat;

const NOW: f64 = 1_700_000_000.0;

/// Client id whose bytes all start with binary 11: no marker can form in
/// the id field at any bit alignment.
fn safe_client_id(rng: &mut StdRng) -> Uuid {
    let mut bytes = [0u8; 16];
    rng.fill_bytes(&mut bytes);
    for b in &mut bytes {
        *b |= 0xC0;
    }
    Uuid::from_bytes(bytes)
}

/// Random heartbeat with realistic field ranges.
fn make_random_heartbeat(rng: &mut StdRng, timestamp: f64) -> Heartbeat {
    let carousel_count = rng.gen_range(0..=5u8);
    Heartbeat {
        client_id: safe_client_id(rng),
        timestamp,
        tuner_vendor: "1d6b".to_string(),
        tuner_model: "0002".to_string(),
        tuner_preset: rng.gen_range(0..=6),
        signal_lock: rng.gen_bool(0.9),
        service_lock: rng.gen_bool(0.85),
        signal_strength: rng.gen_range(0..=100),
        snr: rng.gen_range(0.0..3.2),
        bitrate: rng.gen_range(0..1_000_000),
        carousel_count,
        carousel_status: (0..carousel_count).map(|_| rng.gen_bool(0.7)).collect(),
    }
}

/// Chronological batch whose gaps sit on the 5-second delta grid and stay
/// within the 4-bit wire range, so timestamps reconstruct exactly.
fn make_random_batch(rng: &mut StdRng, len: usize) -> Vec<Heartbeat> {
    let mut times = Vec::with_capacity(len);
    let mut t = NOW - rng.gen_range(0..=2) as f64 * 5.0;
    for _ in 0..len {
        times.push(t);
        t -= rng.gen_range(0..=3) as f64 * 5.0;
    }
    times.reverse(); // oldest first
    times
        .into_iter()
        .map(|ts| make_random_heartbeat(rng, ts))
        .collect()
}

/// What the lossy quantization must give back for one heartbeat.
fn assert_quantization_laws(original: &Heartbeat, decoded: &Heartbeat) {
    assert_eq!(decoded.client_id, original.client_id);
    assert_eq!(decoded.tuner_vendor, original.tuner_vendor.to_lowercase());
    assert_eq!(decoded.tuner_model, original.tuner_model.to_lowercase());
    assert_eq!(decoded.tuner_preset, original.tuner_preset);
    assert_eq!(decoded.signal_lock, original.signal_lock);
    assert_eq!(decoded.service_lock, original.service_lock);
    assert_eq!(
        decoded.signal_strength,
        (original.signal_strength / 10).min(10) * 10
    );
    assert_eq!(
        decoded.snr,
        ((original.snr * 10.0) as u64).min(31) as f64 / 10.0
    );
    assert_eq!(
        decoded.bitrate,
        (original.bitrate / 10_000).min(63) * 10_000
    );
    assert_eq!(decoded.carousel_count, original.carousel_count);
    assert_eq!(
        decoded.carousel_status,
        original.carousel_status[..original.carousel_count as usize]
    );
}

// ---------------------------------------------------------------------------
// Test 1: Single healthy heartbeat round trip (pinned vector)
// ---------------------------------------------------------------------------

#[test]
fn single_healthy_heartbeat_roundtrip() {
    let hb = Heartbeat {
        client_id: "12345678-1234-4abc-8def-1234567890ab".parse().unwrap(),
        timestamp: NOW,
        tuner_vendor: "1d6b".to_string(),
        tuner_model: "0002".to_string(),
        tuner_preset: 1,
        signal_lock: true,
        service_lock: true,
        signal_strength: 80,
        snr: 1.7,
        bitrate: 250_000,
        carousel_count: 3,
        carousel_status: vec![true, true, false],
    };

    let stream = to_stream_at(&[hb.clone()], 1, NOW).expect("encode");
    assert_eq!(stream.len(), 34);
    assert_eq!(&stream[0..3], &[0x4F, 0x48, 0x44]);
    assert_eq!(&stream[31..34], &[0x4F, 0x48, 0x44]);

    let decoded = from_stream_at(&stream, 1, NOW).expect("decode");
    assert_eq!(decoded.len(), 1);
    let d = &decoded[0];
    assert_eq!(
        d.client_id.to_string(),
        "12345678-1234-4abc-8def-1234567890ab"
    );
    assert_eq!(d.signal_strength, 80);
    assert_eq!(d.snr, 1.7);
    assert_eq!(d.bitrate, 250_000);
    assert_eq!(d.carousel_status, vec![true, true, false]);
}

// ---------------------------------------------------------------------------
// Test 2: Saturation of quantized fields
// ---------------------------------------------------------------------------

#[test]
fn saturated_fields_clamp() {
    let mut rng = StdRng::seed_from_u64(2);
    let mut hb = make_random_heartbeat(&mut rng, NOW);
    hb.signal_strength = 200;
    hb.snr = 10.0;
    hb.bitrate = 10_000_000;
    hb.carousel_count = 31;
    hb.carousel_status = vec![true; 31];

    let stream = to_stream_at(&[hb], 1, NOW).expect("encode");
    let decoded = from_stream_at(&stream, 1, NOW).expect("decode");
    assert_eq!(decoded[0].signal_strength, 100);
    assert_eq!(decoded[0].snr, 3.1);
    assert_eq!(decoded[0].bitrate, 630_000);
    assert_eq!(decoded[0].carousel_count, 31);
}

// ---------------------------------------------------------------------------
// Test 3: Batch delta decode with a pinned clock
// ---------------------------------------------------------------------------

#[test]
fn batch_delta_decode() {
    let mut rng = StdRng::seed_from_u64(3);
    let batch: Vec<Heartbeat> = [NOW - 13.0, NOW - 7.0, NOW]
        .iter()
        .map(|&ts| make_random_heartbeat(&mut rng, ts))
        .collect();

    let stream = to_stream_at(&batch, 1, NOW).expect("encode");
    let decoded = from_stream_at(&stream, 1, NOW).expect("decode");

    let times: Vec<f64> = decoded.iter().map(|h| h.timestamp).collect();
    // Every inter-heartbeat gap rounds down to the 5-second grid.
    assert_eq!(times, vec![NOW - 10.0, NOW - 5.0, NOW]);
}

// ---------------------------------------------------------------------------
// Test 4: Random batch round trip, length law and marker law
// ---------------------------------------------------------------------------

#[test]
fn random_batch_roundtrip() {
    let mut rng = StdRng::seed_from_u64(4);
    for len in [1usize, 2, 10, 30] {
        let batch = make_random_batch(&mut rng, len);
        let stream = to_stream_at(&batch, 1, NOW).expect("encode");

        // Length law.
        assert_eq!(stream.len(), 34 * len);

        // Marker law: every 34-byte window is delimited by "OHD".
        for k in 0..len {
            assert_eq!(&stream[34 * k..34 * k + 3], &[0x4F, 0x48, 0x44]);
            assert_eq!(&stream[34 * k + 31..34 * k + 34], &[0x4F, 0x48, 0x44]);
        }

        // No spurious markers anywhere in the stream.
        let bits = BitBuf::from_bytes(&stream);
        assert_eq!(bits.find_marker(v1::MARKER).len(), 2 * len);

        let decoded = from_stream_at(&stream, 1, NOW).expect("decode");
        assert_eq!(decoded.len(), len);
        for (original, decoded) in batch.iter().zip(&decoded) {
            assert_quantization_laws(original, decoded);
        }
        // Grid-aligned gaps reconstruct timestamps exactly.
        for (original, decoded) in batch.iter().zip(&decoded) {
            assert_eq!(decoded.timestamp, original.timestamp);
        }
    }
}

// ---------------------------------------------------------------------------
// Test 5: Concatenated uploads decode as one stream
// ---------------------------------------------------------------------------

#[test]
fn concatenated_streams_decode() {
    let mut rng = StdRng::seed_from_u64(5);
    // Two uploads back to back, the first ten minutes older.
    let mut older = make_random_batch(&mut rng, 3);
    for hb in &mut older {
        hb.timestamp -= 600.0;
    }
    let newer = make_random_batch(&mut rng, 2);

    let mut stream = to_stream_at(&older, 1, older.last().unwrap().timestamp).expect("encode");
    stream.extend(to_stream_at(&newer, 1, NOW).expect("encode"));

    let decoded = from_stream_at(&stream, 1, NOW).expect("decode");
    assert_eq!(decoded.len(), 5);
    for (original, decoded) in older.iter().chain(&newer).zip(&decoded) {
        assert_eq!(decoded.client_id, original.client_id);
    }
}

// ---------------------------------------------------------------------------
// Test 6: Strict mode end to end
// ---------------------------------------------------------------------------

#[test]
fn strict_mode_roundtrip_and_refusal() {
    let mut rng = StdRng::seed_from_u64(6);

    // Gaps within the 4-bit wire range encode fine.
    let batch = make_random_batch(&mut rng, 8);
    let stream = v1::encode_stream(&batch, NOW, EncodeMode::Strict).expect("strict encode");
    let decoded = from_stream_at(&stream, 1, NOW).expect("decode");
    assert_eq!(decoded.len(), 8);

    // A gap beyond 75 seconds must be refused instead of wrapped.
    let mut stale = make_random_batch(&mut rng, 1);
    stale[0].timestamp = NOW - 500.0;
    assert!(v1::encode_stream(&stale, NOW, EncodeMode::Strict).is_err());
}
