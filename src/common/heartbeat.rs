//! Heartbeat data model
//!
//! One telemetry sample emitted by a receiver client. Heartbeats are
//! immutable once created; a batch is the chronologically ordered buffer a
//! client accumulated between uploads (oldest first).

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One telemetry sample.
///
/// `tuner_vendor` and `tuner_model` are USB ids carried as 4-hex-digit
/// strings. `carousel_status` holds exactly `carousel_count` entries; the
/// codec enforces the invariant at encode time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Heartbeat {
    /// Client identity (v4 UUID).
    pub client_id: Uuid,
    /// Sample time, seconds since epoch at the client.
    pub timestamp: f64,
    pub tuner_vendor: String,
    pub tuner_model: String,
    /// Preset id in [0, 31]; 0 = unknown.
    pub tuner_preset: u8,
    /// Tuner locked onto the carrier.
    pub signal_lock: bool,
    /// A stream PID was found and demultiplexed.
    pub service_lock: bool,
    /// Signal strength percentage in [0, 100].
    pub signal_strength: u8,
    /// Signal-to-noise ratio, non-negative, roughly [0, 3.1].
    pub snr: f64,
    /// Service bitrate, bits per second.
    pub bitrate: u64,
    /// Number of carousels in [0, 31].
    pub carousel_count: u8,
    /// Per-carousel transfer activity, `carousel_count` entries.
    pub carousel_status: Vec<bool>,
}

impl Heartbeat {
    /// True when at least one carousel is transferring.
    pub fn any_carousel_active(&self) -> bool {
        self.carousel_status.iter().any(|&b| b)
    }

    /// One-line human-readable summary (debug tooling).
    pub fn display(&self) -> String {
        format!(
            "{} ts={:.0} preset={} vendor={} model={} lock={}/{} strength={} snr={:.1} rate={}bps carousels={}/{}",
            self.client_id,
            self.timestamp,
            self.tuner_preset,
            self.tuner_vendor,
            self.tuner_model,
            if self.signal_lock { "sig" } else { "-" },
            if self.service_lock { "svc" } else { "-" },
            self.signal_strength,
            self.snr,
            self.bitrate,
            self.carousel_status.iter().filter(|&&b| b).count(),
            self.carousel_count,
        )
    }
}

impl std::fmt::Display for Heartbeat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.display())
    }
}
