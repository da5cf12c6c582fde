//! Heartbeat fleet emulator
//!
//! Simulates a fleet of receiver clients for end-to-end testing of the
//! collector: each simulated client samples plausible tuner telemetry once
//! per heartbeat period, buffers it, and uploads the encoded buffer every
//! transmit period, keeping the buffer when the upload fails.

use rand::prelude::*;
use rand::rngs::StdRng;
use rand_distr::{Distribution, Normal};
use reqwest::multipart::{Form, Part};
use thiserror::Error;
use tokio::sync::broadcast;
use tokio::time::{interval, Duration};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::codec::{to_stream, CodecError};
use crate::common::Heartbeat;
use crate::satdata::{get_preset, match_preset, TunerParams};

/// Emulator configuration
#[derive(Debug, Clone)]
pub struct EmulatorConfig {
    /// Collector endpoint (e.g., "http://localhost:8080/collect")
    pub server_url: String,
    /// Number of simulated clients
    pub clients: usize,
    /// Seconds between telemetry samples
    pub heartbeat_period_secs: u64,
    /// Seconds of buffered samples per upload
    pub transmit_period_secs: u64,
    /// Preset the simulated fleet is tuned to
    pub tuner_preset: u8,
    /// Fraction of the fleet simulated with dead carousels
    pub degraded_fraction: f64,
    /// RNG seed for reproducible fleets
    pub seed: u64,
}

impl Default for EmulatorConfig {
    fn default() -> Self {
        Self {
            server_url: "http://localhost:8080/collect".to_string(),
            clients: 10,
            heartbeat_period_secs: 60,
            transmit_period_secs: 300,
            tuner_preset: 1,
            degraded_fraction: 0.1,
            seed: 0,
        }
    }
}

/// Emulator errors
#[derive(Error, Debug)]
pub enum EmulatorError {
    #[error("encode error: {0}")]
    Codec(#[from] CodecError),

    #[error("upload error: {0}")]
    Http(#[from] reqwest::Error),
}

/// One simulated client with its upload buffer.
struct SimClient {
    id: Uuid,
    tuner_vendor: String,
    tuner_model: String,
    degraded: bool,
    /// Chronological buffer, oldest first.
    buffer: Vec<Heartbeat>,
}

/// Heartbeat fleet emulator
pub struct Emulator {
    config: EmulatorConfig,
    http: reqwest::Client,
    rng: StdRng,
    clients: Vec<SimClient>,
    /// What the fleet's tuners are set to; heartbeats carry whatever
    /// preset these parameters match, like a real client would.
    tuner: TunerParams,
}

impl Emulator {
    pub fn new(config: EmulatorConfig) -> Self {
        let mut rng = StdRng::seed_from_u64(config.seed);
        let clients = (0..config.clients)
            .map(|i| {
                let degraded = ((i as f64 + 0.5) / config.clients.max(1) as f64)
                    < config.degraded_fraction;
                SimClient {
                    id: Uuid::from_u128(rng.gen()),
                    tuner_vendor: "0b48".to_string(),
                    tuner_model: format!("{:04x}", 0x3000 + rng.gen_range(0..16)),
                    degraded,
                    buffer: Vec::new(),
                }
            })
            .collect();
        let tuner = get_preset(config.tuner_preset)
            .map(|p| p.params())
            .unwrap_or_else(|| TunerParams {
                frequency: "11000".to_string(),
                symbolrate: "20000".to_string(),
                polarization: "v".to_string(),
                delivery: "DVB-S".to_string(),
                modulation: "QPSK".to_string(),
            });
        Self {
            config,
            http: reqwest::Client::new(),
            rng,
            clients,
            tuner,
        }
    }

    /// Sample one heartbeat for a client.
    fn sample(rng: &mut StdRng, client: &SimClient, preset: u8, now: f64) -> Heartbeat {
        // Rare fades drop the carrier entirely.
        let signal_lock = rng.gen_bool(0.97);

        let strength_noise = Normal::<f64>::new(75.0, 8.0).unwrap();
        let snr_noise = Normal::<f64>::new(1.8, 0.35).unwrap();
        let bitrate_noise = Normal::<f64>::new(300_000.0, 40_000.0).unwrap();

        let (signal_strength, snr, bitrate) = if signal_lock {
            (
                strength_noise.sample(rng).clamp(0.0, 100.0) as u8,
                snr_noise.sample(rng).max(0.0),
                bitrate_noise.sample(rng).max(0.0) as u64,
            )
        } else {
            (0, 0.0, 0)
        };

        let carousel_count = 3u8;
        let carousel_status: Vec<bool> = if !signal_lock || client.degraded {
            vec![false; carousel_count as usize]
        } else {
            (0..carousel_count).map(|_| rng.gen_bool(0.8)).collect()
        };

        Heartbeat {
            client_id: client.id,
            timestamp: now,
            tuner_vendor: client.tuner_vendor.clone(),
            tuner_model: client.tuner_model.clone(),
            tuner_preset: preset,
            signal_lock,
            service_lock: signal_lock && rng.gen_bool(0.98),
            signal_strength,
            snr,
            bitrate,
            carousel_count,
            carousel_status,
        }
    }

    /// Upload one client's buffer; the buffer survives a failed upload.
    async fn transmit(&self, buffer: &[Heartbeat]) -> Result<(), EmulatorError> {
        let stream = to_stream(buffer, 1)?;
        let form = Form::new().part("stream", Part::bytes(stream));
        let response = self
            .http
            .post(&self.config.server_url)
            .multipart(form)
            .send()
            .await?;
        response.error_for_status()?;
        Ok(())
    }

    /// Run the fleet until the shutdown channel fires.
    pub async fn run(&mut self, mut shutdown: broadcast::Receiver<()>) {
        let mut ticker = interval(Duration::from_secs(self.config.heartbeat_period_secs.max(1)));

        info!(
            clients = self.clients.len(),
            server = %self.config.server_url,
            "Emulator fleet started"
        );

        loop {
            tokio::select! {
                _ = ticker.tick() => self.tick().await,
                _ = shutdown.recv() => {
                    info!("Emulator shutting down");
                    break;
                }
            }
        }
    }

    async fn tick(&mut self) {
        let now = crate::common::unix_now();
        let transmit_window = self.config.transmit_period_secs as f64;
        let preset = match_preset(&self.tuner);

        for i in 0..self.clients.len() {
            let hb = Self::sample(&mut self.rng, &self.clients[i], preset, now);
            self.clients[i].buffer.push(hb);

            let due = self.clients[i]
                .buffer
                .first()
                .map(|oldest| now - oldest.timestamp > transmit_window)
                .unwrap_or(false);
            if !due {
                continue;
            }

            // Ship only samples still inside the transmit window.
            self.clients[i]
                .buffer
                .retain(|hb| now - hb.timestamp <= transmit_window);

            let client_id = self.clients[i].id;
            let result = self.transmit(&self.clients[i].buffer).await;
            match result {
                Ok(()) => {
                    debug!(
                        client = %client_id,
                        datapoints = self.clients[i].buffer.len(),
                        "Uploaded heartbeat batch"
                    );
                    self.clients[i].buffer.clear();
                }
                Err(err) => {
                    warn!(client = %client_id, error = %err, "Upload failed, keeping buffer");
                }
            }
        }
    }
}
