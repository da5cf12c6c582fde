//! CLI argument parsing for the monitoring binaries
//!
//! Common arguments are shared via composition: each binary has its own
//! Args struct that embeds CommonArgs.

use clap::Parser;

/// Common arguments shared across all binaries
#[derive(Parser, Debug, Clone)]
pub struct CommonArgs {
    /// Path to configuration file
    #[arg(short = 'f', long = "config", default_value = "config.toml")]
    pub config_file: String,
}

/// Arguments for the monitoring server
#[derive(Parser, Debug, Clone)]
pub struct ServerArgs {
    #[command(flatten)]
    pub common: CommonArgs,

    /// Override bind address (e.g., 0.0.0.0:8080)
    #[arg(long)]
    pub bind: Option<String>,
}

/// Arguments for the heartbeat fleet emulator
#[derive(Parser, Debug, Clone)]
pub struct EmulatorArgs {
    /// Collector endpoint
    #[arg(short = 'u', long = "url", default_value = "http://localhost:8080/collect")]
    pub server_url: String,

    /// Number of simulated clients
    #[arg(short = 'n', long, default_value = "10")]
    pub clients: usize,

    /// Seconds between telemetry samples
    #[arg(long = "heartbeat-period", default_value = "60")]
    pub heartbeat_period_secs: u64,

    /// Seconds of buffered samples per upload
    #[arg(long = "transmit-period", default_value = "300")]
    pub transmit_period_secs: u64,

    /// Preset the simulated fleet is tuned to
    #[arg(long, default_value = "1")]
    pub preset: u8,

    /// Fraction of the fleet simulated with dead carousels
    #[arg(long = "degraded", default_value = "0.1")]
    pub degraded_fraction: f64,

    /// RNG seed for reproducible fleets
    #[arg(long, default_value = "0")]
    pub seed: u64,
}

/// Arguments for the stream dump tool
#[derive(Parser, Debug, Clone)]
pub struct StreamDumpArgs {
    /// Stream file to decode; reads stdin when omitted
    pub file: Option<std::path::PathBuf>,

    /// Stream version selector
    #[arg(short = 'v', long, default_value = "1")]
    pub version: u8,
}
