//! Common data types shared across components
//!
//! This module defines the heartbeat data model and the CLI argument
//! structures the binaries share.

pub mod cli;
pub mod heartbeat;

pub use heartbeat::Heartbeat;

/// Seconds since the Unix epoch.
pub fn unix_now() -> f64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or(0.0)
}
