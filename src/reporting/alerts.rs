//! Per-satellite aggregation and alert messages
//!
//! Groups the reporting window by satellite preset and client, classifies
//! each client, and turns the per-satellite picture into an operational
//! status plus the alert text sent when that status changes.

use chrono::DateTime;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use super::classifier::{client_report, Health};
use crate::storage::StatsDocument;

/// Operational status of one satellite.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "UPPERCASE")]
pub enum SatStatus {
    Normal,
    Warning,
    Critical,
}

impl std::fmt::Display for SatStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            SatStatus::Normal => "NORMAL",
            SatStatus::Warning => "WARNING",
            SatStatus::Critical => "CRITICAL",
        };
        write!(f, "{}", s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Warning,
    Critical,
}

/// One client's contribution to an alert.
#[derive(Debug, Clone, PartialEq)]
pub struct ClientError {
    /// Wall clock when the error was recorded, seconds since epoch.
    pub timestamp: f64,
    pub client_id: Uuid,
    pub health: Health,
    /// The aggregate value behind the error (a rate for HighErrorRate).
    pub value: f64,
    pub kind: ErrorKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    HighErrorRate,
}

impl ErrorKind {
    pub fn label(&self) -> &'static str {
        match self {
            ErrorKind::HighErrorRate => "high error rate",
        }
    }

    pub fn parameter(&self) -> &'static str {
        match self {
            ErrorKind::HighErrorRate => "errors rate",
        }
    }

    pub fn severity(&self) -> Severity {
        match self {
            ErrorKind::HighErrorRate => Severity::Critical,
        }
    }
}

impl ClientError {
    pub fn high_error_rate(client_id: Uuid, health: Health, error_rate: f64, now: f64) -> Self {
        Self {
            timestamp: now,
            client_id,
            health,
            value: error_rate,
            kind: ErrorKind::HighErrorRate,
        }
    }

    pub fn severity(&self) -> Severity {
        self.kind.severity()
    }
}

impl std::fmt::Display for ClientError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let when = DateTime::from_timestamp(self.timestamp as i64, 0)
            .map(|t| t.format("%b %d %H:%M UTC").to_string())
            .unwrap_or_else(|| "unknown time".to_string());
        write!(
            f,
            "[{}] Client {} reported {} with aggregate value of {} {} and health {}",
            when,
            self.client_id,
            self.kind.label(),
            self.value,
            self.kind.parameter(),
            self.health,
        )
    }
}

/// Aggregated picture of one satellite over the reporting window.
#[derive(Debug, Clone)]
pub struct SatReport {
    pub preset: u8,
    /// Clients seen on this preset.
    pub nclients: usize,
    /// One entry per client whose classifier status came back false.
    pub errors: Vec<ClientError>,
    /// Failing clients over clients seen.
    pub error_rate: f64,
    /// Mean of per-client average bitrates, counting only clients that
    /// moved data.
    pub bitrate: f64,
}

impl SatReport {
    pub fn status(&self) -> SatStatus {
        if self.error_rate > 0.10 {
            SatStatus::Critical
        } else if self.error_rate > 0.05 {
            SatStatus::Warning
        } else {
            SatStatus::Normal
        }
    }
}

/// Group the sorted reporting window by preset and client and classify
/// every client.
///
/// `rows` must be sorted by `(tuner_preset, client_id, timestamp)` — the
/// order the repository query returns.
pub fn sat_reports(rows: &[StatsDocument], now: f64) -> Vec<SatReport> {
    let mut reports = Vec::new();
    for preset_rows in rows.chunk_by(|a, b| a.tuner_preset == b.tuner_preset) {
        let preset = preset_rows[0].tuner_preset;

        let mut nclients = 0usize;
        let mut errors = Vec::new();
        let mut moving_bitrates = Vec::new();

        for client_rows in preset_rows.chunk_by(|a, b| a.client_id == b.client_id) {
            nclients += 1;
            let report = client_report(client_rows, now);
            if report.avg_bitrate > 0.0 {
                moving_bitrates.push(report.avg_bitrate);
            }
            if !report.status {
                errors.push(ClientError::high_error_rate(
                    client_rows[0].client_id,
                    report.health,
                    report.error_rate,
                    now,
                ));
            }
        }

        let error_rate = errors.len() as f64 / nclients as f64;
        let bitrate = if moving_bitrates.is_empty() {
            0.0
        } else {
            moving_bitrates.iter().sum::<f64>() / moving_bitrates.len() as f64
        };

        reports.push(SatReport {
            preset,
            nclients,
            errors,
            error_rate,
            bitrate,
        });
    }
    reports
}

fn error_block(title: &str, errors: &[&ClientError]) -> String {
    let mut msg = format!("{}:\n\n", title);
    msg.push_str(
        &errors
            .iter()
            .map(|e| e.to_string())
            .collect::<Vec<_>>()
            .join("\n"),
    );
    msg.push_str("\n\n");
    msg
}

/// Compose the alert body for a satellite whose status changed.
pub fn compose_message(status: SatStatus, errors: &[ClientError]) -> String {
    let critical: Vec<&ClientError> = errors
        .iter()
        .filter(|e| e.severity() == Severity::Critical)
        .collect();
    let warnings: Vec<&ClientError> = errors
        .iter()
        .filter(|e| e.severity() == Severity::Warning)
        .collect();

    let mut msg = format!("SATELLITE STATUS: {}\n\n", status);
    if !critical.is_empty() {
        msg.push_str(&error_block("CRITICAL ALERTS", &critical));
    }
    if !warnings.is_empty() {
        msg.push_str(&error_block("WARNINGS", &warnings));
    }
    msg
}
