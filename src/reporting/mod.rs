//! Periodic client health reporting
//!
//! Architecture:
//! - One bulk window query against the stats repository
//! - Pure in-memory pass: classify clients, aggregate per satellite,
//!   detect status transitions against the previous pass
//! - Alert delivery over SMTP for every transition
//!
//! The pass is idempotent under re-execution: it reads one window, holds
//! no transaction, and the only cross-pass memory is the per-satellite
//! status map. Delivery failures are logged and never touch that map, so
//! a lost alert surfaces again on the next genuine transition.

pub mod alerts;
pub mod classifier;
pub mod mailer;

pub use alerts::{ClientError, SatReport, SatStatus};
pub use classifier::{client_report, ClientReport, Health};
pub use mailer::SmtpMailer;

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;
use serde::Serialize;
use thiserror::Error;
use tokio::sync::broadcast;
use tracing::{error, info, warn};
use utoipa::ToSchema;

use crate::common::unix_now;
use crate::satdata::{preset_ids, sat_name_or};
use crate::storage::{StatsRepository, StorageError};

/// Reporting errors
#[derive(Error, Debug)]
pub enum ReportingError {
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("SMTP transport error: {0}")]
    Smtp(#[from] lettre::transport::smtp::Error),

    #[error("bad email address: {0}")]
    Address(#[from] lettre::address::AddressError),

    #[error("email build error: {0}")]
    Email(#[from] lettre::error::Error),
}

/// Dashboard summary for one satellite.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, ToSchema)]
pub struct SatSummary {
    pub status: SatStatus,
    pub clients: usize,
    pub error_rate: f64,
    pub bitrate: f64,
}

/// Process-wide reporting memory, mutated only by the reporting pass.
#[derive(Debug, Clone, Default)]
pub struct ReportingState {
    /// Per-preset status as of the previous pass. Missing entries read as
    /// NORMAL. Process-local: a restart re-alerts any degraded satellite
    /// on its first pass.
    pub last_state: HashMap<u8, SatStatus>,
    /// Published dashboard map, satellite name to summary.
    pub last_report: BTreeMap<String, SatSummary>,
    /// Wall clock of the last completed pass.
    pub last_check: Option<f64>,
}

/// Shared handle to the reporting state.
pub type SharedReportingState = Arc<RwLock<ReportingState>>;

/// One alert to deliver: a satellite whose status changed.
#[derive(Debug, Clone)]
pub struct Alert {
    pub preset: u8,
    pub sat_name: &'static str,
    pub status: SatStatus,
    pub errors: Vec<ClientError>,
}

impl Alert {
    pub fn subject(&self) -> String {
        format!("[SAT MONITOR ALERT] {}", self.sat_name)
    }

    pub fn message(&self) -> String {
        alerts::compose_message(self.status, &self.errors)
    }
}

/// Outcome of one pure classifier pass.
#[derive(Debug, Clone)]
pub struct PassOutcome {
    pub new_state: HashMap<u8, SatStatus>,
    pub report: BTreeMap<String, SatSummary>,
    pub alerts: Vec<Alert>,
}

/// Run the classifier over one reporting window.
///
/// Pure: everything time-dependent flows through `now`, and `last_state`
/// is read-only. Rows must be sorted by `(tuner_preset, client_id,
/// timestamp)`.
pub fn classifier_pass(
    rows: &[crate::storage::StatsDocument],
    now: f64,
    last_state: &HashMap<u8, SatStatus>,
) -> PassOutcome {
    let reports = alerts::sat_reports(rows, now);

    let mut report = BTreeMap::new();
    for sat in &reports {
        report.insert(
            sat_name_or(sat.preset, "Unknown").to_string(),
            SatSummary {
                status: sat.status(),
                clients: sat.nclients,
                error_rate: sat.error_rate,
                bitrate: sat.bitrate,
            },
        );
    }

    // Current status for every known preset; no data means NORMAL.
    let mut new_state = HashMap::new();
    for preset in preset_ids() {
        let status = reports
            .iter()
            .find(|r| r.preset == preset)
            .map(|r| r.status())
            .unwrap_or(SatStatus::Normal);
        new_state.insert(preset, status);
    }

    let mut pass_alerts = Vec::new();
    for preset in preset_ids() {
        let old = last_state.get(&preset).copied().unwrap_or(SatStatus::Normal);
        let new = new_state[&preset];
        if old != new {
            let errors = reports
                .iter()
                .find(|r| r.preset == preset)
                .map(|r| r.errors.clone())
                .unwrap_or_default();
            pass_alerts.push(Alert {
                preset,
                sat_name: sat_name_or(preset, "Unknown"),
                status: new,
                errors,
            });
        }
    }

    PassOutcome {
        new_state,
        report,
        alerts: pass_alerts,
    }
}

/// Execute one full reporting pass: query, classify, store, deliver.
pub async fn run_pass(
    repo: &StatsRepository,
    state: &SharedReportingState,
    mailer: &SmtpMailer,
    recipients: &[String],
    datapoints_interval: u64,
) -> Result<(), ReportingError> {
    let now = unix_now();
    let rows = repo.recent_datapoints(datapoints_interval, now).await?;

    let last_state = state.read().last_state.clone();
    let outcome = classifier_pass(&rows, now, &last_state);

    info!(
        datapoints = rows.len(),
        satellites = outcome.report.len(),
        transitions = outcome.alerts.len(),
        "Reporting pass complete"
    );

    // Store first: delivery failures must not corrupt the status map.
    {
        let mut guard = state.write();
        guard.last_state = outcome.new_state.clone();
        guard.last_report = outcome.report.clone();
        guard.last_check = Some(now);
    }

    for alert in &outcome.alerts {
        info!(
            preset = alert.preset,
            sat = alert.sat_name,
            status = %alert.status,
            clients_in_error = alert.errors.len(),
            "Satellite status changed"
        );
        if let Err(err) = mailer
            .send(recipients, &alert.subject(), &alert.message())
            .await
        {
            error!(sat = alert.sat_name, error = %err, "Mail report sending failed");
        }
    }

    Ok(())
}

/// Periodic reporting task. Runs until the shutdown channel fires.
pub async fn run_reporting_task(
    repo: StatsRepository,
    state: SharedReportingState,
    mailer: SmtpMailer,
    recipients: Vec<String>,
    interval_secs: u64,
    datapoints_interval: u64,
    mut shutdown: broadcast::Receiver<()>,
) {
    let mut ticker = tokio::time::interval(Duration::from_secs(interval_secs.max(1)));
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    info!(
        interval_secs = interval_secs,
        datapoints_interval = datapoints_interval,
        "Reporting task started"
    );

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                if let Err(err) =
                    run_pass(&repo, &state, &mailer, &recipients, datapoints_interval).await
                {
                    warn!(error = %err, "Reporting pass failed");
                }
            }
            _ = shutdown.recv() => {
                info!("Reporting task shutting down");
                break;
            }
        }
    }
}
