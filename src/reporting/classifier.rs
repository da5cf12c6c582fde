//! Client health classifier
//!
//! Walks a fixed chain of failure checks over one client's recent
//! datapoints. Each check confirms a diagnosis from its own window and
//! failure-rate threshold; a check that does not confirm hands over to the
//! next. The chain order is a strict refinement from "broadcast content
//! missing" down to "no carrier at all" — reordering it changes diagnoses.
//!
//! The classifier is total: it never fails, and falls through to
//! [`Health::Unknown`] when nothing confirms. All clock dependence goes
//! through the `now` argument, so a frozen clock makes it deterministic.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::storage::StatsDocument;

/// Window for the recency-sensitive checks, seconds.
const SHORT_WINDOW_SECS: f64 = 600.0;

/// Health diagnosis for one client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum Health {
    Ok,
    NoCarousels,
    BadBitrate,
    NoServiceLock,
    NoSignalLock,
    Unknown,
}

impl std::fmt::Display for Health {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let tag = match self {
            Health::Ok => "ok",
            Health::NoCarousels => "no_carousels",
            Health::BadBitrate => "bad_bitrate",
            Health::NoServiceLock => "no_service_lock",
            Health::NoSignalLock => "no_signal_lock",
            Health::Unknown => "unknown",
        };
        write!(f, "{}", tag)
    }
}

/// Classifier output for one client.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClientReport {
    pub health: Health,
    /// Failure rate of the confirmed check's window; for `Unknown`, the
    /// whole-window fraction of `service_ok == false`.
    pub error_rate: f64,
    /// Mean bitrate over the full window, 0 when empty.
    pub avg_bitrate: f64,
    /// True for `Ok`; for `Unknown`, true while `error_rate < 0.5`;
    /// false for every confirmed failure state.
    pub status: bool,
}

/// Classify one client's datapoints.
///
/// `rows` is the client's working set within the reporting window; `now`
/// anchors the 10-minute sub-windows.
pub fn client_report(rows: &[StatsDocument], now: f64) -> ClientReport {
    let avg_bitrate = mean(rows.iter().map(|r| r.bitrate as f64));

    let confirmed = check_ok(rows)
        .or_else(|| check_no_carousels(rows, now))
        .or_else(|| check_bad_bitrate(rows))
        .or_else(|| check_no_service_lock(rows, now))
        .or_else(|| check_no_signal_lock(rows, now));

    match confirmed {
        Some((health, error_rate)) => ClientReport {
            health,
            error_rate,
            avg_bitrate,
            status: health == Health::Ok,
        },
        None => {
            let error_rate = failure_rate(rows.iter(), |r| !r.service_ok).unwrap_or(0.0);
            ClientReport {
                health: Health::Unknown,
                error_rate,
                avg_bitrate,
                status: error_rate < 0.5,
            }
        }
    }
}

/// Dead carousels: none detected, or none transmitting.
fn carousels_dead(row: &StatsDocument) -> bool {
    row.carousels_count == 0 || !row.carousels_status.iter().any(|&b| b)
}

/// Healthy: at most 20% of the whole window has dead carousels.
fn check_ok(rows: &[StatsDocument]) -> Option<(Health, f64)> {
    let rate = failure_rate(rows.iter(), carousels_dead)?;
    (rate <= 0.20).then_some((Health::Ok, rate))
}

/// Carrier and bitrate are fine but carousels stay dead: over 80% of the
/// last 10 minutes.
fn check_no_carousels(rows: &[StatsDocument], now: f64) -> Option<(Health, f64)> {
    let rate = failure_rate(short_window(rows, now), |r| {
        r.bitrate > 0 && carousels_dead(r)
    })?;
    (rate > 0.80).then_some((Health::NoCarousels, rate))
}

/// No data at all: over 80% of the whole window reports zero bitrate.
fn check_bad_bitrate(rows: &[StatsDocument]) -> Option<(Health, f64)> {
    let rate = failure_rate(rows.iter(), |r| r.bitrate == 0)?;
    (rate > 0.80).then_some((Health::BadBitrate, rate))
}

/// Demultiplexer never finds the stream: at least half the last 10 minutes.
fn check_no_service_lock(rows: &[StatsDocument], now: f64) -> Option<(Health, f64)> {
    let rate = failure_rate(short_window(rows, now), |r| !r.service_lock)?;
    (rate >= 0.50).then_some((Health::NoServiceLock, rate))
}

/// No carrier: at least 20% of the last 10 minutes unlocked.
///
/// Never confirms over server-side data (the window query already excludes
/// unlocked rows) but is kept for callers that feed an unfiltered window.
fn check_no_signal_lock(rows: &[StatsDocument], now: f64) -> Option<(Health, f64)> {
    let rate = failure_rate(short_window(rows, now), |r| !r.signal_lock)?;
    (rate >= 0.20).then_some((Health::NoSignalLock, rate))
}

fn short_window<'a>(
    rows: &'a [StatsDocument],
    now: f64,
) -> impl Iterator<Item = &'a StatsDocument> {
    rows.iter().filter(move |r| r.timestamp >= now - SHORT_WINDOW_SECS)
}

/// Fraction of rows failing the predicate; `None` for an empty window,
/// which never confirms a check.
fn failure_rate<'a, I, F>(rows: I, failure: F) -> Option<f64>
where
    I: IntoIterator<Item = &'a StatsDocument>,
    F: Fn(&StatsDocument) -> bool,
{
    let mut datapoints = 0u32;
    let mut failures = 0u32;
    for row in rows {
        datapoints += 1;
        failures += u32::from(failure(row));
    }
    (datapoints > 0).then(|| failures as f64 / datapoints as f64)
}

fn mean(values: impl Iterator<Item = f64>) -> f64 {
    let mut count = 0u32;
    let mut total = 0.0;
    for v in values {
        count += 1;
        total += v;
    }
    if count == 0 {
        0.0
    } else {
        total / count as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    const NOW: f64 = 1_700_000_000.0;

    fn row(age_secs: f64) -> StatsDocument {
        StatsDocument {
            ip: "203.0.113.9".to_string(),
            location: Some("de".to_string()),
            client_id: Uuid::nil(),
            signal_lock: true,
            service_lock: true,
            signal_strength: 80,
            bitrate: 250_000,
            snr: 1.8,
            service_ok: true,
            tuner_vendor: "1d6b".to_string(),
            tuner_model: "0002".to_string(),
            tuner_preset: 1,
            carousels_count: 2,
            carousels_status: vec![true, false],
            timestamp: NOW - age_secs,
            reported: NOW - age_secs,
        }
    }

    fn dead_carousels(mut r: StatsDocument) -> StatsDocument {
        r.carousels_status = vec![false; r.carousels_count as usize];
        r.service_ok = false;
        r
    }

    /// 30 points over 20 minutes, 2 with dead carousels: healthy.
    #[test]
    fn healthy_client() {
        let mut rows = Vec::new();
        for i in 0..30 {
            let r = row(i as f64 * 40.0);
            rows.push(if i < 2 { dead_carousels(r) } else { r });
        }
        let report = client_report(&rows, NOW);
        assert_eq!(report.health, Health::Ok);
        assert!(report.status);
        assert!(report.error_rate <= 0.20);
        assert_eq!(report.avg_bitrate, 250_000.0);
    }

    /// Bitrate present but every recent point has dead carousels.
    #[test]
    fn no_carousels_client() {
        let rows: Vec<_> = (0..10)
            .map(|i| dead_carousels(row(i as f64 * 60.0)))
            .collect();
        let report = client_report(&rows, NOW);
        assert_eq!(report.health, Health::NoCarousels);
        assert!(!report.status);
        assert_eq!(report.error_rate, 1.0);
    }

    /// Zero bitrate everywhere falls past no_carousels to bad_bitrate.
    #[test]
    fn bad_bitrate_client() {
        let rows: Vec<_> = (0..20)
            .map(|i| {
                let mut r = dead_carousels(row(i as f64 * 60.0));
                r.bitrate = 0;
                r
            })
            .collect();
        let report = client_report(&rows, NOW);
        assert_eq!(report.health, Health::BadBitrate);
        assert!(!report.status);
        assert_eq!(report.avg_bitrate, 0.0);
    }

    /// Carrier locked, stream never found.
    #[test]
    fn no_service_lock_client() {
        let rows: Vec<_> = (0..10)
            .map(|i| {
                let mut r = row(i as f64 * 60.0);
                r.service_lock = false;
                r.service_ok = false;
                // Half the carousels dead: enough to fail the ok check,
                // not enough for no_carousels to confirm.
                if i % 2 == 0 {
                    r.carousels_status = vec![false, false];
                }
                r
            })
            .collect();
        let report = client_report(&rows, NOW);
        assert_eq!(report.health, Health::NoServiceLock);
        assert!(!report.status);
        assert_eq!(report.error_rate, 1.0);
    }

    /// Unlocked rows only confirm no_signal_lock when the caller feeds an
    /// unfiltered window; the server-side query never does.
    #[test]
    fn no_signal_lock_on_unfiltered_window() {
        let rows: Vec<_> = (0..10)
            .map(|i| {
                let mut r = row(i as f64 * 60.0);
                if i < 3 {
                    r.signal_lock = false;
                }
                // Keep earlier checks from confirming: carousels half dead.
                r.carousels_status = vec![if i % 2 == 0 { false } else { true }, false];
                r
            })
            .collect();
        let report = client_report(&rows, NOW);
        assert_eq!(report.health, Health::NoSignalLock);
        assert!(!report.status);
    }

    /// Nothing confirms: unknown, with the service_ok failure fraction.
    #[test]
    fn unknown_when_nothing_confirms() {
        // Mixed bag: 40% dead carousels (fails ok's <=20%), recent window
        // only 40% dead (fails no_carousels' >80%), bitrate nonzero, all
        // locks on.
        let rows: Vec<_> = (0..10)
            .map(|i| {
                let r = row(i as f64 * 60.0);
                if i % 5 < 2 {
                    dead_carousels(r)
                } else {
                    r
                }
            })
            .collect();
        let report = client_report(&rows, NOW);
        assert_eq!(report.health, Health::Unknown);
        assert_eq!(report.error_rate, 0.4);
        assert!(report.status);
    }

    /// Empty working set: unknown with zero error rate.
    #[test]
    fn empty_window_is_unknown() {
        let report = client_report(&[], NOW);
        assert_eq!(report.health, Health::Unknown);
        assert_eq!(report.error_rate, 0.0);
        assert_eq!(report.avg_bitrate, 0.0);
        assert!(report.status);
    }

    /// Old rows outside the 10-minute window cannot confirm recency checks.
    #[test]
    fn short_window_excludes_old_rows() {
        // All carousels dead, but every row is 15+ minutes old: the
        // no_carousels window is empty and the cascade falls through to
        // bad_bitrate, which the nonzero bitrate also fails; service and
        // signal lock windows are empty too, so unknown.
        let rows: Vec<_> = (0..10)
            .map(|i| dead_carousels(row(900.0 + i as f64 * 60.0)))
            .collect();
        let report = client_report(&rows, NOW);
        assert_eq!(report.health, Health::Unknown);
        assert!(!report.status); // every point failed service_ok
    }

    /// Same inputs, same clock: identical outputs.
    #[test]
    fn deterministic_under_frozen_clock() {
        let rows: Vec<_> = (0..8).map(|i| dead_carousels(row(i as f64 * 70.0))).collect();
        let a = client_report(&rows, NOW);
        let b = client_report(&rows, NOW);
        assert_eq!(a, b);
    }
}
