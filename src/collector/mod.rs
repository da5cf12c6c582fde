//! Collector - HTTP ingest endpoint for heartbeat streams
//!
//! Clients POST their encoded heartbeat batch as the `stream` field of a
//! multipart form. The collector decodes the stream, computes a service
//! verdict per datapoint and persists one row each, stamped with the
//! receiving IP, resolved country and the server wall clock. A small
//! status API publishes the latest reporting pass for dashboards.

use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    extract::{ConnectInfo, Multipart, State},
    http::StatusCode,
    response::Json,
    routing::{get, post},
    Router,
};
use serde::Serialize;
use thiserror::Error;
use tokio::sync::broadcast;
use tower_http::cors::CorsLayer;
use tracing::{error, info};
use utoipa::{OpenApi, ToSchema};
use utoipa_swagger_ui::SwaggerUi;

use crate::codec::from_stream;
use crate::common::{unix_now, Heartbeat};
use crate::reporting::{SatStatus, SatSummary, SharedReportingState};
use crate::storage::{StatsDocument, StatsRepository};

/// Stream version accepted by this collector.
const STREAM_VERSION: u8 = 1;

/// Collector errors
#[derive(Error, Debug)]
pub enum CollectorError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Geographic IP resolution, provided by an external collaborator.
pub trait CountryLookup: Send + Sync {
    /// ISO-3166-1 alpha-2 country code, lower case, if resolvable.
    fn country_code(&self, ip: std::net::IpAddr) -> Option<String>;
}

/// Lookup that resolves nothing; used when no geo database is wired in.
pub struct NoCountryLookup;

impl CountryLookup for NoCountryLookup {
    fn country_code(&self, _ip: std::net::IpAddr) -> Option<String> {
        None
    }
}

/// Shared collector state
pub struct AppState {
    pub repo: StatsRepository,
    pub reporting: SharedReportingState,
    pub geoip: Arc<dyn CountryLookup>,
}

#[derive(OpenApi)]
#[openapi(
    paths(show_status),
    components(schemas(StatusResponse, SatSummary, SatStatus)),
    tags((name = "Monitoring", description = "Fleet monitoring status"))
)]
struct ApiDoc;

/// Build the collector router.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/collect", post(collect_heartbeat))
        .route("/status", get(show_status))
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Serve the collector until the shutdown channel fires.
pub async fn serve(
    bind: &str,
    state: Arc<AppState>,
    mut shutdown: broadcast::Receiver<()>,
) -> Result<(), CollectorError> {
    let listener = tokio::net::TcpListener::bind(bind).await?;
    info!(bind = bind, "Collector listening");
    axum::serve(
        listener,
        router(state).into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(async move {
        let _ = shutdown.recv().await;
    })
    .await?;
    Ok(())
}

/// Service verdict for one decoded heartbeat.
///
/// Unlocked points are reported OK: without a lock nothing is known about
/// the service, and the classifier excludes them anyway. An empty or
/// all-idle carousel set could also mean local trouble at the client
/// (broken cache, full disk), but is counted against the service until
/// that proves misleading.
pub fn service_ok(hb: &Heartbeat) -> bool {
    if !hb.signal_lock {
        return true;
    }
    if hb.bitrate == 0 {
        return false;
    }
    if !hb.service_lock {
        return false;
    }
    if hb.carousel_count == 0 || !hb.any_carousel_active() {
        return false;
    }
    true
}

/// Build the persisted row for one heartbeat.
fn stats_row(
    hb: &Heartbeat,
    ip: &str,
    location: Option<String>,
    reported: f64,
) -> StatsDocument {
    StatsDocument {
        ip: ip.to_string(),
        location,
        client_id: hb.client_id,
        signal_lock: hb.signal_lock,
        service_lock: hb.service_lock,
        signal_strength: hb.signal_strength,
        bitrate: hb.bitrate,
        snr: hb.snr,
        service_ok: service_ok(hb),
        tuner_vendor: hb.tuner_vendor.clone(),
        tuner_model: hb.tuner_model.clone(),
        tuner_preset: hb.tuner_preset,
        carousels_count: hb.carousel_count,
        carousels_status: hb.carousel_status.clone(),
        timestamp: hb.timestamp,
        reported,
    }
}

/// POST /collect - ingest one encoded heartbeat batch.
async fn collect_heartbeat(
    State(state): State<Arc<AppState>>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    mut multipart: Multipart,
) -> (StatusCode, &'static str) {
    let mut stream = None;
    loop {
        match multipart.next_field().await {
            Ok(Some(field)) => {
                if field.name() == Some("stream") {
                    match field.bytes().await {
                        Ok(bytes) => stream = Some(bytes),
                        Err(_) => return (StatusCode::BAD_REQUEST, "Invalid data"),
                    }
                }
            }
            Ok(None) => break,
            Err(_) => return (StatusCode::BAD_REQUEST, "Invalid data"),
        }
    }
    let Some(stream) = stream else {
        return (StatusCode::BAD_REQUEST, "Invalid data");
    };

    let heartbeats = match from_stream(&stream, STREAM_VERSION) {
        Ok(heartbeats) => heartbeats,
        Err(err) => {
            info!(peer = %addr, error = %err, "Rejected heartbeat stream");
            return (StatusCode::BAD_REQUEST, "Invalid data");
        }
    };

    info!(peer = %addr, datapoints = heartbeats.len(), "Received data points");

    let ip = addr.ip().to_string();
    let location = state.geoip.country_code(addr.ip());
    for hb in &heartbeats {
        let row = stats_row(hb, &ip, location.clone(), unix_now());
        if let Err(err) = state.repo.insert(&row).await {
            // Drop the row, keep the batch going.
            error!(client = %hb.client_id, error = %err, "Failed to store datapoint");
        }
    }

    info!("Finished storing all data points");
    (StatusCode::OK, "OK")
}

/// Dashboard status payload.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct StatusResponse {
    /// Latest per-satellite summaries, keyed by satellite name.
    pub satellites: BTreeMap<String, SatSummary>,
    /// Wall clock of the last completed reporting pass, seconds since
    /// epoch; absent before the first pass.
    pub last_check: Option<f64>,
}

/// Get the latest reporting pass results
#[utoipa::path(
    get,
    path = "/status",
    tag = "Monitoring",
    responses(
        (status = 200, description = "Latest per-satellite status", body = StatusResponse)
    )
)]
async fn show_status(State(state): State<Arc<AppState>>) -> Json<StatusResponse> {
    let guard = state.reporting.read();
    Json(StatusResponse {
        satellites: guard.last_report.clone(),
        last_check: guard.last_check,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn heartbeat() -> Heartbeat {
        Heartbeat {
            client_id: uuid::Uuid::nil(),
            timestamp: 1_700_000_000.0,
            tuner_vendor: "1d6b".to_string(),
            tuner_model: "0002".to_string(),
            tuner_preset: 1,
            signal_lock: true,
            service_lock: true,
            signal_strength: 80,
            snr: 1.9,
            bitrate: 250_000,
            carousel_count: 2,
            carousel_status: vec![true, false],
        }
    }

    #[test]
    fn service_ok_verdicts() {
        // Fully operational.
        let hb = heartbeat();
        assert!(service_ok(&hb));

        // No lock: verdict is OK because nothing is known.
        let mut hb = heartbeat();
        hb.signal_lock = false;
        hb.bitrate = 0;
        assert!(service_ok(&hb));

        // Locked but no data.
        let mut hb = heartbeat();
        hb.bitrate = 0;
        assert!(!service_ok(&hb));

        // Locked, data, but no service lock.
        let mut hb = heartbeat();
        hb.service_lock = false;
        assert!(!service_ok(&hb));

        // No carousels detected.
        let mut hb = heartbeat();
        hb.carousel_count = 0;
        hb.carousel_status = vec![];
        assert!(!service_ok(&hb));

        // Carousels present but all idle.
        let mut hb = heartbeat();
        hb.carousel_status = vec![false, false];
        assert!(!service_ok(&hb));
    }

    #[test]
    fn stats_row_carries_verdict_and_origin() {
        let hb = heartbeat();
        let row = stats_row(&hb, "203.0.113.9", Some("de".to_string()), 1_700_000_100.0);
        assert!(row.service_ok);
        assert_eq!(row.ip, "203.0.113.9");
        assert_eq!(row.location.as_deref(), Some("de"));
        assert_eq!(row.reported, 1_700_000_100.0);
        assert_eq!(row.timestamp, hb.timestamp);
        assert_eq!(row.carousels_count, 2);
        assert_eq!(row.carousels_status, vec![true, false]);
    }
}
