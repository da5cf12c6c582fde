//! Monitoring server binary - heartbeat collector + periodic reporting
//!
//! Usage:
//!   cargo run --bin server                         # config.toml defaults
//!   cargo run --bin server -- --config mon.toml
//!   cargo run --bin server -- --bind 0.0.0.0:9000

use std::sync::Arc;

use clap::Parser;
use tokio::sync::broadcast;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use ohdmon_rs::collector::{self, AppState, NoCountryLookup};
use ohdmon_rs::common::cli::ServerArgs;
use ohdmon_rs::config::Config;
use ohdmon_rs::reporting::{self, ReportingState, SmtpMailer};
use ohdmon_rs::storage::StatsRepository;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing (logging)
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("ohdmon_rs=info".parse()?))
        .init();

    let args = ServerArgs::parse();
    let config = Config::load(&args.common.config_file)?;
    info!(config_file = %args.common.config_file, "Loaded configuration");

    let bind = args.bind.unwrap_or_else(|| config.server.bind.clone());

    let repo = StatsRepository::connect(&config.database.uri, &config.database.database).await?;

    let reporting_state = Arc::new(parking_lot::RwLock::new(ReportingState::default()));

    // Create shutdown channel
    let (shutdown_tx, shutdown_rx) = broadcast::channel::<()>(1);

    // Handle Ctrl+C
    let shutdown_tx_clone = shutdown_tx.clone();
    tokio::spawn(async move {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to listen for Ctrl+C");
        println!("\nReceived Ctrl+C, shutting down...");
        let _ = shutdown_tx_clone.send(());
    });

    // Periodic reporting needs complete alerting configuration; the
    // collector keeps running either way.
    let mut reporting_task = None;
    match config.alerting() {
        Ok((email, recipients)) => match SmtpMailer::new(email) {
            Ok(mailer) => {
                reporting_task = Some(tokio::spawn(reporting::run_reporting_task(
                    repo.clone(),
                    reporting_state.clone(),
                    mailer,
                    recipients.to_vec(),
                    config.reporting.interval,
                    config.reporting.datapoints_interval,
                    shutdown_tx.subscribe(),
                )));
            }
            Err(err) => error!(error = %err, "SMTP setup failed, reporting disabled"),
        },
        Err(err) => warn!(error = %err, "Reporting disabled"),
    }

    let state = Arc::new(AppState {
        repo,
        reporting: reporting_state,
        geoip: Arc::new(NoCountryLookup),
    });

    println!("========================================");
    println!("     Satellite Monitor Started");
    println!("========================================");
    println!();
    println!("  Collector:  http://{}/collect", bind);
    println!("  Status:     http://{}/status", bind);
    println!("  Swagger UI: http://{}/swagger-ui/", bind);
    println!();
    println!("  Press Ctrl+C to stop.");
    println!("========================================");

    collector::serve(&bind, state, shutdown_rx).await?;

    if let Some(task) = reporting_task {
        let _ = task.await;
    }

    println!("Server stopped.");
    Ok(())
}
