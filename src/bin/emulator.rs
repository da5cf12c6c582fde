//! Emulator binary - simulated receiver fleet posting heartbeats
//!
//! Usage:
//!   cargo run --bin emulator                                   # defaults
//!   cargo run --bin emulator -- -u http://collector:8080/collect -n 50
//!   cargo run --bin emulator -- --heartbeat-period 5 --transmit-period 30

use clap::Parser;
use tokio::sync::broadcast;
use tracing_subscriber::EnvFilter;

use ohdmon_rs::common::cli::EmulatorArgs;
use ohdmon_rs::emulator::{Emulator, EmulatorConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing (logging)
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("ohdmon_rs=info".parse()?))
        .init();

    let args = EmulatorArgs::parse();
    let config = EmulatorConfig {
        server_url: args.server_url,
        clients: args.clients,
        heartbeat_period_secs: args.heartbeat_period_secs,
        transmit_period_secs: args.transmit_period_secs,
        tuner_preset: args.preset,
        degraded_fraction: args.degraded_fraction,
        seed: args.seed,
    };

    // Create shutdown channel
    let (shutdown_tx, shutdown_rx) = broadcast::channel::<()>(1);
    tokio::spawn(async move {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to listen for Ctrl+C");
        println!("\nReceived Ctrl+C, shutting down...");
        let _ = shutdown_tx.send(());
    });

    println!("========================================");
    println!("     Heartbeat Fleet Emulator");
    println!("========================================");
    println!();
    println!("  Uploading to: {}", config.server_url);
    println!("  Clients:      {}", config.clients);
    println!();
    println!("  Press Ctrl+C to stop.");
    println!("========================================");

    let mut emulator = Emulator::new(config);
    emulator.run(shutdown_rx).await;

    println!("Emulator stopped.");
    Ok(())
}
