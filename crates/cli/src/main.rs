mod args;
mod render;
mod version;

use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::signal;
use tracing::{debug, error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use qbfleet_core::control::check_gate;
use qbfleet_core::{
    load_config, run_round, validate_config, Fleet, RoundSettings, SanitizedConfig,
};

use args::Args;

#[tokio::main]
async fn main() {
    match run().await {
        Ok(code) => std::process::exit(code),
        Err(e) => {
            error!("Fatal error: {:#}", e);
            std::process::exit(1);
        }
    }
}

async fn run() -> Result<i32> {
    let args = Args::parse();

    // Initialize logging
    let default_filter = if args.silent { "warn" } else { "info" };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_ansi(args.color)
                .with_target(false),
        )
        .init();

    if !args.silent {
        println!("{}", version::banner());
    }

    let ops = args.operations();
    ops.validate().context("Invalid arguments")?;

    info!("Loading configuration from {:?}", args.config);
    let config = load_config(&args.config)
        .with_context(|| format!("Failed to load config from {:?}", args.config))?;
    validate_config(&config).context("Configuration validation failed")?;
    info!(endpoints = config.endpoints.len(), "Configuration loaded");
    debug!(config = ?SanitizedConfig::from(&config), "Effective configuration");

    let fleet = Fleet::from_config(&config).context("Failed to create endpoint clients")?;
    let statuses = fleet.connect(!args.silent).await;
    if !args.silent {
        println!("{}", render::connections(&statuses));
    }

    let settings = RoundSettings::from_config(&config);
    let interval = Duration::from_secs(config.rounds.interval_secs);

    if ops.is_empty() {
        info!("No operations selected");
    }

    loop {
        let report = run_round(&fleet, &ops, &settings).await?;
        render::print_round(&report);

        if !args.looping {
            break;
        }

        info!(seconds = interval.as_secs(), "Next round scheduled");
        tokio::select! {
            _ = tokio::time::sleep(interval) => {}
            _ = shutdown_signal() => {
                info!("Shutdown signal received, leaving loop");
                break;
            }
        }
    }

    // Runs last: its exit code reflects the fleet after every round.
    if args.check {
        let outcome = check_gate(&fleet).await;
        for failure in &outcome.failures {
            warn!("{}", failure);
        }
        println!("{}", render::gate_line(&outcome));
        return Ok(outcome.verdict.exit_code());
    }

    Ok(0)
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
