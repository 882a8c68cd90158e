//! Vocalis application binary - composition root.
//!
//! Wires the engine together the way the desktop shell does, with the platform
//! layer replaced by an offline replay host:
//! 1. Load engine configuration from TOML and install logging
//! 2. Build the reconciler around the replay host and probe capabilities
//! 3. Start the event pump and replay an NDJSON event log through the bus
//! 4. Print the reconciled snapshot, and optionally a diagnostics report

mod cli;
mod replay_host;

use std::path::Path;
use std::sync::Arc;

use clap::Parser;
use vocalis_core::config::VocalisConfig;
use vocalis_core::error::{Result, VocalisError};
use vocalis_core::user_config::UserConfig;
use vocalis_engine::bus;
use vocalis_engine::{PlatformReport, StateReconciler};

use crate::cli::CliArgs;
use crate::replay_host::ReplayHost;

/// Read the mirrored user configuration, or defaults when no file is given.
fn load_user_config(path: Option<&Path>) -> Result<UserConfig> {
    match path {
        Some(path) => {
            let content = std::fs::read_to_string(path)?;
            Ok(serde_json::from_str(&content)?)
        }
        None => Ok(UserConfig::default()),
    }
}

fn load_platform_report(path: Option<&Path>) -> Result<PlatformReport> {
    match path {
        Some(path) => {
            let content = std::fs::read_to_string(path)?;
            Ok(serde_json::from_str(&content)?)
        }
        None => Ok(PlatformReport::default()),
    }
}

#[tokio::main]
async fn main() -> std::result::Result<(), Box<dyn std::error::Error>> {
    let args = CliArgs::parse();

    // Config is read before logging exists so its level can seed the filter.
    let config_file = args.resolve_config_path();
    let loaded = VocalisConfig::load(&config_file);
    let log_level = args.resolve_log_level(
        loaded
            .as_ref()
            .map(|c| c.general.log_level.as_str())
            .unwrap_or("info"),
    );

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&log_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    tracing::info!("Starting Vocalis v{}", env!("CARGO_PKG_VERSION"));

    let config = match loaded {
        Ok(config) => {
            tracing::info!(path = %config_file.display(), "Configuration loaded");
            config
        }
        Err(e) => {
            tracing::warn!(
                path = %config_file.display(),
                error = %e,
                "Failed to load config, using defaults"
            );
            VocalisConfig::default()
        }
    };

    let user_config = load_user_config(args.user_config.as_deref())?;
    let platform = load_platform_report(args.platform.as_deref())?;

    // Engine.
    let host = Arc::new(ReplayHost::new(platform));
    let reconciler = Arc::new(StateReconciler::new(
        host,
        config.clone(),
        user_config,
    ));
    if let Err(e) = reconciler.refresh_capabilities().await {
        tracing::warn!(code = %e.code, "Capability probe failed: {}", e.message);
    }

    // Event pump.
    let (publisher, pump) = bus::channel(config.bus.channel_capacity);
    let pump_reconciler = Arc::clone(&reconciler);
    let pump_task = tokio::spawn(async move { pump.run(&pump_reconciler).await });

    if let Some(events) = args.events.as_deref() {
        let log = std::fs::read_to_string(events)?;
        let published = bus::replay_ndjson(&publisher, &log).await?;
        tracing::info!(path = %events.display(), published, "Event log replayed");
    }
    drop(publisher);

    let stats = pump_task
        .await
        .map_err(|e| VocalisError::Command(format!("event pump failed: {}", e)))?;
    tracing::info!(
        delivered = stats.delivered,
        applied = stats.applied,
        "Events reconciled"
    );

    println!("{}", serde_json::to_string_pretty(&reconciler.snapshot())?);

    if args.diagnostics {
        if let Err(e) = reconciler.run_self_check().await {
            tracing::warn!(code = %e.code, "Self-check failed: {}", e.message);
        }
        println!("{}", reconciler.generate_diagnostics().await);
    }

    Ok(())
}
