// SPDX-License-Identifier: MIT OR Apache-2.0
#![deny(unsafe_code)]
use std::path::PathBuf;
use std::sync::Arc;

use abp_daemon::{build_app, AppState};
use abp_receipt::load_signing_key_pem;
use anyhow::{Context, Result};
use clap::Parser;
use tower_http::trace::TraceLayer;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "solace-gw", version, about = "Solace policy enforcement point")]
struct Args {
    /// Path to the gateway's TOML configuration file.
    #[arg(long, default_value = "solace-gateway.toml")]
    config: PathBuf,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config = abp_config::load_config(Some(&args.config))
        .with_context(|| format!("load config from {}", args.config.display()))?;
    let warnings = abp_config::validate_config(&config).context("validate config")?;

    let filter = EnvFilter::new(config.log_level.clone());
    tracing_subscriber::fmt().with_env_filter(filter).init();

    for warning in &warnings {
        tracing::warn!(%warning, "configuration warning");
    }

    let signing_key = load_signing_key_pem(&config.receipt_private_key_pem)
        .context("load receipt signing key")?;
    let public_key_pem = config.receipt_public_key_pem.clone();
    let bind = config.bind.clone();

    let orchestrator = abp_gate::GateOrchestrator::new(Arc::new(config), signing_key);
    let state = Arc::new(AppState {
        orchestrator,
        public_key_pem,
    });

    let app = build_app(state).layer(TraceLayer::new_for_http());

    let listener = tokio::net::TcpListener::bind(&bind)
        .await
        .with_context(|| format!("bind {bind}"))?;
    info!(%bind, "solace-gw listening");

    axum::serve(listener, app).await.context("serve")
}
