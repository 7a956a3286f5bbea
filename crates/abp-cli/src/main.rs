// SPDX-License-Identifier: MIT OR Apache-2.0
#![deny(unsafe_code)]
use std::path::PathBuf;
use std::sync::Arc;

use abp_cli::commands::{self, SchemaKind};
use abp_daemon::{build_app, AppState};
use abp_receipt::{encode_signing_key_pem, generate_keypair, load_verifying_key_pem};
use abp_verifier::verify_executor_request;
use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "solace-gw-cli", version, about = "Solace gateway command-line tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the gateway's HTTP adapter endpoint.
    Serve {
        /// Path to the gateway's TOML configuration file.
        #[arg(long, default_value = "solace-gateway.toml")]
        config: PathBuf,
    },

    /// Run the Executor-side verification contract against a saved request,
    /// for Executor authors who want a quick check without writing code.
    VerifyReceipt {
        /// Path to a JSON file: `{receiptHeader, service, execute, publicKeyPem}`.
        #[arg()]
        file: PathBuf,
    },

    /// Generate a fresh Ed25519 keypair for bootstrapping a deployment.
    Keygen {
        /// Write the private key PEM here instead of stdout.
        #[arg(long)]
        private_out: Option<PathBuf>,
        /// Write the public key PEM here instead of stdout.
        #[arg(long)]
        public_out: Option<PathBuf>,
    },

    /// Print a JSON schema for one of the gateway's wire or config types.
    Schema {
        /// Which schema to print.
        #[arg(value_enum)]
        kind: SchemaArg,
    },
}

/// Schema kind argument for the `schema` subcommand.
#[derive(Debug, Clone, Copy, ValueEnum)]
enum SchemaArg {
    /// `{intent, execute, acceptance}` envelope schema.
    Envelope,
    /// Signed receipt schema.
    Receipt,
    /// Gateway TOML configuration schema.
    Config,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Serve { config } => cmd_serve(config).await,
        Commands::VerifyReceipt { file } => cmd_verify_receipt(&file),
        Commands::Keygen {
            private_out,
            public_out,
        } => cmd_keygen(private_out, public_out),
        Commands::Schema { kind } => cmd_schema(kind),
    }
}

fn cmd_schema(kind: SchemaArg) -> Result<()> {
    let sk = match kind {
        SchemaArg::Envelope => SchemaKind::Envelope,
        SchemaArg::Receipt => SchemaKind::Receipt,
        SchemaArg::Config => SchemaKind::Config,
    };
    println!("{}", commands::schema_json(sk)?);
    Ok(())
}

async fn cmd_serve(config_path: PathBuf) -> Result<()> {
    let config = abp_config::load_config(Some(&config_path))
        .with_context(|| format!("load config from {}", config_path.display()))?;
    let warnings = abp_config::validate_config(&config).context("validate config")?;

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(config.log_level.clone()))
        .init();
    for warning in &warnings {
        tracing::warn!(%warning, "configuration warning");
    }

    let signing_key = abp_receipt::load_signing_key_pem(&config.receipt_private_key_pem)
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
    tracing::info!(%bind, "solace-gw listening");
    axum::serve(listener, app).await.context("serve")
}

#[derive(Debug, serde::Deserialize)]
struct VerifyReceiptRequest {
    #[serde(rename = "receiptHeader")]
    receipt_header: String,
    service: String,
    execute: serde_json::Value,
    #[serde(rename = "publicKeyPem")]
    public_key_pem: String,
}

fn cmd_verify_receipt(file: &std::path::Path) -> Result<()> {
    let content =
        std::fs::read_to_string(file).with_context(|| format!("read {}", file.display()))?;
    let request: VerifyReceiptRequest =
        serde_json::from_str(&content).context("parse verify-receipt request")?;
    let public_key = load_verifying_key_pem(&request.public_key_pem).context("load public key")?;

    let outcome = verify_executor_request(
        &request.receipt_header,
        &public_key,
        &request.service,
        &request.execute,
        None,
        None,
    );

    if outcome.ok {
        println!("ok: true");
        if let Some(receipt) = outcome.receipt {
            println!("receiptId: {}", receipt.receipt_id);
            println!("executeHash: {}", receipt.execute_hash);
        }
        Ok(())
    } else {
        println!("ok: false");
        println!("reason: {}", outcome.reason.unwrap_or("unknown"));
        std::process::exit(1);
    }
}

fn cmd_keygen(private_out: Option<PathBuf>, public_out: Option<PathBuf>) -> Result<()> {
    let (signing_key, public_pem) = generate_keypair().context("generate keypair")?;
    let private_pem = encode_signing_key_pem(&signing_key).context("encode signing key")?;

    write_or_print(private_out, "private key", &private_pem)?;
    write_or_print(public_out, "public key", &public_pem)?;
    Ok(())
}

fn write_or_print(path: Option<PathBuf>, label: &str, pem: &str) -> Result<()> {
    match path {
        Some(p) => {
            std::fs::write(&p, pem).with_context(|| format!("write {label} to {}", p.display()))?;
            eprintln!("{label} written to {}", p.display());
        }
        None => println!("{pem}"),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keygen_produces_pem_pairs() {
        let (signing_key, public_pem) = generate_keypair().unwrap();
        let private_pem = encode_signing_key_pem(&signing_key).unwrap();
        assert!(private_pem.contains("PRIVATE KEY"));
        assert!(public_pem.contains("PUBLIC KEY"));
    }

    #[test]
    fn verify_receipt_request_json_shape() {
        let json = serde_json::json!({
            "receiptHeader": "abc",
            "service": "payments",
            "execute": {"action": "payments:refund"},
            "publicKeyPem": "pem",
        });
        let parsed: VerifyReceiptRequest = serde_json::from_value(json).unwrap();
        assert_eq!(parsed.service, "payments");
    }
}
