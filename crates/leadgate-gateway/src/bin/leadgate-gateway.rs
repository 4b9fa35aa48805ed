//! Leadgate Gateway Binary
//!
//! # Usage
//! ```bash
//! leadgate-gateway [--config gateway.json] [--port 8787] [--host 127.0.0.1] \
//!     [--repo owner/name] [--ledger-path agent/used_emails.txt] [--dry-run] [--verbose]
//! ```
//!
//! The GitHub token is read from `VITE_GITHUB_TOKEN`, `GITHUB_TOKEN` or
//! `VERCEL_WEBSITE_WEBHOOK` (first set wins); a `.env` file is honoured.

use anyhow::Context;
use clap::Parser;
use leadgate_gateway::{Gateway, GatewayConfig};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

/// Leadgate Gateway - one lead scan per email address
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// JSON configuration file
    #[arg(short, long)]
    config: Option<String>,

    /// Port to listen on
    #[arg(short, long)]
    port: Option<u16>,

    /// Host to bind to
    #[arg(long)]
    host: Option<String>,

    /// Repository holding the ledger, as owner/name
    #[arg(long)]
    repo: Option<String>,

    /// Ledger path inside the repository
    #[arg(long)]
    ledger_path: Option<String>,

    /// Dispatch event type
    #[arg(long)]
    event_type: Option<String>,

    /// Record identifiers but skip the dispatch
    #[arg(long)]
    dry_run: bool,

    /// Enable verbose debug logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Missing .env is fine
    let _ = dotenvy::dotenv();

    let args = Args::parse();

    let default_level = if args.verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(args.verbose)
        .init();

    let config = build_config(&args)?;
    print_banner(&config);

    let gateway = Arc::new(Gateway::new(config).context("failed to initialise gateway")?);

    let signal_gateway = gateway.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            signal_gateway.shutdown();
        }
    });

    gateway.start().await?;
    Ok(())
}

fn build_config(args: &Args) -> anyhow::Result<GatewayConfig> {
    let mut config = match &args.config {
        Some(path) => GatewayConfig::from_file(path)
            .with_context(|| format!("failed to load config from {}", path))?,
        None => GatewayConfig::default(),
    };

    if let Some(host) = &args.host {
        config.host = host.clone();
    }
    if let Some(port) = args.port {
        config.port = port;
    }
    if let Some(repo) = &args.repo {
        config.intake = config.intake.with_repository(repo)?;
    }
    if let Some(path) = &args.ledger_path {
        config.intake = config.intake.with_ledger_path(path.clone());
    }
    if let Some(event_type) = &args.event_type {
        config.intake = config.intake.with_event_type(event_type.clone());
    }
    if args.dry_run {
        config.intake = config.intake.with_dry_run(true);
    }

    Ok(config)
}

fn print_banner(config: &GatewayConfig) {
    println!();
    println!("Leadgate Gateway v{}", leadgate_gateway::VERSION);
    println!("─────────────────────────────────────────────");
    println!("Ledger   {}:{}", config.intake.repository(), config.intake.ledger_path);
    println!("Dispatch {}{}", config.intake.event_type, if config.intake.dry_run { " (dry run)" } else { "" });
    println!();
    println!("HTTP Endpoints");
    println!("   ├─ POST http://{}:{}/intake", config.host, config.port);
    println!("   ├─ GET  http://{}:{}/health", config.host, config.port);
    println!("   └─ GET  http://{}:{}/status", config.host, config.port);
    println!();
    println!("Press Ctrl+C to stop the gateway");
    println!();
}
