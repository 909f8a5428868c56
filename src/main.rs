//! IP Block Responder CLI.

use anyhow::{Context, Result};
use clap::Parser;
use ip_block_responder::config::BackendKind;
use ip_block_responder::{build_backend, Config, RuleReconciler};
use std::path::PathBuf;
use tokio::io::AsyncReadExt;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "ip-block-responder")]
#[command(about = "Block the malicious IP named in a security finding in a firewall rule-set")]
#[command(version)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "ip-block-responder.yaml")]
    config: PathBuf,

    /// Finding event JSON file, or "-" for stdin
    #[arg(short, long, default_value = "-")]
    event: String,

    /// Override the target rule-set id from the configuration
    #[arg(long, value_name = "ID")]
    rule_set_id: Option<String>,

    /// Apply the change to an in-memory rule-set instead of the configured backend
    #[arg(long)]
    dry_run: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short = 'L', long, default_value = "info")]
    log_level: String,

    /// Print example configuration and exit
    #[arg(long)]
    print_config: bool,

    /// Validate configuration and exit
    #[arg(long)]
    validate: bool,
}

async fn read_event(source: &str) -> Result<String> {
    if source == "-" {
        let mut buf = String::new();
        tokio::io::stdin()
            .read_to_string(&mut buf)
            .await
            .context("Failed to read finding from stdin")?;
        Ok(buf)
    } else {
        tokio::fs::read_to_string(source)
            .await
            .with_context(|| format!("Failed to read finding from {}", source))
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Handle --print-config
    if args.print_config {
        println!("{}", Config::example());
        return Ok(());
    }

    // Logs go to stderr; stdout carries the result only
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&args.log_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    info!(config = %args.config.display(), "Loading configuration");
    let mut config = Config::load(&args.config)
        .with_context(|| format!("Failed to load {}", args.config.display()))?;

    if let Some(id) = args.rule_set_id {
        config.rule_set.id = id;
        config.validate()?;
    }

    // Handle --validate
    if args.validate {
        info!("Configuration is valid");
        return Ok(());
    }

    if args.dry_run {
        config.backend.kind = BackendKind::Memory;
    } else if config.backend.kind == BackendKind::Memory {
        warn!(
            rule_set = %config.rule_set.id,
            "Memory backend configured: rules are not written to any external rule-set"
        );
    }

    let backend = build_backend(&config)?;
    info!(
        rule_set = %config.rule_set.id,
        backend = backend.name(),
        "IP block responder initialized"
    );

    let event = read_event(&args.event).await?;
    let reconciler = RuleReconciler::new(&config, backend);

    match reconciler.reconcile_json(&event).await {
        Ok(outcome) => {
            println!("{}", serde_json::to_string(&outcome.response())?);
            Ok(())
        }
        Err(e) => {
            error!(rule_set = %config.rule_set.id, error = %e, "Reconcile failed");
            Err(e.into())
        }
    }
}
