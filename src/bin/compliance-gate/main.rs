//! compliance-gate CLI entry point.

mod cli;

use clap::Parser;
use cli::{Cli, Command};
use compliance_gate::payment::PaymentSubmission;
use compliance_gate::{GateBuilder, GateConfig};
use std::path::Path;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

fn load_submission(path: &Path) -> color_eyre::Result<PaymentSubmission> {
    let content = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&content)?)
}

#[tokio::main]
async fn main() -> color_eyre::Result<()> {
    // Initialize error handling
    color_eyre::install()?;

    // Parse CLI arguments
    let cli = Cli::parse();

    // Initialize tracing
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&cli.log_level));

    if cli.json_logs {
        tracing_subscriber::registry()
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .with(filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(fmt::layer().with_writer(std::io::stderr))
            .with(filter)
            .init();
    }

    info!("compliance-gate v{}", env!("CARGO_PKG_VERSION"));

    if let Command::InitConfig { path } = &cli.command {
        GateConfig::default().to_file(path)?;
        info!("Wrote default configuration to {}", path.display());
        return Ok(());
    }

    let config = cli.to_config()?;
    let gate = GateBuilder::new(config).build()?;

    match cli.command {
        Command::Assess { address } => {
            let assessment = gate.assess(&address).await?;
            println!("{}", serde_json::to_string_pretty(&assessment)?);
        }
        Command::Verify { payment } => {
            let submission = load_submission(&payment)?;
            let result = gate
                .verify(&submission.authorization, &submission.requirements)
                .await;
            println!("{}", serde_json::to_string_pretty(&result)?);
        }
        Command::Settle { payment } => {
            let submission = load_submission(&payment)?;
            let (verification, settlement) = gate
                .verify_and_settle(&submission.authorization, &submission.requirements)
                .await;
            let output = serde_json::json!({
                "verification": verification,
                "settlement": settlement,
            });
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
        Command::InitConfig { .. } => {}
    }

    Ok(())
}
