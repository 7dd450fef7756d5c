//! Command-line interface definition.

use clap::{Parser, Subcommand};
use compliance_gate::GateConfig;
use std::path::PathBuf;

/// AML screening, payment verification and settlement for token payments.
#[derive(Parser, Debug)]
#[command(name = "compliance-gate")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file.
    #[arg(long, short, global = true, env = "COMPLIANCE_GATE_CONFIG")]
    pub config: Option<PathBuf>,

    /// JSON-RPC endpoint.
    #[arg(long, global = true, env = "COMPLIANCE_GATE_RPC_URL")]
    pub rpc_url: Option<String>,

    /// EVM chain id of the endpoint.
    #[arg(long, global = true, env = "COMPLIANCE_GATE_CHAIN_ID")]
    pub chain_id: Option<u64>,

    /// Risk score at or above which payments are rejected (0-100).
    #[arg(long, global = true, env = "COMPLIANCE_GATE_RISK_THRESHOLD")]
    pub risk_threshold: Option<u8>,

    /// Allow HIGH-tier payers over the threshold, flagged for review.
    #[arg(long, global = true, env = "COMPLIANCE_GATE_MANUAL_REVIEW")]
    pub manual_review: bool,

    /// Disable the remote sanctions oracle.
    #[arg(long, global = true)]
    pub no_oracle: bool,

    /// Local sanctions list (JSON or TOML).
    #[arg(long, global = true, env = "COMPLIANCE_GATE_SANCTIONS_LIST")]
    pub sanctions_list: Option<PathBuf>,

    /// Merchant account used to settle.
    #[arg(long, global = true, env = "COMPLIANCE_GATE_MERCHANT")]
    pub merchant: Option<String>,

    /// Log level.
    #[arg(long, default_value = "info", global = true, env = "RUST_LOG")]
    pub log_level: String,

    /// Emit logs as JSON.
    #[arg(long, global = true)]
    pub json_logs: bool,

    /// Command to run.
    #[command(subcommand)]
    pub command: Command,
}

/// Subcommands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Risk-assess an address.
    Assess {
        /// Address to assess.
        address: String,
    },
    /// Verify a payment submission (JSON with `authorization` and `requirements`).
    Verify {
        /// Path to the submission file.
        payment: PathBuf,
    },
    /// Verify a payment submission and settle it if it passes.
    Settle {
        /// Path to the submission file.
        payment: PathBuf,
    },
    /// Write a default configuration file.
    InitConfig {
        /// Destination path.
        path: PathBuf,
    },
}

impl Cli {
    /// Build the effective configuration: file (or defaults) then flags.
    ///
    /// # Errors
    ///
    /// Returns an error if a config file is specified but cannot be loaded.
    pub fn to_config(&self) -> color_eyre::Result<GateConfig> {
        let mut config = if let Some(ref path) = self.config {
            GateConfig::from_file(path)?
        } else {
            GateConfig::default()
        };

        if let Some(ref url) = self.rpc_url {
            config.chain.rpc_url.clone_from(url);
        }
        if let Some(chain_id) = self.chain_id {
            config.chain.chain_id = chain_id;
        }
        if let Some(threshold) = self.risk_threshold {
            config.compliance.risk_threshold = threshold;
        }
        if self.manual_review {
            config.compliance.require_manual_review = true;
        }
        if self.no_oracle {
            config.compliance.use_oracle = false;
        }
        if let Some(ref list) = self.sanctions_list {
            config.compliance.sanctions_list = Some(list.clone());
        }
        if let Some(ref merchant) = self.merchant {
            config.settlement.merchant_address = Some(merchant.clone());
        }
        config.log_level.clone_from(&self.log_level);

        config.validate()?;
        Ok(config)
    }
}
