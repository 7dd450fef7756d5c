//! Configuration for compliance-gate.

use crate::compliance::CompliancePolicy;
use crate::error::{Error, FaultPolicy, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GateConfig {
    /// RPC endpoint and network identity.
    #[serde(default)]
    pub chain: ChainConfig,

    /// Compliance screening.
    #[serde(default)]
    pub compliance: ComplianceConfig,

    /// Settlement.
    #[serde(default)]
    pub settlement: SettlementConfig,

    /// Log level.
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

/// RPC endpoint configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainConfig {
    /// JSON-RPC endpoint.
    #[serde(default = "default_rpc_url")]
    pub rpc_url: String,

    /// Network name as it appears in payment requirements.
    #[serde(default = "default_network")]
    pub network: String,

    /// EVM chain id of the endpoint.
    #[serde(default = "default_chain_id")]
    pub chain_id: u64,
}

/// Compliance configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComplianceConfig {
    /// Screen payments at all.
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Scores at or above this are denied (0-100).
    #[serde(default = "default_risk_threshold")]
    pub risk_threshold: u8,

    /// Allow HIGH-tier payers over the threshold, flagged for review.
    #[serde(default)]
    pub require_manual_review: bool,

    /// Query the remote sanctions oracle.
    #[serde(default = "default_true")]
    pub use_oracle: bool,

    /// Oracle contract override. Required on networks without a known deployment.
    #[serde(default)]
    pub oracle_address: Option<String>,

    /// Use the local list when the oracle fails instead of rejecting.
    #[serde(default = "default_true")]
    pub fallback_to_local: bool,

    /// Path to the local sanctions list (JSON or TOML).
    #[serde(default)]
    pub sanctions_list: Option<PathBuf>,

    /// What to do when behavioural chain reads fail.
    #[serde(default)]
    pub behavior_fault_policy: FaultPolicy,
}

/// Settlement configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SettlementConfig {
    /// Merchant account that submits `transferFrom`. Must be managed by the node.
    #[serde(default)]
    pub merchant_address: Option<String>,

    /// Delay between receipt polls.
    #[serde(default = "default_receipt_poll_interval_ms")]
    pub receipt_poll_interval_ms: u64,

    /// Receipt polls before giving up.
    #[serde(default = "default_max_receipt_polls")]
    pub max_receipt_polls: u32,
}

impl Default for ChainConfig {
    fn default() -> Self {
        Self {
            rpc_url: default_rpc_url(),
            network: default_network(),
            chain_id: default_chain_id(),
        }
    }
}

impl Default for ComplianceConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            risk_threshold: default_risk_threshold(),
            require_manual_review: false,
            use_oracle: true,
            oracle_address: None,
            fallback_to_local: true,
            sanctions_list: None,
            behavior_fault_policy: FaultPolicy::default(),
        }
    }
}

impl Default for SettlementConfig {
    fn default() -> Self {
        Self {
            merchant_address: None,
            receipt_poll_interval_ms: default_receipt_poll_interval_ms(),
            max_receipt_polls: default_max_receipt_polls(),
        }
    }
}

impl ComplianceConfig {
    /// Policy handed to the compliance modifier.
    #[must_use]
    pub fn policy(&self) -> CompliancePolicy {
        CompliancePolicy {
            enabled: self.enabled,
            risk_threshold: self.risk_threshold,
            require_manual_review: self.require_manual_review,
        }
    }

    /// Policy applied when the oracle fails.
    #[must_use]
    pub fn oracle_fault_policy(&self) -> FaultPolicy {
        FaultPolicy::from_fallback(self.fallback_to_local)
    }
}

fn default_rpc_url() -> String {
    "http://127.0.0.1:8545".to_string()
}

fn default_network() -> String {
    "base-sepolia".to_string()
}

const fn default_chain_id() -> u64 {
    84_532
}

const fn default_true() -> bool {
    true
}

const fn default_risk_threshold() -> u8 {
    70
}

const fn default_receipt_poll_interval_ms() -> u64 {
    1_000
}

const fn default_max_receipt_polls() -> u32 {
    60
}

fn default_log_level() -> String {
    "info".to_string()
}

impl GateConfig {
    /// Load configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, parsed or validated.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content).map_err(|e| Error::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written.
    pub fn to_file(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self).map_err(|e| Error::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Check value ranges.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] describing the first invalid value.
    pub fn validate(&self) -> Result<()> {
        if self.compliance.risk_threshold > 100 {
            return Err(Error::Config(format!(
                "risk_threshold must be within 0-100, got {}",
                self.compliance.risk_threshold
            )));
        }
        if self.chain.rpc_url.trim().is_empty() {
            return Err(Error::Config("chain.rpc_url must not be empty".to_string()));
        }
        if let Some(addr) = &self.compliance.oracle_address {
            crate::chain::parse_address(addr)
                .map_err(|_| Error::Config(format!("Invalid oracle_address: {addr}")))?;
        }
        if let Some(addr) = &self.settlement.merchant_address {
            crate::chain::parse_address(addr)
                .map_err(|_| Error::Config(format!("Invalid merchant_address: {addr}")))?;
        }
        Ok(())
    }
}
