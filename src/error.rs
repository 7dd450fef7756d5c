//! Error types for compliance-gate.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type alias using the crate error.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised while screening, verifying or settling a payment.
#[derive(Debug, Error)]
pub enum Error {
    /// Address failed to parse as a 20-byte hex address.
    #[error("Invalid address: {0}")]
    InvalidAddress(String),

    /// Malformed payment input (amount, hex, missing field).
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Signature could not be decoded or recovered.
    #[error("Signature error: {0}")]
    Signature(String),

    /// Transport-level failure talking to the RPC endpoint.
    #[error("Network error: {0}")]
    Network(String),

    /// The RPC endpoint answered with a JSON-RPC error object.
    #[error("RPC error {code}: {message}")]
    Rpc {
        /// JSON-RPC error code.
        code: i64,
        /// Error message reported by the node.
        message: String,
    },

    /// Sanctions oracle or local list failure.
    #[error("Sanctions check failed: {0}")]
    Sanctions(String),

    /// Settlement transfer failure.
    #[error("Settlement error: {0}")]
    Settlement(String),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Coarse classification of an [`Error`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Caller-correctable input problem.
    Input,
    /// Business-logic outcome such as a bad signature.
    Verification,
    /// RPC, oracle or I/O fault.
    Infrastructure,
    /// Transfer failed during settlement.
    Settlement,
}

impl Error {
    /// Classify this error.
    #[must_use]
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::InvalidAddress(_) | Self::InvalidInput(_) | Self::Config(_) => {
                ErrorCategory::Input
            }
            Self::Signature(_) => ErrorCategory::Verification,
            Self::Network(_) | Self::Rpc { .. } | Self::Sanctions(_) | Self::Io(_) => {
                ErrorCategory::Infrastructure
            }
            Self::Settlement(_) => ErrorCategory::Settlement,
        }
    }
}

/// What a boundary does with an infrastructure fault it could absorb.
///
/// The modifier chain and the compliance modifier do not take a policy:
/// a fault there always denies the payment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FaultPolicy {
    /// Substitute a conservative local answer and record the degradation.
    #[default]
    Degrade,
    /// Hand the fault to the caller.
    Propagate,
}

impl FaultPolicy {
    /// Map a "fall back on failure" toggle onto a policy.
    #[must_use]
    pub const fn from_fallback(fallback: bool) -> Self {
        if fallback {
            Self::Degrade
        } else {
            Self::Propagate
        }
    }
}
