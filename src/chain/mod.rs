//! Chain access used by the verifier, the risk engine and settlement.
//!
//! Everything that touches the network sits behind one of three traits so
//! the decision logic can be driven by an in-memory chain in tests:
//!
//! - [`ChainReader`]: balance, code and nonce reads
//! - [`SanctionsOracle`]: the remote `isSanctioned(address)` lookup
//! - [`TransferSubmitter`]: submit a `transferFrom` and await its receipt
//!
//! [`rpc::RpcClient`] implements all of them over Ethereum JSON-RPC.

pub mod rpc;


use crate::error::{Error, Result};
use alloy_primitives::{Address, Bytes, U256};
use async_trait::async_trait;
use std::str::FromStr;

pub use rpc::{RpcClient, RpcOracle};

/// Read-only chain state queries.
#[async_trait]
pub trait ChainReader: Send + Sync {
    /// Balance of `owner` in the fungible token at `asset`.
    async fn token_balance(&self, asset: Address, owner: Address) -> Result<U256>;

    /// Deployed bytecode at `address` (empty for an EOA).
    async fn code_at(&self, address: Address) -> Result<Bytes>;

    /// Number of transactions sent from `address`.
    async fn transaction_count(&self, address: Address) -> Result<u64>;

    /// Native asset balance of `address`.
    async fn native_balance(&self, address: Address) -> Result<U256>;
}

/// Remote sanctions oracle.
#[async_trait]
pub trait SanctionsOracle: Send + Sync {
    /// Whether the oracle lists `address` as sanctioned.
    async fn is_sanctioned(&self, address: Address) -> Result<bool>;
}

/// A third-party transfer the merchant asks the token contract to perform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferRequest {
    /// Token contract.
    pub asset: Address,
    /// Account sending the transaction (the approved spender).
    pub spender: Address,
    /// Payer whose allowance is consumed.
    pub from: Address,
    /// Recipient of the funds.
    pub to: Address,
    /// Amount in token base units.
    pub amount: U256,
}

/// Outcome of a mined transfer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferReceipt {
    /// Transaction hash.
    pub transaction_hash: String,
    /// Whether the transaction executed successfully.
    pub success: bool,
    /// Block the transaction was included in, if reported.
    pub block_number: Option<u64>,
}

/// State-mutating transfer submission.
#[async_trait]
pub trait TransferSubmitter: Send + Sync {
    /// Submit the transfer, returning the transaction hash if one was emitted.
    async fn submit_transfer_from(&self, request: &TransferRequest) -> Result<Option<String>>;

    /// Wait for one confirmation of `transaction_hash`.
    async fn wait_for_receipt(&self, transaction_hash: &str) -> Result<Option<TransferReceipt>>;
}

/// Parse a `0x`-prefixed, 20-byte hex address. Case is not significant.
///
/// # Errors
///
/// Returns [`Error::InvalidAddress`] for anything else.
pub fn parse_address(input: &str) -> Result<Address> {
    let trimmed = input.trim();
    let valid_shape = trimmed.len() == 42
        && (trimmed.starts_with("0x") || trimmed.starts_with("0X"))
        && trimmed[2..].chars().all(|c| c.is_ascii_hexdigit());
    if !valid_shape {
        return Err(Error::InvalidAddress(input.to_string()));
    }
    Address::from_str(&trimmed[2..]).map_err(|_| Error::InvalidAddress(input.to_string()))
}

/// Parse a token amount given in decimal (or `0x` hex) base units.
///
/// # Errors
///
/// Returns [`Error::InvalidInput`] if the amount is not a non-negative integer.
pub fn parse_amount(input: &str) -> Result<U256> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(Error::InvalidInput("Empty amount".to_string()));
    }
    let parsed = if let Some(hex) = trimmed.strip_prefix("0x") {
        U256::from_str_radix(hex, 16)
    } else {
        U256::from_str_radix(trimmed, 10)
    };
    parsed.map_err(|e| Error::InvalidInput(format!("Invalid amount '{input}': {e}")))
}

/// Lower-cased `0x` hex form used for cache keys and comparisons.
#[must_use]
pub fn normalize_address(address: &Address) -> String {
    format!("0x{}", hex::encode(address.as_slice()))
}
