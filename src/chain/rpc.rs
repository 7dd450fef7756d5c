//! Ethereum JSON-RPC adapter.
//!
//! A thin `reqwest` client speaking the handful of `eth_*` methods the gate
//! needs. Calldata for contract reads and the settlement transfer is built
//! from `sol!` bindings.

use crate::chain::{
    normalize_address, ChainReader, SanctionsOracle, TransferReceipt, TransferRequest,
    TransferSubmitter,
};
use crate::error::{Error, Result};
use alloy_primitives::{address, Address, Bytes, U256};
use alloy_sol_types::SolCall;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Chainalysis sanctions oracle on Ethereum mainnet.
pub const REFERENCE_ORACLE_ADDRESS: Address = address!("40C57923924B5c5c5455c48D93317139ADDaC8fb");

/// Chain id of the only network the reference oracle is deployed on.
pub const REFERENCE_ORACLE_CHAIN_ID: u64 = 1;

/// Default interval between receipt polls.
const DEFAULT_RECEIPT_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Default number of receipt polls before giving up.
const DEFAULT_MAX_RECEIPT_POLLS: u32 = 60;

mod abi {
    alloy_sol_types::sol! {
        function balanceOf(address account) external view returns (uint256);
        function isSanctioned(address addr) external view returns (bool);
        function transferFrom(address from, address to, uint256 amount) external returns (bool);
    }
}

use abi::{balanceOfCall, isSanctionedCall, transferFromCall};

#[derive(Serialize)]
struct RpcRequest<'a> {
    jsonrpc: &'static str,
    id: u64,
    method: &'a str,
    params: Value,
}

#[derive(Deserialize)]
struct RpcResponse {
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<RpcErrorObject>,
}

#[derive(Deserialize)]
struct RpcErrorObject {
    code: i64,
    message: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RpcReceipt {
    transaction_hash: String,
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    block_number: Option<String>,
}

/// JSON-RPC client for a single endpoint.
pub struct RpcClient {
    http: reqwest::Client,
    url: String,
    next_id: AtomicU64,
    receipt_poll_interval: Duration,
    max_receipt_polls: u32,
}

impl RpcClient {
    /// Create a client for the endpoint at `url`.
    #[must_use]
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            url: url.into(),
            next_id: AtomicU64::new(1),
            receipt_poll_interval: DEFAULT_RECEIPT_POLL_INTERVAL,
            max_receipt_polls: DEFAULT_MAX_RECEIPT_POLLS,
        }
    }

    /// Override how receipts are polled after a transfer is submitted.
    #[must_use]
    pub fn with_receipt_polling(mut self, interval: Duration, max_polls: u32) -> Self {
        self.receipt_poll_interval = interval;
        self.max_receipt_polls = max_polls.max(1);
        self
    }

    /// Endpoint URL.
    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Issue one JSON-RPC call and return its `result`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Network`] on transport failure and [`Error::Rpc`] when
    /// the node answers with an error object.
    pub async fn request(&self, method: &str, params: Value) -> Result<Value> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        debug!("RPC {} (id={}) -> {}", method, id, self.url);

        let body = RpcRequest {
            jsonrpc: "2.0",
            id,
            method,
            params,
        };

        let response = self
            .http
            .post(&self.url)
            .json(&body)
            .send()
            .await
            .map_err(|e| Error::Network(format!("{method} request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::Network(format!(
                "{method} returned HTTP {status}"
            )));
        }

        let parsed: RpcResponse = response
            .json()
            .await
            .map_err(|e| Error::Network(format!("{method} returned malformed JSON: {e}")))?;

        if let Some(err) = parsed.error {
            return Err(Error::Rpc {
                code: err.code,
                message: err.message,
            });
        }

        Ok(parsed.result.unwrap_or(Value::Null))
    }

    async fn eth_call(&self, to: Address, data: Vec<u8>) -> Result<Vec<u8>> {
        let result = self
            .request(
                "eth_call",
                json!([
                    {
                        "to": normalize_address(&to),
                        "data": format!("0x{}", hex::encode(data)),
                    },
                    "latest"
                ]),
            )
            .await?;
        decode_hex_bytes(&result)
    }
}

#[async_trait]
impl ChainReader for RpcClient {
    async fn token_balance(&self, asset: Address, owner: Address) -> Result<U256> {
        let data = balanceOfCall { account: owner }.abi_encode();
        let word = self.eth_call(asset, data).await?;
        decode_uint_word(&word)
    }

    async fn code_at(&self, address: Address) -> Result<Bytes> {
        let result = self
            .request(
                "eth_getCode",
                json!([normalize_address(&address), "latest"]),
            )
            .await?;
        decode_hex_bytes(&result).map(Bytes::from)
    }

    async fn transaction_count(&self, address: Address) -> Result<u64> {
        let result = self
            .request(
                "eth_getTransactionCount",
                json!([normalize_address(&address), "latest"]),
            )
            .await?;
        decode_quantity_u64(&result)
    }

    async fn native_balance(&self, address: Address) -> Result<U256> {
        let result = self
            .request(
                "eth_getBalance",
                json!([normalize_address(&address), "latest"]),
            )
            .await?;
        let text = result
            .as_str()
            .ok_or_else(|| Error::InvalidInput(format!("Expected hex quantity, got {result}")))?;
        let digits = text.strip_prefix("0x").unwrap_or(text);
        U256::from_str_radix(digits, 16)
            .map_err(|e| Error::InvalidInput(format!("Invalid balance '{text}': {e}")))
    }
}

#[async_trait]
impl TransferSubmitter for RpcClient {
    async fn submit_transfer_from(&self, request: &TransferRequest) -> Result<Option<String>> {
        let data = transferFromCall {
            from: request.from,
            to: request.to,
            amount: request.amount,
        }
        .abi_encode();

        info!(
            "Submitting transferFrom {} -> {} ({} units of {})",
            normalize_address(&request.from),
            normalize_address(&request.to),
            request.amount,
            normalize_address(&request.asset)
        );

        let result = self
            .request(
                "eth_sendTransaction",
                json!([{
                    "from": normalize_address(&request.spender),
                    "to": normalize_address(&request.asset),
                    "data": format!("0x{}", hex::encode(data)),
                }]),
            )
            .await?;

        Ok(result.as_str().map(str::to_string))
    }

    async fn wait_for_receipt(&self, transaction_hash: &str) -> Result<Option<TransferReceipt>> {
        for attempt in 1..=self.max_receipt_polls {
            let result = self
                .request("eth_getTransactionReceipt", json!([transaction_hash]))
                .await?;

            if !result.is_null() {
                let receipt: RpcReceipt = serde_json::from_value(result).map_err(|e| {
                    Error::Settlement(format!("Malformed receipt for {transaction_hash}: {e}"))
                })?;
                let block_number = receipt
                    .block_number
                    .as_deref()
                    .and_then(|n| u64::from_str_radix(n.trim_start_matches("0x"), 16).ok());
                return Ok(Some(TransferReceipt {
                    transaction_hash: receipt.transaction_hash,
                    success: receipt.status.as_deref() == Some("0x1"),
                    block_number,
                }));
            }

            debug!(
                "Receipt for {} not available yet (attempt {}/{})",
                transaction_hash, attempt, self.max_receipt_polls
            );
            tokio::time::sleep(self.receipt_poll_interval).await;
        }

        warn!(
            "No receipt for {} after {} polls",
            transaction_hash, self.max_receipt_polls
        );
        Ok(None)
    }
}

/// Sanctions oracle contract reached through an [`RpcClient`].
pub struct RpcOracle {
    client: std::sync::Arc<RpcClient>,
    contract: Address,
}

impl RpcOracle {
    /// Oracle at `contract`.
    #[must_use]
    pub fn new(client: std::sync::Arc<RpcClient>, contract: Address) -> Self {
        Self { client, contract }
    }

    /// Resolve the oracle contract for a network.
    ///
    /// An explicit override always wins. Otherwise only the reference
    /// network has a known deployment.
    #[must_use]
    pub fn resolve_contract(chain_id: u64, override_address: Option<Address>) -> Option<Address> {
        override_address.or_else(|| {
            (chain_id == REFERENCE_ORACLE_CHAIN_ID).then_some(REFERENCE_ORACLE_ADDRESS)
        })
    }

    /// Oracle contract address.
    #[must_use]
    pub fn contract(&self) -> Address {
        self.contract
    }
}

#[async_trait]
impl SanctionsOracle for RpcOracle {
    async fn is_sanctioned(&self, address: Address) -> Result<bool> {
        let data = isSanctionedCall { addr: address }.abi_encode();
        let word = self.client.eth_call(self.contract, data).await?;
        if word.len() != 32 {
            return Err(Error::Sanctions(format!(
                "Oracle returned {} bytes, expected 32",
                word.len()
            )));
        }
        Ok(word.iter().any(|b| *b != 0))
    }
}

fn decode_hex_bytes(value: &Value) -> Result<Vec<u8>> {
    let text = value
        .as_str()
        .ok_or_else(|| Error::InvalidInput(format!("Expected hex data, got {value}")))?;
    hex::decode(text.strip_prefix("0x").unwrap_or(text))
        .map_err(|e| Error::InvalidInput(format!("Invalid hex data: {e}")))
}

fn decode_quantity_u64(value: &Value) -> Result<u64> {
    let text = value
        .as_str()
        .ok_or_else(|| Error::InvalidInput(format!("Expected hex quantity, got {value}")))?;
    u64::from_str_radix(text.strip_prefix("0x").unwrap_or(text), 16)
        .map_err(|e| Error::InvalidInput(format!("Invalid quantity '{text}': {e}")))
}

fn decode_uint_word(word: &[u8]) -> Result<U256> {
    if word.len() != 32 {
        return Err(Error::InvalidInput(format!(
            "Expected 32-byte word, got {} bytes",
            word.len()
        )));
    }
    Ok(U256::from_be_slice(word))
}
