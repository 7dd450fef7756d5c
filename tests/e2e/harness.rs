//! Test harness that assembles a gate over in-memory backends.
//!
//! `TestChain` stands in for the JSON-RPC node and the sanctions oracle.
//! `TestTransfers` records settlement requests and replays a scripted outcome.

use alloy_primitives::{Address, Bytes, U256};
use async_trait::async_trait;
use compliance_gate::chain::{
    normalize_address, parse_address, ChainReader, SanctionsOracle, TransferReceipt,
    TransferRequest, TransferSubmitter,
};
use compliance_gate::payment::{
    address_of, canonical_message, sign_message, PaymentAuthorization, PaymentRequirements,
};
use compliance_gate::{Error, Gate, GateBuilder, GateConfig, Result};
use k256::ecdsa::SigningKey;
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

/// Anvil account #1.
pub const PAYER_KEY: &str = "59c6995e998f97a5a0044966f0945389dc9e86dae88c7a8412f4603b6b78690d";

/// Anvil account #2.
pub const REVIEWER_KEY: &str = "5de4111afa1a4b94908f83103eb1f1706367c2e68ca870fc3fb9a804cdab365a";

/// Token contract used by every test payment.
pub const ASSET: &str = "0x036CbD53842c5426634e7929541eC2318f3dCF7e";

/// Merchant that receives and settles payments (Anvil account #0).
pub const MERCHANT: &str = "0xf39Fd6e51aad88F6F4ce6aB8827279cffFb92266";

#[derive(Debug, Clone, Default)]
struct Account {
    code: Vec<u8>,
    transaction_count: u64,
    native_balance: U256,
}

/// In-memory chain state plus sanctions oracle.
#[derive(Default)]
pub struct TestChain {
    accounts: Mutex<HashMap<Address, Account>>,
    token_balances: Mutex<HashMap<(Address, Address), U256>>,
    sanctioned: Mutex<HashSet<Address>>,
    oracle_down: AtomicBool,
    oracle_queries: AtomicUsize,
}

impl TestChain {
    /// Externally owned account with `transaction_count` sends.
    pub fn wallet(&self, address: Address, transaction_count: u64) {
        self.accounts.lock().insert(
            address,
            Account {
                code: Vec::new(),
                transaction_count,
                native_balance: U256::from(1_000_000_000_000_000u64),
            },
        );
    }

    /// Contract account with `transaction_count` sends.
    pub fn contract(&self, address: Address, transaction_count: u64) {
        self.accounts.lock().insert(
            address,
            Account {
                code: vec![0x60, 0x80, 0x60, 0x40],
                transaction_count,
                native_balance: U256::ZERO,
            },
        );
    }

    /// Set the payment token balance of `owner`.
    pub fn fund(&self, owner: Address, amount: u64) {
        self.token_balances
            .lock()
            .insert((parse_address(ASSET).unwrap(), owner), U256::from(amount));
    }

    /// Have the oracle report `address` as sanctioned.
    pub fn sanction(&self, address: Address) {
        self.sanctioned.lock().insert(address);
    }

    /// Make every oracle query fail.
    pub fn take_oracle_down(&self) {
        self.oracle_down.store(true, Ordering::SeqCst);
    }

    /// Number of oracle queries served.
    pub fn oracle_queries(&self) -> usize {
        self.oracle_queries.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ChainReader for TestChain {
    async fn token_balance(&self, asset: Address, owner: Address) -> Result<U256> {
        Ok(self
            .token_balances
            .lock()
            .get(&(asset, owner))
            .copied()
            .unwrap_or(U256::ZERO))
    }

    async fn code_at(&self, address: Address) -> Result<Bytes> {
        Ok(self
            .accounts
            .lock()
            .get(&address)
            .map(|a| Bytes::from(a.code.clone()))
            .unwrap_or_default())
    }

    async fn transaction_count(&self, address: Address) -> Result<u64> {
        Ok(self
            .accounts
            .lock()
            .get(&address)
            .map_or(0, |a| a.transaction_count))
    }

    async fn native_balance(&self, address: Address) -> Result<U256> {
        Ok(self
            .accounts
            .lock()
            .get(&address)
            .map_or(U256::ZERO, |a| a.native_balance))
    }
}

#[async_trait]
impl SanctionsOracle for TestChain {
    async fn is_sanctioned(&self, address: Address) -> Result<bool> {
        self.oracle_queries.fetch_add(1, Ordering::SeqCst);
        if self.oracle_down.load(Ordering::SeqCst) {
            return Err(Error::Network("oracle unreachable".to_string()));
        }
        Ok(self.sanctioned.lock().contains(&address))
    }
}

/// Scripted settlement outcome.
#[derive(Debug, Clone)]
pub enum TransferOutcome {
    /// Mined and succeeded.
    Confirmed(String),
    /// Mined and reverted.
    Reverted(String),
    /// Rejected by the node before a hash was issued.
    Rejected(String),
}

/// Records settlement requests.
pub struct TestTransfers {
    outcome: TransferOutcome,
    /// Requests submitted so far.
    pub requests: Mutex<Vec<TransferRequest>>,
}

impl TestTransfers {
    /// Transfers that behave as `outcome`.
    pub fn new(outcome: TransferOutcome) -> Self {
        Self {
            outcome,
            requests: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl TransferSubmitter for TestTransfers {
    async fn submit_transfer_from(&self, request: &TransferRequest) -> Result<Option<String>> {
        self.requests.lock().push(request.clone());
        match &self.outcome {
            TransferOutcome::Confirmed(tx) | TransferOutcome::Reverted(tx) => Ok(Some(tx.clone())),
            TransferOutcome::Rejected(message) => Err(Error::Rpc {
                code: 3,
                message: message.clone(),
            }),
        }
    }

    async fn wait_for_receipt(&self, transaction_hash: &str) -> Result<Option<TransferReceipt>> {
        Ok(Some(TransferReceipt {
            transaction_hash: transaction_hash.to_string(),
            success: matches!(self.outcome, TransferOutcome::Confirmed(_)),
            block_number: Some(1),
        }))
    }
}

/// Gate fixture: chain state, a signing payer and the default configuration.
pub struct TestHarness {
    /// Chain and oracle.
    pub chain: Arc<TestChain>,
    /// Settlement backend.
    pub transfers: Arc<TestTransfers>,
    /// Configuration handed to the gate.
    pub config: GateConfig,
    key: SigningKey,
}

impl TestHarness {
    /// Harness whose payer is [`PAYER_KEY`].
    pub fn new() -> Self {
        Self::with_payer_key(PAYER_KEY)
    }

    /// Harness whose payer is `key_hex`.
    pub fn with_payer_key(key_hex: &str) -> Self {
        let key = SigningKey::from_slice(&hex::decode(key_hex).unwrap()).unwrap();
        let mut config = GateConfig::default();
        config.settlement.merchant_address = Some(MERCHANT.to_string());
        Self {
            chain: Arc::new(TestChain::default()),
            transfers: Arc::new(TestTransfers::new(TransferOutcome::Confirmed(
                "0xabc123".to_string(),
            ))),
            config,
            key,
        }
    }

    /// Replace the settlement backend.
    pub fn with_transfers(mut self, outcome: TransferOutcome) -> Self {
        self.transfers = Arc::new(TestTransfers::new(outcome));
        self
    }

    /// Address of the signing payer.
    pub fn payer(&self) -> Address {
        address_of(&self.key)
    }

    /// A builder wired to the harness backends.
    pub fn builder(&self) -> GateBuilder {
        GateBuilder::new(self.config.clone())
            .with_chain(self.chain.clone())
            .with_oracle(self.chain.clone())
            .with_transfers(self.transfers.clone())
    }

    /// Assemble a gate.
    pub fn gate(&self) -> Gate {
        self.builder().build().unwrap()
    }

    /// Requirements for `amount` units of [`ASSET`] payable to [`MERCHANT`].
    pub fn requirements(&self, amount: &str) -> PaymentRequirements {
        PaymentRequirements {
            scheme: "exact".to_string(),
            network: self.config.chain.network.clone(),
            asset: ASSET.to_string(),
            pay_to: MERCHANT.to_string(),
            max_amount_required: amount.to_string(),
            resource: "https://api.example.com/premium".to_string(),
            max_timeout_seconds: 60,
        }
    }

    /// Authorization signed by the payer, naming them as `from`.
    pub fn authorization(&self, requirements: &PaymentRequirements) -> PaymentAuthorization {
        self.authorization_from(&normalize_address(&self.payer()), requirements)
    }

    /// Authorization signed by the payer with `from` spelled as given.
    pub fn authorization_from(
        &self,
        from: &str,
        requirements: &PaymentRequirements,
    ) -> PaymentAuthorization {
        let mut authorization = PaymentAuthorization {
            from: Some(from.to_string()),
            to: requirements.pay_to.clone(),
            value: requirements.max_amount_required.clone(),
            valid_after: 0,
            valid_before: 0,
            nonce: "0x2a".to_string(),
            signature: None,
            message: None,
        };
        let message = canonical_message(&authorization, requirements, from);
        authorization.signature = Some(sign_message(&self.key, &message).unwrap());
        authorization
    }
}
