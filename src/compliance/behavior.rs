//! Heuristic on-chain behaviour signals for a wallet.

use crate::chain::ChainReader;
use crate::error::Result;
use alloy_primitives::{Address, U256};
use std::sync::Arc;
use tracing::debug;

/// Raw behavioural signals read from chain state.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct BehaviorProfile {
    /// Address has deployed bytecode.
    pub is_contract: bool,
    /// Transactions sent from the address.
    pub transaction_count: u64,
    /// `transaction_count / 10`. A volume proxy, not a calendar age.
    pub wallet_age_estimate: u64,
    /// Native asset balance.
    pub balance: U256,
}

/// Derives a [`BehaviorProfile`] from chain reads.
pub struct BehaviorAnalyzer {
    chain: Arc<dyn ChainReader>,
}

impl BehaviorAnalyzer {
    /// Create an analyzer over `chain`.
    #[must_use]
    pub fn new(chain: Arc<dyn ChainReader>) -> Self {
        Self { chain }
    }

    /// Read code presence, transaction count and balance, in that order.
    ///
    /// # Errors
    ///
    /// Returns the first chain-read error.
    pub async fn analyze(&self, address: &Address) -> Result<BehaviorProfile> {
        let code = self.chain.code_at(*address).await?;
        let transaction_count = self.chain.transaction_count(*address).await?;
        let balance = self.chain.native_balance(*address).await?;

        let profile = BehaviorProfile {
            is_contract: !code.is_empty(),
            transaction_count,
            wallet_age_estimate: estimate_wallet_age(transaction_count),
            balance,
        };
        debug!("Behaviour profile for {address}: {profile:?}");
        Ok(profile)
    }
}

/// Coarse wallet age: one unit per ten transactions.
#[must_use]
pub const fn estimate_wallet_age(transaction_count: u64) -> u64 {
    transaction_count / 10
}
