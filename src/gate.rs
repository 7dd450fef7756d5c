//! Gate assembly - wires configuration into the pipeline and executor.

use crate::chain::{parse_address, ChainReader, RpcClient, RpcOracle, SanctionsOracle, TransferSubmitter};
use crate::compliance::{
    BehaviorAnalyzer, CacheStats, ComplianceModifier, LocalSanctionsList, RiskAssessment, RiskEngine,
    SanctionsCache, SanctionsSource,
};
use crate::config::GateConfig;
use crate::error::Result;
use crate::event::{create_event_channel, GateEventsChannel, GateEventsSender};
use crate::payment::{
    Modifier, PaymentAuthorization, PaymentRequirements, SettlementExecutor, SettlementResult,
    VerificationPipeline, VerificationResult,
};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// Builder for a [`Gate`].
pub struct GateBuilder {
    config: GateConfig,
    chain: Option<Arc<dyn ChainReader>>,
    oracle: Option<Arc<dyn SanctionsOracle>>,
    transfers: Option<Arc<dyn TransferSubmitter>>,
    extra_modifiers: Vec<Arc<dyn Modifier>>,
}

impl GateBuilder {
    /// Create a builder with the given configuration.
    #[must_use]
    pub fn new(config: GateConfig) -> Self {
        Self {
            config,
            chain: None,
            oracle: None,
            transfers: None,
            extra_modifiers: Vec::new(),
        }
    }

    /// Use a custom chain reader instead of the configured RPC endpoint.
    #[must_use]
    pub fn with_chain(mut self, chain: Arc<dyn ChainReader>) -> Self {
        self.chain = Some(chain);
        self
    }

    /// Use a custom sanctions oracle.
    #[must_use]
    pub fn with_oracle(mut self, oracle: Arc<dyn SanctionsOracle>) -> Self {
        self.oracle = Some(oracle);
        self
    }

    /// Use a custom transfer submitter.
    #[must_use]
    pub fn with_transfers(mut self, transfers: Arc<dyn TransferSubmitter>) -> Self {
        self.transfers = Some(transfers);
        self
    }

    /// Register an additional policy modifier.
    #[must_use]
    pub fn with_modifier(mut self, modifier: Arc<dyn Modifier>) -> Self {
        self.extra_modifiers.push(modifier);
        self
    }

    /// Build the gate.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid or the local
    /// sanctions list cannot be loaded.
    pub fn build(self) -> Result<Gate> {
        self.config.validate()?;
        info!(
            "Building compliance gate for {} (chain id {})",
            self.config.chain.network, self.config.chain.chain_id
        );

        let rpc = Arc::new(
            RpcClient::new(self.config.chain.rpc_url.clone()).with_receipt_polling(
                Duration::from_millis(self.config.settlement.receipt_poll_interval_ms),
                self.config.settlement.max_receipt_polls,
            ),
        );

        let chain: Arc<dyn ChainReader> = match self.chain {
            Some(chain) => chain,
            None => rpc.clone() as Arc<dyn ChainReader>,
        };
        let transfers: Arc<dyn TransferSubmitter> = match self.transfers {
            Some(transfers) => transfers,
            None => rpc.clone() as Arc<dyn TransferSubmitter>,
        };

        let compliance = &self.config.compliance;
        let list = match &compliance.sanctions_list {
            Some(path) => LocalSanctionsList::from_file(path)?,
            None => LocalSanctionsList::default(),
        };
        let cache = SanctionsCache::from_list(&list);

        let oracle = if compliance.use_oracle {
            match self.oracle {
                Some(oracle) => Some(oracle),
                None => {
                    let override_address = compliance
                        .oracle_address
                        .as_deref()
                        .map(parse_address)
                        .transpose()?;
                    match RpcOracle::resolve_contract(self.config.chain.chain_id, override_address) {
                        Some(contract) => {
                            Some(Arc::new(RpcOracle::new(rpc.clone(), contract)) as Arc<dyn SanctionsOracle>)
                        }
                        None => {
                            warn!(
                                "No sanctions oracle deployment on chain {}; using local list only",
                                self.config.chain.chain_id
                            );
                            None
                        }
                    }
                }
            }
        } else {
            None
        };

        let sanctions = match oracle {
            Some(oracle) => {
                SanctionsSource::with_oracle(oracle, cache, compliance.oracle_fault_policy())
            }
            None => SanctionsSource::local(cache),
        };

        let engine = Arc::new(
            RiskEngine::new(sanctions, BehaviorAnalyzer::new(chain.clone()))
                .with_analysis_fault_policy(compliance.behavior_fault_policy),
        );

        let (events_tx, events_rx) = create_event_channel();

        let mut pipeline = VerificationPipeline::new(chain)
            .with_modifier(Arc::new(ComplianceModifier::new(
                engine.clone(),
                compliance.policy(),
            )))
            .with_events(events_tx.clone());
        for modifier in self.extra_modifiers {
            pipeline = pipeline.with_modifier(modifier);
        }

        let merchant = self
            .config
            .settlement
            .merchant_address
            .as_deref()
            .map(parse_address)
            .transpose()?;
        let settlement = SettlementExecutor::new(transfers, merchant).with_events(events_tx.clone());

        info!(
            "Compliance gate ready (modifiers: {:?}, oracle: {}, merchant configured: {})",
            pipeline.modifiers().names(),
            engine.sanctions().uses_oracle(),
            merchant.is_some()
        );

        Ok(Gate {
            config: self.config,
            engine,
            pipeline,
            settlement,
            events_tx,
            events_rx: Some(events_rx),
        })
    }
}

/// A configured compliance gate.
pub struct Gate {
    config: GateConfig,
    engine: Arc<RiskEngine>,
    pipeline: VerificationPipeline,
    settlement: SettlementExecutor,
    events_tx: GateEventsSender,
    events_rx: Option<GateEventsChannel>,
}

impl Gate {
    /// Active configuration.
    #[must_use]
    pub fn config(&self) -> &GateConfig {
        &self.config
    }

    /// Sanctions cache statistics.
    #[must_use]
    pub fn sanctions_stats(&self) -> CacheStats {
        self.engine.sanctions().cache().stats()
    }

    /// Names of the registered modifiers, in execution order.
    #[must_use]
    pub fn modifier_names(&self) -> Vec<String> {
        self.pipeline.modifiers().names()
    }

    /// Get a receiver for gate events.
    ///
    /// Note: Can only be called once. Subsequent calls return None.
    pub fn events(&mut self) -> Option<GateEventsChannel> {
        self.events_rx.take()
    }

    /// Subscribe to gate events.
    #[must_use]
    pub fn subscribe_events(&self) -> GateEventsChannel {
        self.events_tx.subscribe()
    }

    /// Risk-assess a single address.
    ///
    /// # Errors
    ///
    /// Returns an error for malformed addresses or unrecoverable oracle faults.
    pub async fn assess(&self, address: &str) -> Result<RiskAssessment> {
        self.engine.assess(address).await
    }

    /// Verify a payment.
    pub async fn verify(
        &self,
        authorization: &PaymentAuthorization,
        requirements: &PaymentRequirements,
    ) -> VerificationResult {
        self.pipeline.verify(authorization, requirements).await
    }

    /// Verify a payment and, if it passes, settle it.
    pub async fn verify_and_settle(
        &self,
        authorization: &PaymentAuthorization,
        requirements: &PaymentRequirements,
    ) -> (VerificationResult, Option<SettlementResult>) {
        let verification = self.verify(authorization, requirements).await;
        if !verification.is_valid {
            return (verification, None);
        }
        let settlement = self.settlement.settle(authorization, requirements).await;
        (verification, Some(settlement))
    }
}
