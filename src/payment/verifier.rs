//! Payment verification pipeline.
//!
//! Signature, then the signed terms against the merchant's, then balance,
//! then the modifier chain. Each step is a hard gate, and the chain only
//! runs once the cheap checks have passed.

use crate::chain::{normalize_address, parse_address, parse_amount, ChainReader};
use crate::compliance::{META_REQUIRES_MANUAL_REVIEW, META_RISK_ASSESSMENT};
use crate::error::Result;
use crate::event::{emit, GateEvent, GateEventsSender};
use crate::payment::modifier::{Modifier, ModifierChain, VerificationContext};
use crate::payment::signature::{addresses_match, recover_signer, signed_message};
use crate::payment::types::{
    Metadata, PaymentAuthorization, PaymentRequirements, VerificationResult,
};
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Reason given when the authorization lacks a payer or a signature.
pub const REASON_MISSING_PAYER_OR_SIGNATURE: &str = "missing payer or signature";

/// Verifies payment authorizations against merchant requirements.
pub struct VerificationPipeline {
    chain: Arc<dyn ChainReader>,
    modifiers: ModifierChain,
    events: Option<GateEventsSender>,
}

impl VerificationPipeline {
    /// Create a pipeline with an empty modifier chain.
    #[must_use]
    pub fn new(chain: Arc<dyn ChainReader>) -> Self {
        Self {
            chain,
            modifiers: ModifierChain::default(),
            events: None,
        }
    }

    /// Register a policy modifier.
    #[must_use]
    pub fn with_modifier(mut self, modifier: Arc<dyn Modifier>) -> Self {
        self.modifiers.register(modifier);
        self
    }

    /// Replace the modifier chain.
    #[must_use]
    pub fn with_modifiers(mut self, modifiers: ModifierChain) -> Self {
        self.modifiers = modifiers;
        self
    }

    /// Emit [`GateEvent`]s on `sender`.
    #[must_use]
    pub fn with_events(mut self, sender: GateEventsSender) -> Self {
        self.events = Some(sender);
        self
    }

    /// The modifier chain.
    #[must_use]
    pub fn modifiers(&self) -> &ModifierChain {
        &self.modifiers
    }

    /// Verify a payment. Never fails: every fault becomes an invalid result.
    pub async fn verify(
        &self,
        authorization: &PaymentAuthorization,
        requirements: &PaymentRequirements,
    ) -> VerificationResult {
        let result = match self.run(authorization, requirements).await {
            Ok(result) => result,
            Err(e) => {
                warn!("Verification aborted: {}", e);
                VerificationResult::invalid(authorization.from.clone(), e.to_string(), Metadata::new())
            }
        };

        if result.is_valid {
            let payer = result.payer.clone().unwrap_or_default();
            if result.requires_manual_review() {
                let score = result.risk_assessment.as_ref().map_or(0, |a| a.score);
                emit(
                    self.events.as_ref(),
                    GateEvent::ManualReviewRequired {
                        payer: payer.clone(),
                        score,
                    },
                );
            }
            emit(self.events.as_ref(), GateEvent::PaymentVerified { payer });
        } else {
            emit(
                self.events.as_ref(),
                GateEvent::PaymentRejected {
                    payer: result.payer.clone(),
                    reason: result.invalid_reason.clone().unwrap_or_default(),
                },
            );
        }

        result
    }

    async fn run(
        &self,
        authorization: &PaymentAuthorization,
        requirements: &PaymentRequirements,
    ) -> Result<VerificationResult> {
        // Step 1: payer and signature
        let (Some(payer), Some(signature)) = (
            authorization.from.as_deref().filter(|s| !s.trim().is_empty()),
            authorization.signature.as_deref().filter(|s| !s.trim().is_empty()),
        ) else {
            info!("Rejecting authorization: {}", REASON_MISSING_PAYER_OR_SIGNATURE);
            return Ok(VerificationResult::invalid(
                authorization.from.clone(),
                REASON_MISSING_PAYER_OR_SIGNATURE,
                Metadata::new(),
            ));
        };
        let payer = payer.to_string();

        // Step 2-3: signer recovery
        let message = signed_message(authorization, requirements, &payer);
        let recovered = normalize_address(&recover_signer(&message, signature)?);
        if !addresses_match(&payer, &recovered) {
            info!("Signature mismatch for {}: recovered {}", payer, recovered);
            return Ok(VerificationResult::invalid(
                Some(payer.clone()),
                format!("Invalid signature: expected {payer}, recovered {recovered}"),
                Metadata::new(),
            ));
        }
        debug!("Signature valid for {}", payer);

        // Step 4: signed terms against merchant terms
        let required = parse_amount(&requirements.max_amount_required)?;
        if !addresses_match(&authorization.to, &requirements.pay_to) {
            info!(
                "Recipient mismatch for {}: authorized {}, requires {}",
                payer, authorization.to, requirements.pay_to
            );
            return Ok(VerificationResult::invalid(
                Some(payer),
                format!(
                    "recipient mismatch: authorized {}, requires {}",
                    authorization.to, requirements.pay_to
                ),
                Metadata::new(),
            ));
        }
        let authorized = parse_amount(&authorization.value)?;
        if authorized < required {
            info!(
                "Authorized amount too low for {}: authorized {}, requires {}",
                payer, authorized, required
            );
            return Ok(VerificationResult::invalid(
                Some(payer),
                format!("insufficient authorized amount: authorized {authorized}, requires {required}"),
                Metadata::new(),
            ));
        }

        // Step 5: balance
        let payer_address = parse_address(&payer)?;
        let asset = parse_address(&requirements.asset)?;
        let balance = self.chain.token_balance(asset, payer_address).await?;
        if balance < required {
            info!(
                "Insufficient balance for {}: has {}, requires {}",
                payer, balance, required
            );
            return Ok(VerificationResult::invalid(
                Some(payer),
                format!("insufficient balance: has {balance}, requires {required}"),
                Metadata::new(),
            ));
        }

        // Step 6: modifier chain
        let mut context = VerificationContext::new(
            Some(payer.clone()),
            authorization.clone(),
            requirements.clone(),
        );
        let verdict = self.modifiers.execute(&mut context).await;

        if !verdict.allowed {
            context.merge(verdict.metadata);
            let reason = verdict
                .reason
                .unwrap_or_else(|| "rejected by policy".to_string());
            return Ok(VerificationResult::invalid(Some(payer), reason, context.metadata));
        }

        // Step 7
        let risk = context
            .metadata
            .get(META_RISK_ASSESSMENT)
            .and_then(|a| a.get("score"))
            .and_then(Value::as_u64);
        let manual_review = context
            .metadata
            .get(META_REQUIRES_MANUAL_REVIEW)
            .and_then(Value::as_bool)
            .unwrap_or(false);
        info!(
            "Payment from {} verified (risk score: {}, manual review: {})",
            payer,
            risk.map_or_else(|| "n/a".to_string(), |s| s.to_string()),
            manual_review
        );
        Ok(VerificationResult::valid(payer, context.metadata))
    }
}
