//! Settlement of verified payments.
//!
//! The merchant account pulls `maxAmountRequired` from the payer with a
//! `transferFrom`. The payer must already have approved the merchant as a
//! spender; that approval is not checked here.

use crate::chain::{normalize_address, parse_address, parse_amount, TransferRequest, TransferSubmitter};
use crate::error::{Error, Result};
use crate::event::{emit, GateEvent, GateEventsSender};
use crate::payment::types::{PaymentAuthorization, PaymentRequirements, SettlementResult};
use alloy_primitives::Address;
use std::sync::Arc;
use tracing::{info, warn};

/// Reason used when no transaction hash or no successful receipt came back.
pub const REASON_TRANSACTION_FAILED: &str = "transaction failed";

/// Reason used when no merchant identity is configured.
pub const REASON_NO_MERCHANT: &str = "no merchant signing identity configured";

/// Reason used when the authorization names no payer.
pub const REASON_NO_PAYER: &str = "missing payer";

/// Fragments node and token error messages use for allowance shortfalls.
const ALLOWANCE_FAULT_MARKERS: &[&str] = &[
    "insufficient allowance",
    "exceeds allowance",
    "erc20insufficientallowance",
];

/// Executes the settlement transfer for a verified payment.
pub struct SettlementExecutor {
    transfers: Arc<dyn TransferSubmitter>,
    merchant: Option<Address>,
    events: Option<GateEventsSender>,
}

impl SettlementExecutor {
    /// Create an executor. Without a merchant identity every settlement fails.
    #[must_use]
    pub fn new(transfers: Arc<dyn TransferSubmitter>, merchant: Option<Address>) -> Self {
        Self {
            transfers,
            merchant,
            events: None,
        }
    }

    /// Emit [`GateEvent`]s on `sender`.
    #[must_use]
    pub fn with_events(mut self, sender: GateEventsSender) -> Self {
        self.events = Some(sender);
        self
    }

    /// Settle a payment that has already passed verification.
    pub async fn settle(
        &self,
        authorization: &PaymentAuthorization,
        requirements: &PaymentRequirements,
    ) -> SettlementResult {
        let result = self.run(authorization, requirements).await;

        match (result.success, result.transaction.as_ref()) {
            (true, Some(tx)) => emit(
                self.events.as_ref(),
                GateEvent::PaymentSettled {
                    payer: result.payer.clone().unwrap_or_default(),
                    transaction: tx.clone(),
                },
            ),
            _ => emit(
                self.events.as_ref(),
                GateEvent::SettlementFailed {
                    payer: result.payer.clone(),
                    reason: result.error_reason.clone().unwrap_or_default(),
                },
            ),
        }

        result
    }

    async fn run(
        &self,
        authorization: &PaymentAuthorization,
        requirements: &PaymentRequirements,
    ) -> SettlementResult {
        let Some(merchant) = self.merchant else {
            warn!("Settlement requested without a merchant identity");
            return SettlementResult::failed(authorization.from.clone(), REASON_NO_MERCHANT);
        };

        let Some(payer) = authorization
            .from
            .clone()
            .filter(|p| !p.trim().is_empty())
        else {
            return SettlementResult::failed(None, REASON_NO_PAYER);
        };

        match self.transfer(merchant, &payer, requirements).await {
            Ok(result) => result,
            Err(e) => {
                let reason = describe_fault(&e);
                warn!("Settlement for {} failed: {}", payer, reason);
                SettlementResult::failed(Some(payer), reason)
            }
        }
    }

    async fn transfer(
        &self,
        merchant: Address,
        payer: &str,
        requirements: &PaymentRequirements,
    ) -> Result<SettlementResult> {
        let request = TransferRequest {
            asset: parse_address(&requirements.asset)?,
            spender: merchant,
            from: parse_address(payer)?,
            to: parse_address(&requirements.pay_to)?,
            amount: parse_amount(&requirements.max_amount_required)?,
        };

        let Some(tx) = self.transfers.submit_transfer_from(&request).await? else {
            return Ok(SettlementResult::failed(
                Some(payer.to_string()),
                REASON_TRANSACTION_FAILED,
            ));
        };

        let receipt = self.transfers.wait_for_receipt(&tx).await?;
        match receipt {
            Some(receipt) if receipt.success => {
                info!(
                    "Settled {} units from {} to {} in {}",
                    request.amount,
                    payer,
                    normalize_address(&request.to),
                    tx
                );
                Ok(SettlementResult {
                    success: true,
                    transaction: Some(tx),
                    payer: Some(payer.to_string()),
                    error_reason: None,
                })
            }
            _ => Ok(SettlementResult {
                success: false,
                transaction: Some(tx),
                payer: Some(payer.to_string()),
                error_reason: Some(REASON_TRANSACTION_FAILED.to_string()),
            }),
        }
    }
}

/// Turn a settlement fault into a caller-facing reason.
///
/// Allowance shortfalls get an actionable message; anything else is passed
/// through unchanged.
#[must_use]
pub fn describe_fault(error: &Error) -> String {
    let raw = error.to_string();
    let lowered = raw.to_ascii_lowercase();
    if ALLOWANCE_FAULT_MARKERS.iter().any(|m| lowered.contains(m)) {
        return "Payer has not approved the merchant to spend this amount. \
                The payer must grant a token spending approval to the merchant \
                address before the payment can be settled."
            .to_string();
    }
    raw
}
