//! Payment data model shared by verification and settlement.
//!
//! Field names serialize in camelCase to match the x402 wire format.

use crate::compliance::RiskAssessment;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// Free-form metadata threaded through the modifier chain.
pub type Metadata = serde_json::Map<String, Value>;

/// Payer-signed intent to move `value` units of an asset to `to`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentAuthorization {
    /// Payer address.
    #[serde(default)]
    pub from: Option<String>,
    /// Recipient address.
    pub to: String,
    /// Amount in token base units, decimal.
    pub value: String,
    /// Unix time after which the authorization is usable.
    #[serde(default, deserialize_with = "u64_from_string_or_number")]
    pub valid_after: u64,
    /// Unix time before which the authorization is usable.
    #[serde(default, deserialize_with = "u64_from_string_or_number")]
    pub valid_before: u64,
    /// Payer-chosen nonce.
    #[serde(default)]
    pub nonce: String,
    /// 65-byte hex signature.
    #[serde(default)]
    pub signature: Option<String>,
    /// Exact message that was signed, when the wallet supplied one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Merchant-declared payment terms.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentRequirements {
    /// Payment scheme, e.g. `exact`.
    pub scheme: String,
    /// Network name, e.g. `base-sepolia`.
    pub network: String,
    /// Token contract address.
    pub asset: String,
    /// Merchant address receiving funds.
    pub pay_to: String,
    /// Amount in token base units, decimal.
    pub max_amount_required: String,
    /// Resource being paid for.
    #[serde(default)]
    pub resource: String,
    /// How long the merchant will wait for settlement.
    #[serde(default)]
    pub max_timeout_seconds: u64,
}

/// An authorization together with the requirements it answers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentSubmission {
    /// Signed authorization.
    pub authorization: PaymentAuthorization,
    /// Merchant terms.
    pub requirements: PaymentRequirements,
}

/// Outcome of [`crate::payment::VerificationPipeline::verify`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerificationResult {
    /// Whether the payment is admissible.
    pub is_valid: bool,
    /// Payer address, when it could be extracted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payer: Option<String>,
    /// Why the payment was rejected.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub invalid_reason: Option<String>,
    /// Risk assessment produced by the compliance modifier, if it ran.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub risk_assessment: Option<RiskAssessment>,
    /// Everything the modifier chain accumulated.
    #[serde(default, skip_serializing_if = "Metadata::is_empty")]
    pub metadata: Metadata,
}

impl VerificationResult {
    /// Successful verification.
    #[must_use]
    pub fn valid(payer: String, metadata: Metadata) -> Self {
        Self {
            is_valid: true,
            payer: Some(payer),
            invalid_reason: None,
            risk_assessment: risk_assessment_from(&metadata),
            metadata,
        }
    }

    /// Rejected verification.
    #[must_use]
    pub fn invalid(payer: Option<String>, reason: impl Into<String>, metadata: Metadata) -> Self {
        Self {
            is_valid: false,
            payer,
            invalid_reason: Some(reason.into()),
            risk_assessment: risk_assessment_from(&metadata),
            metadata,
        }
    }

    /// Whether the result flags the payment for manual review.
    #[must_use]
    pub fn requires_manual_review(&self) -> bool {
        self.metadata
            .get(crate::compliance::META_REQUIRES_MANUAL_REVIEW)
            .and_then(Value::as_bool)
            .unwrap_or(false)
    }
}

/// Outcome of [`crate::payment::SettlementExecutor::settle`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SettlementResult {
    /// Whether the transfer was mined successfully.
    pub success: bool,
    /// Transaction hash.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transaction: Option<String>,
    /// Payer address.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payer: Option<String>,
    /// Why settlement failed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_reason: Option<String>,
}

impl SettlementResult {
    /// Failed settlement.
    #[must_use]
    pub fn failed(payer: Option<String>, reason: impl Into<String>) -> Self {
        Self {
            success: false,
            transaction: None,
            payer,
            error_reason: Some(reason.into()),
        }
    }
}

fn risk_assessment_from(metadata: &Metadata) -> Option<RiskAssessment> {
    metadata
        .get(crate::compliance::META_RISK_ASSESSMENT)
        .and_then(|v| serde_json::from_value(v.clone()).ok())
}

fn u64_from_string_or_number<'de, D>(deserializer: D) -> std::result::Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Number(u64),
        Text(String),
    }

    match Raw::deserialize(deserializer)? {
        Raw::Number(n) => Ok(n),
        Raw::Text(s) => s.trim().parse().map_err(serde::de::Error::custom),
    }
}
