//! Compliance policy on top of the risk engine.

use crate::compliance::risk::{RiskAssessment, RiskEngine, RiskTier};
use crate::error::Result;
use crate::payment::{Modifier, ModifierVerdict, VerificationContext};
use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{info, warn};

/// Priority of the compliance modifier. Runs ahead of other policy checks.
pub const COMPLIANCE_PRIORITY: i32 = 10;

/// Metadata key holding the serialized [`RiskAssessment`].
pub const META_RISK_ASSESSMENT: &str = "riskAssessment";
/// Metadata key describing whether compliance ran.
pub const META_COMPLIANCE: &str = "compliance";
/// Metadata key set when a payment is allowed pending human review.
pub const META_REQUIRES_MANUAL_REVIEW: &str = "requiresManualReview";

/// Compliance policy knobs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompliancePolicy {
    /// Screen payments at all.
    pub enabled: bool,
    /// Scores at or above this are denied, in `0..=100`.
    pub risk_threshold: u8,
    /// Allow HIGH-tier payments over the threshold, flagged for review.
    pub require_manual_review: bool,
}

impl Default for CompliancePolicy {
    fn default() -> Self {
        Self {
            enabled: true,
            risk_threshold: 70,
            require_manual_review: false,
        }
    }
}

/// Decision for an assessment under a policy, before metadata is attached.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Decision {
    Allow,
    AllowForReview,
    Deny(String),
}

fn decide(policy: &CompliancePolicy, assessment: &RiskAssessment) -> Decision {
    if assessment.sanctioned {
        return Decision::Deny(format!("Address {} is sanctioned", assessment.address));
    }

    if assessment.score < policy.risk_threshold {
        return Decision::Allow;
    }

    if policy.require_manual_review && assessment.tier == RiskTier::High {
        return Decision::AllowForReview;
    }

    Decision::Deny(format!(
        "Risk score {} ({}) meets or exceeds threshold {}",
        assessment.score, assessment.tier, policy.risk_threshold
    ))
}

/// Screens the payer through a [`RiskEngine`] and applies [`CompliancePolicy`].
pub struct ComplianceModifier {
    engine: Arc<RiskEngine>,
    policy: CompliancePolicy,
}

impl ComplianceModifier {
    /// Create a modifier.
    #[must_use]
    pub fn new(engine: Arc<RiskEngine>, policy: CompliancePolicy) -> Self {
        Self { engine, policy }
    }

    /// Active policy.
    #[must_use]
    pub fn policy(&self) -> &CompliancePolicy {
        &self.policy
    }
}

#[async_trait]
impl Modifier for ComplianceModifier {
    fn priority(&self) -> i32 {
        COMPLIANCE_PRIORITY
    }

    fn name(&self) -> &str {
        "compliance"
    }

    async fn execute(&self, context: &VerificationContext) -> Result<ModifierVerdict> {
        if !self.policy.enabled {
            return Ok(ModifierVerdict::allow()
                .with(META_COMPLIANCE, json!({"checked": false, "skipped": "disabled"})));
        }

        let Some(payer) = context.payer.as_deref() else {
            return Ok(ModifierVerdict::deny("No payer to check"));
        };

        let assessment = match self.engine.assess(payer).await {
            Ok(assessment) => assessment,
            Err(e) => {
                warn!("Compliance check failed for {}: {}", payer, e);
                return Ok(ModifierVerdict::deny(format!("Compliance check failed: {e}"))
                    .with(META_COMPLIANCE, json!({"checked": false, "error": e.to_string()})));
            }
        };

        let assessment_value = serde_json::to_value(&assessment).unwrap_or(Value::Null);
        let summary = json!({
            "checked": true,
            "score": assessment.score,
            "tier": assessment.tier,
            "threshold": self.policy.risk_threshold,
        });

        let verdict = match decide(&self.policy, &assessment) {
            Decision::Allow => ModifierVerdict::allow(),
            Decision::AllowForReview => {
                info!(
                    "Payer {} scored {} ({}); allowed pending manual review",
                    assessment.address, assessment.score, assessment.tier
                );
                ModifierVerdict::allow().with(META_REQUIRES_MANUAL_REVIEW, true)
            }
            Decision::Deny(reason) => {
                info!("Payer {} rejected: {}", assessment.address, reason);
                ModifierVerdict::deny(reason)
            }
        };

        Ok(verdict
            .with(META_COMPLIANCE, summary)
            .with(META_RISK_ASSESSMENT, assessment_value))
    }
}
