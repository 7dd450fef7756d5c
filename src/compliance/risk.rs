//! Risk scoring: sanctions screening plus behavioural heuristics.
//!
//! # Scoring
//!
//! A sanctioned address scores exactly 100 and skips behavioural analysis.
//! Otherwise the score is additive, capped below 100:
//!
//! | Signal                     | Points |
//! |----------------------------|--------|
//! | contract address           | +30    |
//! | no transaction history     | +40    |
//! | fewer than 10 transactions | +25    |
//! | fewer than 50 transactions | +10    |
//! | age estimate below 1       | +20    |
//! | age estimate below 7       | +10    |
//!
//! The age term only applies to wallets with some history; an empty
//! history is already covered by its own term.

use crate::chain::{normalize_address, parse_address};
use crate::compliance::behavior::{BehaviorAnalyzer, BehaviorProfile};
use crate::compliance::sanctions::SanctionsSource;
use crate::error::{FaultPolicy, Result};
use alloy_primitives::Address;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

/// Score given to a sanctioned address, and only to one.
pub const SANCTIONED_SCORE: u8 = 100;

/// Upper bound for any score derived from behaviour alone.
const MAX_BEHAVIOR_SCORE: u8 = SANCTIONED_SCORE - 1;

/// Flag recorded for a sanctioned address. Always first.
pub const FLAG_SANCTIONED: &str = "sanctioned address";
/// Flag recorded when chain reads failed and the assessment degraded.
pub const FLAG_ANALYSIS_FAILED: &str = "analysis failed";

/// Four-level risk bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RiskTier {
    /// Score below 40.
    Low,
    /// Score in 40..70.
    Medium,
    /// Score in 70..90.
    High,
    /// Score 90 and above.
    Critical,
}

impl RiskTier {
    /// Tier for a score.
    #[must_use]
    pub const fn from_score(score: u8) -> Self {
        match score {
            90..=u8::MAX => Self::Critical,
            70..=89 => Self::High,
            40..=69 => Self::Medium,
            _ => Self::Low,
        }
    }
}

impl std::fmt::Display for RiskTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Low => "LOW",
            Self::Medium => "MEDIUM",
            Self::High => "HIGH",
            Self::Critical => "CRITICAL",
        };
        f.write_str(name)
    }
}

/// Point-in-time risk verdict for one address.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RiskAssessment {
    /// Lower-cased address.
    pub address: String,
    /// Score in `0..=100`.
    pub score: u8,
    /// Tier derived from `score`.
    pub tier: RiskTier,
    /// Whether the address is sanctioned.
    pub sanctioned: bool,
    /// Contributing factors, in the order they were evaluated.
    pub flags: Vec<String>,
    /// `transaction_count / 10`.
    pub wallet_age_estimate: u64,
    /// Transactions sent from the address.
    pub transaction_count: u64,
    /// Address has deployed bytecode.
    pub is_contract: bool,
}

impl RiskAssessment {
    /// Assessment for a sanctioned address.
    #[must_use]
    pub fn sanctioned(address: &Address) -> Self {
        Self {
            address: normalize_address(address),
            score: SANCTIONED_SCORE,
            tier: RiskTier::from_score(SANCTIONED_SCORE),
            sanctioned: true,
            flags: vec![FLAG_SANCTIONED.to_string()],
            wallet_age_estimate: 0,
            transaction_count: 0,
            is_contract: false,
        }
    }

    /// Assessment for a clean address built from its behaviour profile.
    #[must_use]
    pub fn from_profile(address: &Address, profile: &BehaviorProfile) -> Self {
        let (score, flags) = score_profile(profile);
        Self {
            address: normalize_address(address),
            score,
            tier: RiskTier::from_score(score),
            sanctioned: false,
            flags,
            wallet_age_estimate: profile.wallet_age_estimate,
            transaction_count: profile.transaction_count,
            is_contract: profile.is_contract,
        }
    }

    /// Complete but degraded assessment when chain reads failed.
    #[must_use]
    pub fn degraded(address: &Address) -> Self {
        Self {
            address: normalize_address(address),
            score: 0,
            tier: RiskTier::Low,
            sanctioned: false,
            flags: vec![FLAG_ANALYSIS_FAILED.to_string()],
            wallet_age_estimate: 0,
            transaction_count: 0,
            is_contract: false,
        }
    }

    /// Whether behavioural analysis failed for this assessment.
    #[must_use]
    pub fn is_degraded(&self) -> bool {
        self.flags.iter().any(|f| f == FLAG_ANALYSIS_FAILED)
    }
}

/// Score a behaviour profile. Returns the capped score and its flags.
#[must_use]
pub fn score_profile(profile: &BehaviorProfile) -> (u8, Vec<String>) {
    let mut score: u32 = 0;
    let mut flags = Vec::new();

    if profile.is_contract {
        score += 30;
        flags.push("contract address".to_string());
    }

    match profile.transaction_count {
        0 => {
            score += 40;
            flags.push("no transaction history".to_string());
        }
        n @ 1..=9 => {
            score += 25;
            flags.push(format!("low transaction count ({n})"));
        }
        n @ 10..=49 => {
            score += 10;
            flags.push(format!("limited transaction count ({n})"));
        }
        _ => {}
    }

    if profile.transaction_count > 0 {
        match profile.wallet_age_estimate {
            0 => {
                score += 20;
                flags.push("very new wallet".to_string());
            }
            1..=6 => {
                score += 10;
                flags.push("new wallet".to_string());
            }
            _ => {}
        }
    }

    if profile.balance.is_zero() {
        flags.push("zero balance".to_string());
    }

    let capped = score.min(u32::from(MAX_BEHAVIOR_SCORE));
    (u8::try_from(capped).unwrap_or(MAX_BEHAVIOR_SCORE), flags)
}

/// Combines sanctions screening and behavioural analysis into one verdict.
pub struct RiskEngine {
    sanctions: SanctionsSource,
    behavior: BehaviorAnalyzer,
    on_analysis_fault: FaultPolicy,
}

impl RiskEngine {
    /// Create an engine. Behavioural read failures degrade by default.
    #[must_use]
    pub fn new(sanctions: SanctionsSource, behavior: BehaviorAnalyzer) -> Self {
        Self {
            sanctions,
            behavior,
            on_analysis_fault: FaultPolicy::Degrade,
        }
    }

    /// Set what happens when behavioural chain reads fail.
    #[must_use]
    pub fn with_analysis_fault_policy(mut self, policy: FaultPolicy) -> Self {
        self.on_analysis_fault = policy;
        self
    }

    /// The sanctions source backing this engine.
    #[must_use]
    pub fn sanctions(&self) -> &SanctionsSource {
        &self.sanctions
    }

    /// Assess an address given as text.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::InvalidAddress`] before any network call if the
    /// address is malformed, or a sanctions error when the oracle fails with
    /// fallback disabled.
    pub async fn assess(&self, address: &str) -> Result<RiskAssessment> {
        let parsed = parse_address(address)?;
        self.assess_address(&parsed).await
    }

    /// Assess a parsed address.
    ///
    /// # Errors
    ///
    /// See [`RiskEngine::assess`].
    pub async fn assess_address(&self, address: &Address) -> Result<RiskAssessment> {
        let check = self.sanctions.check(address).await?;
        if check.sanctioned {
            info!(
                "Address {} is sanctioned (source: {:?})",
                normalize_address(address),
                check.source
            );
            return Ok(RiskAssessment::sanctioned(address));
        }

        let assessment = match self.behavior.analyze(address).await {
            Ok(profile) => RiskAssessment::from_profile(address, &profile),
            Err(e) => match self.on_analysis_fault {
                FaultPolicy::Degrade => {
                    warn!(
                        "Behaviour analysis failed for {}: {}",
                        normalize_address(address),
                        e
                    );
                    RiskAssessment::degraded(address)
                }
                FaultPolicy::Propagate => return Err(e),
            },
        };

        debug!(
            "Risk assessment for {}: score={} tier={} flags={:?}",
            assessment.address, assessment.score, assessment.tier, assessment.flags
        );
        Ok(assessment)
    }
}
