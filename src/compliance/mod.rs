//! AML screening for payers.
//!
//! ```text
//! payer address
//!        │
//!        ▼
//! ┌─────────────────────┐   hit    ┌──────────────────┐
//! │ Sanctions oracle    │────────▶│ score 100, deny  │
//! │ + local list (OR)   │          └──────────────────┘
//! └─────────┬───────────┘
//!           │ clean
//!           ▼
//! ┌─────────────────────┐
//! │ Behaviour analysis  │  code? tx count? balance?
//! └─────────┬───────────┘
//!           ▼
//!   score → tier → policy (threshold, manual review)
//! ```

mod behavior;
mod modifier;
mod risk;
mod sanctions;

pub use behavior::{estimate_wallet_age, BehaviorAnalyzer, BehaviorProfile};
pub use modifier::{
    ComplianceModifier, CompliancePolicy, COMPLIANCE_PRIORITY, META_COMPLIANCE,
    META_REQUIRES_MANUAL_REVIEW, META_RISK_ASSESSMENT,
};
pub use risk::{
    score_profile, RiskAssessment, RiskEngine, RiskTier, FLAG_ANALYSIS_FAILED, FLAG_SANCTIONED,
    SANCTIONED_SCORE,
};
pub use sanctions::{
    CacheStats, LocalSanctionsList, SanctionsCache, SanctionsCheck, SanctionsSource,
    SanctionsSourceKind,
};
