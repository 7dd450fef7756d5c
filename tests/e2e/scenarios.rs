//! Verification scenarios through an assembled gate.

use super::harness::{TestHarness, REVIEWER_KEY};
use compliance_gate::chain::normalize_address;
use compliance_gate::compliance::{RiskTier, FLAG_SANCTIONED, META_COMPLIANCE};
use compliance_gate::payment::{ValidityWindowModifier, REASON_MISSING_PAYER_OR_SIGNATURE};
use compliance_gate::{Error, GateEvent};
use std::io::Write;
use std::sync::Arc;

#[tokio::test]
async fn test_fresh_wallet_is_medium_risk_and_allowed() {
    let harness = TestHarness::new();
    harness.chain.wallet(harness.payer(), 0);
    harness.chain.fund(harness.payer(), 1_000_000);

    let gate = harness.gate();
    let requirements = harness.requirements("500000");
    let result = gate
        .verify(&harness.authorization(&requirements), &requirements)
        .await;

    assert!(result.is_valid, "{:?}", result.invalid_reason);
    let assessment = result.risk_assessment.as_ref().unwrap();
    assert_eq!(assessment.score, 40);
    assert_eq!(assessment.tier, RiskTier::Medium);
    assert!(!assessment.sanctioned);
    assert!(!result.requires_manual_review());
    assert_eq!(result.metadata[META_COMPLIANCE]["checked"], true);
}

#[tokio::test]
async fn test_established_wallet_is_low_risk() {
    let harness = TestHarness::new();
    harness.chain.wallet(harness.payer(), 250);
    harness.chain.fund(harness.payer(), 1_000_000);

    let gate = harness.gate();
    let requirements = harness.requirements("1000");
    let result = gate
        .verify(&harness.authorization(&requirements), &requirements)
        .await;

    assert!(result.is_valid);
    let assessment = result.risk_assessment.unwrap();
    assert_eq!(assessment.score, 0);
    assert_eq!(assessment.tier, RiskTier::Low);
    assert!(assessment.flags.is_empty());
}

#[tokio::test]
async fn test_unused_contract_payer_is_denied_at_threshold() {
    let harness = TestHarness::new();
    harness.chain.contract(harness.payer(), 0);
    harness.chain.fund(harness.payer(), 1_000_000);

    let gate = harness.gate();
    let requirements = harness.requirements("1000");
    let result = gate
        .verify(&harness.authorization(&requirements), &requirements)
        .await;

    assert!(!result.is_valid);
    assert_eq!(
        result.invalid_reason.as_deref(),
        Some("Risk score 70 (HIGH) meets or exceeds threshold 70")
    );
    let assessment = result.risk_assessment.unwrap();
    assert_eq!(assessment.score, 70);
    assert_eq!(assessment.tier, RiskTier::High);
    assert!(assessment.is_contract);
}

#[tokio::test]
async fn test_unused_contract_payer_allowed_for_review() {
    let mut harness = TestHarness::new();
    harness.config.compliance.require_manual_review = true;
    harness.chain.contract(harness.payer(), 0);
    harness.chain.fund(harness.payer(), 1_000_000);

    let mut gate = harness.gate();
    let mut events = gate.events().unwrap();
    let requirements = harness.requirements("1000");
    let result = gate
        .verify(&harness.authorization(&requirements), &requirements)
        .await;

    assert!(result.is_valid);
    assert!(result.requires_manual_review());
    assert_eq!(result.risk_assessment.unwrap().score, 70);

    let payer = normalize_address(&harness.payer());
    assert_eq!(
        events.recv().await.unwrap(),
        GateEvent::ManualReviewRequired {
            payer: payer.clone(),
            score: 70
        }
    );
    assert_eq!(
        events.recv().await.unwrap(),
        GateEvent::PaymentVerified { payer }
    );
}

#[tokio::test]
async fn test_sanctioned_payer_denied_even_with_manual_review() {
    let mut harness = TestHarness::new();
    harness.config.compliance.require_manual_review = true;
    harness.chain.wallet(harness.payer(), 500);
    harness.chain.fund(harness.payer(), 1_000_000);
    harness.chain.sanction(harness.payer());

    let gate = harness.gate();
    let requirements = harness.requirements("1000");
    let result = gate
        .verify(&harness.authorization(&requirements), &requirements)
        .await;

    assert!(!result.is_valid);
    assert!(result.invalid_reason.unwrap().contains("sanctioned"));
    let assessment = result.risk_assessment.unwrap();
    assert_eq!(assessment.score, 100);
    assert_eq!(assessment.tier, RiskTier::Critical);
    assert_eq!(assessment.flags, vec![FLAG_SANCTIONED.to_string()]);
}

#[tokio::test]
async fn test_payer_casing_does_not_matter() {
    let harness = TestHarness::new();
    harness.chain.wallet(harness.payer(), 250);
    harness.chain.fund(harness.payer(), 1_000_000);

    let upper = format!(
        "0x{}",
        normalize_address(&harness.payer())[2..].to_ascii_uppercase()
    );
    let gate = harness.gate();
    let requirements = harness.requirements("1000");
    let result = gate
        .verify(&harness.authorization_from(&upper, &requirements), &requirements)
        .await;

    assert!(result.is_valid, "{:?}", result.invalid_reason);
    assert_eq!(result.payer.as_deref(), Some(upper.as_str()));
}

#[tokio::test]
async fn test_signature_from_another_wallet_is_rejected() {
    let harness = TestHarness::new();
    let impostor = TestHarness::with_payer_key(REVIEWER_KEY);
    harness.chain.wallet(harness.payer(), 250);
    harness.chain.fund(harness.payer(), 1_000_000);

    let gate = harness.gate();
    let requirements = harness.requirements("1000");
    let claimed = normalize_address(&harness.payer());
    let authorization = impostor.authorization_from(&claimed, &requirements);
    let result = gate.verify(&authorization, &requirements).await;

    assert!(!result.is_valid);
    let reason = result.invalid_reason.unwrap();
    assert!(reason.starts_with("Invalid signature"));
    assert!(reason.contains(&claimed));
    assert!(reason.contains(&normalize_address(&impostor.payer())));
    assert_eq!(harness.chain.oracle_queries(), 0);
}

#[tokio::test]
async fn test_missing_signature_is_rejected() {
    let harness = TestHarness::new();
    let gate = harness.gate();
    let requirements = harness.requirements("1000");
    let mut authorization = harness.authorization(&requirements);
    authorization.signature = None;

    let result = gate.verify(&authorization, &requirements).await;
    assert!(!result.is_valid);
    assert_eq!(
        result.invalid_reason.as_deref(),
        Some(REASON_MISSING_PAYER_OR_SIGNATURE)
    );
}

#[tokio::test]
async fn test_short_balance_skips_compliance() {
    let harness = TestHarness::new();
    harness.chain.wallet(harness.payer(), 0);
    harness.chain.fund(harness.payer(), 10);

    let gate = harness.gate();
    let requirements = harness.requirements("1000");
    let result = gate
        .verify(&harness.authorization(&requirements), &requirements)
        .await;

    assert!(!result.is_valid);
    assert_eq!(
        result.invalid_reason.as_deref(),
        Some("insufficient balance: has 10, requires 1000")
    );
    assert!(result.risk_assessment.is_none());
    assert!(result.metadata.is_empty());
    assert_eq!(harness.chain.oracle_queries(), 0);
}

#[tokio::test]
async fn test_disabled_compliance_skips_screening() {
    let mut harness = TestHarness::new();
    harness.config.compliance.enabled = false;
    harness.chain.contract(harness.payer(), 0);
    harness.chain.fund(harness.payer(), 1_000_000);
    harness.chain.sanction(harness.payer());

    let gate = harness.gate();
    let requirements = harness.requirements("1000");
    let result = gate
        .verify(&harness.authorization(&requirements), &requirements)
        .await;

    assert!(result.is_valid);
    assert!(result.risk_assessment.is_none());
    assert_eq!(result.metadata[META_COMPLIANCE]["checked"], false);
    assert_eq!(harness.chain.oracle_queries(), 0);
}

#[tokio::test]
async fn test_oracle_outage_falls_back_to_local_list() {
    let mut harness = TestHarness::new();
    let mut list = tempfile::Builder::new().suffix(".json").tempfile().unwrap();
    write!(
        list,
        r#"{{"addresses": ["0x{}"]}}"#,
        normalize_address(&harness.payer())[2..].to_ascii_uppercase()
    )
    .unwrap();

    harness.config.compliance.sanctions_list = Some(list.path().to_path_buf());
    harness.chain.wallet(harness.payer(), 250);
    harness.chain.fund(harness.payer(), 1_000_000);
    harness.chain.take_oracle_down();

    let gate = harness.gate();
    let requirements = harness.requirements("1000");
    let result = gate
        .verify(&harness.authorization(&requirements), &requirements)
        .await;

    assert!(!result.is_valid);
    assert!(result.risk_assessment.unwrap().sanctioned);
    assert_eq!(harness.chain.oracle_queries(), 1);
}

#[tokio::test]
async fn test_oracle_outage_without_fallback_fails_closed() {
    let mut harness = TestHarness::new();
    harness.config.compliance.fallback_to_local = false;
    harness.chain.wallet(harness.payer(), 250);
    harness.chain.fund(harness.payer(), 1_000_000);
    harness.chain.take_oracle_down();

    let gate = harness.gate();
    let requirements = harness.requirements("1000");
    let result = gate
        .verify(&harness.authorization(&requirements), &requirements)
        .await;

    assert!(!result.is_valid);
    assert!(result
        .invalid_reason
        .unwrap()
        .starts_with("Compliance check failed"));
    assert!(result.risk_assessment.is_none());
}

#[tokio::test]
async fn test_oracle_hit_survives_later_outage() {
    let harness = TestHarness::new();
    harness.chain.wallet(harness.payer(), 250);
    harness.chain.sanction(harness.payer());

    let gate = harness.gate();
    let address = normalize_address(&harness.payer());
    assert!(gate.assess(&address).await.unwrap().sanctioned);

    harness.chain.take_oracle_down();
    let again = gate.assess(&address).await.unwrap();
    assert!(again.sanctioned);
    assert_eq!(again.score, 100);
    assert_eq!(harness.chain.oracle_queries(), 2);
    assert_eq!(gate.sanctions_stats().additions, 1);
}

#[tokio::test]
async fn test_assess_rejects_malformed_address() {
    let harness = TestHarness::new();
    let gate = harness.gate();
    assert!(matches!(
        gate.assess("0x1234").await,
        Err(Error::InvalidAddress(_))
    ));
}

#[tokio::test]
async fn test_extra_modifier_runs_after_compliance() {
    let harness = TestHarness::new();
    harness.chain.wallet(harness.payer(), 250);
    harness.chain.fund(harness.payer(), 1_000_000);

    let gate = harness
        .builder()
        .with_modifier(Arc::new(ValidityWindowModifier::with_clock(|| 1_000)))
        .build()
        .unwrap();
    assert_eq!(
        gate.modifier_names(),
        vec!["compliance".to_string(), "validity-window".to_string()]
    );

    let requirements = harness.requirements("1000");
    let mut authorization = harness.authorization(&requirements);
    authorization.valid_after = 2_000;

    let result = gate.verify(&authorization, &requirements).await;
    assert!(!result.is_valid);
    assert!(result
        .invalid_reason
        .unwrap()
        .starts_with("Authorization not valid until 2000"));
    // compliance ran first and its assessment is kept on the rejection
    assert_eq!(result.risk_assessment.unwrap().score, 0);
}
