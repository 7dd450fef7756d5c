//! Verify-then-settle flows.

use super::harness::{TestHarness, TransferOutcome, ASSET, MERCHANT};
use alloy_primitives::U256;
use compliance_gate::chain::{normalize_address, parse_address};
use compliance_gate::payment::{REASON_NO_MERCHANT, REASON_TRANSACTION_FAILED};
use compliance_gate::GateEvent;

fn funded(outcome: TransferOutcome) -> TestHarness {
    let harness = TestHarness::new().with_transfers(outcome);
    harness.chain.wallet(harness.payer(), 250);
    harness.chain.fund(harness.payer(), 1_000_000);
    harness
}

#[tokio::test]
async fn test_verified_payment_is_settled() {
    let harness = funded(TransferOutcome::Confirmed("0xabc123".to_string()));
    let mut gate = harness.gate();
    let mut events = gate.events().unwrap();

    let requirements = harness.requirements("2500");
    let (verification, settlement) = gate
        .verify_and_settle(&harness.authorization(&requirements), &requirements)
        .await;

    assert!(verification.is_valid);
    let settlement = settlement.unwrap();
    assert!(settlement.success);
    assert_eq!(settlement.transaction.as_deref(), Some("0xabc123"));

    let requests = harness.transfers.requests.lock();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].asset, parse_address(ASSET).unwrap());
    assert_eq!(requests[0].spender, parse_address(MERCHANT).unwrap());
    assert_eq!(requests[0].from, harness.payer());
    assert_eq!(requests[0].to, parse_address(MERCHANT).unwrap());
    assert_eq!(requests[0].amount, U256::from(2500u64));
    drop(requests);

    let payer = normalize_address(&harness.payer());
    assert_eq!(
        events.recv().await.unwrap(),
        GateEvent::PaymentVerified {
            payer: payer.clone()
        }
    );
    assert_eq!(
        events.recv().await.unwrap(),
        GateEvent::PaymentSettled {
            payer,
            transaction: "0xabc123".to_string()
        }
    );
}

#[tokio::test]
async fn test_rejected_payment_is_not_settled() {
    let harness = TestHarness::new();
    harness.chain.contract(harness.payer(), 0);
    harness.chain.fund(harness.payer(), 1_000_000);

    let gate = harness.gate();
    let requirements = harness.requirements("2500");
    let (verification, settlement) = gate
        .verify_and_settle(&harness.authorization(&requirements), &requirements)
        .await;

    assert!(!verification.is_valid);
    assert!(settlement.is_none());
    assert!(harness.transfers.requests.lock().is_empty());
}

#[tokio::test]
async fn test_payment_signed_for_other_terms_is_not_settled() {
    let harness = funded(TransferOutcome::Confirmed("0xabc123".to_string()));
    let gate = harness.gate();

    let requirements = harness.requirements("900000");
    let mut signed_terms = requirements.clone();
    signed_terms.pay_to = "0x000000000000000000000000000000000000dEaD".to_string();
    signed_terms.max_amount_required = "1".to_string();
    let authorization = harness.authorization(&signed_terms);

    let (verification, settlement) = gate.verify_and_settle(&authorization, &requirements).await;

    assert!(!verification.is_valid);
    assert!(verification
        .invalid_reason
        .unwrap()
        .starts_with("recipient mismatch"));
    assert!(settlement.is_none());
    assert!(harness.transfers.requests.lock().is_empty());
}

#[tokio::test]
async fn test_underpaid_authorization_is_not_settled() {
    let harness = funded(TransferOutcome::Confirmed("0xabc123".to_string()));
    let gate = harness.gate();

    let requirements = harness.requirements("900000");
    let mut signed_terms = requirements.clone();
    signed_terms.max_amount_required = "1".to_string();
    let authorization = harness.authorization(&signed_terms);

    let (verification, settlement) = gate.verify_and_settle(&authorization, &requirements).await;

    assert!(!verification.is_valid);
    assert_eq!(
        verification.invalid_reason.as_deref(),
        Some("insufficient authorized amount: authorized 1, requires 900000")
    );
    assert!(settlement.is_none());
    assert!(harness.transfers.requests.lock().is_empty());
}

#[tokio::test]
async fn test_reverted_transfer_reports_failure() {
    let harness = funded(TransferOutcome::Reverted("0xdead".to_string()));
    let gate = harness.gate();

    let requirements = harness.requirements("2500");
    let (_, settlement) = gate
        .verify_and_settle(&harness.authorization(&requirements), &requirements)
        .await;

    let settlement = settlement.unwrap();
    assert!(!settlement.success);
    assert_eq!(settlement.transaction.as_deref(), Some("0xdead"));
    assert_eq!(
        settlement.error_reason.as_deref(),
        Some(REASON_TRANSACTION_FAILED)
    );
}

#[tokio::test]
async fn test_missing_approval_gets_actionable_reason() {
    let harness = funded(TransferOutcome::Rejected(
        "execution reverted: ERC20InsufficientAllowance".to_string(),
    ));
    let gate = harness.gate();

    let requirements = harness.requirements("2500");
    let (_, settlement) = gate
        .verify_and_settle(&harness.authorization(&requirements), &requirements)
        .await;

    let settlement = settlement.unwrap();
    assert!(!settlement.success);
    assert!(settlement.transaction.is_none());
    assert!(settlement.error_reason.unwrap().contains("approval"));
}

#[tokio::test]
async fn test_no_merchant_configured() {
    let mut harness = funded(TransferOutcome::Confirmed("0xabc123".to_string()));
    harness.config.settlement.merchant_address = None;
    let gate = harness.gate();

    let requirements = harness.requirements("2500");
    let (verification, settlement) = gate
        .verify_and_settle(&harness.authorization(&requirements), &requirements)
        .await;

    assert!(verification.is_valid);
    let settlement = settlement.unwrap();
    assert!(!settlement.success);
    assert_eq!(settlement.error_reason.as_deref(), Some(REASON_NO_MERCHANT));
    assert!(harness.transfers.requests.lock().is_empty());
}
