//! Payment verification and settlement.
//!
//! # Architecture
//!
//! ```text
//! authorization + requirements
//!        │
//!        ▼
//! ┌─────────────────────┐
//! │ Payer + signature   │── missing ──▶ invalid
//! └─────────┬───────────┘
//!           ▼
//! ┌─────────────────────┐
//! │ Recover signer      │── mismatch ─▶ invalid
//! └─────────┬───────────┘
//!           ▼
//! ┌─────────────────────┐
//! │ Signed terms        │── to/value ─▶ invalid
//! └─────────┬───────────┘
//!           ▼
//! ┌─────────────────────┐
//! │ Token balance       │── short ────▶ invalid
//! └─────────┬───────────┘
//!           ▼
//! ┌─────────────────────┐
//! │ Modifier chain      │── denied ───▶ invalid (+ metadata)
//! │ (compliance, ...)   │
//! └─────────┬───────────┘
//!           ▼
//!         valid ──▶ SettlementExecutor ──▶ transferFrom + receipt
//! ```

mod modifier;
mod settlement;
mod signature;
mod types;
mod verifier;
mod window;

pub use modifier::{Modifier, ModifierChain, ModifierVerdict, VerificationContext};
pub use settlement::{
    describe_fault, SettlementExecutor, REASON_NO_MERCHANT, REASON_NO_PAYER,
    REASON_TRANSACTION_FAILED,
};
pub use signature::{
    address_of, addresses_match, canonical_message, recover_signer, sign_message,
    signed_message, MESSAGE_HEADER, SIGNATURE_SIZE,
};
pub use types::{
    Metadata, PaymentAuthorization, PaymentRequirements, PaymentSubmission, SettlementResult,
    VerificationResult,
};
pub use verifier::{VerificationPipeline, REASON_MISSING_PAYER_OR_SIGNATURE};
pub use window::{ValidityWindowModifier, VALIDITY_WINDOW_PRIORITY};
