//! Gate event system.

use tokio::sync::broadcast;

/// Events emitted while verifying and settling payments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateEvent {
    /// Payment passed verification.
    PaymentVerified {
        /// Payer address.
        payer: String,
    },

    /// Payment failed verification.
    PaymentRejected {
        /// Payer address, if known.
        payer: Option<String>,
        /// Rejection reason.
        reason: String,
    },

    /// Payment was allowed but flagged for a human operator.
    ManualReviewRequired {
        /// Payer address.
        payer: String,
        /// Risk score that triggered the review.
        score: u8,
    },

    /// Settlement transfer confirmed.
    PaymentSettled {
        /// Payer address.
        payer: String,
        /// Transaction hash.
        transaction: String,
    },

    /// Settlement transfer failed.
    SettlementFailed {
        /// Payer address, if known.
        payer: Option<String>,
        /// Failure reason.
        reason: String,
    },
}

/// Channel for receiving gate events.
pub type GateEventsChannel = broadcast::Receiver<GateEvent>;

/// Sender for gate events.
pub type GateEventsSender = broadcast::Sender<GateEvent>;

/// Create a new event channel pair.
#[must_use]
pub fn create_event_channel() -> (GateEventsSender, GateEventsChannel) {
    broadcast::channel(256)
}

/// Send an event if a sender is attached. Having no subscribers is fine.
pub(crate) fn emit(sender: Option<&GateEventsSender>, event: GateEvent) {
    if let Some(tx) = sender {
        let _ = tx.send(event);
    }
}
