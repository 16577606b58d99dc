//! Checkout state persisted in the visitor session.

use lemu_core::{CardSummary, CheckoutEntry, CustomerId, Money, OrderId, PaymentMethod, PersonalInfo};
use serde::{Deserialize, Serialize};

use crate::commerce::PaymentRequest;
use crate::payments::PollState;

/// Where the visitor is in checkout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum CheckoutStep {
    /// Collecting contact and delivery details.
    #[default]
    Personal,
    /// Order created; choosing and submitting a payment method.
    Payment,
    /// STK push sent; waiting for the customer to approve it.
    AwaitingConfirmation,
    /// Payment accepted.
    Completed,
}

impl std::fmt::Display for CheckoutStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Personal => "personal",
            Self::Payment => "payment",
            Self::AwaitingConfirmation => "awaiting_confirmation",
            Self::Completed => "completed",
        };
        f.write_str(name)
    }
}

/// Why the last payment attempt did not complete.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PaymentOutcome {
    Failed { reason: String },
    TimedOut,
    Cancelled,
}

impl PaymentOutcome {
    /// Outcome for a terminal poll state other than success.
    #[must_use]
    pub fn from_poll(state: &PollState) -> Option<Self> {
        match state {
            PollState::Failed { reason, .. } => Some(Self::Failed {
                reason: reason.clone(),
            }),
            PollState::TimedOut { .. } => Some(Self::TimedOut),
            PollState::Cancelled => Some(Self::Cancelled),
            PollState::Polling { .. } | PollState::Complete { .. } => None,
        }
    }
}

/// One visitor's checkout, stored under a single session key while it is
/// in progress.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutSession {
    pub step: CheckoutStep,
    pub entry: CheckoutEntry,
    #[serde(default)]
    pub personal_info: Option<PersonalInfo>,
    #[serde(default)]
    pub payment_method: Option<PaymentMethod>,
    #[serde(default)]
    pub customer_id: Option<CustomerId>,
    #[serde(default)]
    pub order_id: Option<OrderId>,
    #[serde(default)]
    pub order_total: Option<Money>,
    /// Hosted payment page for the order.
    #[serde(default)]
    pub payment_url: Option<String>,
    /// The STK push being confirmed.
    #[serde(default)]
    pub payment: Option<PaymentRequest>,
    #[serde(default)]
    pub outcome: Option<PaymentOutcome>,
    #[serde(default)]
    pub card: Option<CardSummary>,
}

impl CheckoutSession {
    #[must_use]
    pub fn new(entry: CheckoutEntry) -> Self {
        Self {
            entry,
            ..Self::default()
        }
    }
}

/// Checkout together with the latest payment poll.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfirmationStatus {
    pub checkout: CheckoutSession,
    pub poll: PollState,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_session_round_trips_through_json() {
        let mut checkout = CheckoutSession::new(CheckoutEntry::BuyNow);
        checkout.step = CheckoutStep::Payment;
        checkout.order_id = Some(OrderId::new(42));
        checkout.outcome = Some(PaymentOutcome::TimedOut);

        let json = serde_json::to_value(&checkout).unwrap();
        assert_eq!(json["step"], "payment");
        assert_eq!(json["entry"], "buy_now");
        assert_eq!(json["outcome"]["kind"], "timed_out");

        let back: CheckoutSession = serde_json::from_value(json).unwrap();
        assert_eq!(back, checkout);
    }

    #[test]
    fn test_outcome_from_poll() {
        assert_eq!(
            PaymentOutcome::from_poll(&PollState::Failed {
                request_id: "r".to_string(),
                reason: "Insufficient funds".to_string()
            }),
            Some(PaymentOutcome::Failed {
                reason: "Insufficient funds".to_string()
            })
        );
        assert!(
            PaymentOutcome::from_poll(&PollState::Complete {
                amount: None,
                request_id: "r".to_string()
            })
            .is_none()
        );
    }
}
