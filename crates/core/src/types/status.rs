//! Status enums for checkout and payments.

use serde::{Deserialize, Serialize};

/// Payment status as reported by the payments status endpoint.
///
/// The upstream API is not strict about casing or vocabulary, so parsing is
/// lenient: anything not recognised as terminal is treated as still pending.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE", from = "String")]
pub enum PaymentStatus {
    #[default]
    Pending,
    Complete,
    Failed,
}

impl PaymentStatus {
    /// Parse an upstream status string.
    #[must_use]
    pub fn parse(s: &str) -> Self {
        match s.trim().to_ascii_uppercase().as_str() {
            "COMPLETE" | "COMPLETED" | "SUCCESS" | "SUCCESSFUL" | "PAID" => Self::Complete,
            "FAILED" | "FAILURE" | "CANCELLED" | "CANCELED" | "REJECTED" | "EXPIRED" => {
                Self::Failed
            }
            _ => Self::Pending,
        }
    }

    /// Whether polling should stop on this status.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Complete | Self::Failed)
    }
}

impl From<String> for PaymentStatus {
    fn from(value: String) -> Self {
        Self::parse(&value)
    }
}

/// How the customer pays for an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentMethod {
    /// M-Pesa STK push to the customer's phone.
    Mpesa,
    /// Card details submitted directly.
    Card,
}

/// How the visitor entered checkout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum CheckoutEntry {
    /// Checking out the whole cart.
    #[default]
    Cart,
    /// Direct purchase of a single product from its page.
    BuyNow,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_payment_status_parse() {
        assert_eq!(PaymentStatus::parse("PENDING"), PaymentStatus::Pending);
        assert_eq!(PaymentStatus::parse("complete"), PaymentStatus::Complete);
        assert_eq!(PaymentStatus::parse("Completed"), PaymentStatus::Complete);
        assert_eq!(PaymentStatus::parse("FAILED"), PaymentStatus::Failed);
        assert_eq!(PaymentStatus::parse("cancelled"), PaymentStatus::Failed);
        assert_eq!(PaymentStatus::parse("PROCESSING"), PaymentStatus::Pending);
        assert_eq!(PaymentStatus::parse(""), PaymentStatus::Pending);
    }

    #[test]
    fn test_payment_status_terminal() {
        assert!(!PaymentStatus::Pending.is_terminal());
        assert!(PaymentStatus::Complete.is_terminal());
        assert!(PaymentStatus::Failed.is_terminal());
    }

    #[test]
    fn test_payment_status_deserialize_lenient() {
        let status: PaymentStatus = serde_json::from_str("\"SUCCESS\"").unwrap();
        assert_eq!(status, PaymentStatus::Complete);
        assert_eq!(
            serde_json::to_string(&PaymentStatus::Complete).unwrap(),
            "\"COMPLETE\""
        );
    }

    #[test]
    fn test_method_and_entry_serde() {
        assert_eq!(serde_json::to_string(&PaymentMethod::Mpesa).unwrap(), "\"mpesa\"");
        let entry: CheckoutEntry = serde_json::from_str("\"buy_now\"").unwrap();
        assert_eq!(entry, CheckoutEntry::BuyNow);
    }
}
