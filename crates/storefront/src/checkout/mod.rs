//! Checkout Flow Controller.
//!
//! A checkout moves through `Personal → Payment → AwaitingConfirmation →
//! Completed` and can be abandoned from any step. Its state lives in the
//! visitor session under one key, so every step survives a page reload and
//! is discarded on completion or abandon.
//!
//! The order is built either from the whole cart or from a single staged
//! buy-now item, chosen when checkout begins.

mod flow;
mod state;

pub use flow::CheckoutFlow;
pub use state::{CheckoutSession, CheckoutStep, ConfirmationStatus, PaymentOutcome};

use lemu_core::{CartError, FieldErrors, PaymentMethod};

use crate::commerce::CommerceError;

/// Errors from checkout operations.
#[derive(Debug, thiserror::Error)]
pub enum CheckoutError {
    /// One or more form fields are invalid. Nothing was sent upstream.
    #[error("Validation failed: {0}")]
    Validation(FieldErrors),

    /// No checkout in progress for this visitor.
    #[error("No checkout in progress")]
    NotStarted,

    /// The operation does not apply to the current step.
    #[error("Checkout is at the {actual} step, expected {expected}")]
    InvalidStep {
        expected: state::CheckoutStep,
        actual: state::CheckoutStep,
    },

    /// The order source has no lines.
    #[error("Your cart is empty")]
    EmptyCart,

    /// Buy-now checkout without a staged item.
    #[error("No item selected for purchase")]
    MissingBuyNowItem,

    /// The requested quantity cannot be bought.
    #[error(transparent)]
    Quantity(#[from] CartError),

    /// Customer creation succeeded but returned no ID.
    #[error("Customer ID not returned from API")]
    MissingCustomerId,

    /// The commerce API rejected the order.
    #[error("Failed to create order")]
    OrderFailed(#[source] CommerceError),

    /// Payment submitted for a method other than the chosen one.
    #[error("Select {0:?} as the payment method first")]
    MethodNotChosen(PaymentMethod),

    /// Any other commerce API failure.
    #[error(transparent)]
    Commerce(#[from] CommerceError),

    /// The session could not be read or written.
    #[error("Session error: {0}")]
    Session(#[from] tower_sessions::session::Error),
}

impl From<FieldErrors> for CheckoutError {
    fn from(errors: FieldErrors) -> Self {
        Self::Validation(errors)
    }
}
