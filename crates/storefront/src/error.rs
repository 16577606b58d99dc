//! Unified error handling with Sentry integration.
//!
//! Provides a unified `AppError` type that captures errors to Sentry before
//! responding to the client. All route handlers should return `Result<T, AppError>`.
//!
//! Error bodies are JSON: `{"error": "..."}`, or `{"errors": {field: message}}`
//! for validation failures.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use lemu_core::{CartError, FieldErrors};
use serde_json::json;
use thiserror::Error;

use crate::checkout::CheckoutError;
use crate::commerce::{CommerceError, QUOTA_EXCEEDED_MESSAGE};
use crate::services::CartStoreError;

/// Application-level error type for the storefront.
#[derive(Debug, Error)]
pub enum AppError {
    /// Commerce API operation failed.
    #[error("Commerce error: {0}")]
    Commerce(#[from] CommerceError),

    /// Checkout operation failed.
    #[error("Checkout error: {0}")]
    Checkout(#[from] CheckoutError),

    /// Cart rule violated.
    #[error("Cart error: {0}")]
    Cart(#[from] CartError),

    /// Form fields invalid.
    #[error("Validation failed: {0}")]
    Validation(FieldErrors),

    /// Session store failed.
    #[error("Session error: {0}")]
    Session(#[from] tower_sessions::session::Error),

    /// Resource not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Bad request from client.
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Store configuration could not be resolved for this tenant.
    #[error("Store unavailable: {0}")]
    StoreUnavailable(String),

    /// Internal server error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<FieldErrors> for AppError {
    fn from(errors: FieldErrors) -> Self {
        Self::Validation(errors)
    }
}

impl From<CartStoreError> for AppError {
    fn from(err: CartStoreError) -> Self {
        match err {
            CartStoreError::Cart(e) => Self::Cart(e),
            CartStoreError::Session(e) => Self::Session(e),
        }
    }
}

fn commerce_status(err: &CommerceError) -> StatusCode {
    match err {
        CommerceError::QuotaExceeded => StatusCode::SERVICE_UNAVAILABLE,
        CommerceError::NotFound(_) => StatusCode::NOT_FOUND,
        CommerceError::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
        CommerceError::Http(_) | CommerceError::Api { .. } | CommerceError::Parse(_) => {
            StatusCode::BAD_GATEWAY
        }
    }
}

fn commerce_message(err: &CommerceError) -> String {
    match err {
        CommerceError::QuotaExceeded => QUOTA_EXCEEDED_MESSAGE.to_string(),
        CommerceError::NotFound(what) => format!("Not found: {what}"),
        CommerceError::Config(_) => "Internal server error".to_string(),
        _ => "External service error".to_string(),
    }
}

impl AppError {
    /// HTTP status for this error.
    #[must_use]
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Session(_) | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Commerce(err) => commerce_status(err),
            Self::Checkout(err) => match err {
                CheckoutError::Validation(_)
                | CheckoutError::EmptyCart
                | CheckoutError::MissingBuyNowItem
                | CheckoutError::Quantity(_)
                | CheckoutError::MissingCustomerId => StatusCode::UNPROCESSABLE_ENTITY,
                CheckoutError::NotStarted
                | CheckoutError::InvalidStep { .. }
                | CheckoutError::MethodNotChosen(_) => StatusCode::CONFLICT,
                CheckoutError::OrderFailed(e) | CheckoutError::Commerce(e) => commerce_status(e),
                CheckoutError::Session(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
            Self::Cart(_) | Self::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::StoreUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        }
    }

    /// Client-facing message. Internal details are never exposed.
    #[must_use]
    pub fn message(&self) -> String {
        match self {
            Self::Session(_) | Self::Internal(_) => "Internal server error".to_string(),
            Self::Commerce(err) => commerce_message(err),
            Self::Checkout(err) => match err {
                CheckoutError::OrderFailed(CommerceError::QuotaExceeded) => {
                    QUOTA_EXCEEDED_MESSAGE.to_string()
                }
                CheckoutError::Commerce(e) => commerce_message(e),
                CheckoutError::Session(_) => "Internal server error".to_string(),
                other => other.to_string(),
            },
            Self::Cart(err) => err.to_string(),
            Self::Validation(errors) => errors.to_string(),
            Self::NotFound(what) => format!("Not found: {what}"),
            Self::BadRequest(msg) | Self::StoreUnavailable(msg) => msg.clone(),
        }
    }

    const fn field_errors(&self) -> Option<&FieldErrors> {
        match self {
            Self::Validation(errors) | Self::Checkout(CheckoutError::Validation(errors)) => {
                Some(errors)
            }
            _ => None,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();

        // Capture server errors to Sentry
        if status.is_server_error() && !matches!(status, StatusCode::SERVICE_UNAVAILABLE) {
            let event_id = sentry::capture_error(&self);
            tracing::error!(
                error = %self,
                sentry_event_id = %event_id,
                "Request error"
            );
        } else if status.is_server_error() {
            tracing::warn!(error = %self, "Service unavailable");
        }

        let body = match self.field_errors() {
            Some(errors) => json!({ "errors": errors }),
            None => json!({ "error": self.message() }),
        };

        (status, Json(body)).into_response()
    }
}

/// Result type alias for `AppError`.
pub type Result<T> = std::result::Result<T, AppError>;

/// Add a breadcrumb for visitor actions.
///
/// Breadcrumbs appear in Sentry error reports to show the trail of actions
/// leading up to an error.
pub fn add_breadcrumb(category: &str, message: &str, data: Option<&[(&str, &str)]>) {
    let mut breadcrumb = sentry::Breadcrumb {
        category: Some(category.to_string()),
        message: Some(message.to_string()),
        level: sentry::Level::Info,
        ..Default::default()
    };

    if let Some(pairs) = data {
        for (key, value) in pairs {
            breadcrumb.data.insert(
                (*key).to_string(),
                serde_json::Value::String((*value).to_string()),
            );
        }
    }

    sentry::add_breadcrumb(breadcrumb);
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use lemu_core::ProductId;

    use super::*;
    use crate::checkout::CheckoutStep;

    fn get_status(err: AppError) -> StatusCode {
        err.into_response().status()
    }

    async fn body_json(err: AppError) -> serde_json::Value {
        let response = err.into_response();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[test]
    fn test_app_error_display() {
        let err = AppError::NotFound("product 123".to_string());
        assert_eq!(err.to_string(), "Not found: product 123");

        let err = AppError::BadRequest("invalid input".to_string());
        assert_eq!(err.to_string(), "Bad request: invalid input");
    }

    #[test]
    fn test_app_error_status_codes() {
        assert_eq!(get_status(AppError::NotFound("x".to_string())), StatusCode::NOT_FOUND);
        assert_eq!(get_status(AppError::BadRequest("x".to_string())), StatusCode::BAD_REQUEST);
        assert_eq!(
            get_status(AppError::Commerce(CommerceError::QuotaExceeded)),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(
            get_status(AppError::Commerce(CommerceError::Api {
                status: 500,
                body: String::new()
            })),
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(
            get_status(AppError::Checkout(CheckoutError::InvalidStep {
                expected: CheckoutStep::Payment,
                actual: CheckoutStep::Personal
            })),
            StatusCode::CONFLICT
        );
        assert_eq!(
            get_status(AppError::Checkout(CheckoutError::MissingCustomerId)),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(
            get_status(AppError::Cart(CartError::OutOfStock(ProductId::new(1)))),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(
            get_status(AppError::Internal("x".to_string())),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[tokio::test]
    async fn test_validation_body_lists_fields() {
        let errors = FieldErrors::single("email", "Invalid email format");
        let body = body_json(AppError::Checkout(CheckoutError::Validation(errors))).await;
        assert_eq!(body, json!({"errors": {"email": "Invalid email format"}}));
    }

    #[tokio::test]
    async fn test_internal_details_hidden() {
        let body = body_json(AppError::Internal("pool exhausted".to_string())).await;
        assert_eq!(body, json!({"error": "Internal server error"}));

        let body = body_json(AppError::Commerce(CommerceError::Api {
            status: 500,
            body: "stack trace".to_string(),
        }))
        .await;
        assert_eq!(body, json!({"error": "External service error"}));

        let body = body_json(AppError::Commerce(CommerceError::QuotaExceeded)).await;
        assert_eq!(body, json!({"error": "API quota exceeded. Please try again later."}));
    }
}
