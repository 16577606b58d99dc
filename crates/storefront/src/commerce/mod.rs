//! Lemu commerce and payments API client.
//!
//! # Architecture
//!
//! - Plain JSON over HTTPS with `reqwest`; every request carries the
//!   `Lemu-Platform-TenantId` header
//! - The remote API is the source of truth for stores, products, customers,
//!   orders and payments; nothing is persisted locally
//! - In-memory caching via `moka` for store details and single products
//!   (5 minute TTL)
//!
//! Services depend on the [`CommerceApi`] and [`PaymentStatusSource`] traits
//! rather than on [`CommerceClient`] directly, so flows can be exercised
//! against in-process fakes.
//!
//! # Example
//!
//! ```rust,ignore
//! use lemu_storefront::commerce::{CommerceApi, CommerceClient};
//!
//! let client = CommerceClient::new(&config.commerce)?;
//! let store = client.store_details("nexor").await?;
//! let page = client.store_products(store.store_id, &ProductQuery::default(), 12).await?;
//! ```

mod client;
pub mod types;

#[cfg(test)]
pub mod fake;

use std::future::Future;

pub use client::CommerceClient;
pub use types::*;

use lemu_core::{ProductId, StoreId};
use thiserror::Error;

/// Message returned by the API on HTTP 402, surfaced to users verbatim.
pub const QUOTA_EXCEEDED_MESSAGE: &str = "API quota exceeded. Please try again later.";

/// Errors that can occur when calling the commerce API.
#[derive(Debug, Error)]
pub enum CommerceError {
    /// HTTP request failed (connection, timeout, TLS).
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The platform quota for this tenant is exhausted (HTTP 402).
    #[error("API quota exceeded. Please try again later.")]
    QuotaExceeded,

    /// Any other non-success status.
    #[error("API error: {status} {body}")]
    Api { status: u16, body: String },

    /// JSON parsing failed.
    #[error("JSON parse error: {0}")]
    Parse(#[from] serde_json::Error),

    /// Resource not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// The client could not be built from configuration.
    #[error("Invalid client configuration: {0}")]
    Config(String),
}

impl CommerceError {
    /// Text safe to show a shopper: the quota message verbatim, the status
    /// of an API rejection, otherwise `fallback`.
    #[must_use]
    pub fn user_message(&self, fallback: &str) -> String {
        match self {
            Self::QuotaExceeded => QUOTA_EXCEEDED_MESSAGE.to_string(),
            Self::Api { status, .. } => format!("API error: {status}"),
            _ => fallback.to_string(),
        }
    }
}

/// Catalog, customer and order operations.
pub trait CommerceApi: Send + Sync {
    /// `GET /sub-domain/store/details/{subdomain}`
    fn store_details(
        &self,
        subdomain: &str,
    ) -> impl Future<Output = Result<StoreConfig, CommerceError>> + Send;

    /// `GET /shop/product/store/{storeId}` with filter, categories and paging.
    fn store_products(
        &self,
        store_id: StoreId,
        query: &ProductQuery,
        page_size: u32,
    ) -> impl Future<Output = Result<ProductPage, CommerceError>> + Send;

    /// `GET /shop/product/view/{id}`
    fn product(&self, id: ProductId) -> impl Future<Output = Result<Product, CommerceError>> + Send;

    /// `POST /customers/create`
    fn create_customer(
        &self,
        request: &CreateCustomerRequest,
    ) -> impl Future<Output = Result<CreateCustomerResponse, CommerceError>> + Send;

    /// `POST /shop/order/create`
    fn create_order(
        &self,
        request: &CreateOrderRequest,
    ) -> impl Future<Output = Result<CreateOrderResponse, CommerceError>> + Send;

    /// `POST /payments/process` (M-Pesa STK push)
    fn stk_push(
        &self,
        request: &StkPushRequest,
    ) -> impl Future<Output = Result<PaymentRequest, CommerceError>> + Send;
}

/// Payment status queries, split out so the poller can own a cheap handle.
pub trait PaymentStatusSource: Send + Sync + 'static {
    /// `POST /payments/status`
    fn payment_status(
        &self,
        request: &PaymentStatusRequest,
    ) -> impl Future<Output = Result<PaymentStatusResponse, CommerceError>> + Send;
}
