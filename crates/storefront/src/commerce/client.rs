//! HTTP implementation of the commerce API.
//!
//! Caches store details (per subdomain) and single products (per ID) using
//! `moka` with a 5-minute TTL. Listings and anything that mutates are never
//! cached.

use std::sync::Arc;
use std::time::Duration;

use lemu_core::{ProductId, StoreId};
use moka::future::Cache;
use reqwest::header::{CONTENT_TYPE, HeaderMap, HeaderValue};
use reqwest::{RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use tracing::{debug, instrument};

use crate::config::CommerceConfig;

use super::{
    CommerceApi, CommerceError, CreateCustomerRequest, CreateCustomerResponse,
    CreateOrderRequest, CreateOrderResponse, PaymentRequest, PaymentStatusRequest,
    PaymentStatusResponse, PaymentStatusSource, Product, ProductPage, ProductQuery,
    StkPushRequest, StoreConfig,
};

/// Header identifying the platform tenant on every request.
pub const TENANT_HEADER: &str = "Lemu-Platform-TenantId";

const CACHE_TTL: Duration = Duration::from_secs(300);

/// Longest upstream body excerpt kept in errors and logs.
const BODY_EXCERPT_LEN: usize = 500;

/// Cache key for store details and products.
#[derive(Debug, Clone, Hash, PartialEq, Eq)]
enum CacheKey {
    Store(String),
    Product(ProductId),
}

/// Cached value types.
#[derive(Debug, Clone)]
enum CacheValue {
    Store(Box<StoreConfig>),
    Product(Box<Product>),
}

// =============================================================================
// CommerceClient
// =============================================================================

/// Client for the Lemu commerce and payments API.
#[derive(Clone)]
pub struct CommerceClient {
    inner: Arc<CommerceClientInner>,
}

struct CommerceClientInner {
    client: reqwest::Client,
    base_url: String,
    cache: Cache<CacheKey, CacheValue>,
}

impl CommerceClient {
    /// Create a new commerce API client.
    ///
    /// # Errors
    ///
    /// Returns [`CommerceError::Config`] if the tenant ID is not a valid
    /// header value, or [`CommerceError::Http`] if the HTTP client cannot be
    /// built.
    pub fn new(config: &CommerceConfig) -> Result<Self, CommerceError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            TENANT_HEADER,
            HeaderValue::from_str(&config.tenant_id)
                .map_err(|e| CommerceError::Config(format!("tenant id: {e}")))?,
        );
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(config.request_timeout)
            .build()?;

        let cache = Cache::builder()
            .max_capacity(1000)
            .time_to_live(CACHE_TTL)
            .build();

        Ok(Self {
            inner: Arc::new(CommerceClientInner {
                client,
                base_url: config.api_base_url.as_str().trim_end_matches('/').to_string(),
                cache,
            }),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.inner.base_url, path.trim_start_matches('/'))
    }

    /// Send a request and decode the JSON body.
    ///
    /// HTTP 402 maps to [`CommerceError::QuotaExceeded`]; any other
    /// non-success status to [`CommerceError::Api`].
    async fn execute<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T, CommerceError> {
        let response = request.send().await?;
        let status = response.status();

        if status == StatusCode::PAYMENT_REQUIRED {
            tracing::warn!("Commerce API quota exceeded");
            return Err(CommerceError::QuotaExceeded);
        }

        // Get response body as text first for better error diagnostics
        let response_text = response.text().await?;

        if !status.is_success() {
            let body: String = response_text.chars().take(BODY_EXCERPT_LEN).collect();
            tracing::error!(
                status = %status,
                body = %body,
                "Commerce API returned non-success status"
            );
            return Err(CommerceError::Api {
                status: status.as_u16(),
                body,
            });
        }

        serde_json::from_str(&response_text).map_err(|e| {
            tracing::error!(
                error = %e,
                body = %response_text.chars().take(BODY_EXCERPT_LEN).collect::<String>(),
                "Failed to parse commerce API response"
            );
            CommerceError::Parse(e)
        })
    }
}

impl CommerceApi for CommerceClient {
    #[instrument(skip(self), fields(subdomain = %subdomain))]
    async fn store_details(&self, subdomain: &str) -> Result<StoreConfig, CommerceError> {
        let cache_key = CacheKey::Store(subdomain.to_string());

        if let Some(CacheValue::Store(store)) = self.inner.cache.get(&cache_key).await {
            debug!("Cache hit for store details");
            return Ok(*store);
        }

        let request = self
            .inner
            .client
            .get(self.url(&format!("sub-domain/store/details/{subdomain}")));
        let store: StoreConfig = self.execute(request).await?;

        self.inner
            .cache
            .insert(cache_key, CacheValue::Store(Box::new(store.clone())))
            .await;

        Ok(store)
    }

    #[instrument(skip(self, query), fields(store_id = %store_id, page = query.page))]
    async fn store_products(
        &self,
        store_id: StoreId,
        query: &ProductQuery,
        page_size: u32,
    ) -> Result<ProductPage, CommerceError> {
        let mut params: Vec<(&str, String)> = vec![("filter", query.search.trim().to_string())];
        params.extend(query.categories.iter().map(|c| ("category", c.to_string())));
        params.push(("page", query.page.to_string()));
        params.push(("size", page_size.to_string()));

        let request = self
            .inner
            .client
            .get(self.url(&format!("shop/product/store/{store_id}")))
            .query(&params);

        self.execute(request).await
    }

    #[instrument(skip(self), fields(product_id = %id))]
    async fn product(&self, id: ProductId) -> Result<Product, CommerceError> {
        let cache_key = CacheKey::Product(id);

        if let Some(CacheValue::Product(product)) = self.inner.cache.get(&cache_key).await {
            debug!("Cache hit for product");
            return Ok(*product);
        }

        let request = self
            .inner
            .client
            .get(self.url(&format!("shop/product/view/{id}")));
        let product: Product = match self.execute(request).await {
            Err(CommerceError::Api { status: 404, .. }) => {
                return Err(CommerceError::NotFound(format!("product {id}")));
            }
            other => other?,
        };

        self.inner
            .cache
            .insert(cache_key, CacheValue::Product(Box::new(product.clone())))
            .await;

        Ok(product)
    }

    #[instrument(skip(self, request))]
    async fn create_customer(
        &self,
        request: &CreateCustomerRequest,
    ) -> Result<CreateCustomerResponse, CommerceError> {
        let builder = self
            .inner
            .client
            .post(self.url("customers/create"))
            .json(request);
        self.execute(builder).await
    }

    #[instrument(skip(self, request), fields(customer_id = %request.customer_id, lines = request.cart.len()))]
    async fn create_order(
        &self,
        request: &CreateOrderRequest,
    ) -> Result<CreateOrderResponse, CommerceError> {
        let builder = self
            .inner
            .client
            .post(self.url("shop/order/create"))
            .json(request);
        self.execute(builder).await
    }

    #[instrument(skip(self, request), fields(order_id = %request.order_id))]
    async fn stk_push(&self, request: &StkPushRequest) -> Result<PaymentRequest, CommerceError> {
        let builder = self
            .inner
            .client
            .post(self.url("payments/process"))
            .json(request);
        self.execute(builder).await
    }
}

impl PaymentStatusSource for CommerceClient {
    #[instrument(skip(self, request), fields(request_id = %request.request_id))]
    async fn payment_status(
        &self,
        request: &PaymentStatusRequest,
    ) -> Result<PaymentStatusResponse, CommerceError> {
        let builder = self
            .inner
            .client
            .post(self.url("payments/status"))
            .json(request);
        self.execute(builder).await
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_url_joins_without_double_slash() {
        let client = CommerceClient::new(&CommerceConfig::default()).unwrap();
        assert_eq!(
            client.url("/customers/create"),
            "https://paymentsapi.lemuapps.com/lemu/api/v1/customers/create"
        );
        assert_eq!(
            client.url("sub-domain/store/details/nexor"),
            "https://paymentsapi.lemuapps.com/lemu/api/v1/sub-domain/store/details/nexor"
        );
    }

    #[test]
    fn test_invalid_tenant_header_is_config_error() {
        let config = CommerceConfig {
            tenant_id: "bad\nvalue".to_string(),
            ..CommerceConfig::default()
        };
        assert!(matches!(
            CommerceClient::new(&config),
            Err(CommerceError::Config(_))
        ));
    }
}
