//! In-process commerce API double for unit tests.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use lemu_core::{CustomerId, OrderId, PaymentStatus, ProductId, StoreId};

use super::{
    CommerceApi, CommerceError, CreateCustomerRequest, CreateCustomerResponse,
    CreateOrderRequest, CreateOrderResponse, PaymentRequest, PaymentStatusRequest,
    PaymentStatusResponse, PaymentStatusSource, Product, ProductPage, ProductQuery,
    StkPushRequest, StoreConfig,
};

/// Scripted reply to a payment status query.
#[derive(Debug, Clone, Copy)]
pub enum FakeStatus {
    Status(PaymentStatus),
    Error,
}

/// Configurable fake. Every clone shares the same script and call log.
#[derive(Clone, Default)]
pub struct FakeCommerce {
    inner: Arc<FakeInner>,
}

#[derive(Default)]
struct FakeInner {
    store: Mutex<Option<StoreConfig>>,
    products: Mutex<Vec<Product>>,
    products_delay: Mutex<Duration>,
    customer_id: Mutex<Option<CustomerId>>,
    order_id: Mutex<Option<OrderId>>,
    statuses: Mutex<VecDeque<FakeStatus>>,
    quota_exceeded: AtomicBool,
    product_queries: Mutex<Vec<ProductQuery>>,
    orders: Mutex<Vec<CreateOrderRequest>>,
    stk_pushes: Mutex<Vec<StkPushRequest>>,
    store_calls: AtomicUsize,
    customer_calls: AtomicUsize,
    status_calls: AtomicUsize,
}

#[allow(clippy::unwrap_used)]
impl FakeCommerce {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_store(self, store: StoreConfig) -> Self {
        *self.inner.store.lock().unwrap() = Some(store);
        self
    }

    pub fn with_products(self, products: Vec<Product>) -> Self {
        *self.inner.products.lock().unwrap() = products;
        self
    }

    pub fn with_products_delay(self, delay: Duration) -> Self {
        *self.inner.products_delay.lock().unwrap() = delay;
        self
    }

    pub fn with_customer_id(self, id: Option<CustomerId>) -> Self {
        *self.inner.customer_id.lock().unwrap() = id;
        self
    }

    pub fn with_order_id(self, id: Option<OrderId>) -> Self {
        *self.inner.order_id.lock().unwrap() = id;
        self
    }

    pub fn with_statuses(self, statuses: impl IntoIterator<Item = FakeStatus>) -> Self {
        self.inner.statuses.lock().unwrap().extend(statuses);
        self
    }

    pub fn set_quota_exceeded(&self, exceeded: bool) {
        self.inner.quota_exceeded.store(exceeded, Ordering::SeqCst);
    }

    pub fn product_queries(&self) -> Vec<ProductQuery> {
        self.inner.product_queries.lock().unwrap().clone()
    }

    pub fn orders(&self) -> Vec<CreateOrderRequest> {
        self.inner.orders.lock().unwrap().clone()
    }

    pub fn stk_pushes(&self) -> Vec<StkPushRequest> {
        self.inner.stk_pushes.lock().unwrap().clone()
    }

    pub fn store_calls(&self) -> usize {
        self.inner.store_calls.load(Ordering::SeqCst)
    }

    pub fn customer_calls(&self) -> usize {
        self.inner.customer_calls.load(Ordering::SeqCst)
    }

    pub fn status_calls(&self) -> usize {
        self.inner.status_calls.load(Ordering::SeqCst)
    }

    fn check_quota(&self) -> Result<(), CommerceError> {
        if self.inner.quota_exceeded.load(Ordering::SeqCst) {
            Err(CommerceError::QuotaExceeded)
        } else {
            Ok(())
        }
    }
}

#[allow(clippy::unwrap_used)]
impl CommerceApi for FakeCommerce {
    async fn store_details(&self, subdomain: &str) -> Result<StoreConfig, CommerceError> {
        self.inner.store_calls.fetch_add(1, Ordering::SeqCst);
        self.check_quota()?;
        self.inner
            .store
            .lock()
            .unwrap()
            .clone()
            .ok_or_else(|| CommerceError::Api {
                status: 404,
                body: format!("no store for {subdomain}"),
            })
    }

    async fn store_products(
        &self,
        _store_id: StoreId,
        query: &ProductQuery,
        page_size: u32,
    ) -> Result<ProductPage, CommerceError> {
        self.inner.product_queries.lock().unwrap().push(query.clone());
        let delay = *self.inner.products_delay.lock().unwrap();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        self.check_quota()?;

        let needle = query.search.trim().to_lowercase();
        let matching: Vec<Product> = self
            .inner
            .products
            .lock()
            .unwrap()
            .iter()
            .filter(|p| needle.is_empty() || p.name.to_lowercase().contains(&needle))
            .cloned()
            .collect();

        let size = page_size.max(1) as usize;
        let total = matching.len();
        let total_pages = u32::try_from(total.div_ceil(size)).unwrap();
        let content = matching
            .into_iter()
            .skip(query.page as usize * size)
            .take(size)
            .collect();

        Ok(ProductPage {
            content,
            total_pages,
            total_elements: total as u64,
            number: query.page,
            size: page_size,
            first: query.page == 0,
            last: query.page + 1 >= total_pages,
        })
    }

    async fn product(&self, id: ProductId) -> Result<Product, CommerceError> {
        self.check_quota()?;
        self.inner
            .products
            .lock()
            .unwrap()
            .iter()
            .find(|p| p.id == id)
            .cloned()
            .ok_or_else(|| CommerceError::NotFound(format!("product {id}")))
    }

    async fn create_customer(
        &self,
        _request: &CreateCustomerRequest,
    ) -> Result<CreateCustomerResponse, CommerceError> {
        self.inner.customer_calls.fetch_add(1, Ordering::SeqCst);
        self.check_quota()?;
        Ok(CreateCustomerResponse {
            id: *self.inner.customer_id.lock().unwrap(),
        })
    }

    async fn create_order(
        &self,
        request: &CreateOrderRequest,
    ) -> Result<CreateOrderResponse, CommerceError> {
        self.check_quota()?;
        self.inner.orders.lock().unwrap().push(request.clone());
        let order_id = *self.inner.order_id.lock().unwrap();
        order_id
            .map(|order_id| CreateOrderResponse {
                order_id,
                amount: None,
            })
            .ok_or_else(|| CommerceError::Api {
                status: 500,
                body: "order rejected".to_string(),
            })
    }

    async fn stk_push(&self, request: &StkPushRequest) -> Result<PaymentRequest, CommerceError> {
        self.check_quota()?;
        self.inner.stk_pushes.lock().unwrap().push(request.clone());
        Ok(PaymentRequest {
            request_id: format!("req-{}", request.order_id),
            transaction_id: format!("txn-{}", request.order_id),
        })
    }
}

#[allow(clippy::unwrap_used)]
impl PaymentStatusSource for FakeCommerce {
    async fn payment_status(
        &self,
        _request: &PaymentStatusRequest,
    ) -> Result<PaymentStatusResponse, CommerceError> {
        self.inner.status_calls.fetch_add(1, Ordering::SeqCst);
        let next = self.inner.statuses.lock().unwrap().pop_front();
        match next {
            Some(FakeStatus::Error) => Err(CommerceError::Api {
                status: 503,
                body: "unavailable".to_string(),
            }),
            Some(FakeStatus::Status(status)) => Ok(PaymentStatusResponse {
                status,
                amount: None,
                message: None,
            }),
            None => Ok(PaymentStatusResponse {
                status: PaymentStatus::Pending,
                amount: None,
                message: None,
            }),
        }
    }
}
