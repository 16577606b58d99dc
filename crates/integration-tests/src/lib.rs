//! End-to-end test harness for the Lemu storefront.
//!
//! Each [`TestContext`] starts two servers on ephemeral ports: a mock of the
//! Lemu commerce API and the storefront itself, pointed at the mock. The
//! storefront uses an in-memory session store and a lazy database pool, so
//! no `PostgreSQL` is needed.
//!
//! # Running Tests
//!
//! ```bash
//! cargo test -p lemu-integration-tests
//! ```
//!
//! # Mock catalog
//!
//! | Store subdomain | Behaviour                          |
//! |-----------------|------------------------------------|
//! | `nexor`         | Store 7 with two categories        |
//! | `broke`         | HTTP 402 (quota exceeded)          |
//!
//! Products: 11 "Canvas Tote" (1000, stock 4, colours Red/Blue) and
//! 12 "Sold Out Cap" (500, stock 0).

#![allow(clippy::missing_panics_doc, clippy::expect_used)]

use std::net::{IpAddr, SocketAddr};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use lemu_storefront::config::{CatalogConfig, CommerceConfig, PaymentPollConfig, StorefrontConfig};
use lemu_storefront::routes;
use lemu_storefront::state::AppState;
use secrecy::SecretString;
use serde_json::{Value, json};
use sqlx::postgres::PgPoolOptions;
use tokio::net::TcpListener;
use tower_sessions::MemoryStore;
use url::Url;

/// Host header value that routes requests to the `broke` tenant.
pub const BROKE_HOST: &str = "broke.lemu.shop";

// =============================================================================
// Mock commerce API
// =============================================================================

/// Recorded traffic and scripted answers of the mock commerce API.
#[derive(Clone, Default)]
pub struct MockCommerce {
    inner: Arc<MockInner>,
}

#[derive(Default)]
struct MockInner {
    listing_calls: AtomicUsize,
    listing_filters: Mutex<Vec<String>>,
    customers: Mutex<Vec<Value>>,
    orders: Mutex<Vec<Value>>,
    stk_pushes: Mutex<Vec<Value>>,
    status_calls: AtomicUsize,
    payment_script: Mutex<PaymentScript>,
}

/// How `/payments/status` answers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaymentScript {
    /// `PENDING` for the first `n - 1` queries, then `COMPLETED`.
    CompleteAfter(usize),
    /// `PENDING` for the first `n - 1` queries, then `FAILED`.
    FailAfter(usize),
    /// Always `PENDING`.
    NeverSettles,
}

impl Default for PaymentScript {
    fn default() -> Self {
        Self::CompleteAfter(2)
    }
}

impl MockCommerce {
    /// Change how payment status queries answer from now on.
    pub fn script_payments(&self, script: PaymentScript) {
        *self.inner.payment_script.lock().expect("mock lock") = script;
    }

    #[must_use]
    pub fn listing_calls(&self) -> usize {
        self.inner.listing_calls.load(Ordering::SeqCst)
    }

    #[must_use]
    pub fn listing_filters(&self) -> Vec<String> {
        self.inner.listing_filters.lock().expect("mock lock").clone()
    }

    #[must_use]
    pub fn customers(&self) -> Vec<Value> {
        self.inner.customers.lock().expect("mock lock").clone()
    }

    #[must_use]
    pub fn orders(&self) -> Vec<Value> {
        self.inner.orders.lock().expect("mock lock").clone()
    }

    #[must_use]
    pub fn stk_pushes(&self) -> Vec<Value> {
        self.inner.stk_pushes.lock().expect("mock lock").clone()
    }

    #[must_use]
    pub fn status_calls(&self) -> usize {
        self.inner.status_calls.load(Ordering::SeqCst)
    }

    fn router(&self) -> Router {
        let api = Router::new()
            .route("/sub-domain/store/details/{subdomain}", get(mock_store))
            .route("/shop/product/store/{store_id}", get(mock_listing))
            .route("/shop/product/view/{id}", get(mock_product))
            .route("/customers/create", post(mock_customer))
            .route("/shop/order/create", post(mock_order))
            .route("/payments/process", post(mock_stk_push))
            .route("/payments/status", post(mock_payment_status))
            .with_state(self.clone());

        Router::new().nest("/lemu/api/v1", api)
    }
}

fn store_json() -> Value {
    json!({
        "storeId": 7,
        "merchantId": 3,
        "storeName": "Nexor",
        "description": "Everyday carry",
        "currencySymbol": "KSh",
        "customColor": "#ff6600",
        "categories": [
            {"id": 1, "name": "Bags"},
            {"id": 2, "categoryName": "Hats"}
        ]
    })
}

fn products_json() -> Vec<Value> {
    vec![
        json!({
            "id": 11,
            "name": "Canvas Tote",
            "images": ["https://img.lemu.test/tote.jpg"],
            "salePrice": 1000,
            "originalPrice": 1200,
            "currentStock": 4,
            "category": "Bags",
            "options": {"colour": ["Red", "Blue"], "size": []}
        }),
        json!({
            "id": 12,
            "name": "Sold Out Cap",
            "salePrice": 500,
            "currentStock": 0,
            "category": "Hats",
            "options": null
        }),
    ]
}

async fn mock_store(Path(subdomain): Path<String>) -> Response {
    match subdomain.as_str() {
        "nexor" => Json(store_json()).into_response(),
        "broke" => (StatusCode::PAYMENT_REQUIRED, "quota exhausted").into_response(),
        _ => (StatusCode::NOT_FOUND, "no such store").into_response(),
    }
}

async fn mock_listing(
    State(mock): State<MockCommerce>,
    Path(_store_id): Path<i64>,
    Query(params): Query<Vec<(String, String)>>,
) -> Json<Value> {
    mock.inner.listing_calls.fetch_add(1, Ordering::SeqCst);

    let filter = params
        .iter()
        .find(|(k, _)| k == "filter")
        .map(|(_, v)| v.to_lowercase())
        .unwrap_or_default();
    let page: u32 = params
        .iter()
        .find(|(k, _)| k == "page")
        .and_then(|(_, v)| v.parse().ok())
        .unwrap_or_default();
    mock.inner
        .listing_filters
        .lock()
        .expect("mock lock")
        .push(filter.clone());

    let content: Vec<Value> = products_json()
        .into_iter()
        .filter(|p| {
            p["name"]
                .as_str()
                .is_some_and(|name| name.to_lowercase().contains(&filter))
        })
        .collect();
    let total = content.len();

    Json(json!({
        "content": content,
        "totalPages": 1,
        "totalElements": total,
        "number": page,
        "size": 12,
        "first": page == 0,
        "last": true
    }))
}

async fn mock_product(Path(id): Path<i64>) -> Response {
    products_json()
        .into_iter()
        .find(|p| p["id"] == id)
        .map_or_else(
            || (StatusCode::NOT_FOUND, "no such product").into_response(),
            |p| Json(p).into_response(),
        )
}

async fn mock_customer(State(mock): State<MockCommerce>, Json(body): Json<Value>) -> Json<Value> {
    let mut customers = mock.inner.customers.lock().expect("mock lock");
    customers.push(body);
    Json(json!({"id": 500 + customers.len()}))
}

async fn mock_order(State(mock): State<MockCommerce>, Json(body): Json<Value>) -> Json<Value> {
    let amount: f64 = body["cart"]
        .as_array()
        .map(|lines| {
            lines
                .iter()
                .map(|l| l["price"].as_f64().unwrap_or_default() * l["quantity"].as_f64().unwrap_or_default())
                .sum()
        })
        .unwrap_or_default();
    let mut orders = mock.inner.orders.lock().expect("mock lock");
    orders.push(body);
    Json(json!({"orderId": 900 + orders.len(), "amount": amount}))
}

async fn mock_stk_push(State(mock): State<MockCommerce>, Json(body): Json<Value>) -> Json<Value> {
    let mut pushes = mock.inner.stk_pushes.lock().expect("mock lock");
    pushes.push(body);
    let n = pushes.len();
    Json(json!({"requestId": format!("req-{n}"), "transactionId": format!("tx-{n}")}))
}

async fn mock_payment_status(State(mock): State<MockCommerce>) -> Json<Value> {
    let calls = mock.inner.status_calls.fetch_add(1, Ordering::SeqCst) + 1;
    let script = *mock.inner.payment_script.lock().expect("mock lock");
    let status = match script {
        PaymentScript::CompleteAfter(n) if calls >= n => "COMPLETED",
        PaymentScript::FailAfter(n) if calls >= n => "FAILED",
        _ => "PENDING",
    };
    Json(json!({"status": status, "amount": 2000, "resultDesc": "Request cancelled by user"}))
}

// =============================================================================
// TestContext
// =============================================================================

/// A running storefront wired to a mock commerce API.
pub struct TestContext {
    pub client: reqwest::Client,
    pub base_url: String,
    pub mock: MockCommerce,
    pub state: AppState,
}

/// Status and decoded body of a storefront response. An empty body decodes
/// as `null`.
#[derive(Debug)]
pub struct Reply {
    pub status: StatusCode,
    pub body: Value,
}

async fn spawn(router: Router) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind test listener");
    let addr = listener.local_addr().expect("Listener has no address");
    tokio::spawn(async move {
        axum::serve(listener, router).await.expect("Test server failed");
    });
    addr
}

/// Configuration with a fast payment poll and short debounce.
#[must_use]
pub fn test_config(api_base_url: Url) -> StorefrontConfig {
    StorefrontConfig {
        database_url: SecretString::from("postgres://lemu@127.0.0.1:1/lemu_test"),
        host: IpAddr::from([127, 0, 0, 1]),
        port: 0,
        base_url: "http://localhost".to_string(),
        default_subdomain: "nexor".to_string(),
        commerce: CommerceConfig {
            api_base_url,
            request_timeout: Duration::from_secs(5),
            ..CommerceConfig::default()
        },
        payments: PaymentPollConfig {
            interval: Duration::from_millis(50),
            deadline: Duration::from_millis(1500),
        },
        catalog: CatalogConfig {
            debounce: Duration::from_millis(20),
            page_size: 12,
        },
        sentry_dsn: None,
        sentry_environment: None,
        sentry_sample_rate: 1.0,
        sentry_traces_sample_rate: 0.0,
    }
}

impl TestContext {
    /// Start the mock API and the storefront.
    pub async fn start() -> Self {
        let mock = MockCommerce::default();
        let mock_addr = spawn(mock.router()).await;
        let api_base_url =
            Url::parse(&format!("http://{mock_addr}/lemu/api/v1/")).expect("Mock URL is valid");

        let config = test_config(api_base_url);
        let pool = PgPoolOptions::new()
            .acquire_timeout(Duration::from_millis(200))
            .connect_lazy("postgres://lemu@127.0.0.1:1/lemu_test")
            .expect("Lazy pool never connects up front");
        let state = AppState::new(config, pool).expect("Failed to build app state");

        let app = routes::app(state.clone(), MemoryStore::default());
        let addr = spawn(app).await;

        let client = reqwest::Client::builder()
            .cookie_store(true)
            .build()
            .expect("Failed to create HTTP client");

        Self {
            client,
            base_url: format!("http://{addr}"),
            mock,
            state,
        }
    }

    #[must_use]
    pub fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    pub async fn get(&self, path: &str) -> Reply {
        Self::reply(self.client.get(self.url(path))).await
    }

    /// GET as the tenant behind `host`.
    pub async fn get_as(&self, host: &str, path: &str) -> Reply {
        Self::reply(self.client.get(self.url(path)).header("x-forwarded-host", host)).await
    }

    pub async fn post(&self, path: &str, body: &Value) -> Reply {
        Self::reply(self.client.post(self.url(path)).json(body)).await
    }

    async fn reply(request: reqwest::RequestBuilder) -> Reply {
        let response = request.send().await.expect("Request failed");
        let status = StatusCode::from_u16(response.status().as_u16()).expect("Valid status");
        let text = response.text().await.expect("Failed to read body");
        let body = if text.is_empty() {
            Value::Null
        } else {
            serde_json::from_str(&text).unwrap_or(Value::String(text))
        };
        Reply { status, body }
    }

    /// Poll the confirmation endpoint until the payment leaves `polling`.
    pub async fn await_confirmation(&self) -> Value {
        for _ in 0..100 {
            let reply = self.get("/checkout/payment/status").await;
            assert_eq!(reply.status, StatusCode::OK, "status body: {}", reply.body);
            if reply.body["poll"]["state"] != "polling" {
                return reply.body;
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
        panic!("payment never settled");
    }
}

/// A personal details form that passes validation.
#[must_use]
pub fn valid_personal_info() -> Value {
    json!({
        "firstName": "Amina",
        "lastName": "Otieno",
        "email": "amina@example.com",
        "mobileNumber": "+254 712 345 678",
        "usePickupPoint": false
    })
}
