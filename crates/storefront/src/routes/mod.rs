//! HTTP route handlers for storefront.
//!
//! # Route Structure
//!
//! ```text
//! GET  /health                 - Liveness
//! GET  /health/ready           - Database reachable
//!
//! # Store & catalog
//! GET  /api/store              - Store config, branding and theme
//! GET  /api/products           - Listing (?q=&category=&page=&size=), debounced
//! GET  /api/products/{id}      - Product detail
//!
//! # Cart
//! GET  /cart                   - Lines and totals (?promo=)
//! GET  /cart/count             - Badge count
//! POST /cart/add               - {product, quantity?, selectedOptions?}
//! POST /cart/increase          - {id}
//! POST /cart/decrease          - {id}
//! POST /cart/remove            - {id}
//! POST /cart/clear
//!
//! # Checkout
//! POST /checkout/buy-now       - {product, quantity, selectedOptions}
//! POST /checkout/start         - {entry}
//! GET  /checkout               - Current checkout
//! POST /checkout/personal      - Personal details
//! POST /checkout/payment/method - {method}
//! POST /checkout/payment/mpesa - M-Pesa number
//! POST /checkout/payment/card  - Card details
//! GET  /checkout/payment/status - Confirmation progress
//! POST /checkout/abandon
//! ```

pub mod cart;
pub mod checkout;
pub mod health;
pub mod products;
pub mod store;

use axum::{
    Router,
    http::Request,
    routing::{get, post},
};
use tower_http::trace::TraceLayer;
use tower_sessions::SessionStore;

use crate::middleware::{request_context_middleware, session_layer};
use crate::state::AppState;

/// Create the store and catalog API router.
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/store", get(store::show))
        .route("/products", get(products::index))
        .route("/products/{id}", get(products::show))
}

/// Create the cart routes router.
pub fn cart_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(cart::show))
        .route("/count", get(cart::count))
        .route("/add", post(cart::add))
        .route("/increase", post(cart::increase))
        .route("/decrease", post(cart::decrease))
        .route("/remove", post(cart::remove))
        .route("/clear", post(cart::clear))
}

/// Create the checkout routes router.
pub fn checkout_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(checkout::show))
        .route("/buy-now", post(checkout::buy_now))
        .route("/start", post(checkout::start))
        .route("/personal", post(checkout::personal))
        .route("/payment/method", post(checkout::method))
        .route("/payment/mpesa", post(checkout::mpesa))
        .route("/payment/card", post(checkout::card))
        .route("/payment/status", get(checkout::status))
        .route("/abandon", post(checkout::abandon))
}

/// Create all routes that need a visitor session.
pub fn routes() -> Router<AppState> {
    Router::new()
        .nest("/api", api_routes())
        .nest("/cart", cart_routes())
        .nest("/checkout", checkout_routes())
}

/// Build the complete application over a session store.
///
/// Sentry layers are added by the binary, outside this router.
pub fn app<S>(state: AppState, session_store: S) -> Router
where
    S: SessionStore + Clone,
{
    let sessions = session_layer(session_store, state.config());

    Router::new()
        .merge(routes().layer(sessions))
        .route("/health", get(health::health))
        .route("/health/ready", get(health::readiness))
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            request_context_middleware,
        ))
        .layer(TraceLayer::new_for_http().make_span_with(|request: &Request<_>| {
            tracing::info_span!(
                "request",
                method = %request.method(),
                uri = %request.uri(),
                request_id = tracing::field::Empty,
                tenant = tracing::field::Empty,
            )
        }))
        .with_state(state)
}
