//! Cart route handlers.
//!
//! The cart lives entirely in the session. Adding a product fetches it
//! (cached) to snapshot the fields the line needs; every other operation
//! works on the stored lines alone.

use std::collections::BTreeMap;

use axum::{
    Json,
    extract::{Query, State},
};
use lemu_core::{CartLineItem, CartTotals, ProductId};
use serde::{Deserialize, Serialize};
use tower_sessions::Session;
use tracing::instrument;

use crate::commerce::CommerceApi;
use crate::error::{Result, add_breadcrumb};
use crate::services::CartStore;
use crate::state::AppState;

/// Cart contents with its price breakdown.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CartView {
    pub items: Vec<CartLineItem>,
    pub item_count: u32,
    pub totals: CartTotals,
    pub promo_code: Option<String>,
}

impl CartView {
    fn build(cart: &CartStore, promo_code: Option<String>) -> Result<Self> {
        let promo_code = promo_code.filter(|c| !c.trim().is_empty());
        Ok(Self {
            items: cart.items().to_vec(),
            item_count: cart.total_count(),
            totals: cart.totals(promo_code.as_deref())?,
            promo_code,
        })
    }
}

/// Badge count.
#[derive(Debug, Serialize)]
pub struct CartCount {
    pub count: u32,
}

/// Query for `GET /cart`.
#[derive(Debug, Deserialize)]
pub struct CartQuery {
    pub promo: Option<String>,
}

/// Body for `POST /cart/add`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddToCartForm {
    pub product: ProductId,
    pub quantity: Option<u32>,
    #[serde(default)]
    pub selected_options: BTreeMap<String, String>,
}

/// Body for line operations.
#[derive(Debug, Deserialize)]
pub struct LineForm {
    pub id: ProductId,
}

/// Display the cart, optionally with a promo code applied.
#[instrument(skip(session))]
pub async fn show(session: Session, Query(query): Query<CartQuery>) -> Result<Json<CartView>> {
    let cart = CartStore::load(&session).await;
    Ok(Json(CartView::build(&cart, query.promo)?))
}

/// Cart badge count.
#[instrument(skip(session))]
pub async fn count(session: Session) -> Json<CartCount> {
    let cart = CartStore::load(&session).await;
    Json(CartCount {
        count: cart.total_count(),
    })
}

/// Add a product. Without a quantity one unit is added; with one, the
/// quantity is checked against stock.
#[instrument(skip(state, session))]
pub async fn add(
    State(state): State<AppState>,
    session: Session,
    Json(form): Json<AddToCartForm>,
) -> Result<Json<CartView>> {
    let product = state.commerce().product(form.product).await?;
    let options = product.resolve_options(&form.selected_options);
    let mut cart = CartStore::load(&session).await;

    match form.quantity {
        None => cart.add(product.to_line_item(1, options)).await?,
        Some(quantity) => {
            cart.add_many(product.to_line_item(quantity, options), quantity, product.current_stock)
                .await?;
        }
    }

    let product_id = product.id.to_string();
    add_breadcrumb("cart", "Added to cart", Some(&[("product_id", product_id.as_str())]));

    Ok(Json(CartView::build(&cart, None)?))
}

/// Increment a line.
#[instrument(skip(session))]
pub async fn increase(session: Session, Json(form): Json<LineForm>) -> Result<Json<CartView>> {
    let mut cart = CartStore::load(&session).await;
    cart.increase(form.id).await?;
    Ok(Json(CartView::build(&cart, None)?))
}

/// Decrement a line; a line at one unit is removed.
#[instrument(skip(session))]
pub async fn decrease(session: Session, Json(form): Json<LineForm>) -> Result<Json<CartView>> {
    let mut cart = CartStore::load(&session).await;
    cart.decrease(form.id).await?;
    Ok(Json(CartView::build(&cart, None)?))
}

/// Remove a line.
#[instrument(skip(session))]
pub async fn remove(session: Session, Json(form): Json<LineForm>) -> Result<Json<CartView>> {
    let mut cart = CartStore::load(&session).await;
    cart.remove(form.id).await?;
    Ok(Json(CartView::build(&cart, None)?))
}

/// Empty the cart.
#[instrument(skip(session))]
pub async fn clear(session: Session) -> Result<Json<CartView>> {
    let mut cart = CartStore::load(&session).await;
    cart.clear().await?;
    Ok(Json(CartView::build(&cart, None)?))
}
