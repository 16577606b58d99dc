//! Wire types for the Lemu commerce and payments API.
//!
//! Field names follow the API's camelCase JSON. Unknown fields are ignored
//! and optional fields default, so additions upstream never break parsing.

use std::collections::BTreeMap;

use lemu_core::{
    CartLineItem, CategoryId, CustomerId, MerchantId, Money, OrderId, PaymentStatus, ProductId,
    StoreId,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

// =============================================================================
// Store
// =============================================================================

/// Store details resolved from a subdomain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoreConfig {
    pub store_id: StoreId,
    #[serde(default)]
    pub merchant_id: Option<MerchantId>,
    #[serde(default)]
    pub store_name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub store_category: String,
    #[serde(default)]
    pub welcome_message: String,
    #[serde(default)]
    pub phone_number: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub currency_id: Option<i64>,
    #[serde(default)]
    pub currency_name: String,
    #[serde(default)]
    pub currency_symbol: String,
    #[serde(default)]
    pub custom_color: Option<String>,
    #[serde(default)]
    pub logo: Option<String>,
    #[serde(default)]
    pub facebook: Option<String>,
    #[serde(default)]
    pub instagram: Option<String>,
    #[serde(default)]
    pub tiktok: Option<String>,
    #[serde(default)]
    pub categories: Vec<Category>,
}

impl StoreConfig {
    /// Whether `id` is one of this store's categories.
    #[must_use]
    pub fn has_category(&self, id: CategoryId) -> bool {
        self.categories.iter().any(|c| c.id == id)
    }
}

/// A product category offered by a store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Category {
    pub id: CategoryId,
    #[serde(alias = "categoryName")]
    pub name: String,
}

// =============================================================================
// Products
// =============================================================================

/// Option keys on a product and in a cart line's `selected_options`.
pub mod option_keys {
    pub const COLOUR: &str = "colour";
    pub const SIZE: &str = "size";
}

/// Selectable product variants.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProductOptions {
    pub colour: Vec<String>,
    pub size: Vec<String>,
}

/// A catalog product.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub id: ProductId,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub images: Vec<String>,
    pub sale_price: Money,
    #[serde(default)]
    pub original_price: Money,
    #[serde(default, with = "rust_decimal::serde::float_option")]
    pub discount: Option<Decimal>,
    #[serde(default)]
    pub current_stock: u32,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub rating: Option<f64>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub options: ProductOptions,
    #[serde(default)]
    pub features: Vec<String>,
    #[serde(default)]
    pub specifications: BTreeMap<String, String>,
}

impl Product {
    #[must_use]
    pub const fn in_stock(&self) -> bool {
        self.current_stock > 0
    }

    /// The first colour and first size, when the product offers them.
    #[must_use]
    pub fn default_options(&self) -> BTreeMap<String, String> {
        let mut selected = BTreeMap::new();
        if let Some(colour) = self.options.colour.first() {
            selected.insert(option_keys::COLOUR.to_string(), colour.clone());
        }
        if let Some(size) = self.options.size.first() {
            selected.insert(option_keys::SIZE.to_string(), size.clone());
        }
        selected
    }

    /// Merge a client's option choice over the defaults, keeping only
    /// values the product actually offers.
    #[must_use]
    pub fn resolve_options(&self, requested: &BTreeMap<String, String>) -> BTreeMap<String, String> {
        let mut selected = self.default_options();
        for (key, offered) in [
            (option_keys::COLOUR, &self.options.colour),
            (option_keys::SIZE, &self.options.size),
        ] {
            if let Some(value) = requested.get(key)
                && offered.contains(value)
            {
                selected.insert(key.to_string(), value.clone());
            }
        }
        selected
    }

    /// Snapshot this product as a cart line.
    #[must_use]
    pub fn to_line_item(&self, quantity: u32, selected_options: BTreeMap<String, String>) -> CartLineItem {
        CartLineItem {
            id: self.id,
            name: self.name.clone(),
            image_url: self.image_url.clone().or_else(|| self.images.first().cloned()),
            sale_price: self.sale_price,
            original_price: self.original_price,
            quantity,
            selected_options,
        }
    }
}

/// One page of a product listing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductPage {
    #[serde(default)]
    pub content: Vec<Product>,
    #[serde(default)]
    pub total_pages: u32,
    #[serde(default)]
    pub total_elements: u64,
    #[serde(default)]
    pub number: u32,
    #[serde(default)]
    pub size: u32,
    #[serde(default)]
    pub first: bool,
    #[serde(default)]
    pub last: bool,
}

impl ProductPage {
    /// An empty first page.
    #[must_use]
    pub const fn empty(size: u32) -> Self {
        Self {
            content: Vec::new(),
            total_pages: 0,
            total_elements: 0,
            number: 0,
            size,
            first: true,
            last: true,
        }
    }
}

/// Search text, category filter and page for a product listing request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductQuery {
    #[serde(default)]
    pub search: String,
    #[serde(default)]
    pub categories: Vec<CategoryId>,
    #[serde(default)]
    pub page: u32,
}

impl ProductQuery {
    /// Whether `other` filters the same products (ignoring the page).
    #[must_use]
    pub fn same_filter(&self, other: &Self) -> bool {
        let mut mine = self.categories.clone();
        let mut theirs = other.categories.clone();
        mine.sort_unstable();
        mine.dedup();
        theirs.sort_unstable();
        theirs.dedup();
        self.search.trim() == other.search.trim() && mine == theirs
    }
}

// =============================================================================
// Customers & Orders
// =============================================================================

/// Payload for `POST /customers/create`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateCustomerRequest {
    pub first_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub middle_name: Option<String>,
    pub last_name: String,
    pub email: String,
    pub mobile_number: String,
    pub use_pickup_point: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pickup_location: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub merchant_id: Option<MerchantId>,
}

/// Response from `POST /customers/create`. The ID is optional on the wire so
/// a missing ID can be reported as a business failure rather than a parse error.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateCustomerResponse {
    #[serde(default)]
    pub id: Option<CustomerId>,
}

/// One line of an order payload.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderLine {
    pub product_id: ProductId,
    pub name: String,
    pub quantity: u32,
    pub price: Money,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub selected_options: BTreeMap<String, String>,
}

impl From<&CartLineItem> for OrderLine {
    fn from(item: &CartLineItem) -> Self {
        Self {
            product_id: item.id,
            name: item.name.clone(),
            quantity: item.quantity,
            price: item.sale_price,
            selected_options: item.selected_options.clone(),
        }
    }
}

/// Payload for `POST /shop/order/create`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateOrderRequest {
    pub customer_id: CustomerId,
    pub store_id: StoreId,
    pub cart: Vec<OrderLine>,
}

/// Response from `POST /shop/order/create`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateOrderResponse {
    #[serde(alias = "id")]
    pub order_id: OrderId,
    #[serde(default)]
    pub amount: Option<Money>,
}

// =============================================================================
// Payments
// =============================================================================

/// Payload for `POST /payments/process` (M-Pesa STK push).
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StkPushRequest {
    pub order_id: OrderId,
    pub phone_number: String,
    pub store_id: StoreId,
    pub amount: Money,
}

/// Identifiers of an initiated STK push, used to query its status.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentRequest {
    pub request_id: String,
    pub transaction_id: String,
}

/// Payload for `POST /payments/status`.
pub type PaymentStatusRequest = PaymentRequest;

/// Response from `POST /payments/status`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentStatusResponse {
    #[serde(default)]
    pub status: PaymentStatus,
    #[serde(default)]
    pub amount: Option<Money>,
    #[serde(default, alias = "resultDesc")]
    pub message: Option<String>,
}

/// Accept JSON `null` for fields that otherwise default.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: serde::Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}
