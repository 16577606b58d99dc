//! Cart line items and quantity arithmetic.
//!
//! The cart is a plain ordered list of lines keyed by product ID. Every
//! operation keeps the invariant that no line ever has a quantity below 1:
//! decrementing a single-unit line removes it.
//!
//! Persistence is not handled here; the storefront serializes the whole
//! [`Cart`] after each mutation.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::{Money, ProductId};

/// Subtotal above which shipping is free.
pub const FREE_SHIPPING_THRESHOLD: Money = Money::new(rust_decimal::Decimal::from_parts(
    5000, 0, 0, false, 0,
));

/// Flat shipping fee charged below the free-shipping threshold.
pub const SHIPPING_FEE: Money = Money::new(rust_decimal::Decimal::from_parts(500, 0, 0, false, 0));

/// The single promo code the storefront recognises.
pub const PROMO_CODE: &str = "DISCOUNT10";

/// Discount granted by [`PROMO_CODE`], in percent.
pub const PROMO_PERCENT: u32 = 10;

/// Errors from cart operations that take user input.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CartError {
    /// The product has no stock left.
    #[error("product {0} is out of stock")]
    OutOfStock(ProductId),

    /// The requested quantity is zero or exceeds available stock.
    #[error("quantity {requested} is not available (in stock: {available})")]
    InvalidQuantity { requested: u32, available: u32 },

    /// The promo code is not recognised.
    #[error("invalid promo code: {0}")]
    InvalidPromoCode(String),
}

/// One product line in the cart.
///
/// Carries a snapshot of the product fields the cart and order payload need,
/// so the cart can be rendered without refetching the catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartLineItem {
    pub id: ProductId,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    pub sale_price: Money,
    #[serde(default)]
    pub original_price: Money,
    pub quantity: u32,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub selected_options: BTreeMap<String, String>,
}

impl CartLineItem {
    /// Line total (`sale_price × quantity`).
    #[must_use]
    pub fn line_total(&self) -> Money {
        self.sale_price * self.quantity
    }
}

/// Price breakdown shown on the cart page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CartTotals {
    pub subtotal: Money,
    pub discount: Money,
    pub shipping: Money,
    pub total: Money,
}

/// Check that `quantity` units can be taken from `stock`.
///
/// # Errors
///
/// Returns [`CartError::OutOfStock`] when `stock` is zero and
/// [`CartError::InvalidQuantity`] when `quantity` is zero or above `stock`.
pub fn check_quantity(id: ProductId, quantity: u32, stock: u32) -> Result<(), CartError> {
    if stock == 0 {
        return Err(CartError::OutOfStock(id));
    }
    if quantity == 0 || quantity > stock {
        return Err(CartError::InvalidQuantity {
            requested: quantity,
            available: stock,
        });
    }
    Ok(())
}

/// An ordered collection of cart lines.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Cart {
    items: Vec<CartLineItem>,
}

impl Cart {
    /// Create an empty cart.
    #[must_use]
    pub const fn new() -> Self {
        Self { items: Vec::new() }
    }

    /// Build a cart from persisted lines, dropping any zero-quantity lines.
    #[must_use]
    pub fn from_items(items: Vec<CartLineItem>) -> Self {
        Self {
            items: items.into_iter().filter(|i| i.quantity > 0).collect(),
        }
    }

    /// The lines in insertion order.
    #[must_use]
    pub fn items(&self) -> &[CartLineItem] {
        &self.items
    }

    /// Consume the cart, returning its lines.
    #[must_use]
    pub fn into_items(self) -> Vec<CartLineItem> {
        self.items
    }

    /// Look up a line by product ID.
    #[must_use]
    pub fn get(&self, id: ProductId) -> Option<&CartLineItem> {
        self.items.iter().find(|i| i.id == id)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Sum of quantities across all lines (the badge count).
    #[must_use]
    pub fn total_count(&self) -> u32 {
        self.items
            .iter()
            .fold(0, |count: u32, i| count.saturating_add(i.quantity))
    }

    /// Add one unit of a product.
    ///
    /// If a line with the same ID exists its quantity is incremented;
    /// otherwise the item is appended with quantity 1. The incoming
    /// `quantity` field is ignored.
    pub fn add(&mut self, item: CartLineItem) {
        if let Some(line) = self.items.iter_mut().find(|i| i.id == item.id) {
            line.quantity = line.quantity.saturating_add(1);
        } else {
            self.items.push(CartLineItem { quantity: 1, ..item });
        }
    }

    /// Add `quantity` units of a product with `stock` units available.
    ///
    /// Equivalent to calling [`Cart::add`] `quantity` times.
    ///
    /// # Errors
    ///
    /// Returns [`CartError::OutOfStock`] when `stock` is zero and
    /// [`CartError::InvalidQuantity`] when `quantity` is zero or above `stock`.
    pub fn add_many(
        &mut self,
        item: CartLineItem,
        quantity: u32,
        stock: u32,
    ) -> Result<(), CartError> {
        check_quantity(item.id, quantity, stock)?;

        if let Some(line) = self.items.iter_mut().find(|i| i.id == item.id) {
            line.quantity = line.quantity.saturating_add(quantity);
        } else {
            self.items.push(CartLineItem { quantity, ..item });
        }
        Ok(())
    }

    /// Remove a line regardless of its quantity. Returns whether a line was removed.
    pub fn remove(&mut self, id: ProductId) -> bool {
        let before = self.items.len();
        self.items.retain(|i| i.id != id);
        self.items.len() != before
    }

    /// Increment a line by one. Returns whether the line exists.
    pub fn increase(&mut self, id: ProductId) -> bool {
        match self.items.iter_mut().find(|i| i.id == id) {
            Some(line) => {
                line.quantity = line.quantity.saturating_add(1);
                true
            }
            None => false,
        }
    }

    /// Decrement a line by one, removing it when it would drop below 1.
    /// Returns whether the line existed.
    pub fn decrease(&mut self, id: ProductId) -> bool {
        let Some(pos) = self.items.iter().position(|i| i.id == id) else {
            return false;
        };

        if let Some(line) = self.items.get_mut(pos) {
            if line.quantity > 1 {
                line.quantity -= 1;
            } else {
                self.items.remove(pos);
            }
        }
        true
    }

    /// Remove every line.
    pub fn clear(&mut self) {
        self.items.clear();
    }

    /// Sum of line totals.
    #[must_use]
    pub fn subtotal(&self) -> Money {
        self.items.iter().map(CartLineItem::line_total).sum()
    }

    /// Compute the price breakdown, optionally applying a promo code.
    ///
    /// # Errors
    ///
    /// Returns [`CartError::InvalidPromoCode`] for an unrecognised code.
    pub fn totals(&self, promo_code: Option<&str>) -> Result<CartTotals, CartError> {
        let subtotal = self.subtotal();

        let discount = match promo_code.map(str::trim).filter(|c| !c.is_empty()) {
            Some(code) if code.eq_ignore_ascii_case(PROMO_CODE) => {
                subtotal.percent(PROMO_PERCENT).round_units()
            }
            Some(code) => return Err(CartError::InvalidPromoCode(code.to_string())),
            None => Money::ZERO,
        };

        let shipping = if subtotal > FREE_SHIPPING_THRESHOLD {
            Money::ZERO
        } else {
            SHIPPING_FEE
        };

        Ok(CartTotals {
            subtotal,
            discount,
            shipping,
            total: subtotal - discount + shipping,
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;

    fn item(id: i64, price: i64) -> CartLineItem {
        CartLineItem {
            id: ProductId::new(id),
            name: format!("Product {id}"),
            image_url: None,
            sale_price: Money::from_units(price),
            original_price: Money::from_units(price),
            quantity: 0,
            selected_options: BTreeMap::new(),
        }
    }

    #[test]
    fn test_add_same_id_twice_yields_one_line() {
        let mut cart = Cart::new();
        cart.add(item(1, 100));
        cart.add(item(1, 100));

        assert_eq!(cart.items().len(), 1);
        assert_eq!(cart.get(ProductId::new(1)).unwrap().quantity, 2);
    }

    #[test]
    fn test_decrease_single_unit_removes_line() {
        let mut cart = Cart::new();
        cart.add(item(1, 100));
        assert!(cart.decrease(ProductId::new(1)));
        assert!(cart.is_empty());
    }

    #[test]
    fn test_decrease_keeps_line_above_one() {
        let mut cart = Cart::new();
        cart.add(item(1, 100));
        cart.increase(ProductId::new(1));
        cart.decrease(ProductId::new(1));
        assert_eq!(cart.get(ProductId::new(1)).unwrap().quantity, 1);
    }

    #[test]
    fn test_unknown_ids_are_noops() {
        let mut cart = Cart::new();
        cart.add(item(1, 100));
        assert!(!cart.increase(ProductId::new(9)));
        assert!(!cart.decrease(ProductId::new(9)));
        assert!(!cart.remove(ProductId::new(9)));
        assert_eq!(cart.total_count(), 1);
    }

    #[test]
    fn test_remove_ignores_quantity() {
        let mut cart = Cart::new();
        cart.add_many(item(1, 100), 5, 10).unwrap();
        cart.add(item(2, 50));
        assert!(cart.remove(ProductId::new(1)));
        assert_eq!(cart.items().len(), 1);
        assert_eq!(cart.total_count(), 1);
    }

    #[test]
    fn test_count_matches_quantities_for_mixed_sequence() {
        let mut cart = Cart::new();
        let ops: [(u8, i64); 12] = [
            (0, 1), (0, 2), (0, 1), (1, 1), (2, 2), (2, 2),
            (0, 3), (3, 3), (1, 2), (0, 2), (2, 1), (2, 1),
        ];
        for (op, id) in ops {
            let id_val = ProductId::new(id);
            match op {
                0 => cart.add(item(id, 10)),
                1 => {
                    cart.increase(id_val);
                }
                2 => {
                    cart.decrease(id_val);
                }
                _ => {
                    cart.remove(id_val);
                }
            }
            let sum: u32 = cart.items().iter().map(|i| i.quantity).sum();
            assert_eq!(cart.total_count(), sum);
            assert!(cart.items().iter().all(|i| i.quantity >= 1));
        }
    }

    #[test]
    fn test_add_many_respects_stock() {
        let mut cart = Cart::new();
        assert_eq!(
            cart.add_many(item(1, 100), 1, 0),
            Err(CartError::OutOfStock(ProductId::new(1)))
        );
        assert_eq!(
            cart.add_many(item(1, 100), 4, 3),
            Err(CartError::InvalidQuantity { requested: 4, available: 3 })
        );
        assert!(cart.add_many(item(1, 100), 0, 3).is_err());
        assert!(cart.is_empty());

        cart.add_many(item(1, 100), 3, 3).unwrap();
        assert_eq!(cart.total_count(), 3);
    }

    #[test]
    fn test_from_items_drops_zero_quantity_lines() {
        let mut zero = item(1, 100);
        zero.quantity = 0;
        let mut two = item(2, 100);
        two.quantity = 2;
        let cart = Cart::from_items(vec![zero, two]);
        assert_eq!(cart.items().len(), 1);
        assert_eq!(cart.total_count(), 2);
    }

    #[test]
    fn test_quantities_saturate_instead_of_wrapping() {
        let mut big = item(1, 1);
        big.quantity = u32::MAX - 1;
        let mut other = item(2, 1);
        other.quantity = 5;
        let mut cart = Cart::from_items(vec![big, other]);

        cart.add(item(1, 1));
        cart.increase(ProductId::new(1));
        cart.add_many(item(1, 1), 3, u32::MAX).unwrap();

        assert_eq!(cart.get(ProductId::new(1)).unwrap().quantity, u32::MAX);
        assert_eq!(cart.total_count(), u32::MAX);
    }

    #[test]
    fn test_totals_below_free_shipping() {
        let mut cart = Cart::new();
        cart.add_many(item(1, 1000), 2, 5).unwrap();
        let totals = cart.totals(None).unwrap();
        assert_eq!(totals.subtotal, Money::from_units(2000));
        assert_eq!(totals.discount, Money::ZERO);
        assert_eq!(totals.shipping, Money::from_units(500));
        assert_eq!(totals.total, Money::from_units(2500));
    }

    #[test]
    fn test_totals_with_promo_and_free_shipping() {
        let mut cart = Cart::new();
        cart.add(CartLineItem {
            sale_price: Money::new(Decimal::new(60_015, 1)),
            ..item(1, 0)
        });
        let totals = cart.totals(Some("discount10")).unwrap();
        // 10% of 6001.5 = 600.15, rounded to 600
        assert_eq!(totals.discount, Money::from_units(600));
        assert_eq!(totals.shipping, Money::ZERO);
        assert_eq!(totals.total, Money::new(Decimal::new(54_015, 1)));
    }

    #[test]
    fn test_totals_exactly_at_threshold_pays_shipping() {
        let mut cart = Cart::new();
        cart.add(item(1, 5000));
        assert_eq!(cart.totals(None).unwrap().shipping, Money::from_units(500));
    }

    #[test]
    fn test_totals_rejects_unknown_promo() {
        let mut cart = Cart::new();
        cart.add(item(1, 100));
        assert_eq!(
            cart.totals(Some("FREESTUFF")),
            Err(CartError::InvalidPromoCode("FREESTUFF".to_string()))
        );
        assert!(cart.totals(Some("  ")).is_ok());
    }

    #[test]
    fn test_serde_preserves_order_and_quantities() {
        let mut cart = Cart::new();
        cart.add_many(item(1, 10), 2, 5).unwrap();
        cart.add(item(2, 20));

        let json = serde_json::to_string(&cart).unwrap();
        let restored: Cart = serde_json::from_str(&json).unwrap();
        assert_eq!(restored, cart);
        assert_eq!(restored.items()[0].id, ProductId::new(1));
        assert_eq!(restored.items()[0].quantity, 2);
        assert_eq!(restored.items()[1].quantity, 1);
    }
}
