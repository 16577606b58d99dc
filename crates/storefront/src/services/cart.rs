//! Cart Store: the visitor's cart, persisted in the session.
//!
//! The cart is hydrated once per request and written back in full after
//! every mutation, so a page reload always sees the last change. No network
//! calls are made here; line items carry the product snapshot they need.

use lemu_core::{Cart, CartError, CartLineItem, CartTotals, ProductId};
use tower_sessions::Session;
use tracing::instrument;

use crate::models::{load_or_default, session_keys};

/// Errors from cart mutations.
#[derive(Debug, thiserror::Error)]
pub enum CartStoreError {
    /// Quantity or stock rule violated.
    #[error(transparent)]
    Cart(#[from] CartError),

    /// The session could not be written.
    #[error("Session error: {0}")]
    Session(#[from] tower_sessions::session::Error),
}

/// A visitor's cart bound to their session.
pub struct CartStore {
    session: Session,
    cart: Cart,
}

impl CartStore {
    /// Hydrate the cart from the session.
    ///
    /// An absent or unreadable snapshot yields an empty cart.
    pub async fn load(session: &Session) -> Self {
        let items: Vec<CartLineItem> = load_or_default(session, session_keys::CART_ITEMS).await;
        Self {
            session: session.clone(),
            cart: Cart::from_items(items),
        }
    }

    #[must_use]
    pub const fn cart(&self) -> &Cart {
        &self.cart
    }

    #[must_use]
    pub fn items(&self) -> &[CartLineItem] {
        self.cart.items()
    }

    /// Badge count: sum of all line quantities.
    #[must_use]
    pub fn total_count(&self) -> u32 {
        self.cart.total_count()
    }

    /// Price breakdown with an optional promo code.
    ///
    /// # Errors
    ///
    /// Returns [`CartError::InvalidPromoCode`] for an unrecognised code.
    pub fn totals(&self, promo_code: Option<&str>) -> Result<CartTotals, CartError> {
        self.cart.totals(promo_code)
    }

    /// Add one unit of a product.
    ///
    /// # Errors
    ///
    /// Returns an error if the session cannot be written.
    #[instrument(skip(self, item), fields(product_id = %item.id))]
    pub async fn add(&mut self, item: CartLineItem) -> Result<(), CartStoreError> {
        self.cart.add(item);
        self.persist().await
    }

    /// Add several units of a product, bounded by its stock.
    ///
    /// # Errors
    ///
    /// Returns [`CartError`] if the quantity is outside `1..=stock`, or a
    /// session error if the cart cannot be written.
    #[instrument(skip(self, item), fields(product_id = %item.id))]
    pub async fn add_many(
        &mut self,
        item: CartLineItem,
        quantity: u32,
        stock: u32,
    ) -> Result<(), CartStoreError> {
        self.cart.add_many(item, quantity, stock)?;
        self.persist().await
    }

    /// Remove a line entirely. Returns whether a line was removed.
    ///
    /// # Errors
    ///
    /// Returns an error if the session cannot be written.
    pub async fn remove(&mut self, id: ProductId) -> Result<bool, CartStoreError> {
        let changed = self.cart.remove(id);
        self.persist().await?;
        Ok(changed)
    }

    /// Increment a line. Returns whether the line exists.
    ///
    /// # Errors
    ///
    /// Returns an error if the session cannot be written.
    pub async fn increase(&mut self, id: ProductId) -> Result<bool, CartStoreError> {
        let changed = self.cart.increase(id);
        self.persist().await?;
        Ok(changed)
    }

    /// Decrement a line, removing it below 1. Returns whether the line existed.
    ///
    /// # Errors
    ///
    /// Returns an error if the session cannot be written.
    pub async fn decrease(&mut self, id: ProductId) -> Result<bool, CartStoreError> {
        let changed = self.cart.decrease(id);
        self.persist().await?;
        Ok(changed)
    }

    /// Empty the cart.
    ///
    /// # Errors
    ///
    /// Returns an error if the session cannot be written.
    pub async fn clear(&mut self) -> Result<(), CartStoreError> {
        self.cart.clear();
        self.persist().await
    }

    async fn persist(&self) -> Result<(), CartStoreError> {
        self.session
            .insert(session_keys::CART_ITEMS, self.cart.items())
            .await?;
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::collections::BTreeMap;
    use std::sync::Arc;

    use lemu_core::Money;
    use tower_sessions::{MemoryStore, SessionStore};

    use super::*;

    fn item(id: i64) -> CartLineItem {
        CartLineItem {
            id: ProductId::new(id),
            name: format!("Product {id}"),
            image_url: None,
            sale_price: Money::from_units(100),
            original_price: Money::from_units(120),
            quantity: 1,
            selected_options: BTreeMap::new(),
        }
    }

    #[tokio::test]
    async fn test_mutations_visible_after_reload() {
        let store = Arc::new(MemoryStore::default());
        let session = Session::new(None, store.clone(), None);

        let mut cart = CartStore::load(&session).await;
        cart.add(item(1)).await.unwrap();
        cart.add(item(1)).await.unwrap();
        cart.add(item(2)).await.unwrap();
        cart.decrease(ProductId::new(2)).await.unwrap();
        session.save().await.unwrap();

        // A fresh session handle with the same ID simulates the next request.
        let reloaded = Session::new(session.id(), store, None);
        let cart = CartStore::load(&reloaded).await;
        assert_eq!(cart.items().len(), 1);
        assert_eq!(cart.total_count(), 2);
    }

    #[tokio::test]
    async fn test_corrupt_snapshot_yields_empty_cart() {
        let session = Session::new(None, Arc::new(MemoryStore::default()), None);
        session
            .insert(session_keys::CART_ITEMS, serde_json::json!({"oops": true}))
            .await
            .unwrap();

        let cart = CartStore::load(&session).await;
        assert!(cart.cart().is_empty());
    }

    #[tokio::test]
    async fn test_add_many_rejects_without_persisting() {
        let session = Session::new(None, Arc::new(MemoryStore::default()), None);
        let mut cart = CartStore::load(&session).await;

        let err = cart.add_many(item(1), 5, 2).await.unwrap_err();
        assert!(matches!(
            err,
            CartStoreError::Cart(CartError::InvalidQuantity { requested: 5, available: 2 })
        ));

        let reloaded = CartStore::load(&session).await;
        assert!(reloaded.cart().is_empty());
    }

    #[tokio::test]
    async fn test_clear_persists_empty_list() {
        let store = Arc::new(MemoryStore::default());
        let session = Session::new(None, store.clone(), None);
        let mut cart = CartStore::load(&session).await;
        cart.add(item(1)).await.unwrap();
        cart.clear().await.unwrap();
        session.save().await.unwrap();

        let record = store.load(&session.id().unwrap()).await.unwrap().unwrap();
        assert_eq!(
            record.data.get(session_keys::CART_ITEMS),
            Some(&serde_json::json!([]))
        );
    }
}
