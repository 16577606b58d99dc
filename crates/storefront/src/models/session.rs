//! Session keys and typed access helpers.

use serde::de::DeserializeOwned;
use tower_sessions::Session;

/// Session keys for visitor state.
pub mod keys {
    /// Key for the cart's line items.
    pub const CART_ITEMS: &str = "cart_items";

    /// Key for the resolved store configuration.
    pub const STORE_DETAILS: &str = "store_details";

    /// Key for the single item staged by "buy now".
    pub const BUY_NOW_ITEM: &str = "buy_now_item";

    /// Key for how the visitor entered checkout (cart or buy now).
    pub const CHECKOUT_ENTRY: &str = "checkout_entry";

    /// Key for the in-progress checkout.
    pub const CHECKOUT: &str = "checkout";

    /// Key for the last catalog query this visitor issued.
    pub const CATALOG_QUERY: &str = "catalog_query";
}

/// Read a value, treating an absent or unreadable entry as the default.
///
/// Stale or corrupt snapshots (e.g. written by an older release) are logged
/// and ignored rather than failing the request.
pub async fn load_or_default<T>(session: &Session, key: &str) -> T
where
    T: DeserializeOwned + Default,
{
    match session.get::<T>(key).await {
        Ok(value) => value.unwrap_or_default(),
        Err(e) => {
            tracing::warn!(key, error = %e, "Discarding unreadable session value");
            T::default()
        }
    }
}
