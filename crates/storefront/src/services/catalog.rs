//! Product Catalog Query.
//!
//! Search-as-you-type arrives as one HTTP request per keystroke. Each
//! visitor gets a debounce channel keyed by the stored session's id: a
//! monotonic sequence number shared by all of that visitor's in-flight
//! catalog requests, even though each request works on its own copy of the
//! session. A request takes a ticket, waits
//! out the quiet window when its filter changed, and is dropped as
//! [`CatalogOutcome::Superseded`] if a newer ticket was issued in the
//! meantime, both before the upstream fetch and after it. The last-issued
//! request wins, never the last-resolved one.
//!
//! Page changes with an unchanged filter skip the quiet window.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use lemu_core::{CategoryId, PageWindow, ProductId};
use moka::future::Cache;
use serde::Serialize;
use tower_sessions::Session;
use tower_sessions::session::Id;
use tracing::{debug, instrument};

use crate::commerce::{CommerceApi, CommerceError, Product, ProductPage, ProductQuery, StoreConfig};
use crate::config::CatalogConfig;
use crate::models::{load_or_default, session_keys};

/// Idle channels are forgotten after this long.
const CHANNEL_IDLE: Duration = Duration::from_secs(30 * 60);

// =============================================================================
// Debounce channels
// =============================================================================

/// Per-visitor sequence counters for catalog requests.
#[derive(Clone)]
pub struct SearchDebouncer {
    channels: Cache<Id, Arc<AtomicU64>>,
    window: Duration,
}

/// Position of one request in its channel.
pub struct Ticket {
    counter: Arc<AtomicU64>,
    issued: u64,
}

impl Ticket {
    /// Whether no newer request has been issued on this channel.
    #[must_use]
    pub fn is_current(&self) -> bool {
        self.counter.load(Ordering::SeqCst) == self.issued
    }
}

impl SearchDebouncer {
    #[must_use]
    pub fn new(window: Duration) -> Self {
        Self {
            channels: Cache::builder()
                .max_capacity(100_000)
                .time_to_idle(CHANNEL_IDLE)
                .build(),
            window,
        }
    }

    /// Issue the next ticket on `channel`, superseding all earlier ones.
    ///
    /// Without a channel the ticket stands alone and is never superseded.
    pub async fn ticket(&self, channel: Option<Id>) -> Ticket {
        let counter = match channel {
            Some(id) => {
                self.channels
                    .get_with(id, async { Arc::new(AtomicU64::new(0)) })
                    .await
            }
            None => Arc::new(AtomicU64::new(0)),
        };
        let issued = counter.fetch_add(1, Ordering::SeqCst) + 1;
        Ticket { counter, issued }
    }

    /// Wait out the quiet window. Returns whether `ticket` is still current.
    pub async fn settle(&self, ticket: &Ticket) -> bool {
        tokio::time::sleep(self.window).await;
        ticket.is_current()
    }
}

// =============================================================================
// Listing
// =============================================================================

/// A product listing ready for display.
///
/// Fetch errors never fail the view: they produce an empty page and a
/// message.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogView {
    pub query: ProductQuery,
    pub page: ProductPage,
    pub pagination: PageWindow,
    pub error: Option<String>,
}

/// Result of a catalog request.
#[derive(Debug, Clone)]
pub enum CatalogOutcome {
    /// The listing for this request.
    Listing(CatalogView),
    /// A newer request from the same visitor replaced this one.
    Superseded,
}

/// Drop categories the store does not offer, and duplicates.
#[must_use]
pub fn sanitize_categories(store: &StoreConfig, categories: &[CategoryId]) -> Vec<CategoryId> {
    let mut kept = Vec::with_capacity(categories.len());
    for &id in categories {
        if store.has_category(id) && !kept.contains(&id) {
            kept.push(id);
        }
    }
    kept
}

/// The visitor's debounce channel: the stored session's id.
///
/// Concurrent requests carrying the same cookie load the same id, so they
/// meet on one channel. A session that was never stored is saved first;
/// no other request can share it yet.
async fn channel_id(session: &Session) -> Result<Option<Id>, tower_sessions::session::Error> {
    if let Some(id) = session.id() {
        return Ok(Some(id));
    }
    session.save().await?;
    Ok(session.id())
}

/// Run a catalog request for this visitor.
///
/// A changed search text or category set resets to the first page and is
/// debounced; a page change alone is fetched immediately.
///
/// # Errors
///
/// Returns an error only if the session cannot be written. Upstream
/// failures are reported inside the [`CatalogView`].
#[instrument(skip_all, fields(store_id = %store.store_id, search = %requested.search, page = requested.page))]
pub async fn search<A: CommerceApi>(
    session: &Session,
    api: &A,
    debouncer: &SearchDebouncer,
    config: &CatalogConfig,
    store: &StoreConfig,
    requested: ProductQuery,
) -> Result<CatalogOutcome, tower_sessions::session::Error> {
    let mut query = ProductQuery {
        search: requested.search.trim().to_string(),
        categories: sanitize_categories(store, &requested.categories),
        page: requested.page,
    };

    let previous: ProductQuery = load_or_default(session, session_keys::CATALOG_QUERY).await;
    let filter_changed = !query.same_filter(&previous);
    if filter_changed {
        query.page = 0;
    }

    let channel = channel_id(session).await?;
    let ticket = debouncer.ticket(channel).await;
    session.insert(session_keys::CATALOG_QUERY, &query).await?;

    if filter_changed && !debouncer.settle(&ticket).await {
        debug!("Catalog request superseded before fetch");
        return Ok(CatalogOutcome::Superseded);
    }

    let result = api.store_products(store.store_id, &query, config.page_size).await;

    if !ticket.is_current() {
        debug!("Catalog response discarded, newer request issued");
        return Ok(CatalogOutcome::Superseded);
    }

    let view = match result {
        Ok(page) => CatalogView {
            pagination: PageWindow::new(page.total_pages, page.number),
            query,
            page,
            error: None,
        },
        Err(e) => {
            tracing::warn!(error = %e, "Catalog fetch failed");
            CatalogView {
                pagination: PageWindow::new(0, 0),
                page: ProductPage::empty(config.page_size),
                query,
                error: Some(e.user_message("Failed to load products")),
            }
        }
    };

    Ok(CatalogOutcome::Listing(view))
}

// =============================================================================
// Product detail
// =============================================================================

/// A single product with its default option selection.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductDetail {
    pub product: Product,
    pub default_options: std::collections::BTreeMap<String, String>,
    pub in_stock: bool,
    /// Largest quantity the quantity picker allows.
    pub max_quantity: u32,
}

impl From<Product> for ProductDetail {
    fn from(product: Product) -> Self {
        Self {
            default_options: product.default_options(),
            in_stock: product.in_stock(),
            max_quantity: product.current_stock,
            product,
        }
    }
}

/// Fetch one product for its detail page.
///
/// # Errors
///
/// Returns the upstream error, including [`CommerceError::NotFound`].
pub async fn product_detail<A: CommerceApi>(api: &A, id: ProductId) -> Result<ProductDetail, CommerceError> {
    api.product(id).await.map(ProductDetail::from)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::commerce::fake::FakeCommerce;
    use tower_sessions::MemoryStore;

    fn store() -> StoreConfig {
        serde_json::from_value(serde_json::json!({
            "storeId": 7,
            "categories": [{"id": 1, "name": "Shoes"}, {"id": 2, "name": "Bags"}]
        }))
        .unwrap()
    }

    fn products(n: i64) -> Vec<Product> {
        (1..=n)
            .map(|i| {
                serde_json::from_value(serde_json::json!({
                    "id": i,
                    "name": format!("Shoe {i}"),
                    "salePrice": 100,
                    "currentStock": 3,
                    "options": {"colour": ["Black"], "size": ["42", "43"]}
                }))
                .unwrap()
            })
            .collect()
    }

    fn session() -> Session {
        Session::new(None, Arc::new(MemoryStore::default()), None)
    }

    fn query(search: &str, page: u32) -> ProductQuery {
        ProductQuery {
            search: search.to_string(),
            categories: Vec::new(),
            page,
        }
    }

    fn listing(outcome: CatalogOutcome) -> CatalogView {
        match outcome {
            CatalogOutcome::Listing(view) => view,
            CatalogOutcome::Superseded => panic!("expected a listing"),
        }
    }

    #[test]
    fn test_sanitize_categories() {
        let kept = sanitize_categories(
            &store(),
            &[CategoryId::new(2), CategoryId::new(9), CategoryId::new(2), CategoryId::new(1)],
        );
        assert_eq!(kept, vec![CategoryId::new(2), CategoryId::new(1)]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_burst_collapses_to_one_fetch() {
        let session = session();
        let api = FakeCommerce::new().with_products(products(3));
        let debouncer = SearchDebouncer::new(Duration::from_millis(300));
        let config = CatalogConfig::default();
        let store = store();

        let first = search(&session, &api, &debouncer, &config, &store, query("s", 0));
        let second = async {
            tokio::time::sleep(Duration::from_millis(100)).await;
            search(&session, &api, &debouncer, &config, &store, query("sh", 0)).await
        };
        let (first, second) = tokio::join!(first, second);

        assert!(matches!(first.unwrap(), CatalogOutcome::Superseded));
        let view = listing(second.unwrap());
        assert_eq!(view.query.search, "sh");
        assert_eq!(view.page.content.len(), 3);
        assert_eq!(api.product_queries().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_burst_across_request_copies_of_one_session() {
        // Each HTTP request loads its own `Session` from the store; the
        // first one has not been written back when the second arrives.
        let store_backend = Arc::new(MemoryStore::default());
        let seeded = Session::new(None, store_backend.clone(), None);
        seeded.insert(session_keys::STORE_DETAILS, store()).await.unwrap();
        seeded.save().await.unwrap();
        let id = seeded.id().unwrap();

        let first_copy = Session::new(Some(id), store_backend.clone(), None);
        let second_copy = Session::new(Some(id), store_backend, None);

        let api = FakeCommerce::new().with_products(products(3));
        let debouncer = SearchDebouncer::new(Duration::from_millis(300));
        let config = CatalogConfig::default();
        let store = store();

        let first = search(&first_copy, &api, &debouncer, &config, &store, query("s", 0));
        let second = async {
            tokio::time::sleep(Duration::from_millis(5)).await;
            search(&second_copy, &api, &debouncer, &config, &store, query("sh", 0)).await
        };
        let (first, second) = tokio::join!(first, second);

        assert!(matches!(first.unwrap(), CatalogOutcome::Superseded));
        assert_eq!(listing(second.unwrap()).query.search, "sh");
        assert_eq!(api.product_queries().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unsaved_session_gets_a_channel() {
        let session = session();
        assert!(session.id().is_none());
        assert!(channel_id(&session).await.unwrap().is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_older_response_discarded_even_if_it_resolves_first() {
        let session = session();
        let api = FakeCommerce::new()
            .with_products(products(30))
            .with_products_delay(Duration::from_millis(500));
        let debouncer = SearchDebouncer::new(Duration::from_millis(300));
        let config = CatalogConfig::default();
        let store = store();

        // Search settles at 300ms and resolves at 800ms; the page change is
        // issued at 400ms and resolves at 900ms.
        let first = search(&session, &api, &debouncer, &config, &store, query("shoe", 0));
        let second = async {
            tokio::time::sleep(Duration::from_millis(400)).await;
            search(&session, &api, &debouncer, &config, &store, query("shoe", 1)).await
        };
        let (first, second) = tokio::join!(first, second);

        assert!(matches!(first.unwrap(), CatalogOutcome::Superseded));
        let view = listing(second.unwrap());
        assert_eq!(view.page.number, 1);
        assert_eq!(api.product_queries().len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_page_change_skips_debounce() {
        let session = session();
        let api = FakeCommerce::new().with_products(products(30));
        let debouncer = SearchDebouncer::new(Duration::from_millis(300));
        let config = CatalogConfig::default();
        let store = store();

        listing(search(&session, &api, &debouncer, &config, &store, query("shoe", 0)).await.unwrap());

        let start = tokio::time::Instant::now();
        let view = listing(search(&session, &api, &debouncer, &config, &store, query("shoe", 2)).await.unwrap());
        assert_eq!(start.elapsed(), Duration::ZERO);
        assert_eq!(view.page.number, 2);
        assert!(view.pagination.has_previous);
        assert!(!view.pagination.has_next);
    }

    #[tokio::test(start_paused = true)]
    async fn test_filter_change_resets_page() {
        let session = session();
        let api = FakeCommerce::new().with_products(products(30));
        let debouncer = SearchDebouncer::new(Duration::from_millis(300));
        let config = CatalogConfig::default();
        let store = store();

        listing(search(&session, &api, &debouncer, &config, &store, query("", 2)).await.unwrap());

        let mut changed = query("", 2);
        changed.categories = vec![CategoryId::new(1), CategoryId::new(99)];
        let view = listing(search(&session, &api, &debouncer, &config, &store, changed).await.unwrap());

        assert_eq!(view.query.page, 0);
        assert_eq!(view.query.categories, vec![CategoryId::new(1)]);
        let sent = api.product_queries();
        assert_eq!(sent.last().unwrap().categories, vec![CategoryId::new(1)]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_fetch_error_yields_empty_page_with_message() {
        let session = session();
        let api = FakeCommerce::new().with_products(products(3));
        api.set_quota_exceeded(true);
        let debouncer = SearchDebouncer::new(Duration::from_millis(300));

        let view = listing(
            search(&session, &api, &debouncer, &CatalogConfig::default(), &store(), query("", 0))
                .await
                .unwrap(),
        );
        assert!(view.page.content.is_empty());
        assert!(view.pagination.is_empty());
        assert_eq!(
            view.error.as_deref(),
            Some("API quota exceeded. Please try again later.")
        );
    }

    #[tokio::test]
    async fn test_product_detail_defaults() {
        let api = FakeCommerce::new().with_products(products(2));
        let detail = product_detail(&api, ProductId::new(2)).await.unwrap();
        assert_eq!(detail.default_options.get("size").map(String::as_str), Some("42"));
        assert!(detail.in_stock);
        assert_eq!(detail.max_quantity, 3);

        let missing = product_detail(&api, ProductId::new(9)).await;
        assert!(matches!(missing, Err(CommerceError::NotFound(_))));
    }
}
