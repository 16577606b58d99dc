//! Application state shared across handlers.

use std::sync::Arc;

use sqlx::PgPool;

use crate::commerce::{CommerceClient, CommerceError};
use crate::config::StorefrontConfig;
use crate::payments::PaymentMonitor;
use crate::services::SearchDebouncer;

/// Application state shared across all handlers.
///
/// This struct is cheaply cloneable via `Arc` and provides access to
/// process-wide resources. Per-visitor state lives in the session.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: StorefrontConfig,
    pool: PgPool,
    commerce: CommerceClient,
    payments: PaymentMonitor,
    debouncer: SearchDebouncer,
}

impl AppState {
    /// Create a new application state.
    ///
    /// # Arguments
    ///
    /// * `config` - Storefront configuration
    /// * `pool` - `PostgreSQL` connection pool backing the session store
    ///
    /// # Errors
    ///
    /// Returns an error if the commerce API client cannot be built.
    pub fn new(config: StorefrontConfig, pool: PgPool) -> Result<Self, CommerceError> {
        let commerce = CommerceClient::new(&config.commerce)?;
        let payments = PaymentMonitor::new(config.payments);
        let debouncer = SearchDebouncer::new(config.catalog.debounce);

        Ok(Self {
            inner: Arc::new(AppStateInner {
                config,
                pool,
                commerce,
                payments,
                debouncer,
            }),
        })
    }

    /// Get a reference to the storefront configuration.
    #[must_use]
    pub fn config(&self) -> &StorefrontConfig {
        &self.inner.config
    }

    /// Get a reference to the database connection pool.
    #[must_use]
    pub fn pool(&self) -> &PgPool {
        &self.inner.pool
    }

    /// Get a reference to the commerce API client.
    #[must_use]
    pub fn commerce(&self) -> &CommerceClient {
        &self.inner.commerce
    }

    /// Get a reference to the running payment pollers.
    #[must_use]
    pub fn payments(&self) -> &PaymentMonitor {
        &self.inner.payments
    }

    /// Get a reference to the catalog debounce channels.
    #[must_use]
    pub fn debouncer(&self) -> &SearchDebouncer {
        &self.inner.debouncer
    }
}
