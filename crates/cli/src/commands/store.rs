//! Store lookup against the commerce API.
//!
//! # Usage
//!
//! ```bash
//! lemu-cli store nexor
//! lemu-cli store nexor --products
//! ```
//!
//! Prints the store details (and optionally the first page of products) as
//! JSON. Useful for checking a tenant's configuration and the API quota
//! without going through the storefront.

use lemu_storefront::commerce::{CommerceApi, CommerceClient, CommerceError, ProductQuery};
use lemu_storefront::config::{CatalogConfig, CommerceConfig, ConfigError};

/// Errors from the store command.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Commerce(#[from] CommerceError),

    #[error("Could not render JSON: {0}")]
    Json(#[from] serde_json::Error),
}

/// Look up a store by subdomain and print it.
///
/// # Errors
///
/// Returns an error if configuration is invalid or either request fails.
pub async fn show(subdomain: &str, products: bool) -> Result<(), StoreError> {
    let _ = dotenvy::dotenv();
    let config = CommerceConfig::from_env()?;
    let client = CommerceClient::new(&config)?;

    tracing::info!(subdomain, api = %config.api_base_url, "Looking up store");

    let store = client.store_details(subdomain).await?;
    print_json(&store)?;

    if products {
        let page = client
            .store_products(store.store_id, &ProductQuery::default(), CatalogConfig::default().page_size)
            .await?;
        tracing::info!(
            total = page.total_elements,
            pages = page.total_pages,
            "Fetched first product page"
        );
        print_json(&page)?;
    }

    Ok(())
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<(), StoreError> {
    let text = serde_json::to_string_pretty(value)?;
    #[allow(clippy::print_stdout)]
    {
        println!("{text}");
    }
    Ok(())
}
