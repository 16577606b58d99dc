//! Product route handlers.

use axum::{
    Json,
    extract::{Path, RawQuery, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use lemu_core::{CategoryId, ProductId};
use tower_sessions::Session;
use tracing::instrument;

use crate::commerce::ProductQuery;
use crate::config::CatalogConfig;
use crate::error::Result;
use crate::middleware::RequireStore;
use crate::services::catalog::{self, CatalogOutcome, ProductDetail};
use crate::state::AppState;

/// Largest page size a client may ask for.
const MAX_PAGE_SIZE: u32 = 60;

/// Listing parameters parsed from the query string.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct ListingParams {
    pub query: ProductQuery,
    pub size: Option<u32>,
}

impl ListingParams {
    /// Parse `?q=&category=&page=&size=`.
    ///
    /// `category` may repeat or hold a comma-separated list. Unparseable
    /// numbers are ignored.
    #[must_use]
    pub fn parse(raw: Option<&str>) -> Self {
        let mut params = Self::default();
        let Some(raw) = raw else {
            return params;
        };

        for (key, value) in url::form_urlencoded::parse(raw.as_bytes()) {
            match key.as_ref() {
                "q" | "search" | "filter" => params.query.search = value.into_owned(),
                "category" => params.query.categories.extend(
                    value
                        .split(',')
                        .filter_map(|id| id.trim().parse::<CategoryId>().ok()),
                ),
                "page" => params.query.page = value.parse().unwrap_or_default(),
                "size" => params.size = value.parse().ok().filter(|s| *s > 0),
                _ => {}
            }
        }
        params
    }
}

/// Product listing. Returns 204 when a newer request from the same visitor
/// replaced this one.
#[instrument(skip(state, session, store))]
pub async fn index(
    State(state): State<AppState>,
    session: Session,
    RequireStore(store): RequireStore,
    RawQuery(raw): RawQuery,
) -> Result<Response> {
    let params = ListingParams::parse(raw.as_deref());
    let config = CatalogConfig {
        page_size: params
            .size
            .map_or(state.config().catalog.page_size, |s| s.min(MAX_PAGE_SIZE)),
        ..state.config().catalog
    };

    let outcome = catalog::search(
        &session,
        state.commerce(),
        state.debouncer(),
        &config,
        &store,
        params.query,
    )
    .await?;

    Ok(match outcome {
        CatalogOutcome::Listing(view) => Json(view).into_response(),
        CatalogOutcome::Superseded => StatusCode::NO_CONTENT.into_response(),
    })
}

/// Product detail.
#[instrument(skip(state))]
pub async fn show(State(state): State<AppState>, Path(id): Path<ProductId>) -> Result<Json<ProductDetail>> {
    Ok(Json(catalog::product_detail(state.commerce(), id).await?))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_listing_params() {
        let params = ListingParams::parse(Some("q=red+shoe&category=1&category=2,3&page=2&size=24"));
        assert_eq!(params.query.search, "red shoe");
        assert_eq!(
            params.query.categories,
            vec![CategoryId::new(1), CategoryId::new(2), CategoryId::new(3)]
        );
        assert_eq!(params.query.page, 2);
        assert_eq!(params.size, Some(24));
    }

    #[test]
    fn test_parse_listing_params_ignores_junk() {
        let params = ListingParams::parse(Some("category=abc&page=-1&size=0&utm=x"));
        assert_eq!(params, ListingParams::default());
        assert_eq!(ListingParams::parse(None), ListingParams::default());
    }
}
