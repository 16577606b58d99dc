//! Store extractor.
//!
//! Resolves the tenant's store configuration through the session cache and
//! hands it to handlers that cannot work without one.

use axum::{extract::FromRequestParts, http::request::Parts};
use tower_sessions::Session;

use crate::commerce::StoreConfig;
use crate::error::AppError;
use crate::services::store_config::{self, StoreConfigState};
use crate::state::AppState;
use crate::tenant::Tenant;

/// Extractor that requires a resolved store.
///
/// # Example
///
/// ```rust,ignore
/// async fn handler(RequireStore(store): RequireStore) -> String {
///     store.store_name
/// }
/// ```
pub struct RequireStore(pub StoreConfig);

impl FromRequestParts<AppState> for RequireStore {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        // Get the session from extensions (set by SessionManagerLayer)
        let session = parts
            .extensions
            .get::<Session>()
            .cloned()
            .ok_or_else(|| AppError::Internal("session layer missing".to_string()))?;
        let Ok(tenant) = Tenant::from_request_parts(parts, state).await;

        match store_config::resolve(&session, state.commerce(), tenant.subdomain()).await {
            StoreConfigState::Ready(store) => Ok(Self(store)),
            StoreConfigState::Failed { message } => Err(AppError::StoreUnavailable(message)),
        }
    }
}
