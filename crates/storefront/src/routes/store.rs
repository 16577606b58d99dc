//! Store route handlers.

use axum::{Json, extract::State};
use serde::Serialize;
use tower_sessions::Session;
use tracing::instrument;

use crate::commerce::StoreConfig;
use crate::services::store_config::{self, StoreBranding, StoreConfigState};
use crate::state::AppState;
use crate::tenant::Tenant;

/// Store state for the UI shell.
///
/// Always returned with 200: a failed resolution carries the fallback
/// branding and a message instead of an error status.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StoreResponse {
    pub subdomain: String,
    pub store: Option<StoreConfig>,
    pub error: Option<String>,
    pub branding: StoreBranding,
    /// `:root` rule setting the theme colour variable.
    pub theme_css: String,
}

/// Resolve the store for this tenant.
#[instrument(skip(state, session))]
pub async fn show(State(state): State<AppState>, tenant: Tenant, session: Session) -> Json<StoreResponse> {
    let resolved = store_config::resolve(&session, state.commerce(), tenant.subdomain()).await;
    let branding = StoreBranding::for_state(&resolved);
    let theme_css = branding.theme.css();

    let (store, error) = match resolved {
        StoreConfigState::Ready(store) => (Some(store), None),
        StoreConfigState::Failed { message } => (None, Some(message)),
    };

    Json(StoreResponse {
        subdomain: tenant.0,
        store,
        error,
        branding,
        theme_css,
    })
}
