//! Store Config Resolver.
//!
//! Resolves the tenant's store configuration once per visitor session: the
//! first successful fetch is cached in the session and every later request
//! is served from there without touching the network. Failures are never
//! cached, so the next page load retries.

use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;
use tower_sessions::Session;
use tracing::instrument;

use crate::commerce::{CommerceApi, StoreConfig};
use crate::models::session_keys;

/// CSS custom property the storefront UI reads its accent colour from.
pub const THEME_VARIABLE: &str = "--shop-theme-color";

/// Theme colour used when the store has none or it is not a valid colour.
pub const DEFAULT_THEME_COLOR: &str = "#003049";

const FALLBACK_STORE_NAME: &str = "Lemu Store";
const FALLBACK_CURRENCY_SYMBOL: &str = "KSh";

/// Hex colours, named colours and rgb()/hsl() functions. Anything else
/// could break out of the declaration.
static CSS_COLOR: LazyLock<Regex> = LazyLock::new(|| {
    #[allow(clippy::unwrap_used)] // pattern is a compile-time constant
    Regex::new(r"^(#[0-9a-fA-F]{3,8}|[a-zA-Z]{3,20}|(rgb|rgba|hsl|hsla)\([0-9.,%\s]+\))$").unwrap()
});

/// Outcome of resolving the store for this visitor.
#[derive(Debug, Clone, PartialEq)]
pub enum StoreConfigState {
    /// The store is known.
    Ready(StoreConfig),
    /// Resolution failed; the UI should degrade to [`StoreBranding::fallback`].
    Failed { message: String },
}

impl StoreConfigState {
    #[must_use]
    pub const fn store(&self) -> Option<&StoreConfig> {
        match self {
            Self::Ready(store) => Some(store),
            Self::Failed { .. } => None,
        }
    }
}

/// Resolve the store for `subdomain`, preferring the session copy.
#[instrument(skip(session, api))]
pub async fn resolve<A: CommerceApi>(session: &Session, api: &A, subdomain: &str) -> StoreConfigState {
    match session.get::<StoreConfig>(session_keys::STORE_DETAILS).await {
        Ok(Some(store)) => return StoreConfigState::Ready(store),
        Ok(None) => {}
        Err(e) => tracing::warn!(error = %e, "Discarding unreadable store details"),
    }

    match api.store_details(subdomain).await {
        Ok(store) => {
            if let Err(e) = session.insert(session_keys::STORE_DETAILS, &store).await {
                tracing::warn!(error = %e, "Failed to cache store details in session");
            }
            StoreConfigState::Ready(store)
        }
        Err(e) => {
            tracing::warn!(error = %e, "Store details unavailable");
            StoreConfigState::Failed {
                message: e.user_message("Failed to fetch store details"),
            }
        }
    }
}

// =============================================================================
// Theme & branding
// =============================================================================

/// The store's accent colour, ready to apply to global styles.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ThemeStyle {
    pub color: String,
}

impl ThemeStyle {
    /// Theme for a store, falling back to the default colour.
    #[must_use]
    pub fn from_config(store: Option<&StoreConfig>) -> Self {
        let color = store
            .and_then(|s| s.custom_color.as_deref())
            .map(str::trim)
            .filter(|c| CSS_COLOR.is_match(c))
            .unwrap_or(DEFAULT_THEME_COLOR);
        Self {
            color: color.to_string(),
        }
    }

    /// The custom property declaration, e.g. `--shop-theme-color: #003049;`.
    #[must_use]
    pub fn declaration(&self) -> String {
        format!("{THEME_VARIABLE}: {};", self.color)
    }

    /// A `:root` rule the UI can inject as-is.
    #[must_use]
    pub fn css(&self) -> String {
        format!(":root {{ {} }}", self.declaration())
    }
}

/// Store identity shown in headers and price labels.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StoreBranding {
    pub store_name: String,
    pub currency_symbol: String,
    pub logo: Option<String>,
    pub theme: ThemeStyle,
}

impl StoreBranding {
    /// Degraded identity used when the store could not be resolved.
    #[must_use]
    pub fn fallback() -> Self {
        Self {
            store_name: FALLBACK_STORE_NAME.to_string(),
            currency_symbol: FALLBACK_CURRENCY_SYMBOL.to_string(),
            logo: None,
            theme: ThemeStyle::from_config(None),
        }
    }

    /// Branding for a resolution outcome.
    #[must_use]
    pub fn for_state(state: &StoreConfigState) -> Self {
        match state {
            StoreConfigState::Ready(store) => Self::from_config(store),
            StoreConfigState::Failed { .. } => Self::fallback(),
        }
    }

    fn from_config(store: &StoreConfig) -> Self {
        let fallback = Self::fallback();
        Self {
            store_name: non_empty(&store.store_name).unwrap_or(fallback.store_name),
            currency_symbol: non_empty(&store.currency_symbol).unwrap_or(fallback.currency_symbol),
            logo: store.logo.clone().filter(|l| !l.trim().is_empty()),
            theme: ThemeStyle::from_config(Some(store)),
        }
    }
}

fn non_empty(value: &str) -> Option<String> {
    let trimmed = value.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}
