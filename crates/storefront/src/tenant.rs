//! Tenant resolution from the request host.
//!
//! Each store is served from its own subdomain of the platform domain, e.g.
//! `nexor.lemuapps.com`. Local development hosts have no subdomain and fall
//! back to the configured default store.

use axum::extract::FromRequestParts;
use axum::http::header::HOST;
use axum::http::request::Parts;

use crate::state::AppState;

/// Header set by reverse proxies carrying the original host.
const FORWARDED_HOST: &str = "x-forwarded-host";

/// DNS label: 1-63 of `[a-z0-9-]`, no leading or trailing hyphen.
fn is_hostname_label(label: &str) -> bool {
    (1..=63).contains(&label.len())
        && !label.starts_with('-')
        && !label.ends_with('-')
        && label
            .bytes()
            .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'-')
}

/// Subdomain for `host`, or `None` when the host carries none.
///
/// The subdomain is every label except the last two: `shop.lemuapps.com`
/// gives `shop`, `a.b.lemuapps.com` gives `a.b`. Ports are ignored, as are
/// `localhost` and `127.0.0.*`. A host with any label outside the hostname
/// character set has no subdomain; the result is safe to use in a URL path.
#[must_use]
pub fn subdomain_of(host: &str) -> Option<String> {
    let host = host.trim().trim_end_matches('.');
    let host = host.rsplit_once(':').map_or(host, |(name, port)| {
        if port.chars().all(|c| c.is_ascii_digit()) { name } else { host }
    });
    let host = host.to_ascii_lowercase();

    if host.is_empty() || host == "localhost" || host.starts_with("127.0.0.") {
        return None;
    }

    let labels: Vec<&str> = host.split('.').collect();
    if labels.len() <= 2 || !labels.iter().all(|l| is_hostname_label(l)) {
        return None;
    }

    labels.get(..labels.len() - 2).map(|sub| sub.join("."))
}

/// Subdomain for `host`, falling back to `default`.
#[must_use]
pub fn resolve_subdomain(host: Option<&str>, default: &str) -> String {
    host.and_then(subdomain_of)
        .unwrap_or_else(|| default.to_string())
}

/// The store subdomain this request is for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tenant(pub String);

impl Tenant {
    #[must_use]
    pub fn subdomain(&self) -> &str {
        &self.0
    }

    /// Tenant for request headers, preferring the proxy's forwarded host.
    #[must_use]
    pub fn from_parts(parts: &Parts, default: &str) -> Self {
        let host = parts
            .headers
            .get(FORWARDED_HOST)
            .or_else(|| parts.headers.get(HOST))
            .and_then(|v| v.to_str().ok())
            .or_else(|| parts.uri.host());
        Self(resolve_subdomain(host, default))
    }
}

impl FromRequestParts<AppState> for Tenant {
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        if let Some(tenant) = parts.extensions.get::<Self>() {
            return Ok(tenant.clone());
        }
        Ok(Self::from_parts(parts, &state.config().default_subdomain))
    }
}
