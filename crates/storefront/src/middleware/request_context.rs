//! Request context middleware for tracing and correlation.
//!
//! Generates a UUID v4 for each request if not provided by an upstream proxy
//! (e.g., Cloudflare, load balancer) and resolves the tenant from the host.
//! Both are:
//! - Recorded in the current tracing span
//! - Added to the Sentry scope for error correlation
//!
//! The request ID is also returned in the response headers, and the
//! [`Tenant`] is stored in request extensions for handlers.

use axum::{
    extract::{Request, State},
    http::HeaderValue,
    middleware::Next,
    response::Response,
};
use tracing::Span;
use uuid::Uuid;

use crate::state::AppState;
use crate::tenant::Tenant;

/// The HTTP header name for request IDs.
pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Middleware that tags every request with a request ID and its tenant.
///
/// If the incoming request has an `x-request-id` header, that value is used.
/// Otherwise, a new UUID v4 is generated.
pub async fn request_context_middleware(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    let request_id = request
        .headers()
        .get(REQUEST_ID_HEADER)
        .and_then(|h| h.to_str().ok())
        .map_or_else(|| Uuid::new_v4().to_string(), String::from);

    let (mut parts, body) = request.into_parts();
    let tenant = Tenant::from_parts(&parts, &state.config().default_subdomain);

    // Record in current span for structured logging
    let span = Span::current();
    span.record("request_id", &request_id);
    span.record("tenant", tenant.subdomain());

    // Set in Sentry scope for error correlation
    sentry::configure_scope(|scope| {
        scope.set_tag("request_id", &request_id);
        scope.set_tag("tenant", tenant.subdomain());
    });

    parts.extensions.insert(tenant);
    let mut response = next.run(Request::from_parts(parts, body)).await;

    // Add to response headers so clients can reference the request ID
    if let Ok(value) = HeaderValue::from_str(&request_id) {
        response.headers_mut().insert(REQUEST_ID_HEADER, value);
    }

    response
}
