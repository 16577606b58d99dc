//! HTTP middleware stack for storefront.
//!
//! # Middleware Order (bottom to top in Router)
//!
//! 1. Sentry layer (capture errors)
//! 2. `TraceLayer` (request tracing)
//! 3. Request context (request ID and tenant)
//! 4. Session layer (tower-sessions)

pub mod request_context;
pub mod session;
pub mod store;

pub use request_context::{REQUEST_ID_HEADER, request_context_middleware};
pub use session::{SESSION_COOKIE_NAME, session_layer};
pub use store::RequireStore;
