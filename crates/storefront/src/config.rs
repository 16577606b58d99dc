//! Storefront configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `STOREFRONT_DATABASE_URL` - `PostgreSQL` connection string for the session
//!   store (falls back to `DATABASE_URL`)
//!
//! ## Optional
//! - `STOREFRONT_HOST` - Bind address (default: 127.0.0.1)
//! - `STOREFRONT_PORT` - Listen port (default: 3000)
//! - `STOREFRONT_BASE_URL` - Public URL (default: <http://localhost:3000>)
//! - `LEMU_API_BASE_URL` - Commerce API base (default: <https://paymentsapi.lemuapps.com/lemu/api/v1>)
//! - `LEMU_TENANT_ID` - Platform tenant header value (default: lemu)
//! - `LEMU_DEFAULT_SUBDOMAIN` - Store used for localhost and bare domains (default: nexor)
//! - `LEMU_PAYMENT_CHECKOUT_URL` - Hosted payment page (default: <https://payments.lemuapps.com/payments/checkout/>)
//! - `LEMU_API_TIMEOUT_SECS` - Commerce API request timeout (default: 15)
//! - `PAYMENT_POLL_INTERVAL_MS` - Payment status poll interval (default: 1000)
//! - `PAYMENT_POLL_DEADLINE_SECS` - Payment confirmation deadline (default: 60)
//! - `CATALOG_DEBOUNCE_MS` - Search-as-you-type quiet window (default: 300)
//! - `CATALOG_PAGE_SIZE` - Products per page (default: 12)
//! - `SENTRY_DSN` - Sentry error tracking DSN
//! - `SENTRY_ENVIRONMENT` - Sentry environment name
//! - `SENTRY_SAMPLE_RATE` - Error sample rate (default: 1.0)
//! - `SENTRY_TRACES_SAMPLE_RATE` - Transaction sample rate (default: 0.0)

use std::net::{IpAddr, SocketAddr};
use std::str::FromStr;
use std::time::Duration;

use secrecy::SecretString;
use thiserror::Error;
use url::Url;

/// Domain the hosted payment page must live on.
pub const PAYMENT_DOMAIN: &str = "lemuapps.com";

const DEFAULT_API_BASE_URL: &str = "https://paymentsapi.lemuapps.com/lemu/api/v1";
const DEFAULT_PAYMENT_CHECKOUT_URL: &str = "https://payments.lemuapps.com/payments/checkout/";

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
}

/// Storefront application configuration.
#[derive(Debug, Clone)]
pub struct StorefrontConfig {
    /// `PostgreSQL` database connection URL (contains password)
    pub database_url: SecretString,
    /// IP address to bind the server to
    pub host: IpAddr,
    /// Port to listen on
    pub port: u16,
    /// Public base URL for the storefront
    pub base_url: String,
    /// Subdomain used when the request host carries none
    pub default_subdomain: String,
    /// Lemu commerce API configuration
    pub commerce: CommerceConfig,
    /// Payment confirmation polling
    pub payments: PaymentPollConfig,
    /// Catalog search behaviour
    pub catalog: CatalogConfig,
    /// Sentry DSN for error tracking
    pub sentry_dsn: Option<String>,
    /// Sentry environment name
    pub sentry_environment: Option<String>,
    /// Fraction of errors sent to Sentry
    pub sentry_sample_rate: f32,
    /// Fraction of transactions traced
    pub sentry_traces_sample_rate: f32,
}

/// Lemu commerce API configuration.
#[derive(Debug, Clone)]
pub struct CommerceConfig {
    /// Base URL all API paths are joined onto
    pub api_base_url: Url,
    /// Value of the `Lemu-Platform-TenantId` header
    pub tenant_id: String,
    /// Hosted payment page; `?orderId=` is appended per order
    pub payment_checkout_url: Url,
    /// Per-request timeout
    pub request_timeout: Duration,
}

impl Default for CommerceConfig {
    #[allow(clippy::unwrap_used)] // URLs are compile-time constants
    fn default() -> Self {
        Self {
            api_base_url: Url::parse(DEFAULT_API_BASE_URL).unwrap(),
            tenant_id: "lemu".to_string(),
            payment_checkout_url: Url::parse(DEFAULT_PAYMENT_CHECKOUT_URL).unwrap(),
            request_timeout: Duration::from_secs(15),
        }
    }
}

/// Payment confirmation polling schedule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PaymentPollConfig {
    /// Time between status queries
    pub interval: Duration,
    /// Absolute deadline measured from the start of polling
    pub deadline: Duration,
}

impl Default for PaymentPollConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(1),
            deadline: Duration::from_secs(60),
        }
    }
}

/// Catalog search configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CatalogConfig {
    /// Quiet window before a search-as-you-type request is sent upstream
    pub debounce: Duration,
    /// Products per page
    pub page_size: u32,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            debounce: Duration::from_millis(300),
            page_size: 12,
        }
    }
}

impl StorefrontConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing or invalid.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let database_url = get_database_url("STOREFRONT_DATABASE_URL")?;
        let host = get_parsed_env("STOREFRONT_HOST", "127.0.0.1")?;
        let port = get_parsed_env("STOREFRONT_PORT", "3000")?;
        let base_url = get_env_or_default("STOREFRONT_BASE_URL", "http://localhost:3000");
        let default_subdomain = get_env_or_default("LEMU_DEFAULT_SUBDOMAIN", "nexor");

        Ok(Self {
            database_url,
            host,
            port,
            base_url,
            default_subdomain,
            commerce: CommerceConfig::from_env()?,
            payments: PaymentPollConfig::from_env()?,
            catalog: CatalogConfig::from_env()?,
            sentry_dsn: get_optional_env("SENTRY_DSN"),
            sentry_environment: get_optional_env("SENTRY_ENVIRONMENT"),
            sentry_sample_rate: get_parsed_env("SENTRY_SAMPLE_RATE", "1.0")?,
            sentry_traces_sample_rate: get_parsed_env("SENTRY_TRACES_SAMPLE_RATE", "0.0")?,
        })
    }

    /// Returns the socket address for binding the server.
    #[must_use]
    pub const fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }

    /// Whether cookies should carry the `Secure` attribute.
    #[must_use]
    pub fn is_secure(&self) -> bool {
        self.base_url.starts_with("https://")
    }
}

impl CommerceConfig {
    /// Load the commerce API settings alone.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if a URL or timeout is invalid.
    pub fn from_env() -> Result<Self, ConfigError> {
        let api_base_url = get_url("LEMU_API_BASE_URL", DEFAULT_API_BASE_URL)?;
        let payment_checkout_url = get_url("LEMU_PAYMENT_CHECKOUT_URL", DEFAULT_PAYMENT_CHECKOUT_URL)?;
        validate_payment_url(&payment_checkout_url, "LEMU_PAYMENT_CHECKOUT_URL")?;

        Ok(Self {
            api_base_url,
            tenant_id: get_env_or_default("LEMU_TENANT_ID", "lemu"),
            payment_checkout_url,
            request_timeout: Duration::from_secs(get_parsed_env("LEMU_API_TIMEOUT_SECS", "15")?),
        })
    }

    /// Hosted payment page URL for an order.
    #[must_use]
    pub fn payment_url(&self, order_id: lemu_core::OrderId) -> Url {
        let mut url = self.payment_checkout_url.clone();
        url.query_pairs_mut()
            .append_pair("orderId", &order_id.to_string());
        url
    }
}

impl PaymentPollConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let interval = Duration::from_millis(get_parsed_env("PAYMENT_POLL_INTERVAL_MS", "1000")?);
        let deadline = Duration::from_secs(get_parsed_env("PAYMENT_POLL_DEADLINE_SECS", "60")?);

        if interval.is_zero() {
            return Err(ConfigError::InvalidEnvVar(
                "PAYMENT_POLL_INTERVAL_MS".to_string(),
                "must be greater than zero".to_string(),
            ));
        }
        if deadline < interval {
            return Err(ConfigError::InvalidEnvVar(
                "PAYMENT_POLL_DEADLINE_SECS".to_string(),
                "must not be shorter than the poll interval".to_string(),
            ));
        }

        Ok(Self { interval, deadline })
    }
}

impl CatalogConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let page_size: u32 = get_parsed_env("CATALOG_PAGE_SIZE", "12")?;
        if page_size == 0 {
            return Err(ConfigError::InvalidEnvVar(
                "CATALOG_PAGE_SIZE".to_string(),
                "must be greater than zero".to_string(),
            ));
        }

        Ok(Self {
            debounce: Duration::from_millis(get_parsed_env("CATALOG_DEBOUNCE_MS", "300")?),
            page_size,
        })
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Get database URL with fallback to generic `DATABASE_URL`.
fn get_database_url(primary_key: &str) -> Result<SecretString, ConfigError> {
    if let Ok(value) = std::env::var(primary_key) {
        return Ok(SecretString::from(value));
    }
    if let Ok(value) = std::env::var("DATABASE_URL") {
        return Ok(SecretString::from(value));
    }
    Err(ConfigError::MissingEnvVar(primary_key.to_string()))
}

/// Get an optional environment variable.
fn get_optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.is_empty())
}

/// Get an environment variable with a default value.
fn get_env_or_default(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

/// Parse an environment variable, falling back to `default` when unset.
fn get_parsed_env<T>(key: &str, default: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    get_env_or_default(key, default)
        .trim()
        .parse::<T>()
        .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))
}

/// Parse a URL environment variable.
fn get_url(key: &str, default: &str) -> Result<Url, ConfigError> {
    get_parsed_env(key, default)
}

/// The hosted payment page must be served from the payments domain.
fn validate_payment_url(url: &Url, var_name: &str) -> Result<(), ConfigError> {
    let allowed = url.host_str().is_some_and(is_payment_host);
    if allowed {
        Ok(())
    } else {
        Err(ConfigError::InvalidEnvVar(
            var_name.to_string(),
            format!("host must be {PAYMENT_DOMAIN} or one of its subdomains"),
        ))
    }
}

/// Whether `host` is the payments domain or a subdomain of it.
#[must_use]
pub fn is_payment_host(host: &str) -> bool {
    host == PAYMENT_DOMAIN
        || host
            .strip_suffix(PAYMENT_DOMAIN)
            .is_some_and(|prefix| prefix.ends_with('.'))
}
