//! Business logic services for the storefront.
//!
//! Each service works on one visitor's session plus, where needed, the
//! commerce API behind [`crate::commerce::CommerceApi`].
//!
//! # Services
//!
//! - [`cart`] - Cart Store persisted in the session
//! - [`store_config`] - Store Config Resolver and theme
//! - [`catalog`] - Product listing with server-side debounce

pub mod cart;
pub mod catalog;
pub mod store_config;

pub use cart::{CartStore, CartStoreError};
pub use catalog::{CatalogOutcome, CatalogView, ProductDetail, SearchDebouncer};
pub use store_config::{StoreBranding, StoreConfigState, ThemeStyle};
