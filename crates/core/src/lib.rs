//! Lemu Core - Shared domain types for the Lemu storefront.
//!
//! This crate provides the types used across all storefront components:
//! - `storefront` - Public-facing storefront server
//! - `cli` - Operational commands
//!
//! # Architecture
//!
//! The core crate contains only types and pure logic - no I/O, no session
//! access, no HTTP clients. Cart arithmetic, pagination windows and form
//! validation live here so they can be tested without a runtime.
//!
//! # Modules
//!
//! - [`types`] - Newtype wrappers for IDs, money, emails, phones and statuses
//! - [`cart`] - Cart line items and quantity arithmetic
//! - [`pagination`] - Page link windowing for catalog listings
//! - [`validation`] - Checkout form validation

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod cart;
pub mod pagination;
pub mod types;
pub mod validation;

pub use cart::{Cart, CartError, CartLineItem, CartTotals, check_quantity};
pub use pagination::{PageLink, PageWindow};
pub use types::*;
pub use validation::{
    CardForm, CardSummary, FieldErrors, MpesaForm, PICKUP_LOCATIONS, PersonalInfo, PersonalInfoForm,
};
