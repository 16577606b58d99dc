//! Core types for the Lemu storefront.
//!
//! This module provides type-safe wrappers for common domain concepts.

pub mod email;
pub mod id;
pub mod money;
pub mod phone;
pub mod status;

pub use email::{Email, EmailError};
pub use id::*;
pub use money::{Money, format_money};
pub use phone::{PhoneError, PhoneNumber};
pub use status::*;
