//! Lemu Storefront library.
//!
//! Headless storefront backend for Lemu stores: a JSON API over per-visitor
//! session state and the remote Lemu commerce API. Provided as a library so
//! the router can be tested in-process.

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod checkout;
pub mod commerce;
pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod models;
pub mod payments;
pub mod routes;
pub mod services;
pub mod state;
pub mod tenant;
