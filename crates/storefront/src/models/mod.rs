//! Per-visitor state stored in the session.
//!
//! Every value is JSON-serialized by tower-sessions under one of the keys in
//! [`session_keys`]. Values are written whole after each mutation.

pub mod session;

pub use session::{keys as session_keys, load_or_default};
