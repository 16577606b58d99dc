//! CLI subcommand implementations.

pub mod migrate;
pub mod store;
