//! I/O helpers for pipeline commands.

pub mod config;
pub mod document;
pub mod manifest_store;
pub mod probe;
pub mod run_store;
pub mod schema;
pub mod templates;
