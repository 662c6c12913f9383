//! Shared building blocks for the food inventory service binaries:
//! logging setup, runtime environment checks, the admin listener and
//! small response types.

pub mod types;
pub mod utils;
pub mod env;
pub mod admin_http;
