// src/api/mod.rs
// HTTP API: a thin request-to-manager-call adapter

pub mod error;
pub mod http;

pub use http::http_router;
