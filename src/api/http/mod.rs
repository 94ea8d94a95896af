// src/api/http/mod.rs

pub mod health;
pub mod memory;
pub mod recall;
pub mod router;

pub use router::http_router;
