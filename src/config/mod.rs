// src/config/mod.rs
// Central configuration, env-first. Loaded once in main and passed
// explicitly; `.env` files are picked up by dotenvy before this runs.

pub mod helpers;
pub mod llm;
pub mod memory;
pub mod server;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub server: server::ServerConfig,
    pub database: server::DatabaseConfig,
    pub vector: memory::VectorConfig,
    pub llm: llm::LlmConfig,
    pub embedding: memory::EmbeddingConfig,
}

impl Config {
    pub fn from_env() -> Self {
        Self {
            server: server::ServerConfig::from_env(),
            database: server::DatabaseConfig::from_env(),
            vector: memory::VectorConfig::from_env(),
            llm: llm::LlmConfig::from_env(),
            embedding: memory::EmbeddingConfig::from_env(),
        }
    }
}
