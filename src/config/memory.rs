// src/config/memory.rs
// Vector index and embedding configuration

use serde::{Deserialize, Serialize};

use super::helpers;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VectorConfig {
    /// Qdrant url; unset selects the in-memory vector store (mock mode).
    pub url: Option<String>,
    pub collection: String,
}

impl VectorConfig {
    pub fn from_env() -> Self {
        Self {
            url: helpers::env_opt("QDRANT_URL"),
            collection: helpers::env_or("QDRANT_COLLECTION", "memories"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    /// "openai" or "mock".
    pub provider: String,
    pub api_key: String,
    pub model: String,
    pub base_url: String,
    /// Target vector dimension; higher-dimensional upstream output is
    /// truncated.
    pub dimension: usize,
}

impl EmbeddingConfig {
    pub fn from_env() -> Self {
        Self {
            provider: helpers::env_or("EMBEDDING_PROVIDER", "mock"),
            api_key: helpers::env_or("EMBEDDING_API_KEY", ""),
            model: helpers::env_or("EMBEDDING_MODEL", "text-embedding-3-small"),
            base_url: helpers::env_or("EMBEDDING_BASE_URL", "https://api.openai.com/v1"),
            dimension: helpers::env_parsed("EMBEDDING_DIMENSION", 768),
        }
    }
}
