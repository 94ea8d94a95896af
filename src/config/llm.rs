// src/config/llm.rs
// LLM provider configuration

use serde::{Deserialize, Serialize};

use super::helpers;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    /// "openai" or "mock".
    pub provider: String,
    pub api_key: String,
    pub model: String,
    pub base_url: String,
}

impl LlmConfig {
    pub fn from_env() -> Self {
        Self {
            provider: helpers::env_or("LLM_PROVIDER", "mock"),
            api_key: helpers::env_or("LLM_API_KEY", ""),
            model: helpers::env_or("LLM_MODEL", "gpt-4o-mini"),
            base_url: helpers::env_or("LLM_BASE_URL", "https://api.openai.com/v1"),
        }
    }
}
