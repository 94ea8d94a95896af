// src/config/server.rs
// Server and database configuration

use serde::{Deserialize, Serialize};

use super::helpers;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// "debug" or "release"; release quiets the default log level.
    pub mode: String,
}

impl ServerConfig {
    pub fn from_env() -> Self {
        Self {
            host: helpers::env_or("SERVER_HOST", "0.0.0.0"),
            port: helpers::env_parsed("SERVER_PORT", 8080),
            mode: helpers::env_or("SERVER_MODE", "debug"),
        }
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// SQLite url; unset selects the in-memory metadata store (mock mode).
    pub url: Option<String>,
    pub max_connections: u32,
}

impl DatabaseConfig {
    pub fn from_env() -> Self {
        Self {
            url: helpers::env_opt("DATABASE_URL"),
            max_connections: helpers::env_parsed("DATABASE_MAX_CONNECTIONS", 5),
        }
    }
}
