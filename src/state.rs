// src/state.rs

//! Application state and bootstrap: wire the configured backends (or their
//! in-memory stand-ins) into one memory manager.

use std::sync::Arc;

use anyhow::Result;
use metrics_exporter_prometheus::PrometheusHandle;
use sqlx::SqlitePool;
use sqlx::sqlite::SqlitePoolOptions;
use tracing::{info, warn};

use crate::config::Config;
use crate::llm::{MockLlm, OpenAiChat};
use crate::memory::{
    EmbedGate, Embedder, InMemoryMetadataStore, InMemoryVectorStore, LlmClient, ManagerConfig,
    MemoryManager, MetadataStore, MockEmbedder, OpenAiEmbedder, QdrantVectorStore,
    SqliteMetadataStore, VectorStore,
};

pub struct AppState {
    pub manager: MemoryManager,
    /// Present when a real database is configured; health checks ping it.
    pub sqlite_pool: Option<SqlitePool>,
    /// Present when a real vector index is configured.
    pub qdrant: Option<Arc<QdrantVectorStore>>,
    pub prometheus: PrometheusHandle,
}

impl AppState {
    pub async fn from_config(config: &Config, prometheus: PrometheusHandle) -> Result<Arc<Self>> {
        let dimension = config.embedding.dimension;

        let (metadata_store, sqlite_pool): (Arc<dyn MetadataStore>, Option<SqlitePool>) =
            match &config.database.url {
                Some(url) => {
                    info!("connecting to database: {url}");
                    let pool = SqlitePoolOptions::new()
                        .max_connections(config.database.max_connections)
                        .connect(url)
                        .await?;
                    let store = SqliteMetadataStore::new(pool.clone());
                    store.init_schema().await?;
                    (Arc::new(store), Some(pool))
                }
                None => {
                    info!("DATABASE_URL not set, using in-memory metadata store");
                    (Arc::new(InMemoryMetadataStore::new()), None)
                }
            };

        let (vector_store, qdrant): (Arc<dyn VectorStore>, Option<Arc<QdrantVectorStore>>) =
            match &config.vector.url {
                Some(url) => {
                    info!("connecting to vector index: {url}");
                    let store = Arc::new(
                        QdrantVectorStore::new(url, &config.vector.collection, dimension).await?,
                    );
                    (store.clone() as Arc<dyn VectorStore>, Some(store))
                }
                None => {
                    info!("QDRANT_URL not set, using in-memory vector store");
                    (Arc::new(InMemoryVectorStore::new(dimension)), None)
                }
            };

        let embedder: Arc<dyn Embedder> = match config.embedding.provider.as_str() {
            "openai" if !config.embedding.api_key.is_empty() => Arc::new(OpenAiEmbedder::new(
                &config.embedding.api_key,
                &config.embedding.model,
                &config.embedding.base_url,
                dimension,
                Arc::new(EmbedGate::default()),
            )),
            "openai" => {
                warn!("EMBEDDING_API_KEY not set, falling back to the mock embedder");
                Arc::new(MockEmbedder::new(dimension))
            }
            "mock" => Arc::new(MockEmbedder::new(dimension)),
            other => anyhow::bail!("unsupported embedding provider: {other} (supported: openai, mock)"),
        };

        let llm: Arc<dyn LlmClient> = match config.llm.provider.as_str() {
            "openai" if !config.llm.api_key.is_empty() => Arc::new(OpenAiChat::new(
                &config.llm.api_key,
                &config.llm.model,
                &config.llm.base_url,
            )),
            "openai" => {
                warn!("LLM_API_KEY not set, falling back to the mock LLM client");
                Arc::new(MockLlm)
            }
            "mock" => Arc::new(MockLlm),
            other => anyhow::bail!("unsupported llm provider: {other} (supported: openai, mock)"),
        };

        let manager = MemoryManager::new(
            vector_store,
            metadata_store,
            embedder,
            llm,
            ManagerConfig::default(),
        );

        Ok(Arc::new(Self {
            manager,
            sqlite_pool,
            qdrant,
            prometheus,
        }))
    }
}
