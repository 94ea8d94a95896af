// src/memory/service/mod.rs

//! The memory manager: orchestrates the embedder, vector index, metadata
//! store and LLM behind one API. Create is a dual-write with graceful
//! degradation; the metadata store is the durable authority and the vector
//! index a derived, lossy cache.

pub mod distill;
pub mod recall;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::memory::core::error::MemoryError;
use crate::memory::core::traits::{Embedder, LlmClient, MetadataStore, VectorStore};
use crate::memory::core::types::Memory;
use crate::metrics;

#[derive(Debug, Clone)]
pub struct ManagerConfig {
    /// Attempts for the rate-limit-aware embedding retry loop.
    pub embed_max_retries: u32,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self { embed_max_retries: 3 }
    }
}

pub struct MemoryManager {
    vector_store: Arc<dyn VectorStore>,
    metadata_store: Arc<dyn MetadataStore>,
    embedder: Arc<dyn Embedder>,
    llm: Arc<dyn LlmClient>,
    config: ManagerConfig,
}

impl MemoryManager {
    pub fn new(
        vector_store: Arc<dyn VectorStore>,
        metadata_store: Arc<dyn MetadataStore>,
        embedder: Arc<dyn Embedder>,
        llm: Arc<dyn LlmClient>,
        config: ManagerConfig,
    ) -> Self {
        Self {
            vector_store,
            metadata_store,
            embedder,
            llm,
            config,
        }
    }

    pub fn llm(&self) -> &Arc<dyn LlmClient> {
        &self.llm
    }

    pub fn metadata_store(&self) -> &Arc<dyn MetadataStore> {
        &self.metadata_store
    }

    /// Create a record in its layer. Writes are ordered embed → vector →
    /// metadata; an embedding or vector-index failure degrades to a
    /// metadata-only write (the record stays retrievable by id and session,
    /// just not by similarity), while a metadata failure is an error.
    pub async fn create_memory(&self, mut memory: Memory) -> Result<Memory, MemoryError> {
        if memory.user_id.is_empty() {
            return Err(MemoryError::Validation("user_id must not be empty".into()));
        }
        if memory.content.is_empty() {
            return Err(MemoryError::Validation("content must not be empty".into()));
        }

        memory.id = Uuid::new_v4().to_string();
        let now = Utc::now();
        memory.created_at = now;
        memory.updated_at = now;
        memory.last_accessed = now;
        memory.access_count = 0;
        if memory.importance == 0.0 {
            memory.importance = memory.layer.default_importance();
        }

        match self.embed_with_retry(&memory.content).await {
            Ok(embedding) => {
                memory.embedding = Some(embedding);
                if let Err(e) = self.vector_store.insert(&memory).await {
                    warn!("degraded write: vector index insert failed, keeping metadata only: {e:#}");
                    ::metrics::counter!(metrics::DEGRADED_WRITES).increment(1);
                }
            }
            Err(e) => {
                warn!("degraded write: embedding failed, keeping metadata only: {e}");
                ::metrics::counter!(metrics::DEGRADED_WRITES).increment(1);
                memory.embedding = None;
            }
        }

        self.metadata_store
            .insert(&memory)
            .await
            .map_err(MemoryError::MetadataStore)?;

        ::metrics::counter!(metrics::MEMORIES_CREATED, "layer" => memory.layer.as_str()).increment(1);
        debug!("created {} memory {}", memory.layer, memory.id);
        Ok(memory)
    }

    /// Flat vector search across all layers. Deliberately not scoped by
    /// user, matching the long-standing behavior callers depend on.
    pub async fn search_memory(&self, query: &str, top_k: usize) -> Result<Vec<Memory>, MemoryError> {
        if query.is_empty() {
            return Err(MemoryError::Validation("query must not be empty".into()));
        }
        if top_k == 0 {
            return Err(MemoryError::Validation("top_k must be at least 1".into()));
        }
        let top_k = top_k.min(100);

        // No retry wrapper here: a query embedding failure surfaces directly.
        let embedding = self
            .embedder
            .embed(query)
            .await
            .map_err(|e| MemoryError::Embedding { attempts: 1, source: e })?;

        let results = self
            .vector_store
            .search(&embedding, top_k, &HashMap::new())
            .await
            .map_err(MemoryError::VectorStore)?;

        ::metrics::counter!(metrics::MEMORY_SEARCHES).increment(1);
        self.touch_access_info(&results);
        Ok(results)
    }

    /// Fetch one record by id, probing the layer partitions.
    pub async fn get_memory(&self, id: &str) -> Result<Memory, MemoryError> {
        let memory = self
            .metadata_store
            .get(id)
            .await
            .map_err(MemoryError::MetadataStore)?
            .ok_or_else(|| MemoryError::NotFound(id.to_string()))?;
        self.touch_access_info(std::slice::from_ref(&memory));
        Ok(memory)
    }

    /// Remove a record from both backends. The vector side is best-effort;
    /// the metadata delete locates the correct partition.
    pub async fn delete_memory(&self, id: &str) -> Result<(), MemoryError> {
        if let Err(e) = self.vector_store.delete(id).await {
            warn!("vector delete failed for {id}: {e:#}");
        }
        self.metadata_store
            .delete(id)
            .await
            .map_err(MemoryError::MetadataStore)
    }

    /// Fire-and-forget access bookkeeping. Failures are swallowed: they
    /// must never affect a read, and counts may be lost under cancellation.
    pub(crate) fn touch_access_info(&self, memories: &[Memory]) {
        let now = Utc::now();
        for memory in memories {
            let store = Arc::clone(&self.metadata_store);
            let id = memory.id.clone();
            tokio::spawn(async move {
                if let Err(e) = store.update_access_info(&id, now).await {
                    debug!("access info update failed for {id}: {e:#}");
                }
            });
        }
    }

    /// Embed with backoff on upstream rate limits (403/429). Any other
    /// error is non-retryable and returned immediately.
    pub(crate) async fn embed_with_retry(&self, text: &str) -> Result<Vec<f32>, MemoryError> {
        let max_retries = self.config.embed_max_retries.max(1);
        let mut attempt = 0;
        loop {
            attempt += 1;
            match self.embedder.embed(text).await {
                Ok(embedding) => return Ok(embedding),
                Err(e) => {
                    let message = e.to_string();
                    let rate_limited = message.contains("403") || message.contains("429");
                    if !rate_limited || attempt >= max_retries {
                        return Err(MemoryError::Embedding { attempts: attempt, source: e });
                    }
                    let backoff = Duration::from_secs(2u64.pow(attempt - 1).min(5));
                    warn!(
                        "embedding rate-limited (attempt {attempt}/{max_retries}), backing off {:?}",
                        backoff
                    );
                    tokio::time::sleep(backoff).await;
                }
            }
        }
    }
}
