// src/memory/core/traits.rs

//! Capability traits for the memory backends. The manager depends on these
//! abstractly and is constructed with concrete implementations (in-memory,
//! Qdrant, SQLite); no direct store calls in business logic.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::types::{Intent, Memory, MemoryLayer, MemoryType, TopicSummary, UserProfile};

/// Dense vector index over memory records.
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Persist a record and make it searchable. Requires an id, a non-empty
    /// embedding of the configured dimension, and the user/layer/type tags.
    async fn insert(&self, memory: &Memory) -> anyhow::Result<()>;

    /// Approximate nearest-neighbour search, ascending L2 distance.
    /// `filters` is a conjunction of equality predicates over the indexed
    /// tag fields (`user_id`, `layer`, `memory_type`); unknown keys are
    /// ignored. Every returned record carries `metadata.similarity_score`.
    async fn search(
        &self,
        embedding: &[f32],
        top_k: usize,
        filters: &HashMap<String, String>,
    ) -> anyhow::Result<Vec<Memory>>;

    /// Idempotent: succeeds whether or not the record existed.
    async fn delete(&self, id: &str) -> anyhow::Result<()>;
}

/// Relational store holding the durable copy of every record, partitioned
/// into dialogue / topic / profile tables by layer.
#[async_trait]
pub trait MetadataStore: Send + Sync {
    async fn insert(&self, memory: &Memory) -> anyhow::Result<()>;

    async fn update(&self, memory: &Memory) -> anyhow::Result<()>;

    /// Probes partitions in order (dialogue → topic → profile) since the
    /// layer is not recoverable from the id alone. First hit wins.
    async fn get(&self, id: &str) -> anyhow::Result<Option<Memory>>;

    /// Same probing order as `get`.
    async fn delete(&self, id: &str) -> anyhow::Result<()>;

    /// Sum across all three partitions.
    async fn count_memories(&self, user_id: &str) -> anyhow::Result<i64>;

    /// Records created before `before`, oldest first, capped by `limit`
    /// overall. Traverses the dialogue and topic partitions only; profiles
    /// do not expire.
    async fn get_old_memories(
        &self,
        user_id: &str,
        before: DateTime<Utc>,
        limit: usize,
    ) -> anyhow::Result<Vec<Memory>>;

    /// Atomic access-count increment + last-accessed update, probing the
    /// three partitions. First affected row wins.
    async fn update_access_info(&self, id: &str, accessed_at: DateTime<Utc>) -> anyhow::Result<()>;

    /// Dialogue partition only, ascending created_at (conversation order).
    async fn get_dialogues_by_session(
        &self,
        user_id: &str,
        session_id: &str,
        limit: usize,
    ) -> anyhow::Result<Vec<Memory>>;

    /// Layer partition, descending created_at (newest first).
    async fn get_memories_by_layer(
        &self,
        user_id: &str,
        layer: MemoryLayer,
        limit: usize,
    ) -> anyhow::Result<Vec<Memory>>;

    /// Partition inferred from the type enum, descending created_at.
    async fn get_memories_by_type(
        &self,
        user_id: &str,
        memory_type: MemoryType,
        limit: usize,
    ) -> anyhow::Result<Vec<Memory>>;

    /// Unbounded variant of `get_dialogues_by_session`, for aggregation.
    async fn get_by_session_id(
        &self,
        user_id: &str,
        session_id: &str,
    ) -> anyhow::Result<Vec<Memory>>;

    /// Unbounded variant of `get_memories_by_layer`, for extraction.
    async fn get_memories_by_user_and_layer(
        &self,
        user_id: &str,
        layer: MemoryLayer,
    ) -> anyhow::Result<Vec<Memory>>;
}

/// Text → fixed-dimension dense vector.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Single-text embedding. Serialized behind the process-wide gate.
    /// Empty input yields an empty vector, not an error.
    async fn embed(&self, text: &str) -> anyhow::Result<Vec<f32>>;

    /// Batch embedding. Bypasses the gate.
    async fn embed_batch(&self, texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>>;
}

/// The three prompt-shaped distillation operations.
#[async_trait]
pub trait LlmClient: Send + Sync {
    /// Dialogue→topic: input ordered oldest→newest, same session.
    async fn summarize_dialogues(&self, dialogues: &[Memory]) -> anyhow::Result<TopicSummary>;

    /// Topic→profile: input topics of one user.
    async fn extract_profile(&self, topics: &[Memory]) -> anyhow::Result<UserProfile>;

    /// Intent classification. Unknown model output maps to `Intent::Chat`,
    /// never an error.
    async fn analyze_intent(&self, message: &str) -> anyhow::Result<Intent>;
}
