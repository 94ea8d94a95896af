// src/memory/storage/qdrant.rs

//! Qdrant-backed vector index over memory records.
//!
//! One collection, L2 metric; `user_id` / `layer` / `memory_type` live in
//! the point payload for filter pushdown. The index is a derived, lossy
//! cache; the metadata store stays the system of record.

use std::collections::HashMap;
use std::str::FromStr;

use anyhow::{Context, Result};
use async_trait::async_trait;
use qdrant_client::Qdrant;
use qdrant_client::qdrant::{
    Condition, CreateCollectionBuilder, DeletePointsBuilder, Distance, Filter, PointId,
    PointStruct, SearchPointsBuilder, UpsertPointsBuilder, Value as QdrantValue,
    VectorParamsBuilder, point_id::PointIdOptions,
};
use tracing::{debug, info, warn};

use crate::memory::core::traits::VectorStore;
use crate::memory::core::types::{Memory, MemoryLayer, MemoryType};

/// Payload fields usable in filter expressions.
const FILTERABLE_FIELDS: [&str; 3] = ["user_id", "layer", "memory_type"];

pub struct QdrantVectorStore {
    client: Qdrant,
    collection: String,
    dimension: usize,
}

impl QdrantVectorStore {
    pub async fn new(url: &str, collection: &str, dimension: usize) -> Result<Self> {
        // Skip compatibility check to allow minor server/client version skew.
        let client = Qdrant::from_url(url)
            .skip_compatibility_check()
            .build()
            .context("failed to connect to Qdrant")?;

        let store = Self {
            client,
            collection: collection.to_string(),
            dimension,
        };
        store.ensure_collection().await?;
        Ok(store)
    }

    async fn ensure_collection(&self) -> Result<()> {
        let exists = self.client.collection_exists(&self.collection).await?;
        if exists {
            return Ok(());
        }

        info!("creating Qdrant collection: {}", self.collection);
        match self
            .client
            .create_collection(
                CreateCollectionBuilder::new(&self.collection).vectors_config(
                    VectorParamsBuilder::new(self.dimension as u64, Distance::Euclid),
                ),
            )
            .await
        {
            Ok(_) => Ok(()),
            Err(e) if e.to_string().contains("already exists") => {
                // Race with another process between the exists check and create.
                debug!("collection {} already exists", self.collection);
                Ok(())
            }
            Err(e) => Err(e).context(format!("failed to create collection {}", self.collection)),
        }
    }

    fn build_filter(filters: &HashMap<String, String>) -> Option<Filter> {
        let conditions: Vec<Condition> = filters
            .iter()
            .filter(|(key, _)| FILTERABLE_FIELDS.contains(&key.as_str()))
            .map(|(key, value)| Condition::matches(key.clone(), value.clone()))
            .collect();
        if conditions.is_empty() {
            None
        } else {
            Some(Filter::must(conditions))
        }
    }

    fn point_to_memory(point: qdrant_client::qdrant::ScoredPoint) -> Option<Memory> {
        let id = match point.id?.point_id_options? {
            PointIdOptions::Uuid(u) => u,
            PointIdOptions::Num(n) => n.to_string(),
        };

        let payload = point.payload;
        let user_id = payload.get("user_id")?.as_str()?.to_string();
        let layer = MemoryLayer::from_str(payload.get("layer")?.as_str()?).ok()?;
        let memory_type = MemoryType::from_str(payload.get("memory_type")?.as_str()?).ok()?;
        let content = payload
            .get("content")
            .and_then(|v| v.as_str())
            .map(String::from)
            .unwrap_or_default();

        let mut memory = Memory::new(user_id, layer, memory_type, content);
        memory.id = id;
        memory.set_similarity_score(point.score);
        Some(memory)
    }

    /// Connection probe for the health endpoint.
    pub async fn health_check(&self) -> bool {
        match self.client.collection_exists(&self.collection).await {
            Ok(_) => true,
            Err(e) => {
                warn!("Qdrant health check failed: {}", e);
                false
            }
        }
    }
}

#[async_trait]
impl VectorStore for QdrantVectorStore {
    async fn insert(&self, memory: &Memory) -> Result<()> {
        if memory.id.is_empty() {
            anyhow::bail!("memory id must not be empty");
        }
        let embedding = match &memory.embedding {
            Some(e) if !e.is_empty() => e,
            _ => anyhow::bail!("memory embedding must not be empty"),
        };
        if embedding.len() != self.dimension {
            anyhow::bail!(
                "embedding dimension mismatch: expected {}, got {}",
                self.dimension,
                embedding.len()
            );
        }

        let mut payload: HashMap<String, QdrantValue> = HashMap::new();
        payload.insert("user_id".to_string(), memory.user_id.clone().into());
        payload.insert("layer".to_string(), memory.layer.as_str().to_string().into());
        payload.insert(
            "memory_type".to_string(),
            memory.memory_type.as_str().to_string().into(),
        );
        payload.insert("content".to_string(), memory.content.clone().into());

        let point = PointStruct::new(memory.id.clone(), embedding.clone(), payload);

        // wait(true): callers expect search-visibility once insert returns.
        self.client
            .upsert_points(UpsertPointsBuilder::new(&self.collection, vec![point]).wait(true))
            .await
            .context("failed to upsert point to Qdrant")?;

        debug!("indexed memory {} in {}", memory.id, self.collection);
        Ok(())
    }

    async fn search(
        &self,
        embedding: &[f32],
        top_k: usize,
        filters: &HashMap<String, String>,
    ) -> Result<Vec<Memory>> {
        if embedding.len() != self.dimension {
            anyhow::bail!(
                "query dimension mismatch: expected {}, got {}",
                self.dimension,
                embedding.len()
            );
        }

        let mut builder =
            SearchPointsBuilder::new(&self.collection, embedding.to_vec(), top_k as u64)
                .with_payload(true);
        if let Some(filter) = Self::build_filter(filters) {
            builder = builder.filter(filter);
        }

        let results = self
            .client
            .search_points(builder)
            .await
            .context("failed to search Qdrant")?;

        Ok(results
            .result
            .into_iter()
            .filter_map(Self::point_to_memory)
            .collect())
    }

    async fn delete(&self, id: &str) -> Result<()> {
        self.client
            .delete_points(
                DeletePointsBuilder::new(&self.collection)
                    .points(vec![PointId::from(id.to_string())])
                    .wait(true),
            )
            .await
            .context("failed to delete point from Qdrant")?;
        Ok(())
    }
}
