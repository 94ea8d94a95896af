// src/memory/storage/memory.rs

//! In-memory backends for mock mode and tests.
//!
//! `InMemoryVectorStore` runs a brute-force L2 scan with the same filter and
//! scoring contract as the real index; `InMemoryMetadataStore` keeps the
//! three layer partitions in hash maps with the same ordering rules as the
//! SQLite store. Both are thread-safe and honest enough to exercise the
//! full manager semantics offline.

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::memory::core::traits::{MetadataStore, VectorStore};
use crate::memory::core::types::{Memory, MemoryLayer, MemoryType};

/// Tag fields the vector index supports in filter expressions. Unknown
/// filter keys are ignored so the manager stays forward-compatible.
const FILTERABLE_FIELDS: [&str; 3] = ["user_id", "layer", "memory_type"];

struct StoredPoint {
    embedding: Vec<f32>,
    user_id: String,
    layer: MemoryLayer,
    memory_type: MemoryType,
    content: String,
}

/// Brute-force vector store over a hash map of points.
pub struct InMemoryVectorStore {
    dimension: usize,
    points: RwLock<HashMap<String, StoredPoint>>,
}

impl InMemoryVectorStore {
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension,
            points: RwLock::new(HashMap::new()),
        }
    }

    fn matches(point: &StoredPoint, filters: &HashMap<String, String>) -> bool {
        for (key, value) in filters {
            if !FILTERABLE_FIELDS.contains(&key.as_str()) {
                continue;
            }
            let field = match key.as_str() {
                "user_id" => point.user_id.as_str(),
                "layer" => point.layer.as_str(),
                "memory_type" => point.memory_type.as_str(),
                _ => unreachable!(),
            };
            if field != value {
                return false;
            }
        }
        true
    }
}

fn l2_distance(a: &[f32], b: &[f32]) -> f32 {
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| (x - y) * (x - y))
        .sum::<f32>()
        .sqrt()
}

#[async_trait]
impl VectorStore for InMemoryVectorStore {
    async fn insert(&self, memory: &Memory) -> anyhow::Result<()> {
        if memory.id.is_empty() {
            anyhow::bail!("memory id must not be empty");
        }
        let embedding = match &memory.embedding {
            Some(e) if !e.is_empty() => e.clone(),
            _ => anyhow::bail!("memory embedding must not be empty"),
        };
        if embedding.len() != self.dimension {
            anyhow::bail!(
                "embedding dimension mismatch: expected {}, got {}",
                self.dimension,
                embedding.len()
            );
        }

        let mut points = self.points.write().expect("vector store lock poisoned");
        points.insert(
            memory.id.clone(),
            StoredPoint {
                embedding,
                user_id: memory.user_id.clone(),
                layer: memory.layer,
                memory_type: memory.memory_type,
                content: memory.content.clone(),
            },
        );
        Ok(())
    }

    async fn search(
        &self,
        embedding: &[f32],
        top_k: usize,
        filters: &HashMap<String, String>,
    ) -> anyhow::Result<Vec<Memory>> {
        if embedding.len() != self.dimension {
            anyhow::bail!(
                "query dimension mismatch: expected {}, got {}",
                self.dimension,
                embedding.len()
            );
        }

        let points = self.points.read().expect("vector store lock poisoned");
        let mut scored: Vec<(f32, &String, &StoredPoint)> = points
            .iter()
            .filter(|(_, p)| Self::matches(p, filters))
            .map(|(id, p)| (l2_distance(embedding, &p.embedding), id, p))
            .collect();

        scored.sort_by(|a, b| a.0.total_cmp(&b.0).then_with(|| a.1.cmp(b.1)));
        scored.truncate(top_k);

        let memories = scored
            .into_iter()
            .map(|(distance, id, p)| {
                let mut memory = Memory::new(p.user_id.clone(), p.layer, p.memory_type, p.content.clone());
                memory.id = id.clone();
                memory.set_similarity_score(distance);
                memory
            })
            .collect();
        Ok(memories)
    }

    async fn delete(&self, id: &str) -> anyhow::Result<()> {
        let mut points = self.points.write().expect("vector store lock poisoned");
        points.remove(id);
        Ok(())
    }
}

/// Hash-map metadata store with one partition per layer.
pub struct InMemoryMetadataStore {
    partitions: [RwLock<HashMap<String, Memory>>; 3],
}

/// Probe order mirrors the SQLite store: dialogue → topic → profile.
const PROBE_ORDER: [MemoryLayer; 3] = [MemoryLayer::Dialogue, MemoryLayer::Topic, MemoryLayer::Profile];

impl InMemoryMetadataStore {
    pub fn new() -> Self {
        Self {
            partitions: [
                RwLock::new(HashMap::new()),
                RwLock::new(HashMap::new()),
                RwLock::new(HashMap::new()),
            ],
        }
    }

    fn partition(&self, layer: MemoryLayer) -> &RwLock<HashMap<String, Memory>> {
        match layer {
            MemoryLayer::Dialogue => &self.partitions[0],
            MemoryLayer::Topic => &self.partitions[1],
            MemoryLayer::Profile => &self.partitions[2],
        }
    }

    fn collect_sorted(
        &self,
        layer: MemoryLayer,
        ascending: bool,
        filter: impl Fn(&Memory) -> bool,
    ) -> Vec<Memory> {
        let partition = self.partition(layer).read().expect("metadata lock poisoned");
        let mut records: Vec<Memory> = partition.values().filter(|m| filter(m)).cloned().collect();
        records.sort_by(|a, b| {
            let ord = a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id));
            if ascending { ord } else { ord.reverse() }
        });
        records
    }
}

impl Default for InMemoryMetadataStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MetadataStore for InMemoryMetadataStore {
    async fn insert(&self, memory: &Memory) -> anyhow::Result<()> {
        if memory.id.is_empty() {
            anyhow::bail!("memory id must not be empty");
        }
        let mut partition = self
            .partition(memory.layer)
            .write()
            .expect("metadata lock poisoned");
        partition.insert(memory.id.clone(), memory.clone());
        Ok(())
    }

    async fn update(&self, memory: &Memory) -> anyhow::Result<()> {
        let mut partition = self
            .partition(memory.layer)
            .write()
            .expect("metadata lock poisoned");
        if !partition.contains_key(&memory.id) {
            anyhow::bail!("memory {} not found in {} partition", memory.id, memory.layer);
        }
        partition.insert(memory.id.clone(), memory.clone());
        Ok(())
    }

    async fn get(&self, id: &str) -> anyhow::Result<Option<Memory>> {
        for layer in PROBE_ORDER {
            let partition = self.partition(layer).read().expect("metadata lock poisoned");
            if let Some(memory) = partition.get(id) {
                return Ok(Some(memory.clone()));
            }
        }
        Ok(None)
    }

    async fn delete(&self, id: &str) -> anyhow::Result<()> {
        for layer in PROBE_ORDER {
            let mut partition = self.partition(layer).write().expect("metadata lock poisoned");
            if partition.remove(id).is_some() {
                return Ok(());
            }
        }
        Ok(())
    }

    async fn count_memories(&self, user_id: &str) -> anyhow::Result<i64> {
        let mut total = 0i64;
        for layer in PROBE_ORDER {
            let partition = self.partition(layer).read().expect("metadata lock poisoned");
            total += partition.values().filter(|m| m.user_id == user_id).count() as i64;
        }
        Ok(total)
    }

    async fn get_old_memories(
        &self,
        user_id: &str,
        before: DateTime<Utc>,
        limit: usize,
    ) -> anyhow::Result<Vec<Memory>> {
        // Dialogue and topic partitions only; profiles do not expire.
        let mut records = Vec::new();
        for layer in [MemoryLayer::Dialogue, MemoryLayer::Topic] {
            records.extend(
                self.collect_sorted(layer, true, |m| m.user_id == user_id && m.created_at < before),
            );
        }
        records.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        records.truncate(limit);
        Ok(records)
    }

    async fn update_access_info(&self, id: &str, accessed_at: DateTime<Utc>) -> anyhow::Result<()> {
        for layer in PROBE_ORDER {
            let mut partition = self.partition(layer).write().expect("metadata lock poisoned");
            if let Some(memory) = partition.get_mut(id) {
                memory.access_count += 1;
                memory.last_accessed = accessed_at;
                return Ok(());
            }
        }
        anyhow::bail!("memory {} not found in any partition", id)
    }

    async fn get_dialogues_by_session(
        &self,
        user_id: &str,
        session_id: &str,
        limit: usize,
    ) -> anyhow::Result<Vec<Memory>> {
        let mut records = self.collect_sorted(MemoryLayer::Dialogue, true, |m| {
            m.user_id == user_id && m.session_id() == Some(session_id)
        });
        records.truncate(limit);
        Ok(records)
    }

    async fn get_memories_by_layer(
        &self,
        user_id: &str,
        layer: MemoryLayer,
        limit: usize,
    ) -> anyhow::Result<Vec<Memory>> {
        let mut records = self.collect_sorted(layer, false, |m| m.user_id == user_id);
        records.truncate(limit);
        Ok(records)
    }

    async fn get_memories_by_type(
        &self,
        user_id: &str,
        memory_type: MemoryType,
        limit: usize,
    ) -> anyhow::Result<Vec<Memory>> {
        let mut records = self.collect_sorted(memory_type.layer(), false, |m| {
            m.user_id == user_id && m.memory_type == memory_type
        });
        records.truncate(limit);
        Ok(records)
    }

    async fn get_by_session_id(
        &self,
        user_id: &str,
        session_id: &str,
    ) -> anyhow::Result<Vec<Memory>> {
        Ok(self.collect_sorted(MemoryLayer::Dialogue, true, |m| {
            m.user_id == user_id && m.session_id() == Some(session_id)
        }))
    }

    async fn get_memories_by_user_and_layer(
        &self,
        user_id: &str,
        layer: MemoryLayer,
    ) -> anyhow::Result<Vec<Memory>> {
        Ok(self.collect_sorted(layer, false, |m| m.user_id == user_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{Map, Value};

    fn dialogue(id: &str, user: &str, session: &str) -> Memory {
        let mut metadata = Map::new();
        metadata.insert("session_id".into(), Value::from(session));
        let mut m = Memory::new(user, MemoryLayer::Dialogue, MemoryType::UserMessage, "hello")
            .with_metadata(metadata);
        m.id = id.to_string();
        m
    }

    #[tokio::test]
    async fn test_vector_search_orders_by_distance() {
        let store = InMemoryVectorStore::new(2);

        for (id, vec) in [("a", vec![0.0, 0.0]), ("b", vec![3.0, 4.0]), ("c", vec![1.0, 0.0])] {
            let mut m = Memory::new("u1", MemoryLayer::Dialogue, MemoryType::UserMessage, "x");
            m.id = id.to_string();
            m.embedding = Some(vec);
            store.insert(&m).await.unwrap();
        }

        let results = store.search(&[0.0, 0.0], 3, &HashMap::new()).await.unwrap();
        let ids: Vec<&str> = results.iter().map(|m| m.id.as_str()).collect();
        assert_eq!(ids, ["a", "c", "b"]);

        let scores: Vec<f64> = results.iter().map(|m| m.similarity_score().unwrap()).collect();
        assert!(scores.windows(2).all(|w| w[0] <= w[1]));
    }

    #[tokio::test]
    async fn test_vector_search_ignores_unknown_filter_keys() {
        let store = InMemoryVectorStore::new(2);
        let mut m = Memory::new("u1", MemoryLayer::Topic, MemoryType::TopicThread, "t");
        m.id = "t1".into();
        m.embedding = Some(vec![1.0, 1.0]);
        store.insert(&m).await.unwrap();

        let mut filters = HashMap::new();
        filters.insert("layer".to_string(), "topic".to_string());
        filters.insert("flavour".to_string(), "strawberry".to_string());
        let results = store.search(&[1.0, 1.0], 5, &filters).await.unwrap();
        assert_eq!(results.len(), 1);
    }

    #[tokio::test]
    async fn test_vector_delete_is_idempotent() {
        let store = InMemoryVectorStore::new(2);
        store.delete("missing").await.unwrap();
        store.delete("missing").await.unwrap();
    }

    #[tokio::test]
    async fn test_metadata_probe_order_and_access_info() {
        let store = InMemoryMetadataStore::new();
        let m = dialogue("d1", "u1", "s1");
        store.insert(&m).await.unwrap();

        let fetched = store.get("d1").await.unwrap().unwrap();
        assert_eq!(fetched.access_count, 0);

        let now = Utc::now();
        store.update_access_info("d1", now).await.unwrap();
        let fetched = store.get("d1").await.unwrap().unwrap();
        assert_eq!(fetched.access_count, 1);
        assert_eq!(fetched.last_accessed, now);

        assert!(store.update_access_info("ghost", now).await.is_err());
    }

    #[tokio::test]
    async fn test_session_dialogues_chronological() {
        let store = InMemoryMetadataStore::new();
        for (i, id) in ["d1", "d2", "d3"].iter().enumerate() {
            let mut m = dialogue(id, "u1", "s1");
            m.created_at = Utc::now() + chrono::Duration::seconds(i as i64);
            store.insert(&m).await.unwrap();
        }

        let records = store.get_dialogues_by_session("u1", "s1", 10).await.unwrap();
        let ids: Vec<&str> = records.iter().map(|m| m.id.as_str()).collect();
        assert_eq!(ids, ["d1", "d2", "d3"]);

        let newest_first = store
            .get_memories_by_layer("u1", MemoryLayer::Dialogue, 10)
            .await
            .unwrap();
        assert_eq!(newest_first.first().unwrap().id, "d3");
    }

    #[tokio::test]
    async fn test_old_memories_skip_profile_partition() {
        let store = InMemoryMetadataStore::new();
        let mut d = dialogue("d1", "u1", "s1");
        d.created_at = Utc::now() - chrono::Duration::days(30);
        store.insert(&d).await.unwrap();

        let mut p = Memory::new("u1", MemoryLayer::Profile, MemoryType::UserIdentity, "profile");
        p.id = "p1".into();
        p.created_at = Utc::now() - chrono::Duration::days(30);
        store.insert(&p).await.unwrap();

        let old = store.get_old_memories("u1", Utc::now(), 10).await.unwrap();
        assert_eq!(old.len(), 1);
        assert_eq!(old[0].id, "d1");
    }
}
