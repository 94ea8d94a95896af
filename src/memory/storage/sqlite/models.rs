// src/memory/storage/sqlite/models.rs

//! Persistence objects for the three layer partitions.
//!
//! Each PO carries the full logical memory plus the partition-specific
//! denormalized columns extracted from the metadata blob. Denormalized
//! columns are written from the same map they mirror, so they stay in sync;
//! on read they take precedence and are folded back into the map.

use anyhow::Context;
use chrono::{DateTime, Utc};
use serde_json::{Map, Value};

use crate::memory::core::types::{Memory, MemoryLayer};

fn encode_embedding(embedding: &Option<Vec<f32>>) -> anyhow::Result<Option<String>> {
    match embedding {
        Some(v) if !v.is_empty() => Ok(Some(serde_json::to_string(v)?)),
        _ => Ok(None),
    }
}

fn decode_embedding(raw: &Option<String>) -> anyhow::Result<Option<Vec<f32>>> {
    match raw {
        Some(text) => Ok(Some(
            serde_json::from_str(text).context("malformed embedding column")?,
        )),
        None => Ok(None),
    }
}

fn decode_metadata(raw: &str) -> anyhow::Result<Map<String, Value>> {
    if raw.is_empty() {
        return Ok(Map::new());
    }
    serde_json::from_str(raw).context("malformed metadata column")
}

fn metadata_str(metadata: &Map<String, Value>, key: &str) -> Option<String> {
    metadata.get(key).and_then(|v| v.as_str()).map(String::from)
}

fn metadata_json(metadata: &Map<String, Value>, key: &str) -> anyhow::Result<Option<String>> {
    match metadata.get(key) {
        Some(value) => Ok(Some(serde_json::to_string(value)?)),
        None => Ok(None),
    }
}

fn fold_back(metadata: &mut Map<String, Value>, key: &str, raw: &Option<String>) -> anyhow::Result<()> {
    if let Some(text) = raw {
        let value: Value = serde_json::from_str(text)
            .with_context(|| format!("malformed {} column", key))?;
        metadata.insert(key.to_string(), value);
    }
    Ok(())
}

/// Row of the `dialogue_memory` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct DialogueMemoryPo {
    pub id: String,
    pub user_id: String,
    pub session_id: Option<String>,
    pub role: Option<String>,
    pub content: String,
    pub embedding: Option<String>,
    pub metadata: String,
    pub memory_type: String,
    pub importance: f64,
    pub access_count: i64,
    pub last_accessed: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl DialogueMemoryPo {
    pub fn from_memory(memory: &Memory) -> anyhow::Result<Self> {
        if memory.layer != MemoryLayer::Dialogue {
            anyhow::bail!("expected dialogue layer, got {}", memory.layer);
        }
        Ok(Self {
            id: memory.id.clone(),
            user_id: memory.user_id.clone(),
            session_id: metadata_str(&memory.metadata, "session_id"),
            role: metadata_str(&memory.metadata, "role"),
            content: memory.content.clone(),
            embedding: encode_embedding(&memory.embedding)?,
            metadata: serde_json::to_string(&memory.metadata)?,
            memory_type: memory.memory_type.as_str().to_string(),
            importance: memory.importance,
            access_count: memory.access_count,
            last_accessed: memory.last_accessed,
            created_at: memory.created_at,
            updated_at: memory.updated_at,
        })
    }

    pub fn into_memory(self) -> anyhow::Result<Memory> {
        let mut metadata = decode_metadata(&self.metadata)?;
        if let Some(session_id) = &self.session_id {
            metadata.insert("session_id".into(), Value::from(session_id.clone()));
        }
        if let Some(role) = &self.role {
            metadata.insert("role".into(), Value::from(role.clone()));
        }
        Ok(Memory {
            id: self.id,
            user_id: self.user_id,
            layer: MemoryLayer::Dialogue,
            memory_type: self.memory_type.parse()?,
            content: self.content,
            embedding: decode_embedding(&self.embedding)?,
            metadata,
            importance: self.importance,
            access_count: self.access_count,
            last_accessed: self.last_accessed,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

/// Row of the `topic_memory` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct TopicMemoryPo {
    pub id: String,
    pub user_id: String,
    pub title: Option<String>,
    pub summary: Option<String>,
    pub keywords: Option<String>,
    pub dialogue_ids: Option<String>,
    pub content: String,
    pub embedding: Option<String>,
    pub metadata: String,
    pub memory_type: String,
    pub importance: f64,
    pub access_count: i64,
    pub last_accessed: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TopicMemoryPo {
    pub fn from_memory(memory: &Memory) -> anyhow::Result<Self> {
        if memory.layer != MemoryLayer::Topic {
            anyhow::bail!("expected topic layer, got {}", memory.layer);
        }
        Ok(Self {
            id: memory.id.clone(),
            user_id: memory.user_id.clone(),
            title: metadata_str(&memory.metadata, "title"),
            summary: metadata_str(&memory.metadata, "summary"),
            keywords: metadata_json(&memory.metadata, "keywords")?,
            dialogue_ids: metadata_json(&memory.metadata, "dialogue_ids")?,
            content: memory.content.clone(),
            embedding: encode_embedding(&memory.embedding)?,
            metadata: serde_json::to_string(&memory.metadata)?,
            memory_type: memory.memory_type.as_str().to_string(),
            importance: memory.importance,
            access_count: memory.access_count,
            last_accessed: memory.last_accessed,
            created_at: memory.created_at,
            updated_at: memory.updated_at,
        })
    }

    pub fn into_memory(self) -> anyhow::Result<Memory> {
        let mut metadata = decode_metadata(&self.metadata)?;
        if let Some(title) = &self.title {
            metadata.insert("title".into(), Value::from(title.clone()));
        }
        if let Some(summary) = &self.summary {
            metadata.insert("summary".into(), Value::from(summary.clone()));
        }
        fold_back(&mut metadata, "keywords", &self.keywords)?;
        fold_back(&mut metadata, "dialogue_ids", &self.dialogue_ids)?;
        Ok(Memory {
            id: self.id,
            user_id: self.user_id,
            layer: MemoryLayer::Topic,
            memory_type: self.memory_type.parse()?,
            content: self.content,
            embedding: decode_embedding(&self.embedding)?,
            metadata,
            importance: self.importance,
            access_count: self.access_count,
            last_accessed: self.last_accessed,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

/// Row of the `profile_memory` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ProfileMemoryPo {
    pub id: String,
    pub user_id: String,
    pub preferences: Option<String>,
    pub habits: Option<String>,
    pub features: Option<String>,
    pub topic_ids: Option<String>,
    pub content: String,
    pub embedding: Option<String>,
    pub metadata: String,
    pub memory_type: String,
    pub importance: f64,
    pub access_count: i64,
    pub last_accessed: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ProfileMemoryPo {
    pub fn from_memory(memory: &Memory) -> anyhow::Result<Self> {
        if memory.layer != MemoryLayer::Profile {
            anyhow::bail!("expected profile layer, got {}", memory.layer);
        }
        Ok(Self {
            id: memory.id.clone(),
            user_id: memory.user_id.clone(),
            preferences: metadata_json(&memory.metadata, "preferences")?,
            habits: metadata_json(&memory.metadata, "habits")?,
            features: metadata_json(&memory.metadata, "features")?,
            topic_ids: metadata_json(&memory.metadata, "topic_ids")?,
            content: memory.content.clone(),
            embedding: encode_embedding(&memory.embedding)?,
            metadata: serde_json::to_string(&memory.metadata)?,
            memory_type: memory.memory_type.as_str().to_string(),
            importance: memory.importance,
            access_count: memory.access_count,
            last_accessed: memory.last_accessed,
            created_at: memory.created_at,
            updated_at: memory.updated_at,
        })
    }

    pub fn into_memory(self) -> anyhow::Result<Memory> {
        let mut metadata = decode_metadata(&self.metadata)?;
        fold_back(&mut metadata, "preferences", &self.preferences)?;
        fold_back(&mut metadata, "habits", &self.habits)?;
        fold_back(&mut metadata, "features", &self.features)?;
        fold_back(&mut metadata, "topic_ids", &self.topic_ids)?;
        Ok(Memory {
            id: self.id,
            user_id: self.user_id,
            layer: MemoryLayer::Profile,
            memory_type: self.memory_type.parse()?,
            content: self.content,
            embedding: decode_embedding(&self.embedding)?,
            metadata,
            importance: self.importance,
            access_count: self.access_count,
            last_accessed: self.last_accessed,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::core::types::MemoryType;
    use serde_json::json;

    fn base(layer: MemoryLayer, memory_type: MemoryType) -> Memory {
        let mut m = Memory::new("u1", layer, memory_type, "记忆内容");
        m.id = "00000000-0000-0000-0000-000000000001".into();
        m.importance = 0.8;
        m.access_count = 3;
        m.embedding = Some(vec![0.25, -1.5, 3.0]);
        m
    }

    #[test]
    fn test_dialogue_round_trip() {
        let mut m = base(MemoryLayer::Dialogue, MemoryType::UserMessage);
        m.metadata.insert("session_id".into(), json!("s1"));
        m.metadata.insert("role".into(), json!("user"));
        m.metadata.insert("turn_number".into(), json!(4));

        let back = DialogueMemoryPo::from_memory(&m).unwrap().into_memory().unwrap();
        assert_eq!(back.id, m.id);
        assert_eq!(back.user_id, m.user_id);
        assert_eq!(back.layer, m.layer);
        assert_eq!(back.memory_type, m.memory_type);
        assert_eq!(back.content, m.content);
        assert_eq!(back.embedding, m.embedding);
        assert_eq!(back.metadata, m.metadata);
        assert_eq!(back.created_at, m.created_at);
        assert_eq!(back.last_accessed, m.last_accessed);
    }

    #[test]
    fn test_topic_round_trip_keeps_well_known_keys() {
        let mut m = base(MemoryLayer::Topic, MemoryType::TopicThread);
        m.metadata.insert("title".into(), json!("户外计划"));
        m.metadata.insert("summary".into(), json!("用户计划周末去爬山"));
        m.metadata.insert("keywords".into(), json!(["爬山", "天气"]));
        m.metadata.insert("dialogue_ids".into(), json!(["d1", "d2"]));

        let back = TopicMemoryPo::from_memory(&m).unwrap().into_memory().unwrap();
        assert_eq!(back.metadata, m.metadata);
    }

    #[test]
    fn test_profile_round_trip_keeps_maps() {
        let mut m = base(MemoryLayer::Profile, MemoryType::UserIdentity);
        m.metadata.insert("preferences".into(), json!({"interests": ["hiking"]}));
        m.metadata.insert("habits".into(), json!({"active_time": "晚间"}));
        m.metadata.insert("features".into(), json!({"knowledge_level": "中级"}));
        m.metadata.insert("topic_ids".into(), json!(["t1"]));

        let back = ProfileMemoryPo::from_memory(&m).unwrap().into_memory().unwrap();
        assert_eq!(back.metadata, m.metadata);
    }

    #[test]
    fn test_converter_rejects_layer_mismatch() {
        let m = base(MemoryLayer::Dialogue, MemoryType::UserMessage);
        assert!(TopicMemoryPo::from_memory(&m).is_err());
        assert!(ProfileMemoryPo::from_memory(&m).is_err());
    }

    #[test]
    fn test_degraded_memory_has_no_embedding_column() {
        let mut m = base(MemoryLayer::Dialogue, MemoryType::UserMessage);
        m.embedding = None;
        let po = DialogueMemoryPo::from_memory(&m).unwrap();
        assert!(po.embedding.is_none());
        assert!(po.into_memory().unwrap().embedding.is_none());
    }
}
