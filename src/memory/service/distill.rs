// src/memory/service/distill.rs

//! LLM-driven distillation: session dialogues fold into topic threads,
//! topic threads into a user profile. Both pipelines re-enter
//! `create_memory`, so the distilled records get embedded and dual-written
//! like any other.

use futures::future::join_all;
use serde_json::{Map, Value, json};
use tracing::{debug, info};

use crate::memory::core::error::MemoryError;
use crate::memory::core::types::{Memory, MemoryLayer, MemoryType};

use super::MemoryManager;

impl MemoryManager {
    /// Summarize one session's dialogues into a new topic record. Returns
    /// the new topic id.
    pub async fn aggregate_dialogue_to_topic(
        &self,
        user_id: &str,
        session_id: &str,
    ) -> Result<String, MemoryError> {
        if user_id.is_empty() {
            return Err(MemoryError::Validation("user_id must not be empty".into()));
        }
        if session_id.is_empty() {
            return Err(MemoryError::Validation("session_id must not be empty".into()));
        }

        let dialogues = self
            .metadata_store
            .get_by_session_id(user_id, session_id)
            .await
            .map_err(MemoryError::MetadataStore)?;
        if dialogues.is_empty() {
            return Err(MemoryError::NotFound(format!(
                "no dialogues for session {session_id}"
            )));
        }

        let summary = self
            .llm
            .summarize_dialogues(&dialogues)
            .await
            .map_err(MemoryError::Llm)?;

        let content = summary.summary.clone();
        let mut metadata = Map::new();
        metadata.insert("title".into(), json!(summary.title));
        metadata.insert("summary".into(), json!(summary.summary));
        metadata.insert("keywords".into(), json!(summary.keywords));
        metadata.insert("dialogue_ids".into(), json!(summary.dialogue_ids));
        metadata.insert("session_id".into(), json!(session_id));
        metadata.insert("source".into(), json!("llm_aggregation"));

        let topic = Memory::new(user_id, MemoryLayer::Topic, MemoryType::TopicThread, content)
            .with_metadata(metadata);
        let created = self.create_memory(topic).await?;

        info!(
            "aggregated {} dialogues of session {} into topic {}",
            dialogues.len(),
            session_id,
            created.id
        );
        Ok(created.id)
    }

    /// Distill a user's topics into a profile record. With explicit
    /// `topic_ids`, missing ids are skipped silently and non-topic records
    /// ignored; otherwise all of the user's topics are consumed. Returns
    /// the new profile id.
    pub async fn extract_profile_from_topics(
        &self,
        user_id: &str,
        topic_ids: &[String],
    ) -> Result<String, MemoryError> {
        if user_id.is_empty() {
            return Err(MemoryError::Validation("user_id must not be empty".into()));
        }

        let topics = if topic_ids.is_empty() {
            self.metadata_store
                .get_memories_by_user_and_layer(user_id, MemoryLayer::Topic)
                .await
                .map_err(MemoryError::MetadataStore)?
        } else {
            let fetched = join_all(topic_ids.iter().map(|id| self.metadata_store.get(id))).await;
            let mut topics = Vec::new();
            for result in fetched {
                match result.map_err(MemoryError::MetadataStore)? {
                    Some(memory) if memory.layer == MemoryLayer::Topic => topics.push(memory),
                    Some(memory) => {
                        debug!("skipping {}: {} record, not a topic", memory.id, memory.layer)
                    }
                    None => {}
                }
            }
            topics
        };
        if topics.is_empty() {
            return Err(MemoryError::NotFound(format!("no topics for user {user_id}")));
        }

        let profile = self
            .llm
            .extract_profile(&topics)
            .await
            .map_err(MemoryError::Llm)?;

        let content = profile
            .preferences
            .get("interests")
            .and_then(|v| v.as_array())
            .map(|interests| {
                let names: Vec<&str> = interests.iter().filter_map(|v| v.as_str()).collect();
                format!("用户兴趣：{}", names.join("、"))
            })
            .unwrap_or_else(|| "用户画像（基于话题提炼）".to_string());

        let mut metadata = Map::new();
        metadata.insert("preferences".into(), Value::Object(profile.preferences));
        metadata.insert("habits".into(), Value::Object(profile.habits));
        metadata.insert("features".into(), Value::Object(profile.features));
        metadata.insert("topic_ids".into(), json!(profile.topic_ids));
        metadata.insert("source".into(), json!("llm_extraction"));

        let record = Memory::new(user_id, MemoryLayer::Profile, MemoryType::UserIdentity, content)
            .with_metadata(metadata);
        let created = self.create_memory(record).await?;

        info!(
            "extracted profile {} for user {} from {} topics",
            created.id,
            user_id,
            topics.len()
        );
        Ok(created.id)
    }

    /// Intended semantics: fold dialogue records beyond the working-set
    /// threshold into topic summaries and drop the originals.
    pub async fn compress_memories(&self, _user_id: &str) -> Result<(), MemoryError> {
        Err(MemoryError::Unimplemented("compress_memories"))
    }

    /// Intended semantics: decay `importance` by record age and prune
    /// records that fall below a floor, pinned records exempt.
    pub async fn decay_memories(&self, _user_id: &str) -> Result<(), MemoryError> {
        Err(MemoryError::Unimplemented("decay_memories"))
    }

    /// Intended semantics: periodic self-review of profile records against
    /// fresh topics, raising or lowering confidence levels.
    pub async fn reflect_memories(&self, _user_id: &str) -> Result<(), MemoryError> {
        Err(MemoryError::Unimplemented("reflect_memories"))
    }
}
