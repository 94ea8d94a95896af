// src/memory/service/recall.rs

//! Per-layer recall and the stage-adaptive hybrid fan-out.

use std::collections::HashMap;

use tracing::warn;

use crate::memory::core::error::MemoryError;
use crate::memory::core::types::{
    DialogStage, Memory, MemoryLayer, MemoryType, RecallCaps, RecallRequest, RecallResult,
};
use crate::metrics;

use super::MemoryManager;

/// Coarse per-record token estimate used by the hybrid budget. Callers who
/// need finer control drive the caps directly via the stage parameter.
pub const TOKENS_PER_RECORD: usize = 100;

/// Profile records below this extraction confidence are dropped from
/// recall; records without the field are kept.
pub const CONFIDENCE_FLOOR: f64 = 0.7;

/// Scale the per-layer caps down proportionally when they would overrun the
/// token budget. `max_tokens == 0` means unbudgeted.
pub(crate) fn apply_token_budget(caps: RecallCaps, max_tokens: usize) -> RecallCaps {
    if max_tokens == 0 {
        return caps;
    }
    let total = caps.total();
    if total == 0 || total <= max_tokens / TOKENS_PER_RECORD {
        return caps;
    }
    let scale = max_tokens as f64 / (TOKENS_PER_RECORD as f64 * total as f64);
    RecallCaps {
        profile: (caps.profile as f64 * scale) as usize,
        topic: (caps.topic as f64 * scale) as usize,
        dialogue: (caps.dialogue as f64 * scale) as usize,
    }
}

impl MemoryManager {
    /// Recent turns of one session, in conversation order (oldest first).
    /// Pure metadata query, no embedding involved.
    pub async fn recall_dialogue_context(
        &self,
        user_id: &str,
        session_id: &str,
        recent_turns: usize,
    ) -> Result<Vec<Memory>, MemoryError> {
        if session_id.is_empty() {
            return Err(MemoryError::Validation("session_id must not be empty".into()));
        }

        let dialogues = self
            .metadata_store
            .get_dialogues_by_session(user_id, session_id, recent_turns)
            .await
            .map_err(MemoryError::MetadataStore)?;

        ::metrics::counter!(metrics::RECALL_REQUESTS, "layer" => "dialogue").increment(1);
        self.touch_access_info(&dialogues);
        Ok(dialogues)
    }

    /// Topic threads semantically close to the query, scoped to the user.
    pub async fn recall_topic_thread(
        &self,
        user_id: &str,
        query: &str,
        top_k: usize,
    ) -> Result<Vec<Memory>, MemoryError> {
        if query.trim().is_empty() {
            return Err(MemoryError::Validation("query must not be empty".into()));
        }
        if top_k == 0 {
            // The hybrid budget can scale a layer down to nothing.
            return Ok(Vec::new());
        }

        let embedding = self.embed_with_retry(query).await?;

        let mut filters = HashMap::new();
        filters.insert("user_id".to_string(), user_id.to_string());
        filters.insert("layer".to_string(), MemoryLayer::Topic.as_str().to_string());

        let topics = self
            .vector_store
            .search(&embedding, top_k, &filters)
            .await
            .map_err(MemoryError::VectorStore)?;

        ::metrics::counter!(metrics::RECALL_REQUESTS, "layer" => "topic").increment(1);
        self.touch_access_info(&topics);
        Ok(topics)
    }

    /// Profile records for a user, optionally narrowed to one category.
    /// Low-confidence extractions are filtered out.
    pub async fn recall_user_profile(
        &self,
        user_id: &str,
        category: &str,
    ) -> Result<Vec<Memory>, MemoryError> {
        let records = if category.is_empty() {
            self.metadata_store
                .get_memories_by_layer(user_id, MemoryLayer::Profile, 100)
                .await
        } else {
            let memory_type = match category {
                "identity" => MemoryType::UserIdentity,
                "style" => MemoryType::CommunicationStyle,
                "personality" => MemoryType::Personality,
                "preference" => MemoryType::Preference,
                _ => {
                    return Err(MemoryError::Validation(format!(
                        "unknown profile category: {category}"
                    )));
                }
            };
            self.metadata_store
                .get_memories_by_type(user_id, memory_type, 50)
                .await
        }
        .map_err(MemoryError::MetadataStore)?;

        ::metrics::counter!(metrics::RECALL_REQUESTS, "layer" => "profile").increment(1);

        Ok(records
            .into_iter()
            .filter(|m| m.confidence_level().is_none_or(|c| c >= CONFIDENCE_FLOOR))
            .collect())
    }

    /// Stage-adaptive fan-out across the three layers, bounded by the token
    /// budget. A failing layer is logged and returned empty, never fatal;
    /// callers must not assume any ordering between the layer fetches.
    pub async fn hybrid_recall(&self, request: RecallRequest) -> Result<RecallResult, MemoryError> {
        if request.user_id.is_empty() {
            return Err(MemoryError::Validation("user_id must not be empty".into()));
        }

        let stage = DialogStage::parse(&request.dialog_stage);
        let caps = apply_token_budget(stage.caps(), request.max_tokens);

        let profile_task = async {
            self.recall_user_profile(&request.user_id, "").await.map(|mut profiles| {
                profiles.truncate(caps.profile);
                profiles
            })
        };
        let topic_task = self.recall_topic_thread(&request.user_id, &request.query, caps.topic);
        let dialogue_task = async {
            if request.session_id.is_empty() {
                Ok(Vec::new())
            } else {
                self.recall_dialogue_context(&request.user_id, &request.session_id, caps.dialogue)
                    .await
            }
        };

        let (profile_result, topic_result, dialogue_result) =
            tokio::join!(profile_task, topic_task, dialogue_task);

        let profile_memories = layer_or_empty("profile", profile_result);
        let topic_memories = layer_or_empty("topic", topic_result);
        let dialogue_memories = layer_or_empty("dialogue", dialogue_result);

        let total = profile_memories.len() + topic_memories.len() + dialogue_memories.len();
        Ok(RecallResult {
            dialogue_memories,
            topic_memories,
            profile_memories,
            strategy: format!("{}: {}", stage.as_str(), stage.strategy_label()),
            tokens_used: total * TOKENS_PER_RECORD,
        })
    }
}

fn layer_or_empty(layer: &str, result: Result<Vec<Memory>, MemoryError>) -> Vec<Memory> {
    match result {
        Ok(memories) => memories,
        Err(e) => {
            warn!("hybrid recall: {layer} layer failed, returning empty: {e}");
            Vec::new()
        }
    }
}
