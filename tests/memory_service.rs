// tests/memory_service.rs

//! End-to-end manager scenarios against the in-memory backends.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;

use mnemos::llm::MockLlm;
use mnemos::memory::{
    InMemoryMetadataStore, InMemoryVectorStore, ManagerConfig, Memory, MemoryError, MemoryLayer,
    MemoryManager, MemoryType, MockEmbedder, VectorStore,
};

const DIM: usize = 64;

fn test_manager() -> MemoryManager {
    MemoryManager::new(
        Arc::new(InMemoryVectorStore::new(DIM)),
        Arc::new(InMemoryMetadataStore::new()),
        Arc::new(MockEmbedder::new(DIM)),
        Arc::new(MockLlm),
        ManagerConfig::default(),
    )
}

fn dialogue_memory(user: &str, session: &str, content: &str) -> Memory {
    let mut memory = Memory::new(user, MemoryLayer::Dialogue, MemoryType::UserMessage, content);
    memory
        .metadata
        .insert("session_id".into(), json!(session));
    memory
}

struct FailingVectorStore;

#[async_trait]
impl VectorStore for FailingVectorStore {
    async fn insert(&self, _memory: &Memory) -> anyhow::Result<()> {
        anyhow::bail!("vector index unavailable")
    }
    async fn search(
        &self,
        _embedding: &[f32],
        _top_k: usize,
        _filters: &HashMap<String, String>,
    ) -> anyhow::Result<Vec<Memory>> {
        Ok(Vec::new())
    }
    async fn delete(&self, _id: &str) -> anyhow::Result<()> {
        Ok(())
    }
}

#[tokio::test]
async fn test_basic_create_and_search() {
    let manager = test_manager();

    let created = manager
        .create_memory(dialogue_memory("u1", "s1", "今天天气怎么样？"))
        .await
        .expect("create");

    let results = manager.search_memory("天气如何", 5).await.expect("search");
    assert!(!results.is_empty());
    assert!(results.iter().any(|m| m.id == created.id));
    for memory in &results {
        assert!(memory.similarity_score().is_some());
    }

    // Scores are raw distances, ascending.
    let scores: Vec<f64> = results.iter().filter_map(|m| m.similarity_score()).collect();
    assert!(scores.windows(2).all(|w| w[0] <= w[1]));
}

#[tokio::test]
async fn test_session_recall_is_chronological() {
    let manager = test_manager();

    for content in ["A", "B", "C"] {
        manager
            .create_memory(dialogue_memory("u1", "s1", content))
            .await
            .expect("create");
        tokio::time::sleep(Duration::from_millis(2)).await;
    }

    let dialogue = manager
        .recall_dialogue_context("u1", "s1", 10)
        .await
        .expect("recall");
    let contents: Vec<&str> = dialogue.iter().map(|m| m.content.as_str()).collect();
    assert_eq!(contents, ["A", "B", "C"]);

    assert!(dialogue.windows(2).all(|w| w[0].created_at <= w[1].created_at));
}

#[tokio::test]
async fn test_profile_confidence_filter() {
    let manager = test_manager();

    let mut confident = Memory::new("u1", MemoryLayer::Profile, MemoryType::UserIdentity, "资深工程师");
    confident.metadata.insert("confidence_level".into(), json!(0.9));
    let confident = manager.create_memory(confident).await.expect("create");

    let mut doubtful = Memory::new("u1", MemoryLayer::Profile, MemoryType::UserIdentity, "可能喜欢猫");
    doubtful.metadata.insert("confidence_level".into(), json!(0.5));
    manager.create_memory(doubtful).await.expect("create");

    let profiles = manager.recall_user_profile("u1", "").await.expect("recall");
    assert_eq!(profiles.len(), 1);
    assert_eq!(profiles[0].id, confident.id);

    // Records without the field are kept.
    let unlabeled = manager
        .create_memory(Memory::new("u1", MemoryLayer::Profile, MemoryType::Preference, "喜欢喝茶"))
        .await
        .expect("create");
    let profiles = manager.recall_user_profile("u1", "").await.expect("recall");
    assert_eq!(profiles.len(), 2);

    // Category narrowing maps to the type enum.
    let preferences = manager
        .recall_user_profile("u1", "preference")
        .await
        .expect("recall");
    assert_eq!(preferences.len(), 1);
    assert_eq!(preferences[0].id, unlabeled.id);

    assert!(matches!(
        manager.recall_user_profile("u1", "zodiac").await.unwrap_err(),
        MemoryError::Validation(_)
    ));
}

#[tokio::test]
async fn test_degraded_write_survives_vector_failure() {
    let manager = MemoryManager::new(
        Arc::new(FailingVectorStore),
        Arc::new(InMemoryMetadataStore::new()),
        Arc::new(MockEmbedder::new(DIM)),
        Arc::new(MockLlm),
        ManagerConfig::default(),
    );

    let created = manager
        .create_memory(dialogue_memory("u1", "s1", "今天天气怎么样？"))
        .await
        .expect("create succeeds despite vector failure");

    // Retrievable by id and by session…
    let fetched = manager.get_memory(&created.id).await.expect("get");
    assert_eq!(fetched.content, "今天天气怎么样？");
    let dialogue = manager.recall_dialogue_context("u1", "s1", 10).await.expect("recall");
    assert_eq!(dialogue.len(), 1);

    // …but invisible to similarity search.
    let results = manager.search_memory("天气", 5).await.expect("search");
    assert!(results.iter().all(|m| m.id != created.id));
}

#[tokio::test]
async fn test_aggregation_pipeline() {
    let manager = test_manager();

    let mut dialogue_ids = Vec::new();
    for i in 0..6 {
        let created = manager
            .create_memory(dialogue_memory("u1", "s1", &format!("第 {} 轮对话", i + 1)))
            .await
            .expect("create");
        dialogue_ids.push(created.id);
    }

    let topic_id = manager
        .aggregate_dialogue_to_topic("u1", "s1")
        .await
        .expect("aggregate");

    let topic = manager.get_memory(&topic_id).await.expect("get topic");
    assert_eq!(topic.layer, MemoryLayer::Topic);
    assert_eq!(topic.memory_type, MemoryType::TopicThread);
    assert_eq!(topic.metadata.get("source"), Some(&json!("llm_aggregation")));
    assert_eq!(topic.session_id(), Some("s1"));

    let recorded: Vec<String> = topic
        .metadata
        .get("dialogue_ids")
        .and_then(|v| serde_json::from_value(v.clone()).ok())
        .expect("dialogue_ids present");
    for id in &dialogue_ids {
        assert!(recorded.contains(id), "missing dialogue id {id}");
    }

    // Empty session is an error, not an empty topic.
    assert!(manager.aggregate_dialogue_to_topic("u1", "ghost-session").await.is_err());
}

#[tokio::test]
async fn test_extraction_pipeline_skips_non_topics() {
    let manager = test_manager();

    let topic = manager
        .create_memory(
            Memory::new("u1", MemoryLayer::Topic, MemoryType::TopicThread, "聊了天气和爬山"),
        )
        .await
        .expect("create topic");
    let stray_dialogue = manager
        .create_memory(dialogue_memory("u1", "s1", "你好"))
        .await
        .expect("create dialogue");

    let ids = vec![
        topic.id.clone(),
        stray_dialogue.id.clone(),
        "missing-id".to_string(),
    ];
    let profile_id = manager
        .extract_profile_from_topics("u1", &ids)
        .await
        .expect("extract");

    let profile = manager.get_memory(&profile_id).await.expect("get profile");
    assert_eq!(profile.layer, MemoryLayer::Profile);
    assert_eq!(profile.memory_type, MemoryType::UserIdentity);
    assert_eq!(profile.metadata.get("source"), Some(&json!("llm_extraction")));
    assert!(profile.content.starts_with("用户兴趣"));

    let topic_ids: Vec<String> = profile
        .metadata
        .get("topic_ids")
        .and_then(|v| serde_json::from_value(v.clone()).ok())
        .expect("topic_ids present");
    assert_eq!(topic_ids, vec![topic.id]);

    // No topics at all is an error.
    assert!(manager.extract_profile_from_topics("stranger", &[]).await.is_err());
}

#[tokio::test]
async fn test_delete_is_idempotent() {
    let manager = test_manager();
    let created = manager
        .create_memory(dialogue_memory("u1", "s1", "转瞬即逝"))
        .await
        .expect("create");

    manager.delete_memory(&created.id).await.expect("first delete");
    assert!(matches!(
        manager.get_memory(&created.id).await.unwrap_err(),
        MemoryError::NotFound(_)
    ));
    // Second delete behaves like deleting a non-existent id.
    manager.delete_memory(&created.id).await.expect("second delete");

    let results = manager.search_memory("转瞬即逝", 5).await.expect("search");
    assert!(results.iter().all(|m| m.id != created.id));
}

#[tokio::test]
async fn test_open_maintenance_operations_are_stubbed() {
    let manager = test_manager();
    assert!(matches!(
        manager.compress_memories("u1").await.unwrap_err(),
        MemoryError::Unimplemented(_)
    ));
    assert!(matches!(
        manager.decay_memories("u1").await.unwrap_err(),
        MemoryError::Unimplemented(_)
    ));
    assert!(matches!(
        manager.reflect_memories("u1").await.unwrap_err(),
        MemoryError::Unimplemented(_)
    ));
}
