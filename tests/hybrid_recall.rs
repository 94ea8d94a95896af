// tests/hybrid_recall.rs

//! Stage-adaptive hybrid recall: caps, budgeting and failure isolation.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::json;

use mnemos::llm::MockLlm;
use mnemos::memory::{
    InMemoryMetadataStore, InMemoryVectorStore, ManagerConfig, Memory, MemoryLayer, MemoryManager,
    MemoryType, MockEmbedder, RecallRequest, VectorStore,
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

/// 20 records in each layer for u1/s1.
async fn seed(manager: &MemoryManager) {
    for i in 0..20 {
        let mut dialogue =
            Memory::new("u1", MemoryLayer::Dialogue, MemoryType::UserMessage, format!("对话 {i}"));
        dialogue.metadata.insert("session_id".into(), json!("s1"));
        manager.create_memory(dialogue).await.expect("seed dialogue");

        manager
            .create_memory(Memory::new(
                "u1",
                MemoryLayer::Topic,
                MemoryType::TopicThread,
                format!("话题 {i}"),
            ))
            .await
            .expect("seed topic");

        manager
            .create_memory(Memory::new(
                "u1",
                MemoryLayer::Profile,
                MemoryType::UserIdentity,
                format!("画像 {i}"),
            ))
            .await
            .expect("seed profile");
    }
}

fn request(stage: &str, max_tokens: usize) -> RecallRequest {
    RecallRequest {
        user_id: "u1".to_string(),
        session_id: "s1".to_string(),
        query: "今天适合出门吗".to_string(),
        dialog_stage: stage.to_string(),
        max_tokens,
    }
}

#[tokio::test]
async fn test_session_start_budgeting() {
    let manager = test_manager();
    seed(&manager).await;

    let result = manager
        .hybrid_recall(request("session_start", 4000))
        .await
        .expect("hybrid recall");

    assert_eq!(result.profile_memories.len(), 10);
    assert_eq!(result.topic_memories.len(), 3);
    assert_eq!(result.dialogue_memories.len(), 2);
    assert!(result.strategy.contains("session_start"));
    assert_eq!(result.tokens_used, 1500);
}

#[tokio::test]
async fn test_stage_caps_bound_every_layer() {
    let manager = test_manager();
    seed(&manager).await;

    for (stage, profile, topic, dialogue) in [
        ("topic_deepening", 5, 8, 5),
        ("multi_turn", 2, 3, 10),
        ("unheard_of_stage", 5, 5, 5),
    ] {
        let result = manager
            .hybrid_recall(request(stage, 4000))
            .await
            .expect("hybrid recall");
        assert!(result.profile_memories.len() <= profile, "{stage}: profile cap");
        assert!(result.topic_memories.len() <= topic, "{stage}: topic cap");
        assert!(result.dialogue_memories.len() <= dialogue, "{stage}: dialogue cap");
        assert_eq!(result.tokens_used, result.total_records() * 100);
    }
}

#[tokio::test]
async fn test_tight_budget_scales_caps_down() {
    let manager = test_manager();
    seed(&manager).await;

    // session_start caps 10/3/2 at 750 tokens scale by 0.5 → 5/1/1.
    let result = manager
        .hybrid_recall(request("session_start", 750))
        .await
        .expect("hybrid recall");

    assert_eq!(result.profile_memories.len(), 5);
    assert_eq!(result.topic_memories.len(), 1);
    assert_eq!(result.dialogue_memories.len(), 1);
    assert_eq!(result.tokens_used, 700);
}

#[tokio::test]
async fn test_missing_session_yields_empty_dialogue_layer() {
    let manager = test_manager();
    seed(&manager).await;

    let mut req = request("multi_turn", 4000);
    req.session_id = String::new();
    let result = manager.hybrid_recall(req).await.expect("hybrid recall");

    assert!(result.dialogue_memories.is_empty());
    assert!(!result.profile_memories.is_empty());
    assert_eq!(result.tokens_used, result.total_records() * 100);
}

/// Vector store whose searches always fail; inserts succeed.
struct SearchlessVectorStore(InMemoryVectorStore);

#[async_trait]
impl VectorStore for SearchlessVectorStore {
    async fn insert(&self, memory: &Memory) -> anyhow::Result<()> {
        self.0.insert(memory).await
    }
    async fn search(
        &self,
        _embedding: &[f32],
        _top_k: usize,
        _filters: &HashMap<String, String>,
    ) -> anyhow::Result<Vec<Memory>> {
        anyhow::bail!("index is rebuilding")
    }
    async fn delete(&self, id: &str) -> anyhow::Result<()> {
        self.0.delete(id).await
    }
}

#[tokio::test]
async fn test_layer_failure_is_isolated() {
    let manager = MemoryManager::new(
        Arc::new(SearchlessVectorStore(InMemoryVectorStore::new(DIM))),
        Arc::new(InMemoryMetadataStore::new()),
        Arc::new(MockEmbedder::new(DIM)),
        Arc::new(MockLlm),
        ManagerConfig::default(),
    );
    seed(&manager).await;

    let result = manager
        .hybrid_recall(request("session_start", 4000))
        .await
        .expect("hybrid recall succeeds despite topic layer failure");

    assert!(result.topic_memories.is_empty());
    assert_eq!(result.profile_memories.len(), 10);
    assert_eq!(result.dialogue_memories.len(), 2);
    assert_eq!(result.tokens_used, 1200);
}

#[tokio::test]
async fn test_topic_recall_flows_cap_into_top_k() {
    let manager = test_manager();
    seed(&manager).await;

    let topics = manager
        .recall_topic_thread("u1", "爬山", 4)
        .await
        .expect("topic recall");
    assert_eq!(topics.len(), 4);
    for topic in &topics {
        assert_eq!(topic.layer, MemoryLayer::Topic);
        assert!(topic.similarity_score().is_some());
    }

    // Other users' topics never leak in.
    let other = manager
        .recall_topic_thread("u2", "爬山", 4)
        .await
        .expect("topic recall");
    assert!(other.is_empty());
}
