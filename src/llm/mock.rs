// src/llm/mock.rs

//! Canned LLM client for mock mode and tests. Deterministic output, no
//! network.

use anyhow::Result;
use async_trait::async_trait;
use serde_json::{Map, json};

use crate::memory::core::traits::LlmClient;
use crate::memory::core::types::{Intent, Memory, TopicSummary, UserProfile};

pub struct MockLlm;

#[async_trait]
impl LlmClient for MockLlm {
    async fn summarize_dialogues(&self, dialogues: &[Memory]) -> Result<TopicSummary> {
        if dialogues.is_empty() {
            anyhow::bail!("empty dialogues");
        }
        let first = dialogues[0].content.chars().take(10).collect::<String>();
        Ok(TopicSummary {
            title: format!("关于「{first}」"),
            summary: format!("用户与助手围绕「{first}」展开了 {} 轮对话。", dialogues.len()),
            keywords: vec!["对话".to_string(), "摘要".to_string(), "话题".to_string()],
            dialogue_ids: dialogues.iter().map(|m| m.id.clone()).collect(),
        })
    }

    async fn extract_profile(&self, topics: &[Memory]) -> Result<UserProfile> {
        if topics.is_empty() {
            anyhow::bail!("empty topics");
        }
        let mut preferences = Map::new();
        preferences.insert("interests".into(), json!(["日常对话"]));
        preferences.insert("communication_style".into(), json!("简洁直接"));
        let mut habits = Map::new();
        habits.insert("active_time".into(), json!("不定"));
        let mut features = Map::new();
        features.insert("knowledge_level".into(), json!("未知"));

        Ok(UserProfile {
            preferences,
            habits,
            features,
            topic_ids: topics.iter().map(|m| m.id.clone()).collect(),
        })
    }

    async fn analyze_intent(&self, message: &str) -> Result<Intent> {
        let message = message.trim();
        if message.contains('?') || message.contains('？') {
            return Ok(Intent::Question);
        }
        if message.starts_with("请") || message.starts_with("帮") {
            return Ok(Intent::Task);
        }
        Ok(Intent::Chat)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::core::types::{MemoryLayer, MemoryType};

    #[tokio::test]
    async fn test_mock_summary_carries_input_ids() {
        let mut a = Memory::new("u1", MemoryLayer::Dialogue, MemoryType::UserMessage, "今天天气怎么样？");
        a.id = "d1".into();
        let mut b = Memory::new("u1", MemoryLayer::Dialogue, MemoryType::AssistantMessage, "晴天。");
        b.id = "d2".into();

        let summary = MockLlm.summarize_dialogues(&[a, b]).await.unwrap();
        assert_eq!(summary.dialogue_ids, vec!["d1", "d2"]);
        assert!(!summary.title.is_empty());
    }

    #[tokio::test]
    async fn test_mock_intent_heuristics() {
        assert_eq!(MockLlm.analyze_intent("现在几点？").await.unwrap(), Intent::Question);
        assert_eq!(MockLlm.analyze_intent("请帮我订个闹钟").await.unwrap(), Intent::Task);
        assert_eq!(MockLlm.analyze_intent("今天心情不错").await.unwrap(), Intent::Chat);
    }
}
