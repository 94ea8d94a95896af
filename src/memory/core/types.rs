// src/memory/core/types.rs

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Memory tier. Dialogue records decay fastest, profiles barely at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MemoryLayer {
    /// Raw conversation turns (short-term).
    Dialogue,
    /// Topic threads aggregated from a session's dialogues (mid-term).
    Topic,
    /// Stable user characteristics extracted from topics (long-term).
    Profile,
}

impl MemoryLayer {
    pub fn as_str(&self) -> &'static str {
        match self {
            MemoryLayer::Dialogue => "dialogue",
            MemoryLayer::Topic => "topic",
            MemoryLayer::Profile => "profile",
        }
    }

    /// Initial importance assigned to records created in this layer.
    pub fn default_importance(&self) -> f64 {
        match self {
            MemoryLayer::Dialogue => 0.6,
            MemoryLayer::Topic => 0.8,
            MemoryLayer::Profile => 1.0,
        }
    }
}

impl fmt::Display for MemoryLayer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for MemoryLayer {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "dialogue" => Ok(MemoryLayer::Dialogue),
            "topic" => Ok(MemoryLayer::Topic),
            "profile" => Ok(MemoryLayer::Profile),
            _ => Err(anyhow::anyhow!("unknown memory layer: {}", s)),
        }
    }
}

/// Per-layer record subtype.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MemoryType {
    // Dialogue layer
    UserMessage,
    AssistantMessage,
    DialogueContext,
    // Topic layer
    TopicThread,
    Intent,
    ConversationFlow,
    // Profile layer
    UserIdentity,
    CommunicationStyle,
    Personality,
    Preference,
}

impl MemoryType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MemoryType::UserMessage => "user_message",
            MemoryType::AssistantMessage => "assistant_message",
            MemoryType::DialogueContext => "dialogue_context",
            MemoryType::TopicThread => "topic_thread",
            MemoryType::Intent => "intent",
            MemoryType::ConversationFlow => "conversation_flow",
            MemoryType::UserIdentity => "user_identity",
            MemoryType::CommunicationStyle => "communication_style",
            MemoryType::Personality => "personality",
            MemoryType::Preference => "preference",
        }
    }

    /// The layer whose partition holds records of this type.
    pub fn layer(&self) -> MemoryLayer {
        match self {
            MemoryType::UserMessage | MemoryType::AssistantMessage | MemoryType::DialogueContext => {
                MemoryLayer::Dialogue
            }
            MemoryType::TopicThread | MemoryType::Intent | MemoryType::ConversationFlow => {
                MemoryLayer::Topic
            }
            MemoryType::UserIdentity
            | MemoryType::CommunicationStyle
            | MemoryType::Personality
            | MemoryType::Preference => MemoryLayer::Profile,
        }
    }
}

impl fmt::Display for MemoryType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for MemoryType {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "user_message" => Ok(MemoryType::UserMessage),
            "assistant_message" => Ok(MemoryType::AssistantMessage),
            "dialogue_context" => Ok(MemoryType::DialogueContext),
            "topic_thread" => Ok(MemoryType::TopicThread),
            "intent" => Ok(MemoryType::Intent),
            "conversation_flow" => Ok(MemoryType::ConversationFlow),
            "user_identity" => Ok(MemoryType::UserIdentity),
            "communication_style" => Ok(MemoryType::CommunicationStyle),
            "personality" => Ok(MemoryType::Personality),
            "preference" => Ok(MemoryType::Preference),
            _ => Err(anyhow::anyhow!("unknown memory type: {}", s)),
        }
    }
}

/// The single logical entity stored at all three layers. The backend
/// representation differs per layer but this shape is uniform.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Memory {
    pub id: String,
    pub user_id: String,
    pub layer: MemoryLayer,
    #[serde(rename = "type")]
    pub memory_type: MemoryType,
    pub content: String,

    /// Dense vector; absent after a degraded write. Never serialized to JSON.
    #[serde(skip)]
    pub embedding: Option<Vec<f32>>,

    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub metadata: Map<String, Value>,

    pub importance: f64,
    pub access_count: i64,
    pub last_accessed: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Memory {
    /// A blank record for the given tier. Id, timestamps and default
    /// importance are assigned by the manager on create.
    pub fn new(
        user_id: impl Into<String>,
        layer: MemoryLayer,
        memory_type: MemoryType,
        content: impl Into<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: String::new(),
            user_id: user_id.into(),
            layer,
            memory_type,
            content: content.into(),
            embedding: None,
            metadata: Map::new(),
            importance: 0.0,
            access_count: 0,
            last_accessed: now,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn with_metadata(mut self, metadata: Map<String, Value>) -> Self {
        self.metadata = metadata;
        self
    }

    /// The session this dialogue record participates in, if any.
    pub fn session_id(&self) -> Option<&str> {
        self.metadata.get("session_id").and_then(|v| v.as_str())
    }

    /// Extraction confidence, when the distillation pipeline recorded one.
    pub fn confidence_level(&self) -> Option<f64> {
        self.metadata.get("confidence_level").and_then(|v| v.as_f64())
    }

    /// Raw vector distance attached by the vector store on search results.
    pub fn similarity_score(&self) -> Option<f64> {
        self.metadata.get("similarity_score").and_then(|v| v.as_f64())
    }

    pub fn set_similarity_score(&mut self, score: f32) {
        self.metadata
            .insert("similarity_score".to_string(), Value::from(score as f64));
    }
}

/// Output of the dialogue→topic distillation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TopicSummary {
    pub title: String,
    pub summary: String,
    pub keywords: Vec<String>,
    /// Ids of the dialogue records the summary was distilled from. Supplied
    /// by the client from its input list, never by the model.
    pub dialogue_ids: Vec<String>,
}

/// Output of the topic→profile distillation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserProfile {
    pub preferences: Map<String, Value>,
    pub habits: Map<String, Value>,
    pub features: Map<String, Value>,
    pub topic_ids: Vec<String>,
}

/// Classified intent of a single user message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Intent {
    Question,
    Chat,
    Task,
    Feedback,
}

impl Intent {
    pub fn as_str(&self) -> &'static str {
        match self {
            Intent::Question => "question",
            Intent::Chat => "chat",
            Intent::Task => "task",
            Intent::Feedback => "feedback",
        }
    }

    /// Lenient parse: anything unrecognized is treated as small talk.
    pub fn parse(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "question" => Intent::Question,
            "task" => Intent::Task,
            "feedback" => Intent::Feedback,
            _ => Intent::Chat,
        }
    }
}

impl fmt::Display for Intent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Conversation stage driving the per-layer recall mix.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DialogStage {
    SessionStart,
    TopicDeepening,
    MultiTurn,
    Balanced,
}

/// Per-layer record caps for one hybrid recall.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecallCaps {
    pub profile: usize,
    pub topic: usize,
    pub dialogue: usize,
}

impl RecallCaps {
    pub fn total(&self) -> usize {
        self.profile + self.topic + self.dialogue
    }
}

impl DialogStage {
    /// Lenient parse: unknown stages fall back to the balanced mix.
    pub fn parse(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "session_start" => DialogStage::SessionStart,
            "topic_deepening" => DialogStage::TopicDeepening,
            "multi_turn" => DialogStage::MultiTurn,
            _ => DialogStage::Balanced,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DialogStage::SessionStart => "session_start",
            DialogStage::TopicDeepening => "topic_deepening",
            DialogStage::MultiTurn => "multi_turn",
            DialogStage::Balanced => "balanced",
        }
    }

    pub fn caps(&self) -> RecallCaps {
        match self {
            DialogStage::SessionStart => RecallCaps { profile: 10, topic: 3, dialogue: 2 },
            DialogStage::TopicDeepening => RecallCaps { profile: 5, topic: 8, dialogue: 5 },
            DialogStage::MultiTurn => RecallCaps { profile: 2, topic: 3, dialogue: 10 },
            DialogStage::Balanced => RecallCaps { profile: 5, topic: 5, dialogue: 5 },
        }
    }

    pub fn strategy_label(&self) -> &'static str {
        match self {
            DialogStage::SessionStart => "重画像，轻对话",
            DialogStage::TopicDeepening => "重话题，中画像",
            DialogStage::MultiTurn => "重对话，轻画像",
            DialogStage::Balanced => "均衡召回",
        }
    }
}

/// Input to the stage-adaptive hybrid recall.
#[derive(Debug, Clone, Deserialize)]
pub struct RecallRequest {
    pub user_id: String,
    #[serde(default)]
    pub session_id: String,
    pub query: String,
    #[serde(default)]
    pub dialog_stage: String,
    #[serde(default)]
    pub max_tokens: usize,
}

/// Merged result of one hybrid recall.
#[derive(Debug, Clone, Serialize)]
pub struct RecallResult {
    pub dialogue_memories: Vec<Memory>,
    pub topic_memories: Vec<Memory>,
    pub profile_memories: Vec<Memory>,
    pub strategy: String,
    pub tokens_used: usize,
}

impl RecallResult {
    pub fn total_records(&self) -> usize {
        self.dialogue_memories.len() + self.topic_memories.len() + self.profile_memories.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layer_round_trip() {
        for layer in [MemoryLayer::Dialogue, MemoryLayer::Topic, MemoryLayer::Profile] {
            assert_eq!(layer.as_str().parse::<MemoryLayer>().unwrap(), layer);
        }
        assert!("working".parse::<MemoryLayer>().is_err());
    }

    #[test]
    fn test_type_partition_inference() {
        assert_eq!(MemoryType::AssistantMessage.layer(), MemoryLayer::Dialogue);
        assert_eq!(MemoryType::TopicThread.layer(), MemoryLayer::Topic);
        assert_eq!(MemoryType::Preference.layer(), MemoryLayer::Profile);
    }

    #[test]
    fn test_intent_parse_defaults_to_chat() {
        assert_eq!(Intent::parse("  QUESTION "), Intent::Question);
        assert_eq!(Intent::parse("greeting"), Intent::Chat);
        assert_eq!(Intent::parse(""), Intent::Chat);
    }

    #[test]
    fn test_stage_caps() {
        assert_eq!(DialogStage::parse("session_start").caps().total(), 15);
        assert_eq!(DialogStage::parse("nonsense").caps(), RecallCaps { profile: 5, topic: 5, dialogue: 5 });
    }

    #[test]
    fn test_embedding_not_serialized() {
        let mut m = Memory::new("u1", MemoryLayer::Dialogue, MemoryType::UserMessage, "hi");
        m.embedding = Some(vec![0.1, 0.2]);
        let json = serde_json::to_value(&m).unwrap();
        assert!(json.get("embedding").is_none());
        assert_eq!(json["type"], "user_message");
    }
}
