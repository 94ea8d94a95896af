// src/llm/openai.rs

//! Chat-completions client implementing the three distillation operations.
//!
//! Works against any OpenAI-compatible endpoint. Responses are expected as
//! bare JSON; models love to wrap them in markdown fences, so every parse
//! goes through [`strip_code_fences`] first.

use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{Map, Value};
use tracing::debug;

use crate::memory::core::traits::LlmClient;
use crate::memory::core::types::{Intent, Memory, TopicSummary, UserProfile};

/// Trim a leading ```` ```json ```` / ```` ``` ```` fence and a trailing
/// ```` ``` ```` fence, then whitespace.
pub fn strip_code_fences(content: &str) -> &str {
    let s = content.trim();
    let s = s.strip_prefix("```json").unwrap_or(s);
    let s = s.strip_prefix("```").unwrap_or(s);
    let s = s.strip_suffix("```").unwrap_or(s);
    s.trim()
}

fn enumerate_contents(header: &str, memories: &[Memory]) -> String {
    let mut text = String::from(header);
    text.push_str("\n\n");
    for (i, memory) in memories.iter().enumerate() {
        text.push_str(&format!("{}. {}\n", i + 1, memory.content));
    }
    text
}

pub struct OpenAiChat {
    client: Client,
    api_key: String,
    model: String,
    base_url: String,
}

impl OpenAiChat {
    pub fn new(
        api_key: impl Into<String>,
        model: impl Into<String>,
        base_url: impl Into<String>,
    ) -> Self {
        Self {
            client: Client::new(),
            api_key: api_key.into(),
            model: model.into(),
            base_url: base_url.into(),
        }
    }

    fn api_url(&self) -> String {
        format!("{}/chat/completions", self.base_url.trim_end_matches('/'))
    }

    async fn chat(&self, prompt: String) -> Result<String> {
        let response = self
            .client
            .post(self.api_url())
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&serde_json::json!({
                "model": &self.model,
                "messages": [{"role": "user", "content": prompt}],
            }))
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("chat API error {}: {}", status.as_u16(), body);
        }

        let raw: Value = response.json().await.context("failed to parse chat response")?;
        let content = raw["choices"][0]["message"]["content"]
            .as_str()
            .ok_or_else(|| anyhow!("empty response from chat API"))?;

        debug!("chat completion returned {} chars", content.len());
        Ok(content.to_string())
    }
}

#[derive(Deserialize)]
struct SummaryPayload {
    title: String,
    summary: String,
    #[serde(default)]
    keywords: Vec<String>,
}

#[derive(Deserialize)]
struct ProfilePayload {
    #[serde(default)]
    preferences: Map<String, Value>,
    #[serde(default)]
    habits: Map<String, Value>,
    #[serde(default)]
    features: Map<String, Value>,
}

#[async_trait]
impl LlmClient for OpenAiChat {
    async fn summarize_dialogues(&self, dialogues: &[Memory]) -> Result<TopicSummary> {
        if dialogues.is_empty() {
            anyhow::bail!("empty dialogues");
        }

        let dialogue_ids: Vec<String> = dialogues.iter().map(|m| m.id.clone()).collect();
        let conversation = enumerate_contents("以下是一段完整的对话记录：", dialogues);

        let prompt = format!(
            r#"{conversation}
请分析这段对话，提取以下信息：
1. 话题标题（5-10字，精炼概括核心主题）
2. 话题摘要（50-200字，详细描述对话内容和要点）
3. 关键词（3-5个）

请严格按照以下 JSON 格式返回，不要添加任何其他内容：
{{
  "title": "话题标题",
  "summary": "详细摘要内容",
  "keywords": ["关键词1", "关键词2", "关键词3"]
}}"#
        );

        let response = self.chat(prompt).await?;
        let content = strip_code_fences(&response);
        let payload: SummaryPayload = serde_json::from_str(content)
            .map_err(|e| anyhow!("failed to parse summary response: {e}\nResponse: {content}"))?;

        Ok(TopicSummary {
            title: payload.title,
            summary: payload.summary,
            keywords: payload.keywords,
            dialogue_ids,
        })
    }

    async fn extract_profile(&self, topics: &[Memory]) -> Result<UserProfile> {
        if topics.is_empty() {
            anyhow::bail!("empty topics");
        }

        let topic_ids: Vec<String> = topics.iter().map(|m| m.id.clone()).collect();
        let history = enumerate_contents("以下是用户的历史话题记录：", topics);

        let prompt = format!(
            r#"{history}
请深度分析这些话题，提炼用户画像，包括：

1. 偏好特征 (Preferences)：用户的兴趣爱好、喜欢的话题类型、沟通风格等
2. 行为习惯 (Habits)：对话频率、活跃时段、提问方式等
3. 认知特征 (Features)：知识水平、学习能力、思维方式等

请严格按照以下 JSON 格式返回，不要添加任何其他内容：
{{
  "preferences": {{
    "interests": ["兴趣1", "兴趣2"],
    "communication_style": "风格描述"
  }},
  "habits": {{
    "active_time": "时段描述",
    "question_pattern": "提问方式"
  }},
  "features": {{
    "knowledge_level": "水平描述",
    "learning_ability": "能力描述"
  }}
}}"#
        );

        let response = self.chat(prompt).await?;
        let content = strip_code_fences(&response);
        let payload: ProfilePayload = serde_json::from_str(content)
            .map_err(|e| anyhow!("failed to parse profile response: {e}\nResponse: {content}"))?;

        Ok(UserProfile {
            preferences: payload.preferences,
            habits: payload.habits,
            features: payload.features,
            topic_ids,
        })
    }

    async fn analyze_intent(&self, message: &str) -> Result<Intent> {
        let prompt = format!(
            r#"分析以下用户消息的意图，从以下类型中选择一个：
- question: 用户在提问
- chat: 用户在闲聊
- task: 用户在请求执行任务
- feedback: 用户在提供反馈

用户消息："{message}"

只返回意图类型（question/chat/task/feedback），不要添加任何其他内容。"#
        );

        let response = self.chat(prompt).await?;
        // Unrecognized model output degrades to small talk, never an error.
        Ok(Intent::parse(&response))
    }
}
