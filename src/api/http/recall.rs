// src/api/http/recall.rs

//! Recall endpoints: per-layer and stage-adaptive hybrid.

use std::sync::Arc;

use axum::{Json, extract::State, response::IntoResponse};
use serde::Deserialize;
use serde_json::json;

use crate::api::error::ApiResult;
use crate::memory::RecallRequest;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct RecallDialogueRequest {
    pub user_id: String,
    pub session_id: String,
    pub recent_turns: Option<usize>,
}

#[derive(Debug, Deserialize)]
pub struct RecallTopicRequest {
    pub user_id: String,
    pub query: String,
    pub top_k: Option<usize>,
}

#[derive(Debug, Deserialize)]
pub struct RecallProfileRequest {
    pub user_id: String,
    #[serde(default)]
    pub category: String,
}

#[derive(Debug, Deserialize)]
pub struct HybridRecallRequest {
    pub user_id: String,
    #[serde(default)]
    pub session_id: String,
    pub query: String,
    pub dialog_stage: Option<String>,
    pub max_tokens: Option<usize>,
}

/// POST /api/v1/recall/dialogue
pub async fn recall_dialogue(
    State(app): State<Arc<AppState>>,
    Json(req): Json<RecallDialogueRequest>,
) -> ApiResult<impl IntoResponse> {
    let recent_turns = req.recent_turns.unwrap_or(10);
    let dialogue = app
        .manager
        .recall_dialogue_context(&req.user_id, &req.session_id, recent_turns)
        .await?;
    Ok(Json(json!({
        "session_id": req.session_id,
        "count": dialogue.len(),
        "dialogue": dialogue,
    })))
}

/// POST /api/v1/recall/topic
pub async fn recall_topic(
    State(app): State<Arc<AppState>>,
    Json(req): Json<RecallTopicRequest>,
) -> ApiResult<impl IntoResponse> {
    let top_k = req.top_k.unwrap_or(5);
    let topics = app
        .manager
        .recall_topic_thread(&req.user_id, &req.query, top_k)
        .await?;
    Ok(Json(json!({ "count": topics.len(), "topics": topics })))
}

/// POST /api/v1/recall/profile
pub async fn recall_profile(
    State(app): State<Arc<AppState>>,
    Json(req): Json<RecallProfileRequest>,
) -> ApiResult<impl IntoResponse> {
    let profile = app
        .manager
        .recall_user_profile(&req.user_id, &req.category)
        .await?;
    Ok(Json(json!({
        "user_id": req.user_id,
        "category": req.category,
        "count": profile.len(),
        "profile": profile,
    })))
}

/// POST /api/v1/recall/hybrid
pub async fn recall_hybrid(
    State(app): State<Arc<AppState>>,
    Json(req): Json<HybridRecallRequest>,
) -> ApiResult<impl IntoResponse> {
    let result = app
        .manager
        .hybrid_recall(RecallRequest {
            user_id: req.user_id,
            session_id: req.session_id,
            query: req.query,
            dialog_stage: req.dialog_stage.unwrap_or_else(|| "multi_turn".to_string()),
            max_tokens: req.max_tokens.unwrap_or(4000),
        })
        .await?;

    Ok(Json(json!({
        "dialogue_count": result.dialogue_memories.len(),
        "topic_count": result.topic_memories.len(),
        "profile_count": result.profile_memories.len(),
        "strategy": result.strategy,
        "tokens_used": result.tokens_used,
        "dialogue": result.dialogue_memories,
        "topics": result.topic_memories,
        "profile": result.profile_memories,
    })))
}
