// src/api/http/memory.rs

//! Memory CRUD and flat search endpoints: thin adapters over the manager.

use std::sync::Arc;

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde::Deserialize;
use serde_json::{Map, Value, json};

use crate::api::error::{ApiError, ApiResult};
use crate::memory::{Memory, MemoryLayer, MemoryType};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct CreateMemoryRequest {
    pub user_id: String,
    pub layer: String,
    #[serde(rename = "type")]
    pub memory_type: String,
    pub content: String,
    #[serde(default)]
    pub metadata: Map<String, Value>,
}

#[derive(Debug, Deserialize)]
pub struct SearchMemoryRequest {
    #[allow(dead_code)] // accepted for forward compatibility; search is not user-scoped
    pub user_id: String,
    pub query: String,
    pub top_k: Option<usize>,
}

#[derive(Debug, Deserialize)]
pub struct ListMemoriesQuery {
    pub user_id: String,
    pub layer: Option<String>,
    pub limit: Option<usize>,
}

/// POST /api/v1/memories
pub async fn create_memory(
    State(app): State<Arc<AppState>>,
    Json(req): Json<CreateMemoryRequest>,
) -> ApiResult<impl IntoResponse> {
    let layer: MemoryLayer = req
        .layer
        .parse()
        .map_err(|e: anyhow::Error| ApiError::bad_request(e.to_string()))?;
    let memory_type: MemoryType = req
        .memory_type
        .parse()
        .map_err(|e: anyhow::Error| ApiError::bad_request(e.to_string()))?;
    if memory_type.layer() != layer {
        return Err(ApiError::bad_request(format!(
            "type {memory_type} does not belong to layer {layer}"
        )));
    }

    let memory = Memory::new(req.user_id, layer, memory_type, req.content)
        .with_metadata(req.metadata);
    let created = app.manager.create_memory(memory).await?;

    Ok((StatusCode::CREATED, Json(json!({ "id": created.id }))))
}

/// GET /api/v1/memories/{id}
pub async fn get_memory(
    State(app): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult<impl IntoResponse> {
    let memory = app.manager.get_memory(&id).await?;
    Ok(Json(json!({ "memory": memory })))
}

/// GET /api/v1/memories?user_id=…&layer=…&limit=…
pub async fn list_memories(
    State(app): State<Arc<AppState>>,
    Query(query): Query<ListMemoriesQuery>,
) -> ApiResult<impl IntoResponse> {
    let limit = query.limit.unwrap_or(50);
    let store = app.manager.metadata_store();

    let memories = match &query.layer {
        Some(layer) => {
            let layer: MemoryLayer = layer
                .parse()
                .map_err(|e: anyhow::Error| ApiError::bad_request(e.to_string()))?;
            store
                .get_memories_by_layer(&query.user_id, layer, limit)
                .await
                .map_err(|e| ApiError::internal(e.to_string()))?
        }
        None => {
            // No layer given: merge all three partitions, newest first.
            let mut merged = Vec::new();
            for layer in [MemoryLayer::Dialogue, MemoryLayer::Topic, MemoryLayer::Profile] {
                merged.extend(
                    store
                        .get_memories_by_layer(&query.user_id, layer, limit)
                        .await
                        .map_err(|e| ApiError::internal(e.to_string()))?,
                );
            }
            merged.sort_by(|a, b| b.created_at.cmp(&a.created_at));
            merged.truncate(limit);
            merged
        }
    };

    Ok(Json(json!({ "count": memories.len(), "memories": memories })))
}

/// POST /api/v1/memories/search
pub async fn search_memories(
    State(app): State<Arc<AppState>>,
    Json(req): Json<SearchMemoryRequest>,
) -> ApiResult<impl IntoResponse> {
    let top_k = req.top_k.unwrap_or(10);
    let memories = app.manager.search_memory(&req.query, top_k).await?;
    Ok(Json(json!({ "count": memories.len(), "memories": memories })))
}
