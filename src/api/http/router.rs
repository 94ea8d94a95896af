// src/api/http/router.rs
// HTTP router composition for the REST surface

use std::sync::Arc;

use axum::{
    Router,
    routing::{get, post},
};

use crate::state::AppState;

use super::{
    health::{health_check, metrics_handler},
    memory::{create_memory, get_memory, list_memories, search_memories},
    recall::{recall_dialogue, recall_hybrid, recall_profile, recall_topic},
};

pub fn http_router(app_state: Arc<AppState>) -> Router {
    Router::new()
        // Operational
        .route("/health", get(health_check))
        .route("/metrics", get(metrics_handler))
        // Memory management
        .route("/api/v1/memories", post(create_memory).get(list_memories))
        .route("/api/v1/memories/search", post(search_memories))
        .route("/api/v1/memories/{id}", get(get_memory))
        // Recall
        .route("/api/v1/recall/dialogue", post(recall_dialogue))
        .route("/api/v1/recall/topic", post(recall_topic))
        .route("/api/v1/recall/profile", post(recall_profile))
        .route("/api/v1/recall/hybrid", post(recall_hybrid))
        .with_state(app_state)
}
