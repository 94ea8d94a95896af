// tests/http_api.rs

//! REST surface tests driven through the router with mock backends.

use std::sync::Arc;

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use http_body_util::BodyExt;
use metrics_exporter_prometheus::PrometheusBuilder;
use serde_json::{Value, json};
use tower::ServiceExt;

use mnemos::api::http_router;
use mnemos::llm::MockLlm;
use mnemos::memory::{
    InMemoryMetadataStore, InMemoryVectorStore, ManagerConfig, MemoryManager, MockEmbedder,
};
use mnemos::state::AppState;

const DIM: usize = 64;

fn test_app() -> Router {
    let manager = MemoryManager::new(
        Arc::new(InMemoryVectorStore::new(DIM)),
        Arc::new(InMemoryMetadataStore::new()),
        Arc::new(MockEmbedder::new(DIM)),
        Arc::new(MockLlm),
        ManagerConfig::default(),
    );
    let prometheus = PrometheusBuilder::new().build_recorder().handle();
    http_router(Arc::new(AppState {
        manager,
        sqlite_pool: None,
        qdrant: None,
        prometheus,
    }))
}

async fn send(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let request = match body {
        Some(json) => Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(json.to_string()))
            .unwrap(),
        None => Request::builder().method(method).uri(uri).body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::String(
            String::from_utf8_lossy(&bytes).to_string(),
        ))
    };
    (status, value)
}

#[tokio::test]
async fn test_create_then_get_memory() {
    let app = test_app();

    let (status, body) = send(
        &app,
        "POST",
        "/api/v1/memories",
        Some(json!({
            "user_id": "u1",
            "layer": "dialogue",
            "type": "user_message",
            "content": "今天天气怎么样？",
            "metadata": {"session_id": "s1"},
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let id = body["id"].as_str().expect("id in response").to_string();

    let (status, body) = send(&app, "GET", &format!("/api/v1/memories/{id}"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["memory"]["content"], "今天天气怎么样？");
    assert_eq!(body["memory"]["layer"], "dialogue");

    let (status, body) = send(&app, "GET", "/api/v1/memories/no-such-id", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], true);
}

#[tokio::test]
async fn test_create_rejects_bad_enums() {
    let app = test_app();

    let (status, _) = send(
        &app,
        "POST",
        "/api/v1/memories",
        Some(json!({
            "user_id": "u1",
            "layer": "working",
            "type": "user_message",
            "content": "x",
        })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    // Type from another layer's partition is rejected too.
    let (status, body) = send(
        &app,
        "POST",
        "/api/v1/memories",
        Some(json!({
            "user_id": "u1",
            "layer": "dialogue",
            "type": "topic_thread",
            "content": "x",
        })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["message"].as_str().unwrap().contains("does not belong"));
}

#[tokio::test]
async fn test_search_endpoint() {
    let app = test_app();

    send(
        &app,
        "POST",
        "/api/v1/memories",
        Some(json!({
            "user_id": "u1",
            "layer": "dialogue",
            "type": "user_message",
            "content": "周末想去爬山",
        })),
    )
    .await;

    let (status, body) = send(
        &app,
        "POST",
        "/api/v1/memories/search",
        Some(json!({"user_id": "u1", "query": "爬山", "top_k": 5})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["count"], 1);
    assert!(body["memories"][0]["metadata"]["similarity_score"].is_number());

    // Empty query is a 400, not a 500.
    let (status, _) = send(
        &app,
        "POST",
        "/api/v1/memories/search",
        Some(json!({"user_id": "u1", "query": "", "top_k": 5})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_recall_routes() {
    let app = test_app();

    for content in ["早上好", "想去公园"] {
        send(
            &app,
            "POST",
            "/api/v1/memories",
            Some(json!({
                "user_id": "u1",
                "layer": "dialogue",
                "type": "user_message",
                "content": content,
                "metadata": {"session_id": "s1"},
            })),
        )
        .await;
    }

    let (status, body) = send(
        &app,
        "POST",
        "/api/v1/recall/dialogue",
        Some(json!({"user_id": "u1", "session_id": "s1"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["count"], 2);
    assert_eq!(body["dialogue"][0]["content"], "早上好");

    let (status, body) = send(
        &app,
        "POST",
        "/api/v1/recall/hybrid",
        Some(json!({"user_id": "u1", "session_id": "s1", "query": "公园"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    // Defaults: multi_turn stage, 4000-token budget.
    assert!(body["strategy"].as_str().unwrap().contains("multi_turn"));
    assert_eq!(
        body["tokens_used"].as_u64().unwrap(),
        100 * (body["dialogue_count"].as_u64().unwrap()
            + body["topic_count"].as_u64().unwrap()
            + body["profile_count"].as_u64().unwrap())
    );

    let (status, body) = send(
        &app,
        "POST",
        "/api/v1/recall/profile",
        Some(json!({"user_id": "u1"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["count"], 0);
}

#[tokio::test]
async fn test_health_and_metrics() {
    let app = test_app();

    let (status, body) = send(&app, "GET", "/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["service"], "mnemos");
    // Mock mode: no real backends configured, but nothing is degraded.
    assert_eq!(body["db"], false);
    assert_eq!(body["vector"], false);

    let (status, _) = send(&app, "GET", "/metrics", None).await;
    assert_eq!(status, StatusCode::OK);
}
