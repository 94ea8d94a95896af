// src/memory/embedding.rs

//! Embedding generation.
//!
//! Single-text embeddings serialize behind an [`EmbedGate`]: the upstream
//! provider enforces per-process QPS caps, so one exclusive lock plus a
//! minimum inter-request spacing is sufficient. Batch embeddings bypass the
//! gate.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::debug;

use crate::memory::core::traits::Embedder;
use crate::metrics;

/// Minimum spacing between single-shot upstream requests.
pub const DEFAULT_EMBED_INTERVAL: Duration = Duration::from_secs(1);

/// Classify an embedding failure for the metrics label.
pub fn classify_embedding_error(message: &str) -> &'static str {
    if message.contains("403") || message.contains("Forbidden") {
        "throttled"
    } else if message.contains("timeout") {
        "timeout"
    } else if message.contains("invalid") || message.contains("parse") {
        "invalid_response"
    } else {
        "unknown"
    }
}

/// Process-wide pacing gate for single-text embeddings: an exclusive lock
/// over the last-request instant. The timestamp is stamped after the
/// upstream call returns, success or failure.
pub struct EmbedGate {
    min_interval: Duration,
    last_request: Mutex<Option<Instant>>,
}

impl EmbedGate {
    pub fn new(min_interval: Duration) -> Self {
        Self {
            min_interval,
            last_request: Mutex::new(None),
        }
    }

    /// Run `call` under the gate, sleeping out the remainder of the
    /// inter-request interval first.
    pub async fn pace<T, Fut>(&self, call: impl FnOnce() -> Fut) -> T
    where
        Fut: Future<Output = T>,
    {
        let mut last = self.last_request.lock().await;
        if let Some(prev) = *last {
            let wait = self.min_interval.saturating_sub(prev.elapsed());
            if !wait.is_zero() {
                debug!("embed gate pacing: sleeping {:?}", wait);
                tokio::time::sleep(wait).await;
            }
        }
        let output = call().await;
        *last = Some(Instant::now());
        output
    }
}

impl Default for EmbedGate {
    fn default() -> Self {
        Self::new(DEFAULT_EMBED_INTERVAL)
    }
}

/// Embedder against an OpenAI-compatible `/embeddings` endpoint.
pub struct OpenAiEmbedder {
    client: reqwest::Client,
    api_key: String,
    model: String,
    base_url: String,
    dimension: usize,
    gate: Arc<EmbedGate>,
}

impl OpenAiEmbedder {
    pub fn new(
        api_key: impl Into<String>,
        model: impl Into<String>,
        base_url: impl Into<String>,
        dimension: usize,
        gate: Arc<EmbedGate>,
    ) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key: api_key.into(),
            model: model.into(),
            base_url: base_url.into(),
            dimension,
            gate,
        }
    }

    fn api_url(&self) -> String {
        format!("{}/embeddings", self.base_url.trim_end_matches('/'))
    }

    async fn request_embeddings(&self, inputs: &[String]) -> Result<Vec<Vec<f32>>> {
        let response = self
            .client
            .post(self.api_url())
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&serde_json::json!({
                "model": &self.model,
                "input": inputs,
                "encoding_format": "float",
            }))
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("embedding API error {}: {}", status.as_u16(), body);
        }

        let raw: serde_json::Value = response
            .json()
            .await
            .context("failed to parse embedding response")?;

        let data = raw
            .get("data")
            .and_then(|d| d.as_array())
            .ok_or_else(|| anyhow::anyhow!("invalid embedding response: missing data array"))?;

        let embeddings: Vec<Vec<f32>> = data
            .iter()
            .filter_map(|item| {
                item.get("embedding").and_then(|e| e.as_array()).map(|arr| {
                    arr.iter()
                        .filter_map(|v| v.as_f64().map(|f| f as f32))
                        .collect()
                })
            })
            .collect();

        if embeddings.len() != inputs.len() {
            anyhow::bail!(
                "invalid embedding response: got {} vectors for {} inputs",
                embeddings.len(),
                inputs.len()
            );
        }
        Ok(embeddings)
    }

    /// Truncation-based dimensionality reduction: the upstream may return
    /// higher-dimensional vectors than configured.
    fn fit_dimension(&self, mut vector: Vec<f32>) -> Result<Vec<f32>> {
        if vector.len() < self.dimension {
            anyhow::bail!(
                "invalid embedding dimension from upstream: got {}, need {}",
                vector.len(),
                self.dimension
            );
        }
        vector.truncate(self.dimension);
        Ok(vector)
    }

    fn record_failure(error: &anyhow::Error) {
        let kind = classify_embedding_error(&error.to_string());
        ::metrics::counter!(metrics::EMBEDDING_ERRORS, "kind" => kind).increment(1);
    }
}

#[async_trait]
impl Embedder for OpenAiEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        if text.is_empty() {
            return Ok(Vec::new());
        }

        let started = Instant::now();
        let inputs = vec![text.to_string()];
        let result = self.gate.pace(|| self.request_embeddings(&inputs)).await;
        ::metrics::histogram!(metrics::EMBEDDING_DURATION).record(started.elapsed().as_secs_f64());

        match result {
            Ok(mut vectors) => self.fit_dimension(vectors.remove(0)),
            Err(e) => {
                Self::record_failure(&e);
                Err(e)
            }
        }
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        // Batch calls bypass the gate.
        match self.request_embeddings(texts).await {
            Ok(vectors) => vectors.into_iter().map(|v| self.fit_dimension(v)).collect(),
            Err(e) => {
                Self::record_failure(&e);
                Err(e)
            }
        }
    }
}

/// Deterministic local embedder for mock mode and tests. Vectors are a
/// normalized hash spread of the input bytes, so identical texts map to
/// identical vectors.
pub struct MockEmbedder {
    dimension: usize,
}

impl MockEmbedder {
    pub fn new(dimension: usize) -> Self {
        Self { dimension }
    }

    fn hash_vector(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0f32; self.dimension];
        let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
        for byte in text.bytes() {
            hash ^= byte as u64;
            hash = hash.wrapping_mul(0x0000_0100_0000_01b3);
            let index = (hash as usize) % self.dimension;
            vector[index] += ((hash >> 32) as f32 / u32::MAX as f32) - 0.5;
        }
        let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm > 0.0 {
            for v in &mut vector {
                *v /= norm;
            }
        }
        vector
    }
}

#[async_trait]
impl Embedder for MockEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        if text.is_empty() {
            return Ok(Vec::new());
        }
        Ok(self.hash_vector(text))
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|t| self.hash_vector(t)).collect())
    }
}
