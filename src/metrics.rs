// src/metrics.rs

//! Metric names recorded across the service. The Prometheus recorder is
//! installed in main; `/metrics` renders it.

pub const MEMORIES_CREATED: &str = "mnemos_memories_created_total";
pub const DEGRADED_WRITES: &str = "mnemos_degraded_writes_total";
pub const MEMORY_SEARCHES: &str = "mnemos_memory_searches_total";
pub const RECALL_REQUESTS: &str = "mnemos_recall_requests_total";
pub const EMBEDDING_DURATION: &str = "mnemos_embedding_duration_seconds";
pub const EMBEDDING_ERRORS: &str = "mnemos_embedding_errors_total";
