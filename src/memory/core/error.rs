// src/memory/core/error.rs

use thiserror::Error;

/// Domain errors surfaced by the memory manager. Component boundaries wrap
/// their failures with operation context; the HTTP adapter maps variants to
/// status codes.
#[derive(Debug, Error)]
pub enum MemoryError {
    /// Empty required field, invalid enum, out-of-range parameter. Never
    /// retried.
    #[error("invalid request: {0}")]
    Validation(String),

    #[error("memory not found: {0}")]
    NotFound(String),

    /// Embedding failed after the retry loop was exhausted (or, for
    /// non-retryable paths, on the first attempt).
    #[error("embedding failed after {attempts} attempt(s): {source}")]
    Embedding {
        attempts: u32,
        #[source]
        source: anyhow::Error,
    },

    #[error("vector store: {0}")]
    VectorStore(#[source] anyhow::Error),

    #[error("metadata store: {0}")]
    MetadataStore(#[source] anyhow::Error),

    #[error("llm: {0}")]
    Llm(#[source] anyhow::Error),

    /// Declared operations whose semantics are documented but not shipped.
    #[error("{0} is not implemented")]
    Unimplemented(&'static str),
}
