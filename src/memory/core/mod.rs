// src/memory/core/mod.rs

//! Core types, traits and errors shared by every memory backend.

pub mod error;
pub mod traits;
pub mod types;

pub use error::MemoryError;
pub use traits::{Embedder, LlmClient, MetadataStore, VectorStore};
pub use types::{
    DialogStage, Intent, Memory, MemoryLayer, MemoryType, RecallCaps, RecallRequest, RecallResult,
    TopicSummary, UserProfile,
};
