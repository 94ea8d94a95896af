// src/memory/storage/mod.rs

//! Storage backends for the memory system.
//!
//! SQLite holds the durable metadata partitions, Qdrant the derived vector
//! index; the in-memory pair backs mock mode and the test suite.

pub mod memory;
pub mod qdrant;
pub mod sqlite;

pub use memory::{InMemoryMetadataStore, InMemoryVectorStore};
pub use qdrant::QdrantVectorStore;
pub use sqlite::SqliteMetadataStore;
