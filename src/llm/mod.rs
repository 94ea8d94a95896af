// src/llm/mod.rs

//! LLM clients backing the distillation pipelines.

pub mod mock;
pub mod openai;

pub use mock::MockLlm;
pub use openai::{OpenAiChat, strip_code_fences};
