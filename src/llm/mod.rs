// src/llm/mod.rs
//
// The LLM client is an external collaborator: the core consumes it through
// these two traits only. `openai.rs` is a thin reqwest-based adapter against
// an OpenAI-compatible completions/embeddings API (the `openai.*` config
// surface is deliberately generic enough to point at a self-hosted gateway
// in dev mode).

pub mod openai;

use async_trait::async_trait;

use crate::error::CoreResult;

#[async_trait]
pub trait Embedder: Send + Sync {
    async fn embed(&self, text: &str) -> CoreResult<Vec<f32>>;
    fn dimension(&self) -> usize;
}

#[async_trait]
pub trait Completion: Send + Sync {
    async fn complete(&self, system_prompt: &str, user_prompt: &str) -> CoreResult<String>;
}
