// src/llm/openai.rs

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::config::llm::OpenAIConfig;
use crate::data::llm_usage;
use crate::db::Pool;
use crate::error::{CoreError, CoreResult};

use super::{Completion, Embedder};

pub struct OpenAIClient {
    client: reqwest::Client,
    config: OpenAIConfig,
    pool: Pool,
}

impl OpenAIClient {
    pub fn new(config: OpenAIConfig, pool: Pool) -> Self {
        Self { client: reqwest::Client::new(), config, pool }
    }
}

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a str,
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingDatum>,
    usage: Usage,
}

#[derive(Deserialize)]
struct EmbeddingDatum {
    embedding: Vec<f32>,
}

#[derive(Deserialize)]
struct Usage {
    prompt_tokens: i64,
    #[serde(default)]
    completion_tokens: i64,
}

#[async_trait]
impl Embedder for OpenAIClient {
    async fn embed(&self, text: &str) -> CoreResult<Vec<f32>> {
        let resp = self
            .client
            .post(format!("{}/embeddings", self.config.base_url))
            .bearer_auth(&self.config.api_key)
            .json(&EmbeddingRequest { model: &self.config.embedding_model, input: text })
            .send()
            .await?;

        let body: EmbeddingResponse = resp.json().await?;
        let vector = body
            .data
            .into_iter()
            .next()
            .ok_or_else(|| CoreError::permanent("embedding response had no data"))?
            .embedding;

        llm_usage::record(&self.pool, &self.config.embedding_model, body.usage.prompt_tokens, body.usage.completion_tokens)
            .await
            .map_err(CoreError::from)?;
        crate::metrics::record_llm_call("embedding", true);

        Ok(vector)
    }

    fn dimension(&self) -> usize {
        self.config.embedding_dim
    }
}

#[derive(Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    messages: Vec<CompletionMessage<'a>>,
}

#[derive(Serialize)]
struct CompletionMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct CompletionResponse {
    choices: Vec<CompletionChoice>,
    usage: Usage,
}

#[derive(Deserialize)]
struct CompletionChoice {
    message: CompletionChoiceMessage,
}

#[derive(Deserialize)]
struct CompletionChoiceMessage {
    content: String,
}

#[async_trait]
impl Completion for OpenAIClient {
    async fn complete(&self, system_prompt: &str, user_prompt: &str) -> CoreResult<String> {
        let request = CompletionRequest {
            model: &self.config.completion_model,
            messages: vec![
                CompletionMessage { role: "system", content: system_prompt },
                CompletionMessage { role: "user", content: user_prompt },
            ],
        };

        let resp: CompletionResponse = self
            .client
            .post(format!("{}/chat/completions", self.config.base_url))
            .bearer_auth(&self.config.api_key)
            .json(&request)
            .send()
            .await?
            .json()
            .await?;

        let text = resp
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| CoreError::permanent("completion response had no choices"))?
            .message
            .content;

        llm_usage::record(&self.pool, &self.config.completion_model, resp.usage.prompt_tokens, resp.usage.completion_tokens)
            .await
            .map_err(CoreError::from)?;
        crate::metrics::record_llm_call("completion", true);

        Ok(text)
    }
}
