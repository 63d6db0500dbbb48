// src/config/llm.rs

use serde::{Deserialize, Serialize};

use super::helpers::{env_or, env_parsed};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenAIConfig {
    pub base_url: String,
    pub api_key: String,
    pub completion_model: String,
    pub embedding_model: String,
    pub embedding_dim: usize,
}

impl OpenAIConfig {
    pub fn from_env() -> Self {
        Self {
            base_url: env_or("OPENAI_BASE_URL", "https://api.openai.com/v1"),
            api_key: env_or("OPENAI_API_KEY", ""),
            completion_model: env_or("OPENAI_MODEL", "gpt-4o-mini"),
            embedding_model: env_or("OPENAI_EMBEDDING_MODEL", "text-embedding-3-small"),
            embedding_dim: env_parsed("OPENAI_EMBEDDING_DIM", 768),
        }
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.api_key.is_empty() {
            anyhow::bail!("openai.api_key must be set");
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LLMUsageCleanupConfig {
    pub default_retention_days: i64,
}

impl LLMUsageCleanupConfig {
    pub fn from_env() -> Self {
        Self {
            default_retention_days: env_parsed("LLM_USAGE_CLEANUP_DEFAULT_RETENTION_DAYS", 90),
        }
    }
}
