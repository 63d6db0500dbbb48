// src/config/mod.rs
// Central configuration for the ratchet daemon.

pub mod classifier;
pub mod database;
pub mod documentation;
pub mod helpers;
pub mod llm;
pub mod server;
pub mod slack;

use serde::{Deserialize, Serialize};
use std::path::Path;

use classifier::ClassifierConfig;
use database::DatabaseConfig;
use documentation::DocumentationConfig;
use llm::{LLMUsageCleanupConfig, OpenAIConfig};
use server::ServerConfig;
use slack::SlackConfig;

/// Composes all domain configs. Secrets and per-process overrides come from
/// the environment (via `.env`, loaded once at startup); the documentation
/// source list comes from a YAML file since it's a nested structure that
/// doesn't map cleanly onto env vars.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub classifier: ClassifierConfig,
    pub openai: OpenAIConfig,
    pub slack: SlackConfig,
    pub documentation: DocumentationConfig,
    pub llm_usage_cleanup: LLMUsageCleanupConfig,
}

impl Config {
    /// Loads env-sourced config plus the documentation source list from
    /// `config_path` (a YAML file). Missing YAML file is not an error: a
    /// fresh install with no documentation sources configured is valid.
    pub fn load(config_path: &Path) -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let documentation = if config_path.exists() {
            let raw = std::fs::read_to_string(config_path)?;
            serde_yaml::from_str(&raw)?
        } else {
            DocumentationConfig::default()
        };

        let config = Self {
            server: ServerConfig::from_env(),
            database: DatabaseConfig::from_env(),
            classifier: ClassifierConfig::from_env(),
            openai: OpenAIConfig::from_env(),
            slack: SlackConfig::from_env(),
            documentation,
            llm_usage_cleanup: LLMUsageCleanupConfig::from_env(),
        };

        config.validate()?;
        Ok(config)
    }

    /// Validated once at startup rather than lazily at first use, so a
    /// misconfiguration surfaces as a bootstrap failure instead of a
    /// confusing mid-run job failure.
    pub fn validate(&self) -> anyhow::Result<()> {
        if !self.server.dev_mode {
            self.slack.validate()?;
            self.openai.validate()?;
        }
        self.documentation.validate()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn loads_defaults_without_yaml_file() {
        // SAFETY: test-only env mutation, single-threaded within this test.
        unsafe {
            std::env::set_var("DEV_MODE", "true");
        }
        let config = Config::load(Path::new("/nonexistent/config.yaml")).unwrap();
        assert!(config.documentation.sources.is_empty());
        unsafe {
            std::env::remove_var("DEV_MODE");
        }
    }
}
