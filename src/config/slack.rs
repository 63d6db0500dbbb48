// src/config/slack.rs

use serde::{Deserialize, Serialize};

use super::helpers::env_or;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SlackConfig {
    pub bot_token: String,
    pub app_token: String,
    pub dev_channel: String,
}

impl SlackConfig {
    pub fn from_env() -> Self {
        Self {
            bot_token: env_or("SLACK_BOT_TOKEN", ""),
            app_token: env_or("SLACK_APP_TOKEN", ""),
            dev_channel: env_or("SLACK_DEV_CHANNEL", ""),
        }
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.bot_token.is_empty() {
            anyhow::bail!("slack_bot_token must be set");
        }
        Ok(())
    }
}
