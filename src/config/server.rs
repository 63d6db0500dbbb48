// src/config/server.rs

use serde::{Deserialize, Serialize};

use super::helpers::{env_bool, env_or};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub http_addr: String,
    pub dev_mode: bool,
}

impl ServerConfig {
    pub fn from_env() -> Self {
        Self {
            http_addr: env_or("HTTP_ADDR", "0.0.0.0:8080"),
            dev_mode: env_bool("DEV_MODE", false),
        }
    }
}
