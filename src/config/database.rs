// src/config/database.rs

use serde::{Deserialize, Serialize};

use super::helpers::{env_bool, env_or, env_parsed};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    pub name: String,
    pub disable_tls: bool,
    pub max_connections: u32,
}

impl DatabaseConfig {
    pub fn from_env() -> Self {
        Self {
            host: env_or("DATABASE_HOST", "localhost"),
            port: env_parsed("DATABASE_PORT", 5432),
            user: env_or("DATABASE_USER", "ratchet"),
            password: env_or("DATABASE_PASSWORD", ""),
            name: env_or("DATABASE_NAME", "ratchet"),
            disable_tls: env_bool("DATABASE_DISABLE_TLS", true),
            max_connections: env_parsed("DATABASE_MAX_CONNECTIONS", 20),
        }
    }

    pub fn connection_string(&self) -> String {
        let sslmode = if self.disable_tls { "disable" } else { "require" };
        format!(
            "postgres://{}:{}@{}:{}/{}?sslmode={}",
            self.user, self.password, self.host, self.port, self.name, sslmode
        )
    }
}
